use crossbeam_utils::Backoff;
use ringkit::{spsc, MpmcQueue, PushError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const MESSAGES: usize = 1_000_000;
const BUFFER_SIZE: usize = 1024;

fn report(label: &str, elapsed: Duration) {
    let throughput = MESSAGES as f64 / elapsed.as_secs_f64();
    println!("{} ({} messages):", label, MESSAGES);
    println!("  Time: {:?}", elapsed);
    println!("  Throughput: {:.2} msgs/sec", throughput);
    println!("  Latency: {:.0} ns/op\n", elapsed.as_nanos() as f64 / MESSAGES as f64);
}

fn main() {
    println!("ringkit Performance Test");
    println!("========================\n");

    let start = Instant::now();
    test_spsc();
    report("SPSC, 1 Producer, 1 Consumer", start.elapsed());

    let start = Instant::now();
    test_mpmc_1p_1c();
    report("MPMC, 1 Producer, 1 Consumer", start.elapsed());

    let start = Instant::now();
    let contended = test_mpmc_4p_4c();
    report("MPMC, 4 Producers, 4 Consumers", start.elapsed());
    println!("  Contended pushes: {}", contended);
}

fn test_spsc() {
    let (tx, rx) = spsc::channel::<usize, BUFFER_SIZE>();

    let producer = thread::spawn(move || {
        for i in 0..MESSAGES {
            let mut item = i;
            while let Err(full) = tx.try_push(item) {
                item = full.into_inner();
                std::hint::spin_loop();
            }
        }
    });

    let consumer = thread::spawn(move || {
        for _ in 0..MESSAGES {
            while rx.try_pop().is_none() {
                std::hint::spin_loop();
            }
        }
    });

    producer.join().unwrap();
    consumer.join().unwrap();
}

fn test_mpmc_1p_1c() {
    let queue = Arc::new(MpmcQueue::<usize, BUFFER_SIZE>::new());
    let q_send = queue.clone();
    let q_recv = queue.clone();

    let producer = thread::spawn(move || {
        for i in 0..MESSAGES {
            let mut item = i;
            while let Err(e) = q_send.try_push(item) {
                item = e.into_inner();
                std::hint::spin_loop();
            }
        }
    });

    let consumer = thread::spawn(move || {
        for _ in 0..MESSAGES {
            while q_recv.try_pop().is_err() {
                std::hint::spin_loop();
            }
        }
    });

    producer.join().unwrap();
    consumer.join().unwrap();
}

fn test_mpmc_4p_4c() -> usize {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const MSGS_PER_PRODUCER: usize = MESSAGES / PRODUCERS;
    const MSGS_PER_CONSUMER: usize = MESSAGES / CONSUMERS;

    let queue = Arc::new(MpmcQueue::<usize, BUFFER_SIZE>::new());
    let contended = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for p in 0..PRODUCERS {
        let q = queue.clone();
        let contended = contended.clone();
        handles.push(thread::spawn(move || {
            let backoff = Backoff::new();
            for i in 0..MSGS_PER_PRODUCER {
                let mut item = p * MSGS_PER_PRODUCER + i;
                loop {
                    match q.try_push(item) {
                        Ok(()) => break,
                        Err(PushError::Contended(v)) => {
                            contended.fetch_add(1, Ordering::Relaxed);
                            item = v;
                            backoff.spin();
                        }
                        Err(PushError::Full(v)) => {
                            item = v;
                            backoff.snooze();
                        }
                    }
                }
                backoff.reset();
            }
        }));
    }

    for _ in 0..CONSUMERS {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            let backoff = Backoff::new();
            for _ in 0..MSGS_PER_CONSUMER {
                while q.try_pop().is_err() {
                    backoff.snooze();
                }
                backoff.reset();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
    contended.load(Ordering::Relaxed)
}
