//! Scheduler sketch: a shared MPMC injector feeds per-thread work-stealing
//! deques, and each thread recycles its scratch buffers through an object pool.
//!
//! Run with `--features tracing` and `RUST_LOG=ringkit=debug` to see pool
//! allocations and construction logs.

use ringkit::deque::{Stealer, Worker};
use ringkit::{MpmcQueue, ObjectPool, PopError, StealError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const WORKERS: usize = 4;
const JOBS: usize = 2_000;
const LOCAL_SLOTS: usize = 256;

struct Job {
    id: usize,
    // Jobs with depth > 0 fan out into two children.
    depth: u8,
}

fn main() {
    ringkit::init_tracing();
    println!("ringkit - Work Stealing Example\n");

    let injector = Arc::new(MpmcQueue::<Job, 1024>::new());
    // Count every job (roots and children) up front so workers know when to stop.
    let per_root = (1usize << 3) - 1;
    let pending = Arc::new(AtomicUsize::new(JOBS * per_root));

    let workers: Vec<Worker<Job, LOCAL_SLOTS>> = (0..WORKERS).map(|_| Worker::new()).collect();
    let stealers: Arc<Vec<Stealer<Job, LOCAL_SLOTS>>> =
        Arc::new(workers.iter().map(Worker::stealer).collect());

    let handles: Vec<_> = workers
        .into_iter()
        .enumerate()
        .map(|(index, local)| {
            let injector = Arc::clone(&injector);
            let stealers = Arc::clone(&stealers);
            let pending = Arc::clone(&pending);
            thread::spawn(move || run_worker(index, local, &injector, &stealers, &pending))
        })
        .collect();

    for id in 0..JOBS {
        let mut job = Job { id, depth: 2 };
        while let Err(e) = injector.try_push(job) {
            job = e.into_inner();
            thread::yield_now();
        }
    }

    let mut total = Stats::default();
    for (index, h) in handles.into_iter().enumerate() {
        let stats = h.join().unwrap();
        println!(
            "worker {}: ran {:>5} jobs (local {:>5}, injected {:>4}, stolen {:>4}), {} buffers built",
            index, stats.ran, stats.local, stats.injected, stats.stolen, stats.built
        );
        total.ran += stats.ran;
    }

    assert_eq!(total.ran, JOBS * per_root);
    println!("\nAll {} jobs completed.", total.ran);
}

#[derive(Default)]
struct Stats {
    ran: usize,
    local: usize,
    injected: usize,
    stolen: usize,
    built: usize,
}

fn run_worker(
    index: usize,
    local: Worker<Job, LOCAL_SLOTS>,
    injector: &MpmcQueue<Job, 1024>,
    stealers: &[Stealer<Job, LOCAL_SLOTS>],
    pending: &AtomicUsize,
) -> Stats {
    let mut scratch = ObjectPool::<Vec<u64>, 8>::new();
    let mut stats = Stats::default();

    loop {
        let job = if let Some(job) = local.pop() {
            stats.local += 1;
            job
        } else if let Some(job) = take_injected(injector) {
            stats.injected += 1;
            job
        } else if let Some(job) = steal_from_peers(index, stealers) {
            stats.stolen += 1;
            job
        } else if pending.load(Ordering::Acquire) == 0 {
            break;
        } else {
            thread::yield_now();
            continue;
        };

        if scratch.is_empty() {
            stats.built += 1;
        }
        let mut buf = scratch.acquire();
        buf.clear();
        buf.extend((0..64).map(|k| (job.id as u64).wrapping_mul(k)));

        if job.depth > 0 {
            for _ in 0..2 {
                let child = Job { id: job.id, depth: job.depth - 1 };
                if let Err(full) = local.push(child) {
                    // Local deque is full: overflow into the shared injector.
                    let mut child = full.into_inner();
                    while let Err(e) = injector.try_push(child) {
                        child = e.into_inner();
                        thread::yield_now();
                    }
                }
            }
        }

        scratch.release(buf);
        stats.ran += 1;
        pending.fetch_sub(1, Ordering::AcqRel);
    }
    stats
}

fn take_injected(injector: &MpmcQueue<Job, 1024>) -> Option<Job> {
    loop {
        match injector.try_pop() {
            Ok(job) => return Some(job),
            Err(PopError::Empty) => return None,
            Err(PopError::Contended) => std::hint::spin_loop(),
        }
    }
}

fn steal_from_peers(index: usize, stealers: &[Stealer<Job, LOCAL_SLOTS>]) -> Option<Job> {
    let n = stealers.len();
    for offset in 1..n {
        let victim = &stealers[(index + offset) % n];
        loop {
            match victim.steal() {
                Ok(job) => return Some(job),
                Err(StealError::Empty) => break,
                Err(StealError::Contended) => std::hint::spin_loop(),
            }
        }
    }
    None
}
