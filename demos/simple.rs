//! Simple usage example: one producer hands strings to one consumer.

use ringkit::spsc;
use std::thread;
use std::time::Duration;

fn main() {
    ringkit::init_tracing();
    println!("ringkit - Simple Example\n");

    // 16 slots, 15 usable
    let (tx, rx) = spsc::channel::<String, 16>();
    println!("capacity: {}", tx.capacity());

    let producer = thread::spawn(move || {
        for i in 0..10 {
            let mut message = format!("Message {}", i);
            println!("Sending: {}", message);

            while let Err(full) = tx.try_push(message) {
                // Ring is full, take the value back and retry
                message = full.into_inner();
                std::hint::spin_loop();
            }

            thread::sleep(Duration::from_millis(100));
        }
        println!("Producer finished!");
    });

    let consumer = thread::spawn(move || {
        for _ in 0..10 {
            loop {
                match rx.try_pop() {
                    Some(message) => {
                        println!("Received: {}", message);
                        break;
                    }
                    None => std::hint::spin_loop(),
                }
            }
        }
        println!("Consumer finished!");
    });

    producer.join().unwrap();
    consumer.join().unwrap();

    println!("\nExample completed successfully!");
}
