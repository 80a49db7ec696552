//! ringkit - fixed-capacity lock-free queues for schedulers and frame loops
//!
//! - [`SpscQueue`]: single-producer single-consumer FIFO ring
//! - [`MpmcQueue`]: multi-producer multi-consumer FIFO ring with single-CAS
//!   reservation and caller-driven retry
//! - [`ObjectPool`]: recycling pool of boxed instances over an SPSC ring
//! - [`deque::Worker`] / [`deque::Stealer`]: work-stealing deque, LIFO for the
//!   owner and FIFO for thieves
//!
//! Every ring has a power-of-two slot count `N` fixed at compile time, keeps
//! one slot empty (so holds at most `N - 1` elements) and never resizes. No
//! operation blocks: each one either completes or reports full, empty or a
//! lost race through its return value.
#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]
#![cfg_attr(not(feature = "tracing"), allow(unused_variables))]

pub mod deque;
mod error;
pub mod mpmc;
pub mod pool;
mod ring;
pub mod spsc;
mod sync;
mod trace;

pub use deque::{Stealer, Worker};
pub use error::{Full, PopError, PushError, StealError};
pub use mpmc::MpmcQueue;
pub use pool::ObjectPool;
pub use spsc::SpscQueue;
pub use trace::init_tracing;
