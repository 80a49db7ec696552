//! Bounded lock-free multi-producer multi-consumer queue.
//!
//! Producers reserve a tail ticket and consumers a head ticket with a single
//! compare-and-swap each. A lost CAS is reported to the caller as
//! [`PushError::Contended`] / [`PopError::Contended`] instead of being retried
//! internally, so the worst-case cost of one call is bounded and retry or
//! backoff policy stays with the caller.
//!
//! Reserving a ticket and moving the payload are separate steps. Each slot
//! therefore carries a stamp telling which ticket it is ready for:
//!
//! - `stamp == ticket`: empty, writable by the producer holding `ticket`
//! - `stamp == ticket + 1`: written, readable by the consumer holding `ticket`
//! - `stamp == ticket + N`: drained, writable on the next lap
//!
//! A slot whose previous lap is still being read, or whose producer has
//! reserved it but not finished writing, is reported as contended rather than
//! handed out. Capacity should still be large relative to the number of
//! threads hammering the queue, otherwise most calls end up contended.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ringkit::{MpmcQueue, PopError};
//!
//! let queue = Arc::new(MpmcQueue::<u32, 64>::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|p| {
//!         let q = Arc::clone(&queue);
//!         std::thread::spawn(move || {
//!             for i in 0..8 {
//!                 let mut item = p * 100 + i;
//!                 while let Err(e) = q.try_push(item) {
//!                     item = e.into_inner();
//!                     std::hint::spin_loop();
//!                 }
//!             }
//!         })
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap();
//! }
//!
//! let mut drained = 0;
//! loop {
//!     match queue.try_pop() {
//!         Ok(_) => drained += 1,
//!         Err(PopError::Empty) => break,
//!         Err(PopError::Contended) => continue,
//!     }
//! }
//! assert_eq!(drained, 32);
//! ```
//!
//! ```compile_fail
//! let queue = ringkit::MpmcQueue::<u32, 0>::new();
//! ```

use std::fmt;
use std::mem::MaybeUninit;

use crossbeam_utils::CachePadded;

use crate::error::{PopError, PushError};
use crate::ring::{alloc_slots, Capacity, Cell};
use crate::sync::{AtomicUsize, Ordering, UnsafeCell};
use crate::trace::{debug, trace};

/// One ring slot, aligned so neighbouring slots never share a cache line.
#[repr(C, align(64))]
struct Slot<T> {
    stamp: AtomicUsize,
    value: Cell<T>,
}

impl<T> Slot<T> {
    fn new(stamp: usize) -> Self {
        Self {
            stamp: AtomicUsize::new(stamp),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Fixed-capacity MPMC ring of `N` slots holding up to `N - 1` elements.
///
/// Share it between threads with `Arc` or scoped threads; every operation
/// takes `&self` except [`clear`](Self::clear).
pub struct MpmcQueue<T, const N: usize> {
    /// Next ticket to pop. Consumers CAS on this.
    head: CachePadded<AtomicUsize>,
    /// Next ticket to push. Producers CAS on this.
    tail: CachePadded<AtomicUsize>,
    slots: Box<[Slot<T>; N]>,
}

impl<T, const N: usize> MpmcQueue<T, N> {
    /// Number of elements the queue can hold.
    pub const CAPACITY: usize = Capacity::<N>::USABLE;

    /// Creates an empty queue.
    ///
    /// Fails to compile if `N` is zero or not a power of two.
    #[must_use]
    pub fn new() -> Self {
        let () = Capacity::<N>::CHECK;
        debug!(slots = N, capacity = Self::CAPACITY, "mpmc queue created");
        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            slots: alloc_slots(Slot::new),
        }
    }

    /// Attempts to push `item` with one tail reservation. Never blocks and
    /// never retries.
    ///
    /// # Errors
    ///
    /// - [`PushError::Full`] if the queue holds `N - 1` elements.
    /// - [`PushError::Contended`] if another producer won the tail slot or a
    ///   consumer is still draining it.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);

        if tail.wrapping_sub(head) >= Self::CAPACITY {
            trace!(head, tail, "mpmc push rejected: full");
            return Err(PushError::Full(item));
        }

        let slot = &self.slots[tail & Capacity::<N>::MASK];
        if slot.stamp.load(Ordering::Acquire) != tail {
            trace!(tail, "mpmc push rejected: slot not yet drained");
            return Err(PushError::Contended(item));
        }

        if self
            .tail
            .compare_exchange(tail, tail.wrapping_add(1), Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            trace!(tail, "mpmc push lost tail reservation");
            return Err(PushError::Contended(item));
        }

        // SAFETY: the CAS handed us ticket `tail` exclusively, and the stamp
        // check (Acquire) proved the previous lap's consumer has finished with
        // the slot. No other thread touches it until we bump the stamp.
        slot.value
            .with_mut(|value| unsafe { value.write(MaybeUninit::new(item)) });
        slot.stamp.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Attempts to pop the oldest element with one head reservation. Never
    /// blocks and never retries.
    ///
    /// # Errors
    ///
    /// - [`PopError::Empty`] if nothing has been pushed past the head.
    /// - [`PopError::Contended`] if another consumer won the head slot or its
    ///   producer has not finished writing it.
    pub fn try_pop(&self) -> Result<T, PopError> {
        let head = self.head.load(Ordering::Relaxed);
        let slot = &self.slots[head & Capacity::<N>::MASK];

        if slot.stamp.load(Ordering::Acquire) != head.wrapping_add(1) {
            if self.tail.load(Ordering::Relaxed) == head {
                return Err(PopError::Empty);
            }
            trace!(head, "mpmc pop rejected: slot not yet published");
            return Err(PopError::Contended);
        }

        if self
            .head
            .compare_exchange(head, head.wrapping_add(1), Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            trace!(head, "mpmc pop lost head reservation");
            return Err(PopError::Contended);
        }

        // SAFETY: the stamp (Acquire) proved the producer of ticket `head`
        // finished its write, and the CAS made us the only consumer of it.
        let item = slot.value.with(|value| unsafe { value.read().assume_init() });
        slot.stamp
            .store(head.wrapping_add(N), Ordering::Release);
        Ok(item)
    }

    /// Drops every queued element, resets both indices to zero and re-arms
    /// the slot stamps for the first lap.
    pub fn clear(&mut self) {
        let dropped = self.drain();
        for (i, slot) in self.slots.iter().enumerate() {
            slot.stamp.store(i, Ordering::Relaxed);
        }
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
        debug!(dropped, "mpmc queue cleared");
    }

    fn drain(&mut self) -> usize {
        let mut dropped = 0;
        // With exclusive access no reservation is in flight, so the only
        // failure left is `Empty`.
        while self.try_pop().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Approximate number of queued elements (snapshot).
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(Self::CAPACITY)
    }

    /// `true` if no ticket is outstanding (snapshot).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if a push would currently report full (snapshot).
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == Self::CAPACITY
    }

    /// Number of elements the queue can hold (`N - 1`).
    #[inline]
    pub const fn capacity(&self) -> usize {
        Self::CAPACITY
    }
}

impl<T, const N: usize> Default for MpmcQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> fmt::Debug for MpmcQueue<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpmcQueue")
            .field("len", &self.len())
            .field("capacity", &Self::CAPACITY)
            .finish()
    }
}

impl<T, const N: usize> Drop for MpmcQueue<T, N> {
    fn drop(&mut self) {
        self.drain();
    }
}

// SAFETY: slot contents are only accessed by the thread holding the matching
// ticket, and tickets are handed out by CAS; the stamps order the hand-off.
unsafe impl<T: Send, const N: usize> Send for MpmcQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for MpmcQueue<T, N> {}
