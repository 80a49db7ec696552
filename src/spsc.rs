//! Bounded lock-free single-producer single-consumer queue.
//!
//! # Overview
//!
//! - [`SpscQueue`] - the ring itself; `&mut self` push/pop for single-threaded use
//! - [`Producer`] - write end after [`SpscQueue::into_split`] or [`channel`]
//! - [`Consumer`] - read end
//!
//! The producer publishes `tail` with `Release` after writing a slot and the
//! consumer loads it with `Acquire` before reading, so a popped element is
//! always fully written. The consumer publishes `head` the same way so the
//! producer never reuses a slot that is still being read.
//!
//! # Example
//!
//! ```
//! use ringkit::spsc;
//!
//! let (tx, rx) = spsc::channel::<u64, 8>();
//!
//! let producer = std::thread::spawn(move || {
//!     for i in 0..100 {
//!         let mut item = i;
//!         while let Err(full) = tx.try_push(item) {
//!             item = full.into_inner();
//!             std::hint::spin_loop();
//!         }
//!     }
//! });
//!
//! let mut received = Vec::new();
//! while received.len() < 100 {
//!     if let Some(v) = rx.try_pop() {
//!         received.push(v);
//!     }
//! }
//! producer.join().unwrap();
//! assert_eq!(received, (0..100).collect::<Vec<_>>());
//! ```
//!
//! A capacity that is not a power of two does not compile:
//!
//! ```compile_fail
//! let queue = ringkit::SpscQueue::<u32, 3>::new();
//! ```

use std::cell::Cell as StdCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;

use crossbeam_utils::CachePadded;

use crate::error::Full;
use crate::ring::{alloc_cells, Capacity, Cell};
use crate::sync::{Arc, AtomicUsize, Ordering};
use crate::trace::{debug, trace};

/// Fixed-capacity SPSC ring of `N` slots holding up to `N - 1` elements.
pub struct SpscQueue<T, const N: usize> {
    /// Next slot to read. Written by the consumer only.
    head: CachePadded<AtomicUsize>,
    /// Next slot to write. Written by the producer only.
    tail: CachePadded<AtomicUsize>,
    buffer: Box<[Cell<T>; N]>,
}

impl<T, const N: usize> SpscQueue<T, N> {
    /// Number of elements the queue can hold.
    pub const CAPACITY: usize = Capacity::<N>::USABLE;

    /// Creates an empty queue.
    ///
    /// Fails to compile if `N` is zero or not a power of two.
    #[must_use]
    pub fn new() -> Self {
        let () = Capacity::<N>::CHECK;
        debug!(slots = N, capacity = Self::CAPACITY, "spsc queue created");
        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            buffer: alloc_cells(),
        }
    }

    /// Pushes `item` at the tail.
    ///
    /// # Errors
    ///
    /// Returns [`Full`] with the item when `N - 1` elements are queued.
    #[inline]
    pub fn try_push(&mut self, item: T) -> Result<(), Full<T>> {
        // SAFETY: `&mut self` makes this the only producer.
        unsafe { self.push(item) }
    }

    /// Pops the element at the head, or `None` if the queue is empty.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        // SAFETY: `&mut self` makes this the only consumer.
        unsafe { self.pop() }
    }

    /// Drops every queued element and resets both indices to zero.
    pub fn clear(&mut self) {
        let dropped = self.drain();
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
        debug!(dropped, "spsc queue cleared");
    }

    fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.try_pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    /// Splits the queue into its producer and consumer ends.
    #[must_use]
    pub fn into_split(self) -> (Producer<T, N>, Consumer<T, N>) {
        let queue = Arc::new(self);
        let producer = Producer {
            queue: Arc::clone(&queue),
            _unsync: PhantomData,
        };
        let consumer = Consumer {
            queue,
            _unsync: PhantomData,
        };
        (producer, consumer)
    }

    /// Approximate number of queued elements.
    ///
    /// Exact when called by the producer or consumer; a snapshot otherwise.
    #[inline]
    pub fn len(&self) -> usize {
        // head first: tail never trails a head value that was already observed.
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(Self::CAPACITY)
    }

    /// `true` if no element is queued (snapshot).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if a push would currently fail (snapshot).
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == Self::CAPACITY
    }

    /// Number of elements the queue can hold (`N - 1`).
    #[inline]
    pub const fn capacity(&self) -> usize {
        Self::CAPACITY
    }

    /// # Safety
    ///
    /// At most one thread may be pushing at any time.
    #[inline]
    unsafe fn push(&self, item: T) -> Result<(), Full<T>> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= Self::CAPACITY {
            trace!(head, tail, "spsc push rejected: full");
            return Err(Full(item));
        }

        // SAFETY: the slot at `tail` is outside [head, tail), so the consumer
        // is not reading it, and we are the only producer. The Acquire load of
        // `head` orders the consumer's last read of this slot before our write.
        self.buffer[tail & Capacity::<N>::MASK]
            .with_mut(|slot| unsafe { slot.write(MaybeUninit::new(item)) });

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// # Safety
    ///
    /// At most one thread may be popping at any time.
    #[inline]
    unsafe fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        // SAFETY: head != tail, so the producer initialized this slot and the
        // Acquire load of `tail` made that write visible. The producer will not
        // touch the slot again until we publish `head + 1`.
        let item = self.buffer[head & Capacity::<N>::MASK]
            .with(|slot| unsafe { slot.read().assume_init() });

        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }
}

impl<T, const N: usize> Default for SpscQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> fmt::Debug for SpscQueue<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpscQueue")
            .field("len", &self.len())
            .field("capacity", &Self::CAPACITY)
            .finish()
    }
}

impl<T, const N: usize> Drop for SpscQueue<T, N> {
    fn drop(&mut self) {
        self.drain();
    }
}

// SAFETY: elements move between threads, hence `T: Send`. The only `&self`
// methods that touch slots are the private `push`/`pop`, reachable solely
// through `&mut self` or through the unique, `!Sync` Producer/Consumer.
unsafe impl<T: Send, const N: usize> Send for SpscQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for SpscQueue<T, N> {}

/// Marker to opt out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<StdCell<&'static ()>>;

/// Creates an SPSC queue and returns its two ends.
#[must_use]
pub fn channel<T, const N: usize>() -> (Producer<T, N>, Consumer<T, N>) {
    SpscQueue::new().into_split()
}

/// Write end of an [`SpscQueue`].
///
/// `Send` but not `Sync` or `Clone`: exactly one thread pushes at a time.
pub struct Producer<T, const N: usize> {
    queue: Arc<SpscQueue<T, N>>,
    _unsync: PhantomUnsync,
}

impl<T, const N: usize> Producer<T, N> {
    /// Pushes `item` at the tail. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Full`] with the item when the queue is full.
    #[inline]
    pub fn try_push(&self, item: T) -> Result<(), Full<T>> {
        // SAFETY: the producer handle is unique and not Sync.
        unsafe { self.queue.push(item) }
    }

    /// Approximate number of queued elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` if no element is queued (snapshot).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// `true` if a push would currently fail (snapshot).
    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Number of elements the queue can hold.
    #[inline]
    pub const fn capacity(&self) -> usize {
        SpscQueue::<T, N>::CAPACITY
    }
}

impl<T, const N: usize> fmt::Debug for Producer<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("queue", &*self.queue).finish()
    }
}

/// Read end of an [`SpscQueue`]. Same thread-safety rules as [`Producer`].
pub struct Consumer<T, const N: usize> {
    queue: Arc<SpscQueue<T, N>>,
    _unsync: PhantomUnsync,
}

impl<T, const N: usize> Consumer<T, N> {
    /// Pops the element at the head, or `None` if the queue is empty.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        // SAFETY: the consumer handle is unique and not Sync.
        unsafe { self.queue.pop() }
    }

    /// Pops and drops everything currently queued, returning how many
    /// elements were dropped. Safe to call while the producer keeps pushing.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.try_pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    /// Approximate number of queued elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` if no element is queued (snapshot).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of elements the queue can hold.
    #[inline]
    pub const fn capacity(&self) -> usize {
        SpscQueue::<T, N>::CAPACITY
    }
}

impl<T, const N: usize> fmt::Debug for Consumer<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("queue", &*self.queue).finish()
    }
}
