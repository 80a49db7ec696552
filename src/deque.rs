//! Fixed-capacity work-stealing deque.
//!
//! The [`Worker`] handle belongs to the owning thread, which pushes and pops
//! at the bottom end (LIFO, so recently spawned work stays cache-hot).
//! [`Stealer`] handles can be cloned and shared with any number of threads,
//! which take the oldest element from the top end (FIFO).
//!
//! `top` only ever moves through a sequentially consistent compare-and-swap,
//! which gives every contested removal (all steals, plus the owner's pop of
//! the last element) a single total order: exactly one contender gets each
//! element. `bottom` is written by the owner alone.
//!
//! Empty deques and lost races are ordinary outcomes: [`Worker::pop`] returns
//! `None` and [`Stealer::steal`] returns a [`StealError`], after which a
//! scheduler is expected to look for work elsewhere.
//!
//! # Example
//!
//! ```
//! use ringkit::deque::Worker;
//!
//! let worker = Worker::<_, 16>::new();
//! worker.push("a").unwrap();
//! worker.push("b").unwrap();
//! worker.push("c").unwrap();
//!
//! let stealer = worker.stealer();
//! let stolen = std::thread::spawn(move || stealer.steal().ok())
//!     .join()
//!     .unwrap();
//!
//! assert_eq!(stolen, Some("a"));
//! assert_eq!(worker.pop(), Some("c"));
//! assert_eq!(worker.pop(), Some("b"));
//! assert_eq!(worker.pop(), None);
//! ```
//!
//! ```compile_fail
//! let worker = ringkit::deque::Worker::<u32, 100>::new();
//! ```

use std::cell::Cell as StdCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;

use crossbeam_utils::CachePadded;

use crate::error::{Full, StealError};
use crate::ring::{alloc_cells, Capacity, Cell};
use crate::sync::{fence, Arc, AtomicIsize, Ordering};
use crate::trace::{debug, trace};

/// Storage shared by the worker and its stealers.
///
/// Indices are signed so the owner's speculative `bottom - 1` on an empty
/// deque compares below `top` instead of wrapping to a huge value.
struct Inner<T, const N: usize> {
    /// One past the newest element. Written by the owner only.
    bottom: CachePadded<AtomicIsize>,
    /// Oldest element. Advanced by SeqCst CAS only.
    top: CachePadded<AtomicIsize>,
    buffer: Box<[Cell<T>; N]>,
}

impl<T, const N: usize> Inner<T, N> {
    #[inline]
    fn cell(&self, index: isize) -> &Cell<T> {
        &self.buffer[index as usize & Capacity::<N>::MASK]
    }

    #[inline]
    fn len(&self) -> usize {
        let top = self.top.load(Ordering::Acquire);
        let bottom = self.bottom.load(Ordering::Acquire);
        usize::try_from(bottom.wrapping_sub(top)).unwrap_or(0)
    }
}

impl<T, const N: usize> Drop for Inner<T, N> {
    fn drop(&mut self) {
        let top = self.top.load(Ordering::Relaxed);
        let bottom = self.bottom.load(Ordering::Relaxed);
        let mut index = top;
        while index.wrapping_sub(bottom) < 0 {
            // SAFETY: every slot in [top, bottom) holds an element nobody
            // removed, and we are the last reference.
            self.cell(index)
                .with_mut(|slot| unsafe { (*slot).assume_init_drop() });
            index = index.wrapping_add(1);
        }
    }
}

// SAFETY: slots in [top, bottom) are owned by the deque; the owner writes
// only at `bottom` and removal of any slot is arbitrated by the CAS on `top`.
unsafe impl<T: Send, const N: usize> Send for Inner<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for Inner<T, N> {}

/// Marker to opt out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<StdCell<&'static ()>>;

/// Owner end of a work-stealing deque of `N` slots (`N - 1` usable).
///
/// `Send` but neither `Sync` nor `Clone`: exactly one thread pushes and pops.
pub struct Worker<T, const N: usize> {
    inner: Arc<Inner<T, N>>,
    _unsync: PhantomUnsync,
}

impl<T, const N: usize> Worker<T, N> {
    /// Number of elements the deque can hold.
    pub const CAPACITY: usize = Capacity::<N>::USABLE;

    /// Creates an empty deque owned by the calling thread.
    ///
    /// Fails to compile if `N` is zero or not a power of two.
    #[must_use]
    pub fn new() -> Self {
        let () = Capacity::<N>::CHECK;
        debug!(slots = N, capacity = Self::CAPACITY, "work-stealing deque created");
        Self {
            inner: Arc::new(Inner {
                bottom: CachePadded::new(AtomicIsize::new(0)),
                top: CachePadded::new(AtomicIsize::new(0)),
                buffer: alloc_cells(),
            }),
            _unsync: PhantomData,
        }
    }

    /// Creates a handle thieves use to take work from the top end.
    #[must_use]
    pub fn stealer(&self) -> Stealer<T, N> {
        Stealer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Pushes `item` at the bottom end.
    ///
    /// # Errors
    ///
    /// Returns [`Full`] with the item when `N - 1` elements are queued, so
    /// `bottom` never laps `top`.
    pub fn push(&self, item: T) -> Result<(), Full<T>> {
        let inner = &*self.inner;
        let bottom = inner.bottom.load(Ordering::Relaxed);
        let top = inner.top.load(Ordering::Acquire);

        if bottom.wrapping_sub(top) >= Self::CAPACITY as isize {
            trace!(top, bottom, "deque push rejected: full");
            return Err(Full(item));
        }

        // SAFETY: the slot at `bottom` is outside [top, bottom). Thieves only
        // read slots below the `bottom` they observe, and we publish the new
        // bottom only after the write.
        inner
            .cell(bottom)
            .with_mut(|slot| unsafe { slot.write(MaybeUninit::new(item)) });

        inner
            .bottom
            .store(bottom.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Pops the most recently pushed element.
    ///
    /// Returns `None` when the deque is empty, including when a thief won the
    /// race for the last remaining element.
    pub fn pop(&self) -> Option<T> {
        let inner = &*self.inner;
        let bottom = inner.bottom.load(Ordering::Relaxed);
        let top = inner.top.load(Ordering::Relaxed);
        if bottom.wrapping_sub(top) <= 0 {
            return None;
        }

        // Claim the bottom slot, then look at top. The fence keeps the store
        // and the load from being reordered, so a thief that read the old
        // bottom is visible to us through `top` and vice versa.
        let bottom = bottom.wrapping_sub(1);
        inner.bottom.store(bottom, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let top = inner.top.load(Ordering::Relaxed);

        let remaining = bottom.wrapping_sub(top);
        if remaining < 0 {
            // Thieves emptied the deque in between.
            inner
                .bottom
                .store(bottom.wrapping_add(1), Ordering::Relaxed);
            return None;
        }

        // SAFETY: `bottom` is in [top, old bottom), so the slot is initialized.
        // Thieves may read it concurrently only when it is the last element,
        // and then the CAS below decides who keeps it.
        let item = inner.cell(bottom).with(|slot| unsafe { slot.read() });

        if remaining > 0 {
            // SAFETY: more than one element remained; no thief can reach this
            // slot, so the copy we read is ours.
            return Some(unsafe { item.assume_init() });
        }

        let won = inner
            .top
            .compare_exchange(
                top,
                top.wrapping_add(1),
                Ordering::SeqCst,
                Ordering::Relaxed,
            )
            .is_ok();
        // Either way top has moved past this slot; restore bottom to match it.
        inner
            .bottom
            .store(bottom.wrapping_add(1), Ordering::Relaxed);

        if won {
            // SAFETY: the CAS made us the sole owner of the last element.
            Some(unsafe { item.assume_init() })
        } else {
            trace!(top, "deque pop lost the last element to a thief");
            None
        }
    }

    /// Approximate number of queued elements (snapshot).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// `true` if nothing is queued (snapshot).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements the deque can hold (`N - 1`).
    #[inline]
    pub const fn capacity(&self) -> usize {
        Self::CAPACITY
    }
}

impl<T, const N: usize> Default for Worker<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> fmt::Debug for Worker<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("len", &self.len())
            .field("capacity", &Self::CAPACITY)
            .finish()
    }
}

/// Thief end of a work-stealing deque. Cheap to clone and share.
pub struct Stealer<T, const N: usize> {
    inner: Arc<Inner<T, N>>,
}

impl<T, const N: usize> Stealer<T, N> {
    /// Takes the oldest element from the top end.
    ///
    /// # Errors
    ///
    /// - [`StealError::Empty`] if there was nothing to steal.
    /// - [`StealError::Contended`] if the owner or another thief removed the
    ///   element first. The caller decides whether to retry.
    pub fn steal(&self) -> Result<T, StealError> {
        let inner = &*self.inner;
        let top = inner.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let bottom = inner.bottom.load(Ordering::Acquire);

        if bottom.wrapping_sub(top) <= 0 {
            return Err(StealError::Empty);
        }

        // Read before claiming: once `top` moves past this slot the owner may
        // refill it. If the owner or another thief got here first, the CAS
        // fails and the bytes are discarded without being treated as a `T`.
        //
        // SAFETY: the slot index is in range and the value is kept as
        // `MaybeUninit` until the CAS confirms ownership.
        let item = inner
            .cell(top)
            .with(|slot| unsafe { ptr::read_volatile(slot) });

        if inner
            .top
            .compare_exchange(
                top,
                top.wrapping_add(1),
                Ordering::SeqCst,
                Ordering::Relaxed,
            )
            .is_err()
        {
            trace!(top, "deque steal lost the race");
            return Err(StealError::Contended);
        }

        // SAFETY: the CAS claimed index `top`, which was below the `bottom`
        // published with Release after its write.
        Ok(unsafe { item.assume_init() })
    }

    /// Approximate number of queued elements (snapshot).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// `true` if nothing is queued (snapshot).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, const N: usize> Clone for Stealer<T, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, const N: usize> fmt::Debug for Stealer<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stealer").field("len", &self.len()).finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn owner_is_lifo_thief_is_fifo() {
        let worker = Worker::<u32, 8>::new();
        let stealer = worker.stealer();
        for i in 0..5 {
            worker.push(i).unwrap();
        }
        assert_eq!(stealer.steal(), Ok(0));
        assert_eq!(stealer.steal(), Ok(1));
        assert_eq!(worker.pop(), Some(4));
        assert_eq!(worker.pop(), Some(3));
        assert_eq!(stealer.len(), 1);
        assert_eq!(worker.pop(), Some(2));
        assert_eq!(worker.pop(), None);
        assert_eq!(stealer.steal(), Err(StealError::Empty));
    }

    #[test]
    fn pop_on_empty_leaves_indices_alone() {
        let worker = Worker::<u32, 4>::new();
        assert_eq!(worker.pop(), None);
        assert_eq!(worker.inner.bottom.load(Ordering::Relaxed), 0);
        assert_eq!(worker.inner.top.load(Ordering::Relaxed), 0);
        worker.push(1).unwrap();
        assert_eq!(worker.pop(), Some(1));
        assert_eq!(worker.pop(), None);
        assert_eq!(worker.inner.bottom.load(Ordering::Relaxed), 1);
        assert_eq!(worker.inner.top.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn push_stops_one_short_of_a_lap() {
        let worker = Worker::<u32, 4>::new();
        for i in 0..3 {
            worker.push(i).unwrap();
        }
        assert_eq!(worker.push(3), Err(Full(3)));
        assert_eq!(worker.len(), 3);
        assert_eq!(worker.stealer().steal(), Ok(0));
        worker.push(3).unwrap();
    }

    #[test]
    fn single_slot_deque_never_accepts() {
        let worker = Worker::<u32, 1>::new();
        assert_eq!(worker.capacity(), 0);
        assert_eq!(worker.push(1), Err(Full(1)));
        assert_eq!(worker.pop(), None);
    }

    #[test]
    fn pop_after_thief_claimed_last_element_is_none() {
        let worker = Worker::<String, 4>::new();
        worker.push("only".to_string()).unwrap();
        // A thief has advanced top past the only element.
        worker.inner.top.store(1, Ordering::SeqCst);
        assert_eq!(worker.pop(), None);
        // Hand the element back to the deque so it is dropped exactly once.
        worker.inner.top.store(0, Ordering::SeqCst);
        assert_eq!(worker.pop().as_deref(), Some("only"));
    }

    #[test]
    fn remaining_elements_are_dropped_with_the_last_handle() {
        use std::rc::Rc;

        let marker = Rc::new(());
        let worker = Worker::<Rc<()>, 8>::new();
        for _ in 0..4 {
            worker.push(Rc::clone(&marker)).unwrap();
        }
        drop(worker.pop());
        assert_eq!(Rc::strong_count(&marker), 4);
        drop(worker);
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
