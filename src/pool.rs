//! Bounded recycling pool of heap-allocated objects.
//!
//! Released instances go into an internal [`SpscQueue`]; acquiring pops one
//! back out, or builds a fresh instance when the pool is empty. Releasing into
//! a full pool drops the instance. Neither operation ever fails.
//!
//! The SPSC queue underneath means one side acquires and one side releases.
//! For single-threaded use call [`ObjectPool::acquire`] and
//! [`ObjectPool::release`] directly; to hand the two roles to two threads use
//! [`ObjectPool::into_split`].
//!
//! Apart from the fallback allocation in `acquire`, nothing here blocks.
//!
//! # Example
//!
//! ```
//! use ringkit::ObjectPool;
//!
//! let mut pool = ObjectPool::<Vec<u8>, 8>::new();
//!
//! let mut buf = pool.acquire();
//! buf.extend_from_slice(b"frame");
//! let addr = &*buf as *const Vec<u8>;
//! buf.clear();
//! pool.release(buf);
//!
//! // The same allocation comes back.
//! let again = pool.acquire();
//! assert_eq!(&*again as *const Vec<u8>, addr);
//! ```

use std::fmt;

use crate::error::Full;
use crate::spsc::{Consumer, Producer, SpscQueue};
use crate::trace::debug;

/// Pool keeping up to `N - 1` idle instances of `T`.
pub struct ObjectPool<T, const N: usize = 64> {
    idle: SpscQueue<Box<T>, N>,
    factory: fn() -> T,
}

impl<T: Default, const N: usize> ObjectPool<T, N> {
    /// Creates an empty pool that builds new instances with `T::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_factory(T::default)
    }
}

impl<T, const N: usize> ObjectPool<T, N> {
    /// Creates an empty pool that builds new instances with `factory`.
    #[must_use]
    pub fn with_factory(factory: fn() -> T) -> Self {
        Self {
            idle: SpscQueue::new(),
            factory,
        }
    }

    /// Returns a pooled instance, or a freshly built one if none is idle.
    pub fn acquire(&mut self) -> Box<T> {
        take_or_build(self.idle.try_pop(), self.factory)
    }

    /// Returns `obj` to the pool, dropping it if the pool is full.
    pub fn release(&mut self, obj: Box<T>) {
        discard_if_full(self.idle.try_push(obj));
    }

    /// Drops every idle instance.
    pub fn clear(&mut self) {
        self.idle.clear();
    }

    /// Number of idle instances.
    #[inline]
    pub fn len(&self) -> usize {
        self.idle.len()
    }

    /// `true` if no instance is idle.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }

    /// Maximum number of idle instances kept (`N - 1`).
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.idle.capacity()
    }

    /// Splits the pool into its acquiring and releasing sides.
    #[must_use]
    pub fn into_split(self) -> (Borrower<T, N>, Returner<T, N>) {
        let factory = self.factory;
        let (producer, consumer) = self.idle.into_split();
        (
            Borrower {
                idle: consumer,
                factory,
            },
            Returner { idle: producer },
        )
    }
}

impl<T: Default, const N: usize> Default for ObjectPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> fmt::Debug for ObjectPool<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("idle", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Acquiring side of a split [`ObjectPool`]. Owned by one thread at a time.
pub struct Borrower<T, const N: usize> {
    idle: Consumer<Box<T>, N>,
    factory: fn() -> T,
}

impl<T, const N: usize> Borrower<T, N> {
    /// Returns a pooled instance, or a freshly built one if none is idle.
    pub fn acquire(&self) -> Box<T> {
        take_or_build(self.idle.try_pop(), self.factory)
    }

    /// Drops every idle instance currently in the pool.
    ///
    /// Instances the [`Returner`] releases concurrently may survive the call.
    pub fn clear(&mut self) {
        let dropped = self.idle.drain();
        debug!(dropped, "object pool cleared");
    }

    /// Number of idle instances (snapshot).
    #[inline]
    pub fn len(&self) -> usize {
        self.idle.len()
    }

    /// `true` if no instance is idle (snapshot).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }
}

impl<T, const N: usize> fmt::Debug for Borrower<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Borrower").field("idle", &self.len()).finish()
    }
}

/// Releasing side of a split [`ObjectPool`]. Owned by one thread at a time.
pub struct Returner<T, const N: usize> {
    idle: Producer<Box<T>, N>,
}

impl<T, const N: usize> Returner<T, N> {
    /// Returns `obj` to the pool, dropping it if the pool is full.
    pub fn release(&self, obj: Box<T>) {
        discard_if_full(self.idle.try_push(obj));
    }

    /// Number of idle instances (snapshot).
    #[inline]
    pub fn len(&self) -> usize {
        self.idle.len()
    }

    /// `true` if no instance is idle (snapshot).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }
}

impl<T, const N: usize> fmt::Debug for Returner<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Returner").field("idle", &self.len()).finish()
    }
}

#[inline]
fn take_or_build<T>(idle: Option<Box<T>>, factory: fn() -> T) -> Box<T> {
    idle.unwrap_or_else(|| {
        debug!("object pool empty, allocating");
        Box::new(factory())
    })
}

#[inline]
fn discard_if_full<T>(released: Result<(), Full<Box<T>>>) {
    if let Err(Full(obj)) = released {
        debug!("object pool full, dropping released instance");
        drop(obj);
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn acquire_builds_when_empty() {
        let mut pool = ObjectPool::<u64, 4>::with_factory(|| 7);
        assert!(pool.is_empty());
        assert_eq!(*pool.acquire(), 7);
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn released_instance_is_reused() {
        let mut pool = ObjectPool::<String, 4>::new();
        let mut s = pool.acquire();
        s.push_str("kept");
        let addr = &*s as *const String;
        pool.release(s);
        assert_eq!(pool.len(), 1);

        let back = pool.acquire();
        assert_eq!(&*back as *const String, addr);
        assert_eq!(*back, "kept");
        assert!(pool.is_empty());
    }

    #[test]
    fn release_into_full_pool_drops() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        #[derive(Default)]
        struct Tracked;
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut pool = ObjectPool::<Tracked, 2>::new();
        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a);
        assert_eq!(DROPS.load(Ordering::Relaxed), 0);
        pool.release(b);
        assert_eq!(DROPS.load(Ordering::Relaxed), 1);
        assert_eq!(pool.len(), 1);

        pool.clear();
        assert_eq!(DROPS.load(Ordering::Relaxed), 2);
        assert!(pool.is_empty());
    }

    #[test]
    fn split_sides_share_idle_instances() {
        let pool = ObjectPool::<Vec<u8>, 8>::new();
        let (mut borrower, returner) = pool.into_split();
        let v = borrower.acquire();
        returner.release(v);
        returner.release(Box::default());
        assert_eq!(borrower.len(), 2);
        borrower.clear();
        assert!(returner.is_empty());
    }
}
