//! Layout and invariants shared by every ring in the crate.
//!
//! - `N` slots, `N` a power of two, fixed for the lifetime of the ring.
//! - Indices are free-running counters that wrap at `usize::MAX`; a slot is
//!   addressed with `index & (N - 1)`. Because `N` divides `2^usize::BITS`, the
//!   mapping stays consistent across the wrap.
//! - One slot is never filled, so at most `N - 1` elements are live and the
//!   producer-side index never gets a full lap ahead of the consumer side.
//!   With `N == 1` the ring has no usable slot at all.

use std::mem::MaybeUninit;

use crate::sync::UnsafeCell;

/// Element storage for one slot. Initialized only while the slot is occupied.
pub(crate) type Cell<T> = UnsafeCell<MaybeUninit<T>>;

/// Compile-time capacity parameters for a ring of `N` slots.
pub(crate) struct Capacity<const N: usize>;

impl<const N: usize> Capacity<N> {
    /// Compile-time assertion that `N` is a non-zero power of two.
    ///
    /// Every constructor evaluates it, so a bad capacity fails the build.
    pub(crate) const CHECK: () = assert!(N.is_power_of_two(), "ring capacity must be a power of two");

    /// Slot index mask.
    pub(crate) const MASK: usize = N - 1;

    /// Number of elements the ring can hold at once.
    pub(crate) const USABLE: usize = Self::MASK;
}

/// Allocates `N` slots on the heap, building slot `i` with `make(i)`.
///
/// Goes through a `Vec` so large rings are never materialized on the stack.
pub(crate) fn alloc_slots<S, const N: usize>(make: impl FnMut(usize) -> S) -> Box<[S; N]> {
    let slots: Box<[S]> = (0..N).map(make).collect();
    slots
        .try_into()
        .unwrap_or_else(|_| panic!("slot count does not match ring capacity"))
}

/// Allocates `N` empty element cells.
pub(crate) fn alloc_cells<T, const N: usize>() -> Box<[Cell<T>; N]> {
    alloc_slots(|_| UnsafeCell::new(MaybeUninit::uninit()))
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn mask_and_usable_capacity() {
        assert_eq!(Capacity::<1>::MASK, 0);
        assert_eq!(Capacity::<1>::USABLE, 0);
        assert_eq!(Capacity::<2>::USABLE, 1);
        assert_eq!(Capacity::<1024>::MASK, 1023);
    }

    #[test]
    fn index_wraps_consistently() {
        let mask = Capacity::<8>::MASK;
        let near_max = usize::MAX - 2;
        let slots: Vec<usize> = (0..6).map(|i| near_max.wrapping_add(i) & mask).collect();
        assert_eq!(slots, vec![5, 6, 7, 0, 1, 2]);
    }

    #[test]
    fn slots_are_built_in_order() {
        let slots: Box<[usize; 4]> = alloc_slots(|i| i * 10);
        assert_eq!(*slots, [0, 10, 20, 30]);
    }
}
