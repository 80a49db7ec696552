//! Non-success outcomes of ring operations.
//!
//! None of these indicate a bug: a full ring, an empty ring and a lost race
//! are all steady-state results the caller is expected to handle, usually by
//! retrying later or polling another source of work.

use thiserror::Error;

/// The ring had no free slot. Carries back the rejected item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ring buffer is full")]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the item that could not be pushed.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Failure of [`MpmcQueue::try_push`](crate::MpmcQueue::try_push).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError<T> {
    /// The queue already holds its usable capacity.
    #[error("queue is full")]
    Full(T),
    /// Another producer reserved the tail slot first, or a consumer has not
    /// finished draining it. Nothing was written.
    #[error("lost the race for the tail slot")]
    Contended(T),
}

impl<T> PushError<T> {
    /// Returns the item that could not be pushed.
    #[inline]
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Contended(item) => item,
        }
    }

    /// `true` if the failure was caused by a full queue.
    #[inline]
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    /// `true` if the failure was a lost race and a retry may succeed.
    #[inline]
    pub const fn is_contended(&self) -> bool {
        matches!(self, Self::Contended(_))
    }
}

impl<T> From<Full<T>> for PushError<T> {
    fn from(full: Full<T>) -> Self {
        Self::Full(full.0)
    }
}

/// Failure of [`MpmcQueue::try_pop`](crate::MpmcQueue::try_pop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PopError {
    /// No published element was available.
    #[error("queue is empty")]
    Empty,
    /// Another consumer reserved the head slot first, or its producer has
    /// not finished writing it.
    #[error("lost the race for the head slot")]
    Contended,
}

/// Failure of [`Stealer::steal`](crate::deque::Stealer::steal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StealError {
    /// The deque had no element to steal.
    #[error("cannot steal from an empty deque")]
    Empty,
    /// The oldest element was taken by the owner or another thief first.
    #[error("lost the race for the oldest element")]
    Contended,
}
