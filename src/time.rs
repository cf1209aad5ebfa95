//! The deadline type passed to timed operations.
//!
//! `spec.md` §3: "Absolute deadlines are `{seconds, nanoseconds}` on a
//! monotonic or real-time clock agreed with the alarm subsystem; the core
//! treats them as opaque and only passes them to the alarm." This crate's
//! alarm subsystem ([`crate::timeout`]) uses the monotonic clock, so
//! [`Deadline`] wraps [`std::time::Instant`] rather than exposing the raw
//! seconds/nanoseconds pair — there is no wall-clock alarm implementation to
//! agree with here, and an opaque monotonic instant is strictly harder to
//! misuse (it can't be confused with a duration, and it isn't affected by
//! clock adjustments).

use std::time::{Duration, Instant};

/// An absolute point in time a timed operation should give up waiting at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// A deadline `d` from now.
    pub fn after(d: Duration) -> Self {
        Self(Instant::now() + d)
    }

    /// A deadline at the given monotonic instant.
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub(crate) fn instant(self) -> Instant {
        self.0
    }
}
