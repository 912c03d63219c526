// SPDX-License-Identifier: Apache-2.0

use crate::time::timestamp::Timestamp;
use core::time::Duration;

/// A source of [`Timestamp`]s.
///
/// The congestion controllers never read the wall clock directly; the
/// connection's send loop owns the `Clock` and passes timestamps in on every
/// event.
pub trait Clock {
    /// Returns the current [`Timestamp`].
    fn get_time(&self) -> Timestamp;
}

/// A clock which always returns a `Timestamp` of 1us; useful wherever a
/// `Clock` is required but time does not otherwise advance.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopClock;

impl Clock for NoopClock {
    fn get_time(&self) -> Timestamp {
        Timestamp::from_micros(1)
    }
}

#[cfg(any(test, feature = "std"))]
mod std_clock {
    use super::*;
    use std::time::Instant;

    #[derive(Clone, Copy, Debug)]
    pub struct StdClock {
        epoch: Instant,
    }

    impl Default for StdClock {
        fn default() -> Self {
            Self {
                epoch: Instant::now(),
            }
        }
    }

    impl StdClock {
        /// Creates a new `StdClock` with the given epoch.
        pub fn new(epoch: Instant) -> Self {
            Self { epoch }
        }
    }

    impl Clock for StdClock {
        fn get_time(&self) -> Timestamp {
            Timestamp::from_micros(self.epoch.elapsed().as_micros() as u64)
        }
    }
}

#[cfg(any(test, feature = "std"))]
pub use std_clock::*;

/// A manually-advanced clock for deterministic tests.
#[cfg(test)]
pub mod testing {
    use super::{Duration, Timestamp};

    #[derive(Clone, Copy, Debug)]
    pub struct Clock {
        current_timestamp: Timestamp,
    }

    impl Default for Clock {
        fn default() -> Self {
            Self {
                current_timestamp: Timestamp::from_micros(1),
            }
        }
    }

    impl super::Clock for Clock {
        fn get_time(&self) -> Timestamp {
            self.current_timestamp
        }
    }

    impl Clock {
        pub fn inc_by(&mut self, duration: Duration) {
            self.current_timestamp += duration;
        }
    }
}
