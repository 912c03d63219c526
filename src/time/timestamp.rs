// SPDX-License-Identifier: Apache-2.0

use core::{fmt, time::Duration};

/// An absolute point in time, expressed as microseconds since an opaque epoch.
///
/// `Timestamp`s are only meaningful when compared against other `Timestamp`s
/// sourced from the same [`Clock`](super::Clock). The representation is a
/// plain `u64` of microseconds, matching the unit the congestion controllers
/// are specified in terms of.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash, Default)]
pub struct Timestamp(u64);

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Timestamp({self})")
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let micros = self.0 % 1_000_000;
        let secs = (self.0 / 1_000_000) % 60;
        let mins = (self.0 / 1_000_000 / 60) % 60;
        let hours = self.0 / 1_000_000 / 60 / 60;
        if micros != 0 {
            write!(f, "{hours}:{mins:02}:{secs:02}.{micros:06}")
        } else {
            write!(f, "{hours}:{mins:02}:{secs:02}")
        }
    }
}

impl Timestamp {
    /// Constructs a `Timestamp` from a microsecond offset from the clock's epoch.
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns the microsecond offset from the clock's epoch.
    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        self.0
            .checked_add(duration.as_micros() as u64)
            .map(Self)
    }

    #[inline]
    pub fn checked_sub(self, duration: Duration) -> Option<Self> {
        self.0
            .checked_sub(duration.as_micros() as u64)
            .map(Self)
    }

    /// Returns the `Duration` which elapsed since an earlier `Timestamp`.
    /// If `earlier` is more recent, the method returns a `Duration` of 0.
    #[inline]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl core::ops::Add<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0 + rhs.as_micros() as u64)
    }
}

impl core::ops::AddAssign<Duration> for Timestamp {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl core::ops::Sub for Timestamp {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Timestamp) -> Self::Output {
        Duration::from_micros(self.0.saturating_sub(rhs.0))
    }
}

impl core::ops::Sub<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0.saturating_sub(rhs.as_micros() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_math() {
        let initial = Timestamp::from_micros(1);
        let ts1 = initial + Duration::from_millis(500);
        assert_eq!(Duration::from_millis(500), ts1 - initial);

        let ts2 = ts1 - Duration::from_millis(110);
        assert_eq!(Duration::from_millis(390), ts2 - initial);

        assert_eq!(Duration::from_millis(0), initial.saturating_duration_since(ts1));
        assert_eq!(Duration::from_millis(500), ts1.saturating_duration_since(initial));
    }

    #[test]
    fn fmt_test() {
        let ts = Timestamp::from_micros(
            (Duration::from_secs(1) + Duration::from_micros(1)).as_micros() as u64,
        );
        assert_eq!(format!("{ts:?}"), "Timestamp(0:00:01.000001)");
    }
}
