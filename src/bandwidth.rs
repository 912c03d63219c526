// SPDX-License-Identifier: Apache-2.0

//! Fixed-point bandwidth arithmetic shared by the BBR bandwidth filter and
//! ack-aggregation filter.
//!
//! Bandwidth is represented as bits-per-second scaled into a `u64` so that
//! multiplying by a `Duration` or a `Ratio<u64>` gain never needs floating
//! point and never silently loses precision the way `f64` bits/sec would
//! over long-running connections.

use core::{ops, time::Duration};
use num_rational::Ratio;

const MICRO_BITS_PER_BYTE: u64 = 8_000_000;

/// A data rate, represented internally as bits per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bandwidth {
    bits_per_second: u64,
}

impl Bandwidth {
    pub const ZERO: Bandwidth = Bandwidth { bits_per_second: 0 };

    /// Constructs a `Bandwidth` from a byte count delivered over `interval`.
    ///
    /// Returns `Bandwidth::ZERO` if `interval` is zero, since a delivery with
    /// no elapsed time carries no rate information.
    #[inline]
    pub fn new(bytes: u64, interval: Duration) -> Self {
        if interval.is_zero() {
            return Self::ZERO;
        }
        let micros = interval.as_micros().max(1) as u64;
        let bits_per_second = bytes
            .saturating_mul(MICRO_BITS_PER_BYTE)
            .checked_div(micros)
            .unwrap_or(u64::MAX);
        Self { bits_per_second }
    }

    #[inline]
    pub const fn as_bits_per_second(self) -> u64 {
        self.bits_per_second
    }

    /// Reconstructs a `Bandwidth` from a raw bits-per-second value, e.g. one
    /// previously read back out of a windowed max filter.
    #[inline]
    pub const fn from_bits_per_second(bits_per_second: u64) -> Self {
        Self { bits_per_second }
    }

    #[inline]
    pub const fn as_bytes_per_second(self) -> u64 {
        self.bits_per_second / 8
    }
}

impl ops::Mul<Ratio<u64>> for Bandwidth {
    type Output = Bandwidth;

    #[inline]
    fn mul(self, gain: Ratio<u64>) -> Bandwidth {
        let scaled = (self.bits_per_second as u128 * *gain.numer() as u128)
            / (*gain.denom() as u128).max(1);
        Bandwidth {
            bits_per_second: scaled.min(u64::MAX as u128) as u64,
        }
    }
}

/// Bandwidth * Duration = bytes delivered over that duration.
impl ops::Mul<Duration> for Bandwidth {
    type Output = u64;

    #[inline]
    fn mul(self, rhs: Duration) -> u64 {
        let bits = self.bits_per_second as u128 * rhs.as_micros() / 1_000_000;
        (bits / 8).min(u64::MAX as u128) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_from_bytes_and_duration() {
        // 1000 bytes in 1 second == 8000 bits per second
        let bw = Bandwidth::new(1000, Duration::from_secs(1));
        assert_eq!(bw.as_bits_per_second(), 8_000);
        assert_eq!(bw.as_bytes_per_second(), 1_000);
    }

    #[test]
    fn zero_interval_is_zero_bandwidth() {
        assert_eq!(Bandwidth::new(1000, Duration::ZERO), Bandwidth::ZERO);
    }

    #[test]
    fn multiply_by_gain() {
        let bw = Bandwidth::new(1000, Duration::from_secs(1));
        let doubled = bw * Ratio::new(2u64, 1u64);
        assert_eq!(doubled.as_bytes_per_second(), 2_000);
    }

    #[test]
    fn bdp_from_bandwidth_and_rtt() {
        let bw = Bandwidth::new(1_200_000, Duration::from_secs(1)); // 1.2 MB/s
        let bdp_bytes = bw * Duration::from_millis(100);
        assert_eq!(bdp_bytes, 120_000);
    }
}
