// SPDX-License-Identifier: Apache-2.0

use crate::recovery::bbr::{BbrController, State};
use num_rational::Ratio;

/// A constant specifying the minimum gain value for calculating the pacing
/// rate that will allow the sending rate to double each round (4*ln(2) ~= 2.77,
/// rounded up here to the more commonly cited 2.885 for headroom against
/// ack compression).
pub(crate) const PACING_GAIN: Ratio<u64> = Ratio::new_raw(2885, 1000);

/// A constant specifying the minimum gain value for calculating the cwnd
/// that will allow the sending rate to double each round (2.885, matching
/// the pacing gain so cwnd is never the bottleneck during startup).
pub(crate) const CWND_GAIN: Ratio<u64> = PACING_GAIN;

/// Consecutive rounds of insufficient bandwidth growth before startup is
/// considered done.
pub(crate) const FULL_BANDWIDTH_ROUNDS: u32 = 3;
/// Bandwidth must grow by at least this ratio each round to reset the count.
pub(crate) const FULL_BANDWIDTH_GROWTH_TARGET: Ratio<u64> = Ratio::new_raw(5, 4);

impl BbrController {
    pub(super) fn enter_startup(&mut self) {
        self.state.transition_to(State::Startup);
    }

    /// Checks whether the bandwidth estimate has plateaued for
    /// `FULL_BANDWIDTH_ROUNDS` consecutive rounds and, if so, enters `Drain`.
    pub(super) fn check_startup_done(&mut self) {
        if !self.round.round_start() {
            return;
        }

        let current_btlbw = self.btlbw();
        if current_btlbw.as_bits_per_second()
            >= (self.full_bw_at_last_check.as_bits_per_second() as u128
                * *FULL_BANDWIDTH_GROWTH_TARGET.numer() as u128
                / *FULL_BANDWIDTH_GROWTH_TARGET.denom() as u128) as u64
        {
            self.full_bw_at_last_check = current_btlbw;
            self.full_bandwidth_round_count = 0;
        } else {
            self.full_bandwidth_round_count += 1;
        }

        if self.state.is_startup()
            && (self.full_bandwidth_round_count >= FULL_BANDWIDTH_ROUNDS
                || self.in_persistent_congestion)
        {
            self.enter_drain();
        }
    }
}
