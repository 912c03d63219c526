// SPDX-License-Identifier: Apache-2.0

use crate::recovery::bbr::{startup, BbrController, State};
use num_rational::Ratio;

/// In Drain, BBR aims to quickly drain any queue built up in Startup by
/// pacing at the inverse of the startup gain, so the queue empties in
/// roughly one round trip.
pub(crate) const PACING_GAIN: Ratio<u64> = Ratio::new_raw(1000, 2885);
pub(crate) const CWND_GAIN: Ratio<u64> = startup::CWND_GAIN;

impl BbrController {
    pub(super) fn enter_drain(&mut self) {
        self.state.transition_to(State::Drain);
    }

    /// Checks whether the queue built up in Startup has drained and, if so,
    /// enters `ProbeBw`.
    pub(super) fn check_drain_done(&mut self) {
        if self.state.is_drain() && self.bytes_in_flight <= self.target_inflight(Ratio::new(1, 1)) {
            self.enter_probe_bw();
        }
    }
}
