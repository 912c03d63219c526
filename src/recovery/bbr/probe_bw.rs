// SPDX-License-Identifier: Apache-2.0

use crate::{
    recovery::bbr::{BbrController, State},
    time::Timestamp,
};
use num_rational::Ratio;

/// The pacing gain cycled through while in `ProbeBw`, one slot per round
/// trip: a round of probing above the estimated bandwidth, a round of
/// draining the resulting queue, then six rounds at the estimated rate.
pub(crate) const PACING_GAIN_CYCLE: [Ratio<u64>; 8] = [
    Ratio::new_raw(5, 4),
    Ratio::new_raw(3, 4),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
];

pub(crate) const CWND_GAIN: Ratio<u64> = Ratio::new_raw(2, 1);

const DRAIN_PHASE: usize = 1;

impl BbrController {
    pub(super) fn enter_probe_bw(&mut self) {
        self.state.transition_to(State::ProbeBw);
        self.pacing_cycle_index = 0;
        self.cycle_round_start_time = None;
    }

    /// Advances the gain-cycle index once a round has elapsed, or sooner if
    /// draining the post-probe queue (cycle slot 1) finishes early.
    pub(super) fn advance_probe_bw_cycle(&mut self, now: Timestamp) {
        if !self.state.is_probe_bw() {
            return;
        }

        let cycle_start = *self.cycle_round_start_time.get_or_insert(now);
        let elapsed_round = self.round.round_start();

        let drain_complete =
            self.pacing_cycle_index == DRAIN_PHASE && self.bytes_in_flight <= self.target_inflight(Ratio::new(1, 1));

        if (elapsed_round && now >= cycle_start) || drain_complete {
            self.pacing_cycle_index = (self.pacing_cycle_index + 1) % PACING_GAIN_CYCLE.len();
            self.cycle_round_start_time = Some(now);
        }
    }

    pub(super) fn probe_bw_pacing_gain(&self) -> Ratio<u64> {
        PACING_GAIN_CYCLE[self.pacing_cycle_index]
    }
}
