// SPDX-License-Identifier: Apache-2.0

use crate::{
    recovery::bbr::{BbrController, State},
    time::Timestamp,
};
use core::time::Duration;
use num_rational::Ratio;

/// Minimum duration for which ProbeRtt holds inflight to `MinPipeCwnd` or
/// fewer packets.
const PROBE_RTT_DURATION: Duration = Duration::from_millis(200);
/// How often a MinRtt sample is allowed to go unrefreshed before BBR forces
/// a ProbeRtt excursion.
pub(crate) const MIN_RTT_FILTER_LEN: Duration = Duration::from_secs(10);

pub(crate) const CWND_GAIN: Ratio<u64> = Ratio::new_raw(1, 1);
pub(crate) const PACING_GAIN: Ratio<u64> = Ratio::new_raw(1, 1);

impl BbrController {
    /// Checks whether the MinRtt estimate is stale and, if so, enters
    /// `ProbeRtt` to get a fresh sample.
    pub(super) fn check_probe_rtt(&mut self, now: Timestamp) {
        let min_rtt_expired = self
            .min_rtt_timestamp
            .map_or(true, |stamp| now.saturating_duration_since(stamp) > MIN_RTT_FILTER_LEN);

        if min_rtt_expired && !self.state.is_probe_rtt() {
            self.save_cwnd();
            self.probe_rtt_done_timestamp = None;
            self.probe_rtt_round_done = false;
            self.state.transition_to(State::ProbeRtt);
        }

        if self.state.is_probe_rtt() {
            self.handle_probe_rtt(now);
        }
    }

    fn handle_probe_rtt(&mut self, now: Timestamp) {
        let probe_rtt_cwnd = self.minimum_window();

        if self.probe_rtt_done_timestamp.is_none() && self.bytes_in_flight <= probe_rtt_cwnd {
            self.probe_rtt_done_timestamp = Some(now + PROBE_RTT_DURATION);
            self.probe_rtt_round_done = false;
        } else if let Some(done_at) = self.probe_rtt_done_timestamp {
            if self.round.round_start() {
                self.probe_rtt_round_done = true;
            }
            if self.probe_rtt_round_done && now >= done_at {
                self.restore_cwnd();
                self.enter_probe_bw();
            }
        }
    }
}
