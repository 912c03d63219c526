// SPDX-License-Identifier: Apache-2.0

//! BBR congestion control: a model-based algorithm that estimates the
//! bottleneck bandwidth and minimum round-trip time of the path and paces
//! sending to match, rather than reacting to loss as the primary signal.
//!
//! The state machine (`Startup` -> `Drain` -> `ProbeBw` <-> `ProbeRtt`) and
//! its gain tables are split into one module per state, mirroring the
//! control flow of the draft this implementation is based on.

mod drain;
mod probe_bw;
mod probe_rtt;
mod round;
mod startup;

use crate::{
    bandwidth::Bandwidth,
    counter::Counter,
    event::{BbrState, OutFlowStatus, Publisher, RateSample},
    recovery::{
        congestion_controller::{AckEvent, CongestionController, LossEvent, Settings},
        window::SlidingWindowExtremum,
    },
    time::Timestamp,
};
use core::time::Duration;
use num_rational::Ratio;

type BytesInFlight = Counter<u32>;

pub(crate) const MIN_PIPE_CWND_PACKETS: u32 = 4;
/// Number of rounds over which the bandwidth and ack-aggregation filters
/// retain their windowed maximum.
const FILTER_WINDOW_ROUNDS: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    Startup,
    Drain,
    ProbeBw,
    ProbeRtt,
}

impl State {
    fn transition_to(&mut self, new_state: State) {
        debug_assert_ne!(*self, new_state, "redundant BBR state transition");
        *self = new_state;
    }

    fn is_startup(&self) -> bool {
        matches!(self, State::Startup)
    }

    fn is_drain(&self) -> bool {
        matches!(self, State::Drain)
    }

    fn is_probe_bw(&self) -> bool {
        matches!(self, State::ProbeBw)
    }

    fn is_probe_rtt(&self) -> bool {
        matches!(self, State::ProbeRtt)
    }
}

impl From<State> for BbrState {
    fn from(state: State) -> Self {
        match state {
            State::Startup => BbrState::Startup,
            State::Drain => BbrState::Drain,
            State::ProbeBw => BbrState::ProbeBw,
            State::ProbeRtt => BbrState::ProbeRtt,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecoveryState {
    NotRecovery,
    /// Cap cwnd growth at acked-plus-lost bytes for the remainder of the
    /// round in which recovery was entered.
    Conservation,
    /// Allow cwnd to grow with each ack, matching Reno's recovery growth.
    Growth,
}

#[derive(Clone, Debug)]
pub struct BbrController {
    max_datagram_size: u16,
    initial_window: u32,
    pacing_enabled: bool,
    min_pacing_threshold: u32,

    state: State,
    recovery_state: RecoveryState,

    congestion_window: u32,
    recovery_window: u32,
    bytes_in_flight: BytesInFlight,
    bytes_in_flight_max: u32,
    exemptions: u8,
    send_quantum: u32,
    prior_cwnd: u32,

    round: round::Counter,
    pacing_cycle_index: usize,
    cycle_round_start_time: Option<Timestamp>,

    bandwidth_filter: SlidingWindowExtremum<u64, 3>,
    max_ack_height_filter: SlidingWindowExtremum<u64, 3>,
    ack_aggregation_start_time: Option<Timestamp>,
    aggregated_ack_bytes: u64,

    min_rtt: Duration,
    min_rtt_timestamp: Option<Timestamp>,

    full_bw_at_last_check: Bandwidth,
    full_bandwidth_round_count: u32,
    in_persistent_congestion: bool,

    end_of_recovery: u64,

    is_app_limited: bool,
    app_limited_exit_target: u64,

    probe_rtt_done_timestamp: Option<Timestamp>,
    probe_rtt_round_done: bool,

    prev_total_acked_retransmittable_bytes: u64,
    prev_adjusted_ack_time: Option<Timestamp>,
}

impl BbrController {
    pub fn new(settings: &Settings) -> Self {
        let initial_window =
            settings.initial_window_packets * settings.max_datagram_size as u32;
        let mut controller = Self {
            max_datagram_size: settings.max_datagram_size,
            initial_window,
            pacing_enabled: settings.pacing_enabled,
            min_pacing_threshold: settings.min_pacing_threshold,

            state: State::Startup,
            recovery_state: RecoveryState::NotRecovery,

            congestion_window: initial_window,
            recovery_window: initial_window,
            bytes_in_flight: Counter::new(0),
            bytes_in_flight_max: 0,
            exemptions: 0,
            send_quantum: settings.max_datagram_size as u32,
            prior_cwnd: initial_window,

            round: round::Counter::default(),
            pacing_cycle_index: 0,
            cycle_round_start_time: None,

            bandwidth_filter: SlidingWindowExtremum::new(),
            max_ack_height_filter: SlidingWindowExtremum::new(),
            ack_aggregation_start_time: None,
            aggregated_ack_bytes: 0,

            min_rtt: Duration::MAX,
            min_rtt_timestamp: None,

            full_bw_at_last_check: Bandwidth::ZERO,
            full_bandwidth_round_count: 0,
            in_persistent_congestion: false,

            end_of_recovery: 0,

            is_app_limited: false,
            app_limited_exit_target: 0,

            probe_rtt_done_timestamp: None,
            probe_rtt_round_done: false,

            prev_total_acked_retransmittable_bytes: 0,
            prev_adjusted_ack_time: None,
        };
        controller.full_bw_at_last_check = controller.btlbw();
        controller
    }

    fn minimum_window(&self) -> u32 {
        MIN_PIPE_CWND_PACKETS * self.max_datagram_size as u32
    }

    fn btlbw(&self) -> Bandwidth {
        self.bandwidth_filter
            .max()
            .map(Bandwidth::from_bits_per_second)
            .unwrap_or(Bandwidth::ZERO)
    }

    fn bdp(&self) -> u64 {
        if self.min_rtt == Duration::MAX {
            return self.initial_window as u64;
        }
        self.btlbw() * self.min_rtt
    }

    /// The target `bytes_in_flight` for a given cwnd gain: `gain * BDP` plus
    /// the ack-aggregation allowance.
    fn target_inflight(&self, gain: Ratio<u64>) -> u32 {
        let bdp = self.bdp();
        let scaled = (bdp as u128 * *gain.numer() as u128 / (*gain.denom() as u128).max(1)) as u64;
        let aggregation_allowance = self.max_ack_height_filter.max().unwrap_or(0);
        (scaled.saturating_add(aggregation_allowance))
            .min(u32::MAX as u64) as u32
    }

    fn current_cwnd_gain(&self) -> Ratio<u64> {
        match self.state {
            State::Startup => startup::CWND_GAIN,
            State::Drain => drain::CWND_GAIN,
            State::ProbeBw => probe_bw::CWND_GAIN,
            State::ProbeRtt => probe_rtt::CWND_GAIN,
        }
    }

    fn current_pacing_gain(&self) -> Ratio<u64> {
        match self.state {
            State::Startup => startup::PACING_GAIN,
            State::Drain => drain::PACING_GAIN,
            State::ProbeBw => self.probe_bw_pacing_gain(),
            State::ProbeRtt => probe_rtt::PACING_GAIN,
        }
    }

    fn save_cwnd(&mut self) {
        if !matches!(self.recovery_state, RecoveryState::NotRecovery) {
            self.prior_cwnd = self.prior_cwnd.max(self.congestion_window);
        } else {
            self.prior_cwnd = self.congestion_window;
        }
    }

    fn restore_cwnd(&mut self) {
        self.congestion_window = self.congestion_window.max(self.prior_cwnd);
    }

    /// Feeds a newly delivered-rate sample into the bandwidth filter, unless
    /// it was produced while app-limited and would not raise the estimate.
    fn sample_bandwidth(&mut self, event: &AckEvent) {
        let Some(prev_time) = self.prev_adjusted_ack_time else {
            self.prev_adjusted_ack_time = Some(event.adjusted_ack_time);
            self.prev_total_acked_retransmittable_bytes = event.total_acked_retransmittable_bytes;
            return;
        };

        let interval = event
            .adjusted_ack_time
            .saturating_duration_since(prev_time);
        let delivered = event
            .total_acked_retransmittable_bytes
            .saturating_sub(self.prev_total_acked_retransmittable_bytes);

        self.prev_adjusted_ack_time = Some(event.adjusted_ack_time);
        self.prev_total_acked_retransmittable_bytes = event.total_acked_retransmittable_bytes;

        if interval.is_zero() {
            return;
        }

        let sample = Bandwidth::new(delivered, interval);
        let sample_is_useful = !event.is_largest_acked_packet_app_limited
            || sample.as_bits_per_second() >= self.btlbw().as_bits_per_second();

        if sample_is_useful {
            self.bandwidth_filter.update(
                sample.as_bits_per_second(),
                Timestamp::from_micros(self.round.round_count()),
                Duration::from_micros(FILTER_WINDOW_ROUNDS),
            );
        }
    }

    /// Tracks the excess of delivered bytes over what the bandwidth estimate
    /// would predict, feeding the excess into the ack-aggregation filter
    /// BBR uses to avoid shrinking cwnd below what bursty acking requires.
    fn sample_ack_aggregation(&mut self, event: &AckEvent) {
        let start = *self.ack_aggregation_start_time.get_or_insert(event.now);
        let elapsed = event.now.saturating_duration_since(start);
        let expected = self.btlbw() * elapsed;

        self.aggregated_ack_bytes = self
            .aggregated_ack_bytes
            .saturating_add(event.retransmittable_bytes_acked as u64);

        if self.aggregated_ack_bytes > expected {
            let excess = self.aggregated_ack_bytes - expected;
            self.max_ack_height_filter.update(
                excess,
                Timestamp::from_micros(self.round.round_count()),
                Duration::from_micros(FILTER_WINDOW_ROUNDS),
            );
        } else {
            self.ack_aggregation_start_time = Some(event.now);
            self.aggregated_ack_bytes = 0;
        }
    }

    fn update_min_rtt(&mut self, event: &AckEvent) {
        if !event.min_rtt_valid {
            return;
        }
        let expired = self
            .min_rtt_timestamp
            .map_or(true, |stamp| {
                event.now.saturating_duration_since(stamp) > probe_rtt::MIN_RTT_FILTER_LEN
            });
        if event.min_rtt < self.min_rtt || expired {
            self.min_rtt = event.min_rtt;
            self.min_rtt_timestamp = Some(event.now);
        }
    }

    fn update_gains_and_cwnd<Pub: Publisher>(&mut self, acked_bytes: u32, publisher: &mut Pub) {
        let pacing_gain = self.current_pacing_gain();
        let cwnd_gain = self.current_cwnd_gain();

        match self.state {
            State::Startup => {
                self.congestion_window = self
                    .congestion_window
                    .max(self.target_inflight(cwnd_gain));
            }
            State::ProbeRtt => {
                self.congestion_window = self.minimum_window();
            }
            State::Drain | State::ProbeBw => {
                let target = self.target_inflight(cwnd_gain);
                self.congestion_window = target.max(self.minimum_window());
            }
        }

        match self.recovery_state {
            RecoveryState::NotRecovery => {}
            RecoveryState::Conservation => {
                self.recovery_window = (*self.bytes_in_flight).saturating_add(acked_bytes).max(self.minimum_window());
                self.congestion_window = self.congestion_window.min(self.recovery_window);
            }
            RecoveryState::Growth => {
                self.recovery_window = self.recovery_window.saturating_add(acked_bytes);
                self.congestion_window = self.congestion_window.min(self.recovery_window);
            }
        }

        self.send_quantum = {
            let pacing_rate = self.btlbw() * pacing_gain;
            let one_ms_bytes = pacing_rate * Duration::from_millis(1);
            one_ms_bytes.clamp(self.max_datagram_size as u64, 64 * 1024) as u32
        };

        publisher.on_pacing_rate_updated(self.btlbw() * pacing_gain, self.send_quantum, pacing_gain);
    }

    fn maybe_exit_recovery(&mut self, event: &AckEvent) {
        if !matches!(self.recovery_state, RecoveryState::NotRecovery)
            && event.largest_acked_packet_number >= self.end_of_recovery
        {
            self.recovery_state = RecoveryState::NotRecovery;
        } else if matches!(self.recovery_state, RecoveryState::Conservation) && self.round.round_start()
        {
            self.recovery_state = RecoveryState::Growth;
        }
    }
}

impl CongestionController for BbrController {
    fn reset(&mut self, full_reset: bool) {
        self.congestion_window = self.initial_window;
        self.recovery_window = self.initial_window;
        self.bytes_in_flight = Counter::new(0);
        self.bytes_in_flight_max = 0;
        self.exemptions = 0;
        self.recovery_state = RecoveryState::NotRecovery;
        self.end_of_recovery = 0;
        self.state = State::Startup;

        if full_reset {
            self.bandwidth_filter.reset();
            self.max_ack_height_filter.reset();
            self.min_rtt = Duration::MAX;
            self.min_rtt_timestamp = None;
            self.full_bw_at_last_check = Bandwidth::ZERO;
            self.full_bandwidth_round_count = 0;
            self.round = round::Counter::default();
        }
    }

    fn congestion_window(&self) -> u32 {
        self.congestion_window
    }

    fn bytes_in_flight(&self) -> u32 {
        *self.bytes_in_flight
    }

    fn bytes_in_flight_max(&self) -> u32 {
        self.bytes_in_flight_max
    }

    fn exemptions(&self) -> u8 {
        self.exemptions
    }

    fn set_exemption(&mut self, n: u8) {
        self.exemptions = self.exemptions.saturating_add(n);
    }

    fn can_send(&self) -> bool {
        *self.bytes_in_flight + self.max_datagram_size as u32 <= self.congestion_window
            || self.exemptions > 0
    }

    fn send_allowance(&self, delta: Duration, delta_valid: bool) -> u32 {
        let available = self.congestion_window.saturating_sub(*self.bytes_in_flight);

        if !self.pacing_enabled || self.congestion_window < self.min_pacing_threshold {
            return available;
        }
        if !delta_valid {
            return 0;
        }
        let pacing_rate = self.btlbw() * self.current_pacing_gain();
        let allowance = (pacing_rate * delta).min(u32::MAX as u64) as u32;
        available.min(allowance)
    }

    fn on_packet_sent<Pub: Publisher>(&mut self, bytes: u32, _publisher: &mut Pub) {
        self.bytes_in_flight += bytes;
        self.bytes_in_flight_max = self.bytes_in_flight_max.max(*self.bytes_in_flight);
        self.exemptions = self.exemptions.saturating_sub(1);
    }

    fn on_data_invalidated(&mut self, bytes: u32) -> bool {
        let was_blocked = !self.can_send();
        self.bytes_in_flight -= bytes;
        was_blocked && self.can_send()
    }

    fn on_ack<Pub: Publisher>(&mut self, event: &AckEvent, publisher: &mut Pub) -> bool {
        let was_blocked = !self.can_send();
        self.bytes_in_flight -= event.retransmittable_bytes_acked;

        self.round
            .on_ack(event.largest_acked_packet_number, event.largest_sent_packet_number);

        self.update_min_rtt(event);
        self.sample_bandwidth(event);
        self.sample_ack_aggregation(event);

        publisher.on_delivery_rate_sampled(RateSample {
            delivered_bytes: event.retransmittable_bytes_acked as u64,
            interval: event.smoothed_rtt,
            is_app_limited: self.is_app_limited,
        });

        match self.state {
            State::Startup => self.check_startup_done(),
            State::Drain => self.check_drain_done(),
            State::ProbeBw => {
                self.advance_probe_bw_cycle(event.now);
                self.check_probe_rtt(event.now);
            }
            State::ProbeRtt => self.check_probe_rtt(event.now),
        }

        let previous_state = self.state;
        self.update_gains_and_cwnd(event.retransmittable_bytes_acked, publisher);
        if self.state != previous_state {
            publisher.on_bbr_state_changed(self.state.into());
        }

        self.maybe_exit_recovery(event);

        if self.is_app_limited && event.largest_acked_packet_number >= self.app_limited_exit_target {
            self.is_app_limited = false;
        }

        was_blocked && self.can_send()
    }

    fn on_packet_lost<Pub: Publisher>(&mut self, event: &LossEvent, _publisher: &mut Pub) {
        self.bytes_in_flight -= event.lost_bytes;

        if matches!(self.recovery_state, RecoveryState::NotRecovery) {
            self.recovery_state = RecoveryState::Conservation;
            self.end_of_recovery = event.largest_sent_packet_number;
            self.recovery_window = (*self.bytes_in_flight).max(self.minimum_window());
        }

        if event.persistent_congestion {
            self.in_persistent_congestion = true;
            self.congestion_window = self.minimum_window();
            self.bandwidth_filter.reset();
            self.max_ack_height_filter.reset();
            self.round = round::Counter::default();
            if !self.state.is_startup() {
                self.enter_startup();
            }
        }
    }

    fn on_spurious_congestion_event<Pub: Publisher>(&mut self, _publisher: &mut Pub) -> bool {
        let was_blocked = !self.can_send();
        self.recovery_state = RecoveryState::NotRecovery;
        was_blocked && self.can_send()
    }

    fn is_app_limited(&self) -> bool {
        self.is_app_limited
    }

    fn set_app_limited(&mut self, largest_sent_packet_number: u64) {
        self.is_app_limited = true;
        self.app_limited_exit_target = largest_sent_packet_number;
    }

    fn log_out_flow_status<Pub: Publisher>(&self, publisher: &mut Pub) {
        publisher.on_out_flow_status(OutFlowStatus {
            congestion_window: self.congestion_window,
            bytes_in_flight: *self.bytes_in_flight,
            congestion_window_max: self.bytes_in_flight_max,
            in_recovery: !matches!(self.recovery_state, RecoveryState::NotRecovery),
            in_slow_start: self.state.is_startup(),
        });
    }
}

#[cfg(test)]
mod tests;
