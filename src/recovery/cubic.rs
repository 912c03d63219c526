// SPDX-License-Identifier: Apache-2.0

//! CUBIC congestion control (RFC 8312 / RFC 9438): a loss-based algorithm
//! that grows the congestion window along a cubic function of time since
//! the last congestion event, converging on the window size that caused the
//! last loss.

use crate::{
    counter::Counter,
    event::{OutFlowStatus, Publisher, SlowStartExitCause},
    recovery::congestion_controller::{AckEvent, CongestionController, LossEvent, Settings},
    time::Timestamp,
};
use core::time::Duration;
use num_traits::Float;

type BytesInFlight = Counter<u32>;

/// Multiplicative decrease factor applied to the congestion window on loss.
const BETA_CUBIC: f64 = 0.7;
/// Cubic growth constant, controlling how aggressively the window grows
/// back toward `WindowMax` once past the cubic inflection point.
const C_CUBIC: f64 = 0.4;

/// Pacing rate multiplier applied to slow start, allowing it to burst ahead
/// of the strict `cwnd`-paced rate while still bounding burstiness.
const SLOW_START_PACING_GAIN: f64 = 1.25;
const CONGESTION_AVOIDANCE_PACING_GAIN: f64 = 1.0;

#[derive(Clone, Debug)]
pub struct CubicController {
    max_datagram_size: u16,
    initial_window: u32,
    pacing_enabled: bool,
    min_pacing_threshold: u32,

    congestion_window: u32,
    bytes_in_flight: BytesInFlight,
    bytes_in_flight_max: u32,
    exemptions: u8,

    slow_start_threshold: u32,
    window_max: u32,
    window_last_max: u32,
    time_of_congestion_avoidance_start: Option<Timestamp>,
    recovery_end_packet_number: u64,
    is_in_recovery: bool,
    is_in_persistent_congestion: bool,
    has_had_congestion_event: bool,

    /// Snapshot of `(congestion_window, slow_start_threshold)` taken right
    /// before the most recent congestion response, so a later spurious-loss
    /// report can roll it back exactly.
    pre_congestion_event_window: u32,
    pre_congestion_event_slow_start_threshold: u32,

    smoothed_rtt: Duration,
}

impl CubicController {
    pub fn new(settings: &Settings) -> Self {
        let initial_window =
            settings.initial_window_packets * settings.max_datagram_size as u32;
        Self {
            max_datagram_size: settings.max_datagram_size,
            initial_window,
            pacing_enabled: settings.pacing_enabled,
            min_pacing_threshold: settings.min_pacing_threshold,

            congestion_window: initial_window,
            bytes_in_flight: Counter::new(0),
            bytes_in_flight_max: 0,
            exemptions: 0,

            slow_start_threshold: u32::MAX,
            window_max: 0,
            window_last_max: 0,
            time_of_congestion_avoidance_start: None,
            recovery_end_packet_number: 0,
            is_in_recovery: false,
            is_in_persistent_congestion: false,
            has_had_congestion_event: false,

            pre_congestion_event_window: initial_window,
            pre_congestion_event_slow_start_threshold: u32::MAX,

            smoothed_rtt: Duration::from_millis(100),
        }
    }

    fn minimum_window(&self) -> u32 {
        2 * self.max_datagram_size as u32
    }

    fn is_in_slow_start(&self) -> bool {
        self.congestion_window < self.slow_start_threshold
    }

    /// Grows the window toward `max(W_cubic(t), W_est(t))`, the larger of
    /// the pure cubic curve and the Reno-friendly region, per RFC 8312 §4.
    fn congestion_avoidance(&mut self, event: &AckEvent) {
        let t_start = *self
            .time_of_congestion_avoidance_start
            .get_or_insert(event.now);
        let t = (event.now - t_start).as_secs_f64();
        let mss = self.max_datagram_size as f64;

        let w_max = (self.window_max as f64 / mss).max(1.0);
        let k = ((w_max * (1.0 - BETA_CUBIC)) / C_CUBIC).cbrt();
        let w_cubic = C_CUBIC * (t - k).powi(3) + w_max;

        let rtt_secs = event.smoothed_rtt.as_secs_f64().max(0.001);
        let w_est = w_max * BETA_CUBIC + 3.0 * (1.0 - BETA_CUBIC) / (1.0 + BETA_CUBIC) * (t / rtt_secs);

        let target_segments = w_cubic.max(w_est);
        let target_bytes = (target_segments * mss) as u32;

        if target_bytes > self.congestion_window {
            // Smooth the increase across the acked bytes in this event
            // rather than jumping straight to the target.
            let acked = event.retransmittable_bytes_acked as f64;
            let cwnd = self.congestion_window.max(1) as f64;
            let increase = ((target_bytes as f64 - cwnd) * acked / cwnd).max(0.0);
            self.congestion_window = self
                .congestion_window
                .saturating_add(increase as u32)
                .min(target_bytes.max(self.congestion_window));
        }
    }
}

impl CongestionController for CubicController {
    fn reset(&mut self, full_reset: bool) {
        self.congestion_window = self.initial_window;
        self.bytes_in_flight = Counter::new(0);
        self.bytes_in_flight_max = 0;
        self.exemptions = 0;
        self.is_in_recovery = false;
        self.time_of_congestion_avoidance_start = None;
        self.recovery_end_packet_number = 0;
        self.slow_start_threshold = u32::MAX;
        self.pre_congestion_event_window = self.initial_window;
        self.pre_congestion_event_slow_start_threshold = u32::MAX;

        if full_reset {
            self.is_in_persistent_congestion = false;
            self.window_max = 0;
            self.window_last_max = 0;
            self.has_had_congestion_event = false;
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

        let gain = if self.is_in_slow_start() {
            SLOW_START_PACING_GAIN
        } else {
            CONGESTION_AVOIDANCE_PACING_GAIN
        };
        let rtt_secs = self.smoothed_rtt.as_secs_f64().max(0.001);
        let rate_bytes_per_sec = gain * self.congestion_window as f64 / rtt_secs;
        let allowance = (rate_bytes_per_sec * delta.as_secs_f64()) as u32;

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
        self.smoothed_rtt = event.smoothed_rtt;

        if self.is_in_recovery && event.largest_acked_packet_number >= self.recovery_end_packet_number
        {
            self.is_in_recovery = false;
        }

        if self.is_in_slow_start() {
            self.congestion_window = self
                .congestion_window
                .saturating_add(event.retransmittable_bytes_acked)
                .min(self.slow_start_threshold);

            if self.congestion_window >= self.slow_start_threshold {
                self.time_of_congestion_avoidance_start = Some(event.now);
                publisher.on_slow_start_exited(
                    SlowStartExitCause::CongestionEvent,
                    self.congestion_window,
                );
            }
        } else {
            self.congestion_avoidance(event);
        }

        was_blocked && self.can_send()
    }

    fn on_packet_lost<Pub: Publisher>(&mut self, event: &LossEvent, _publisher: &mut Pub) {
        self.bytes_in_flight -= event.lost_bytes;

        if !self.is_in_recovery
            || event.largest_packet_number_lost >= self.recovery_end_packet_number
        {
            if !self.is_in_recovery {
                self.pre_congestion_event_window = self.congestion_window;
                self.pre_congestion_event_slow_start_threshold = self.slow_start_threshold;

                if self.congestion_window < self.window_last_max {
                    // Fast convergence: capacity appears to have decreased
                    // since the last congestion event, so dampen the new
                    // target below a plain multiplicative decrease.
                    self.window_last_max = self.congestion_window;
                    self.window_max =
                        (self.congestion_window as f64 * ((1.0 + BETA_CUBIC) / 2.0)) as u32;
                } else {
                    self.window_last_max = self.congestion_window;
                    self.window_max = self.congestion_window;
                }

                self.congestion_window = ((self.congestion_window as f64 * BETA_CUBIC) as u32)
                    .max(self.minimum_window());
                self.slow_start_threshold = self.congestion_window;
                self.recovery_end_packet_number = event.largest_sent_packet_number;
                self.is_in_recovery = true;
                self.has_had_congestion_event = true;
                self.time_of_congestion_avoidance_start = None;
            }
        }

        if event.persistent_congestion {
            self.congestion_window = self.minimum_window();
            self.is_in_persistent_congestion = true;
        }
    }

    fn on_spurious_congestion_event<Pub: Publisher>(&mut self, _publisher: &mut Pub) -> bool {
        let was_blocked = !self.can_send();
        self.congestion_window = self.pre_congestion_event_window;
        self.slow_start_threshold = self.pre_congestion_event_slow_start_threshold;
        self.is_in_recovery = false;
        was_blocked && self.can_send()
    }

    fn is_app_limited(&self) -> bool {
        false
    }

    fn set_app_limited(&mut self, _largest_sent_packet_number: u64) {}

    fn log_out_flow_status<Pub: Publisher>(&self, publisher: &mut Pub) {
        publisher.on_out_flow_status(OutFlowStatus {
            congestion_window: self.congestion_window,
            bytes_in_flight: *self.bytes_in_flight,
            congestion_window_max: self.bytes_in_flight_max,
            in_recovery: self.is_in_recovery,
            in_slow_start: self.is_in_slow_start(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoopPublisher;

    fn settings() -> Settings {
        Settings {
            algorithm: crate::recovery::congestion_controller::Algorithm::Cubic,
            initial_window_packets: 10,
            max_datagram_size: 1200,
            pacing_enabled: false,
            min_pacing_threshold: 4800,
        }
    }

    #[test]
    fn slow_start_grows_by_acked_bytes() {
        let mut cc = CubicController::new(&settings());
        let mut publisher = NoopPublisher;
        assert_eq!(cc.congestion_window(), 12_000);

        for _ in 0..10 {
            cc.on_packet_sent(1200, &mut publisher);
        }
        assert_eq!(cc.bytes_in_flight(), 12_000);

        let event = AckEvent {
            now: Timestamp::from_micros(50_000),
            adjusted_ack_time: Timestamp::from_micros(50_000),
            smoothed_rtt: Duration::from_millis(50),
            min_rtt: Duration::from_millis(50),
            min_rtt_valid: true,
            retransmittable_bytes_acked: 12_000,
            total_acked_retransmittable_bytes: 12_000,
            largest_acked_packet_number: 10,
            largest_sent_packet_number: 10,
            is_largest_acked_packet_app_limited: false,
        };
        cc.on_ack(&event, &mut publisher);

        assert_eq!(cc.congestion_window(), 24_000);
    }

    #[test]
    fn loss_reduces_window_by_beta() {
        let mut cc = CubicController::new(&settings());
        let mut publisher = NoopPublisher;
        cc.congestion_window = 100_000;
        cc.slow_start_threshold = 0; // force congestion-avoidance accounting to be irrelevant here

        let loss = LossEvent {
            lost_bytes: 1_200,
            largest_packet_number_lost: 5,
            largest_sent_packet_number: 5,
            persistent_congestion: false,
        };
        cc.on_packet_lost(&loss, &mut publisher);

        assert_eq!(cc.congestion_window(), 70_000);
        assert_eq!(cc.slow_start_threshold, 70_000);
        assert!(cc.is_in_recovery);
    }

    #[test]
    fn spurious_loss_restores_prior_window() {
        let mut cc = CubicController::new(&settings());
        let mut publisher = NoopPublisher;
        cc.congestion_window = 100_000;
        cc.slow_start_threshold = 0;

        let loss = LossEvent {
            lost_bytes: 1_200,
            largest_packet_number_lost: 5,
            largest_sent_packet_number: 5,
            persistent_congestion: false,
        };
        cc.on_packet_lost(&loss, &mut publisher);
        assert_eq!(cc.congestion_window(), 70_000);

        cc.on_spurious_congestion_event(&mut publisher);
        assert_eq!(cc.congestion_window(), 100_000);
        assert!(!cc.is_in_recovery);
    }

    #[test]
    fn persistent_congestion_collapses_to_minimum() {
        let mut cc = CubicController::new(&settings());
        let mut publisher = NoopPublisher;
        cc.congestion_window = 100_000;

        let loss = LossEvent {
            lost_bytes: 1_200,
            largest_packet_number_lost: 5,
            largest_sent_packet_number: 5,
            persistent_congestion: true,
        };
        cc.on_packet_lost(&loss, &mut publisher);

        assert_eq!(cc.congestion_window(), cc.minimum_window());
        assert!(cc.is_in_persistent_congestion);
    }

    #[test]
    #[cfg_attr(miri, ignore)] // snapshot tests don't work on miri
    fn cubic_controller_size_test() {
        insta::assert_debug_snapshot!(
            stringify!(cubic_controller_size_test),
            core::mem::size_of::<CubicController>()
        );
    }

    #[test]
    fn exemptions_allow_sending_over_window() {
        let mut cc = CubicController::new(&settings());
        let mut publisher = NoopPublisher;
        cc.bytes_in_flight = Counter::new(cc.congestion_window());
        assert!(!cc.can_send());

        cc.set_exemption(1);
        assert!(cc.can_send());

        cc.on_packet_sent(1200, &mut publisher);
        assert_eq!(cc.exemptions(), 0);
    }
}
