// SPDX-License-Identifier: Apache-2.0

//! Telemetry surface the congestion controllers report to.
//!
//! The controllers never own a logging sink directly; the caller hands in a
//! `&mut impl Publisher` on every operation and the controller reports
//! state transitions and measurements to it as they happen. This keeps the
//! hot path free of any concrete logging dependency and lets the connection
//! object decide where the data goes (a `tracing` subscriber, a metrics
//! aggregator, or nothing at all in `[Publisher::noop]`).

use core::time::Duration;
use num_rational::Ratio;

use crate::bandwidth::Bandwidth;

/// Why slow start was exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlowStartExitCause {
    /// A congestion event (loss or ECN) occurred.
    CongestionEvent,
    /// The send path was idle long enough that the slow start estimate is stale.
    Idle,
}

/// Mirrors the BBR state machine for telemetry purposes, independent of the
/// controller's own internal `bbr::State` so that reporting never forces a
/// dependency on the controller's private representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BbrState {
    Startup,
    Drain,
    ProbeBw,
    ProbeRtt,
}

/// A single delivery-rate sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RateSample {
    pub delivered_bytes: u64,
    pub interval: Duration,
    pub is_app_limited: bool,
}

/// A snapshot suitable for periodic out-flow logging.
#[derive(Clone, Copy, Debug)]
pub struct OutFlowStatus {
    pub congestion_window: u32,
    pub bytes_in_flight: u32,
    pub congestion_window_max: u32,
    pub in_recovery: bool,
    pub in_slow_start: bool,
}

pub trait Publisher {
    /// Invoked when the congestion controller has exited the slow start phase.
    fn on_slow_start_exited(&mut self, _cause: SlowStartExitCause, _congestion_window: u32) {}

    /// Invoked when a new delivery rate sample has been produced.
    fn on_delivery_rate_sampled(&mut self, _rate_sample: RateSample) {}

    /// Invoked when the pacing rate changes.
    fn on_pacing_rate_updated(
        &mut self,
        _pacing_rate: Bandwidth,
        _burst_size: u32,
        _pacing_gain: Ratio<u64>,
    ) {
    }

    /// Invoked when BBR transitions between states.
    fn on_bbr_state_changed(&mut self, _state: BbrState) {}

    /// Invoked periodically (or on demand) with a flow-status snapshot.
    fn on_out_flow_status(&mut self, _status: OutFlowStatus) {}
}

/// A `Publisher` that discards every event; useful for call sites and tests
/// that have no telemetry sink of their own.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {}

/// A `Publisher` that forwards every event to `tracing` at `debug`/`trace`
/// level, gated behind the `event-tracing` feature the way the rest of the
/// ambient logging in this crate is.
#[cfg(feature = "event-tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPublisher;

#[cfg(feature = "event-tracing")]
impl Publisher for TracingPublisher {
    fn on_slow_start_exited(&mut self, cause: SlowStartExitCause, congestion_window: u32) {
        tracing::debug!(?cause, congestion_window, "slow_start_exited");
    }

    fn on_delivery_rate_sampled(&mut self, rate_sample: RateSample) {
        tracing::trace!(?rate_sample, "delivery_rate_sampled");
    }

    fn on_pacing_rate_updated(
        &mut self,
        pacing_rate: Bandwidth,
        burst_size: u32,
        pacing_gain: Ratio<u64>,
    ) {
        tracing::trace!(
            bytes_per_second = pacing_rate.as_bytes_per_second(),
            burst_size,
            pacing_gain = %pacing_gain,
            "pacing_rate_updated"
        );
    }

    fn on_bbr_state_changed(&mut self, state: BbrState) {
        tracing::debug!(?state, "bbr_state_changed");
    }

    fn on_out_flow_status(&mut self, status: OutFlowStatus) {
        tracing::trace!(
            congestion_window = status.congestion_window,
            bytes_in_flight = status.bytes_in_flight,
            congestion_window_max = status.congestion_window_max,
            in_recovery = status.in_recovery,
            in_slow_start = status.in_slow_start,
            "out_flow_status"
        );
    }
}
