// SPDX-License-Identifier: Apache-2.0

use crate::{event::Publisher, time::Timestamp};
use core::time::Duration;

/// The congestion control algorithm to run for a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Cubic,
    Bbr,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Cubic
    }
}

/// Configuration consumed by [`crate::recovery::Controller::new`].
///
/// This is the data shape the connection populates from its own settings
/// surface; parsing those settings from a configuration source is outside
/// this crate.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    pub algorithm: Algorithm,
    /// Initial congestion window, expressed as a packet count.
    pub initial_window_packets: u32,
    pub max_datagram_size: u16,
    pub pacing_enabled: bool,
    /// Below this congestion window, pacing is not applied and a full burst
    /// up to the window is permitted.
    pub min_pacing_threshold: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            initial_window_packets: 10,
            max_datagram_size: 1200,
            pacing_enabled: true,
            min_pacing_threshold: 4 * 1200,
        }
    }
}

/// An acknowledgement, digested by the loss/RTT estimator into the scalar
/// fields the congestion controllers need. The controller never looks at
/// packet contents or metadata beyond what is carried here.
#[derive(Clone, Copy, Debug)]
pub struct AckEvent {
    /// Time the event is being processed.
    pub now: Timestamp,
    /// Time the RTT sample was adjusted to account for ack delay; used for
    /// delivery-rate sampling.
    pub adjusted_ack_time: Timestamp,
    pub smoothed_rtt: Duration,
    pub min_rtt: Duration,
    /// False if no new `min_rtt` sample is available this event.
    pub min_rtt_valid: bool,
    /// Bytes newly acknowledged by this event.
    pub retransmittable_bytes_acked: u32,
    /// Cumulative retransmittable bytes acknowledged since the connection
    /// started; used to compute delivery-rate deltas.
    pub total_acked_retransmittable_bytes: u64,
    pub largest_acked_packet_number: u64,
    pub largest_sent_packet_number: u64,
    /// True if the newest acknowledged packet was sent while app-limited.
    pub is_largest_acked_packet_app_limited: bool,
}

/// A loss report, already filtered by the loss detector.
#[derive(Clone, Copy, Debug)]
pub struct LossEvent {
    pub lost_bytes: u32,
    pub largest_packet_number_lost: u64,
    pub largest_sent_packet_number: u64,
    pub persistent_congestion: bool,
}

/// The uniform operation surface both CUBIC and BBR implement.
///
/// All operations are O(1) (or O(C) for the small fixed-capacity filters
/// BBR uses) and none of them allocate or block; they are safe to invoke
/// from a context with no suspension, matching the dispatch-level contract
/// of the connection's send/receive loop.
pub trait CongestionController {
    /// Resets the controller to its post-initialization state. If
    /// `full_reset` is set, the persistent-congestion and loss-history state
    /// is also cleared, as if the controller had just been constructed.
    fn reset(&mut self, full_reset: bool);

    /// The current congestion window, in bytes.
    fn congestion_window(&self) -> u32;

    /// The current bytes in flight.
    fn bytes_in_flight(&self) -> u32;

    /// The largest `bytes_in_flight` observed since the last reset.
    fn bytes_in_flight_max(&self) -> u32;

    /// Remaining exemptions: packets allowed to send despite the congestion
    /// window (used for loss-recovery probes).
    fn exemptions(&self) -> u8;

    /// Grants `n` additional exemptions, saturating at `u8::MAX`.
    fn set_exemption(&mut self, n: u8);

    /// True if at least one byte may be sent right now.
    fn can_send(&self) -> bool;

    /// Bytes allowed to be sent immediately, given `delta` microseconds
    /// elapsed since the last send. If `delta_valid` is false and pacing
    /// would otherwise gate the allowance, returns 0.
    fn send_allowance(&self, delta: Duration, delta_valid: bool) -> u32;

    /// Invoked when `bytes` of retransmittable data are sent.
    fn on_packet_sent<Pub: Publisher>(&mut self, bytes: u32, publisher: &mut Pub);

    /// Invoked when previously-sent data is invalidated (e.g. a packet
    /// number space is discarded) without being acked or declared lost.
    /// Returns true if this unblocks sending.
    fn on_data_invalidated(&mut self, bytes: u32) -> bool;

    /// Invoked on receipt of an acknowledgement. Returns true if this
    /// unblocks sending.
    fn on_ack<Pub: Publisher>(&mut self, event: &AckEvent, publisher: &mut Pub) -> bool;

    /// Invoked when a packet is declared lost.
    fn on_packet_lost<Pub: Publisher>(&mut self, event: &LossEvent, publisher: &mut Pub);

    /// Invoked when a loss previously reported via `on_packet_lost` turns
    /// out to have been spurious. Returns true if this unblocks sending.
    fn on_spurious_congestion_event<Pub: Publisher>(&mut self, publisher: &mut Pub) -> bool;

    /// True if the connection is currently limited by available application
    /// data rather than the congestion window (BBR only; CUBIC's responses
    /// to loss do not depend on this and it always returns false).
    fn is_app_limited(&self) -> bool;

    /// Marks the connection as app-limited as of `largest_sent_packet_number`.
    fn set_app_limited(&mut self, largest_sent_packet_number: u64);

    /// Reports a flow-status snapshot to `publisher`.
    fn log_out_flow_status<Pub: Publisher>(&self, publisher: &mut Pub);
}
