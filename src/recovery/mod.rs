// SPDX-License-Identifier: Apache-2.0

//! Congestion control: window management, loss response, and pacing for a
//! single path.

mod bbr;
mod congestion_controller;
mod cubic;
mod window;

pub use bbr::BbrController;
pub use congestion_controller::{Algorithm, CongestionController, AckEvent, LossEvent, Settings};
pub use cubic::CubicController;
pub use window::SlidingWindowExtremum;

use crate::event::Publisher;
use core::time::Duration;

/// The congestion controller for a path, dispatching to whichever algorithm
/// [`Settings::algorithm`] selected.
///
/// This is a closed sum type rather than a `dyn CongestionController`: the
/// set of algorithms is fixed at compile time, dispatch is a single match on
/// a two-variant enum, and neither variant allocates, so there is nothing a
/// vtable would buy over a match arm.
#[derive(Clone, Debug)]
pub enum Controller {
    Cubic(CubicController),
    Bbr(BbrController),
}

impl Controller {
    pub fn new(settings: &Settings) -> Self {
        match settings.algorithm {
            Algorithm::Cubic => Controller::Cubic(CubicController::new(settings)),
            Algorithm::Bbr => Controller::Bbr(BbrController::new(settings)),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident ($($arg:expr),*)) => {
        match $self {
            Controller::Cubic(c) => c.$method($($arg),*),
            Controller::Bbr(c) => c.$method($($arg),*),
        }
    };
}

impl CongestionController for Controller {
    fn reset(&mut self, full_reset: bool) {
        dispatch!(self, reset(full_reset))
    }

    fn congestion_window(&self) -> u32 {
        dispatch!(self, congestion_window())
    }

    fn bytes_in_flight(&self) -> u32 {
        dispatch!(self, bytes_in_flight())
    }

    fn bytes_in_flight_max(&self) -> u32 {
        dispatch!(self, bytes_in_flight_max())
    }

    fn exemptions(&self) -> u8 {
        dispatch!(self, exemptions())
    }

    fn set_exemption(&mut self, n: u8) {
        dispatch!(self, set_exemption(n))
    }

    fn can_send(&self) -> bool {
        dispatch!(self, can_send())
    }

    fn send_allowance(&self, delta: Duration, delta_valid: bool) -> u32 {
        dispatch!(self, send_allowance(delta, delta_valid))
    }

    fn on_packet_sent<Pub: Publisher>(&mut self, bytes: u32, publisher: &mut Pub) {
        dispatch!(self, on_packet_sent(bytes, publisher))
    }

    fn on_data_invalidated(&mut self, bytes: u32) -> bool {
        dispatch!(self, on_data_invalidated(bytes))
    }

    fn on_ack<Pub: Publisher>(&mut self, event: &AckEvent, publisher: &mut Pub) -> bool {
        dispatch!(self, on_ack(event, publisher))
    }

    fn on_packet_lost<Pub: Publisher>(&mut self, event: &LossEvent, publisher: &mut Pub) {
        dispatch!(self, on_packet_lost(event, publisher))
    }

    fn on_spurious_congestion_event<Pub: Publisher>(&mut self, publisher: &mut Pub) -> bool {
        dispatch!(self, on_spurious_congestion_event(publisher))
    }

    fn is_app_limited(&self) -> bool {
        dispatch!(self, is_app_limited())
    }

    fn set_app_limited(&mut self, largest_sent_packet_number: u64) {
        dispatch!(self, set_app_limited(largest_sent_packet_number))
    }

    fn log_out_flow_status<Pub: Publisher>(&self, publisher: &mut Pub) {
        dispatch!(self, log_out_flow_status(publisher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoopPublisher;

    #[test]
    fn selects_controller_by_algorithm() {
        let mut settings = Settings::default();
        settings.algorithm = Algorithm::Cubic;
        assert!(matches!(Controller::new(&settings), Controller::Cubic(_)));

        settings.algorithm = Algorithm::Bbr;
        assert!(matches!(Controller::new(&settings), Controller::Bbr(_)));
    }

    #[test]
    fn facade_forwards_to_selected_algorithm() {
        let settings = Settings::default();
        let mut publisher = NoopPublisher;
        let mut cubic = Controller::new(&settings);
        let initial = cubic.congestion_window();
        cubic.on_packet_sent(1200, &mut publisher);
        assert_eq!(cubic.bytes_in_flight(), 1200);
        assert_eq!(cubic.congestion_window(), initial);
    }
}
