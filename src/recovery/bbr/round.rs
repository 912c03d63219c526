// SPDX-License-Identifier: Apache-2.0

//! Counts "packet-timed" round trips: a round starts at the transmission of
//! some packet and ends when that packet is acknowledged. Several parts of
//! BBR (the startup bandwidth-growth check, the ProbeBw cycle, ProbeRtt's
//! one-round wait) key off round boundaries rather than wall-clock time.

#[derive(Clone, Debug, Default)]
pub(crate) struct Counter {
    /// The largest sent packet number that must be acknowledged to end the
    /// current round.
    end_of_round_trip: u64,
    round_start: bool,
    round_count: u64,
}

impl Counter {
    /// Called for each acknowledgement.
    pub fn on_ack(&mut self, largest_acked_packet_number: u64, largest_sent_packet_number: u64) {
        if largest_acked_packet_number >= self.end_of_round_trip {
            self.end_of_round_trip = largest_sent_packet_number;
            self.round_count += 1;
            self.round_start = true;
        } else {
            self.round_start = false;
        }
    }

    pub fn round_start(&self) -> bool {
        self.round_start
    }

    pub fn round_count(&self) -> u64 {
        self.round_count
    }
}
