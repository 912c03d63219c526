// SPDX-License-Identifier: Apache-2.0

//! Congestion control core for a QUIC transport: CUBIC and BBR behind a single
//! polymorphic controller, plus the small set of primitives (time, saturating
//! counters, bandwidth arithmetic, a sliding-window extremum filter) that the
//! algorithms build on.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod bandwidth;
pub mod counter;
pub mod event;
pub mod recovery;
pub mod time;
