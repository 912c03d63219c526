// SPDX-License-Identifier: Apache-2.0

//! Time related datatypes: an opaque, microsecond-resolution [`Timestamp`]
//! and the [`Clock`] trait that produces them.

mod clock;
mod timestamp;

pub use clock::*;
pub use timestamp::Timestamp;
