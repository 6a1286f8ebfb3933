//! Common functionality shared by the Tally crates.
//!
//! This crate contains the time primitives used across the workspace:
//!
//!  - [`UnixTimestamp`] for the whole-second timestamps attached to reported points,
//!  - the [`Clock`] trait with a [`SystemClock`] and a controllable [`ManualClock`],
//!  - [`TimeUnit`] for rate and duration conversions.
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod time;
mod unit;

pub use crate::time::{Clock, ManualClock, SystemClock, UnixTimestamp};
pub use crate::unit::*;
