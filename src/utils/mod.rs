//! Utility functions and types

pub mod clock;
pub mod size;

pub use clock::{Clock, ManualClock, SystemClock};
pub use size::SizeEstimate;
