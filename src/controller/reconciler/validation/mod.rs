//! # Validation
//!
//! Validation of user-supplied annotation values.
//!
//! - `duration`: duration string parsing

pub mod duration;

pub use duration::{parse_duration, InvalidDuration};
