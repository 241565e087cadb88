//! Experiment value-of-information math utilities.

pub mod math;

pub use math::beta::*;
pub use math::normal::*;
pub use math::stable::*;
pub use math::student_t::*;
