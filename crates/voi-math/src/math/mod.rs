//! Core math modules.

pub mod beta;
pub mod normal;
pub mod stable;
pub mod student_t;
