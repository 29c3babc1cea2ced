//! File artifacts: the trajectory record and series exports.

pub mod export;
pub mod trajectory;
