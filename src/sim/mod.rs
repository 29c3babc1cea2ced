/// Simulation clock for timestep management.
pub mod clock;
pub mod command;
pub mod engine;
pub mod metrics;
pub mod schedule;
pub mod session;
