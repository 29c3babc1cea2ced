//! Driver for time-domain dynamic simulation studies of power systems.
//!
//! A study configures a case, cleans stale outputs, initializes the engine,
//! schedules disturbances, runs to a final time, and extracts time series
//! from the recorded trajectory.

#[cfg(feature = "api")]
pub mod api;
pub mod case;
pub mod cli;
pub mod config;
pub mod extract;
pub mod io;
pub mod reference;
pub mod runner;
/// Simulation clock, commands, engine seam, session, and response metrics.
pub mod sim;
#[cfg(feature = "tui")]
pub mod tui;
pub mod workspace;
