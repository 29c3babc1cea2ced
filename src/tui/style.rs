//! Color constants for the TUI.

use ratatui::style::Color;

pub use crate::extract::series::SERIES_COLOR;

/// Header bar foreground.
pub const HEADER_FG: Color = Color::White;
/// Header bar background.
pub const HEADER_BG: Color = Color::DarkGray;
/// Footer help text color.
pub const FOOTER_FG: Color = Color::DarkGray;
/// Deviation readout within 1% of the initial value.
pub const NEAR_INITIAL: Color = Color::Green;
/// Deviation readout beyond 1% of the initial value.
pub const DEVIATED: Color = Color::Yellow;

/// Color of the value readout, by relative departure from `initial`.
pub fn deviation_color(value: f64, initial: f64) -> Color {
    let scale = initial.abs().max(1e-3);
    if (value - initial).abs() / scale <= 0.01 {
        NEAR_INITIAL
    } else {
        DEVIATED
    }
}
