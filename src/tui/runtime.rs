//! Replay state of the plot viewer.

use std::time::Instant;

use crate::runner::PlotResult;

/// Number of ticks a full replay takes.
const REPLAY_STEPS: f64 = 300.0;

/// Tick interval options in milliseconds (slowest to fastest).
const SPEED_LEVELS_MS: [u64; 6] = [200, 100, 50, 20, 10, 2];

/// Default speed index (50 ms).
const DEFAULT_SPEED_IDX: usize = 2;

/// TUI application state.
pub struct App {
    /// Plotted series with their metrics.
    pub plots: Vec<PlotResult>,
    /// Index of the displayed plot.
    pub selected: usize,
    /// Replay cursor (s); samples after it are hidden.
    pub cursor: f64,
    start: f64,
    end: f64,
    /// Whether the replay is paused.
    pub paused: bool,
    /// Current index into `SPEED_LEVELS_MS`.
    pub speed_idx: usize,
    /// Whether the user has requested quit.
    pub quit: bool,
    /// When the last replay tick was executed.
    pub last_tick: Instant,
    /// Study name shown in the header.
    pub title: String,
}

impl App {
    /// Creates a viewer over `plots`, with the replay at the first sample.
    pub fn new(title: &str, plots: Vec<PlotResult>) -> Self {
        let (start, end) = plots
            .iter()
            .filter_map(|p| p.series.span())
            .fold(None, |acc: Option<(f64, f64)>, (lo, hi)| {
                Some(acc.map_or((lo, hi), |(a, b)| (a.min(lo), b.max(hi))))
            })
            .unwrap_or((0.0, 0.0));
        Self {
            plots,
            selected: 0,
            cursor: start,
            start,
            end,
            paused: false,
            speed_idx: DEFAULT_SPEED_IDX,
            quit: false,
            last_tick: Instant::now(),
            title: title.to_string(),
        }
    }

    /// Moves the replay cursor forward by one tick.
    pub fn tick(&mut self) {
        if self.is_finished() {
            return;
        }
        let step = (self.end - self.start) / REPLAY_STEPS;
        self.cursor = (self.cursor + step).min(self.end);
    }

    /// Returns `true` once the whole horizon is revealed.
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.end
    }

    /// Reveals the whole horizon at once.
    pub fn skip_to_end(&mut self) {
        self.cursor = self.end;
    }

    /// Restarts the replay from the first sample.
    pub fn restart(&mut self) {
        self.cursor = self.start;
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn next_plot(&mut self) {
        if !self.plots.is_empty() {
            self.selected = (self.selected + 1) % self.plots.len();
        }
    }

    pub fn prev_plot(&mut self) {
        if !self.plots.is_empty() {
            self.selected = (self.selected + self.plots.len() - 1) % self.plots.len();
        }
    }

    /// Increases replay speed (shorter tick interval).
    pub fn speed_up(&mut self) {
        if self.speed_idx + 1 < SPEED_LEVELS_MS.len() {
            self.speed_idx += 1;
        }
    }

    /// Decreases replay speed (longer tick interval).
    pub fn speed_down(&mut self) {
        if self.speed_idx > 0 {
            self.speed_idx -= 1;
        }
    }

    /// Returns the current tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        SPEED_LEVELS_MS[self.speed_idx]
    }

    /// The displayed plot, if any.
    pub fn current(&self) -> Option<&PlotResult> {
        self.plots.get(self.selected)
    }

    /// Samples of the displayed plot up to the cursor.
    pub fn visible_points(&self) -> &[(f64, f64)] {
        let Some(plot) = self.current() else {
            return &[];
        };
        let points = plot.series.points();
        let n = points.partition_point(|&(t, _)| t <= self.cursor);
        &points[..n]
    }

    /// Full time span of the replay.
    pub fn span(&self) -> (f64, f64) {
        (self.start, self.end)
    }
}
