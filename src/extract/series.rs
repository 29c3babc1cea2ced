//! Extracted time series and their text plots.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Widget};

use super::signal::Channel;

/// Line color used for every plotted series.
pub const SERIES_COLOR: Color = Color::Cyan;

/// Ordered `(time, value)` samples of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    channel: Channel,
    points: Vec<(f64, f64)>,
}

impl TimeSeries {
    pub fn new(channel: Channel, points: Vec<(f64, f64)>) -> Self {
        Self { channel, points }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Human-readable label, e.g. `g5 speed deviation [pu]`.
    pub fn label(&self) -> String {
        format!(
            "{} {} [{}]",
            self.channel.component,
            self.channel.signal.description(),
            self.channel.signal.unit()
        )
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|&(t, _)| t)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|&(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First and last sample times.
    pub fn span(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some((first.0, last.0))
    }

    /// Smallest value and the time it first occurs.
    pub fn min(&self) -> Option<(f64, f64)> {
        self.points
            .iter()
            .copied()
            .reduce(|best, p| if p.1 < best.1 { p } else { best })
    }

    /// Largest value and the time it first occurs.
    pub fn max(&self) -> Option<(f64, f64)> {
        self.points
            .iter()
            .copied()
            .reduce(|best, p| if p.1 > best.1 { p } else { best })
    }

    /// Linearly interpolated value at `time`, clamped to the series span.
    pub fn value_at(&self, time: f64) -> Option<f64> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if time <= first.0 {
            return Some(first.1);
        }
        if time >= last.0 {
            return Some(last.1);
        }
        let idx = self.points.partition_point(|&(t, _)| t <= time);
        let (t0, v0) = self.points[idx - 1];
        let (t1, v1) = self.points[idx];
        if t1 <= t0 {
            return Some(v1);
        }
        Some(v0 + (v1 - v0) * (time - t0) / (t1 - t0))
    }

    /// Value range with 10% padding, suitable for a chart axis.
    pub fn y_bounds(&self) -> [f64; 2] {
        let min = self.values().fold(f64::INFINITY, f64::min);
        let max = self.values().fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            return [-1.0, 1.0];
        }
        let range = (max - min).max(1e-6 + max.abs() * 1e-3);
        let pad = range * 0.1;
        [min - pad, max + pad]
    }

    /// Builds a line chart of the series.
    pub fn chart(&self) -> Chart<'_> {
        let (x_lo, x_hi) = self.span().unwrap_or((0.0, 1.0));
        let x_hi = x_hi.max(x_lo + f64::EPSILON);
        let y = self.y_bounds();

        let dataset = Dataset::default()
            .name(self.channel.to_string())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(SERIES_COLOR))
            .data(&self.points);

        Chart::new(vec![dataset])
            .block(
                Block::default()
                    .title(format!(" {} ", self.label()))
                    .borders(Borders::ALL),
            )
            .x_axis(
                Axis::default()
                    .title("t [s]")
                    .bounds([x_lo, x_hi])
                    .labels(vec![format!("{x_lo:.1}"), format!("{x_hi:.1}")]),
            )
            .y_axis(
                Axis::default()
                    .title(self.channel.signal.unit())
                    .bounds(y)
                    .labels(vec![format!("{:.4}", y[0]), format!("{:.4}", y[1])]),
            )
    }

    /// Renders the chart into a `width` x `height` block of text.
    ///
    /// Rendering happens off-screen, so this works without a terminal.
    pub fn plot(&self, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width.max(1), height.max(1));
        let mut buf = Buffer::empty(area);
        self.chart().render(area, &mut buf);

        let mut out = String::with_capacity(usize::from(area.width + 1) * usize::from(area.height));
        for row in buf.content().chunks(usize::from(area.width)) {
            let line: String = row.iter().map(|cell| cell.symbol()).collect();
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}
