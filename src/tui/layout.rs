//! TUI layout and widget rendering.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Gauge, Paragraph};

use super::runtime::App;
use super::style;

/// Renders the full TUI frame.
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Min(10),   // chart
            Constraint::Length(3), // replay progress
            Constraint::Length(5), // metrics panel
            Constraint::Length(1), // footer
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_chart(frame, app, chunks[1]);
    render_progress(frame, app, chunks[2]);
    render_metrics(frame, app, chunks[3]);
    render_footer(frame, chunks[4]);
}

/// Header bar: study name, plot index, cursor time, speed, replay state.
fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let (state_icon, state_label) = if app.is_finished() {
        ("■", "DONE")
    } else if app.paused {
        ("‖", "PAUSED")
    } else {
        ("▶", "REPLAY")
    };

    let header = Line::from(vec![
        Span::styled(
            " DYNSIM ",
            Style::default()
                .fg(style::HEADER_FG)
                .bg(style::HEADER_BG)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(&app.title, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            " │ plot {}/{} │ t={:.2}s │ {}ms │ {} {} ",
            (app.selected + 1).min(app.plots.len()),
            app.plots.len(),
            app.cursor,
            app.tick_interval_ms(),
            state_icon,
            state_label,
        )),
    ]);
    frame.render_widget(Paragraph::new(header), area);
}

/// Selected series up to the replay cursor, on axes fixed to the full run.
fn render_chart(frame: &mut Frame, app: &App, area: Rect) {
    let Some(plot) = app.current() else {
        let empty = Paragraph::new("  No plots configured for this study.")
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };

    let (x_lo, x_hi) = app.span();
    let x_hi = x_hi.max(x_lo + f64::EPSILON);
    let y = plot.series.y_bounds();

    let dataset = Dataset::default()
        .name(plot.series.channel().to_string())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(style::SERIES_COLOR))
        .data(app.visible_points());

    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .title(format!(" {} ", plot.series.label()))
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
                .title(plot.series.channel().signal.unit())
                .bounds(y)
                .labels(vec![format!("{:.4}", y[0]), format!("{:.4}", y[1])]),
        );

    frame.render_widget(chart, area);
}

fn render_progress(frame: &mut Frame, app: &App, area: Rect) {
    let (lo, hi) = app.span();
    let ratio = if hi > lo {
        ((app.cursor - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let gauge = Gauge::default()
        .block(Block::default().title(" Replay ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(style::SERIES_COLOR))
        .ratio(ratio)
        .label(format!("{:.1} / {:.1} s", app.cursor, hi));
    frame.render_widget(gauge, area);
}

/// Metrics panel: value at the cursor against the whole-run statistics.
fn render_metrics(frame: &mut Frame, app: &App, area: Rect) {
    let lines = if let Some(plot) = app.current() {
        let m = &plot.metrics;
        let value = plot.series.value_at(app.cursor).unwrap_or(m.initial);
        vec![
            Line::from(vec![
                Span::raw("  now="),
                Span::styled(
                    format!("{value:>10.5}"),
                    Style::default().fg(style::deviation_color(value, m.initial)),
                ),
                Span::raw(format!(
                    "  initial={:>10.5}  final={:>10.5}",
                    m.initial, m.final_value
                )),
            ]),
            Line::from(format!(
                "  min={:>10.5} @ {:.2}s  max={:>10.5} @ {:.2}s",
                m.min, m.min_time, m.max, m.max_time,
            )),
            Line::from(format!(
                "  max deviation={:.5}  steady-state change={:.5}",
                m.max_deviation, m.steady_state_change,
            )),
        ]
    } else {
        vec![Line::from("  Nothing to show.")]
    };

    let block = Block::default().title(" Metrics ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Footer with keybinding hints.
fn render_footer(frame: &mut Frame, area: Rect) {
    let footer = Paragraph::new(Line::from(Span::styled(
        " q:Quit  Space:Pause  +/-:Speed  ←/→:Plot  e:End  r:Restart",
        Style::default().fg(style::FOOTER_FG),
    )));
    frame.render_widget(footer, area);
}
