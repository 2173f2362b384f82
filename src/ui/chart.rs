//! Bar chart of the largest packages
//!
//! Turns a record list into ranked bars and draws them as a horizontal
//! ratatui `BarChart`, coloured along a plasma-like gradient.

use ratatui::{
    layout::{Direction, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};

use crate::aggregate::{format_size, rank, to_mib, PackageRecord};

/// Longest package name shown next to a bar
const MAX_LABEL_WIDTH: usize = 18;

/// One bar of the chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    /// Package name, possibly shortened
    pub label: String,
    /// Exact size the bar length is drawn from
    pub size_bytes: u64,
    /// Size in MiB, the chart's axis unit
    pub size_mib: f64,
}

/// Build bars for the `n` largest of `records`, biggest first.
pub fn chart_bars(records: &[PackageRecord], n: usize) -> Vec<ChartBar> {
    rank(records, n)
        .into_iter()
        .map(|r| ChartBar {
            label: truncate_label(&r.name, MAX_LABEL_WIDTH),
            size_bytes: r.size_bytes,
            size_mib: to_mib(r.size_bytes),
        })
        .collect()
}

/// Shorten a label to `width` characters, marking the cut with `…`
fn truncate_label(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        name.to_string()
    } else {
        let kept: String = name.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

/// Gradient stops, dark purple to yellow
const PLASMA: [(u8, u8, u8); 5] = [
    (13, 8, 135),
    (126, 3, 168),
    (204, 71, 120),
    (248, 149, 64),
    (240, 249, 33),
];

/// Map a fraction in `0.0..=1.0` onto the plasma gradient
///
/// Out-of-range and NaN inputs are clamped.
pub fn plasma_color(fraction: f64) -> Color {
    let t = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let scaled = t * (PLASMA.len() - 1) as f64;
    let idx = (scaled.floor() as usize).min(PLASMA.len() - 2);
    let local = scaled - idx as f64;

    let (r0, g0, b0) = PLASMA[idx];
    let (r1, g1, b1) = PLASMA[idx + 1];
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * local).round() as u8;

    Color::Rgb(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}

/// Render the largest-packages chart into `area`
pub fn render_chart(frame: &mut Frame, area: Rect, bars: &[ChartBar]) {
    let block = Block::default()
        .title(format!("Top {} Largest Packages (MiB)", bars.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    if bars.is_empty() {
        let empty = Paragraph::new("No packages to chart")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let max = bars.iter().map(|b| b.size_bytes).max().unwrap_or(0).max(1);

    let chart_bars: Vec<Bar> = bars
        .iter()
        .map(|bar| {
            let color = plasma_color(bar.size_bytes as f64 / max as f64);
            Bar::default()
                .value(bar.size_bytes)
                .label(Line::from(bar.label.clone()))
                .text_value(format!("{:.1} ({})", bar.size_mib, format_size(bar.size_bytes)))
                .style(Style::default().fg(color))
                .value_style(Style::default().fg(Color::Black).bg(color))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .max(max)
        .data(BarGroup::default().bars(&chart_bars));

    frame.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_bars_ranked() {
        let records = vec![
            PackageRecord::new("A", "1", "/a", 100),
            PackageRecord::new("B", "1", "/b", 300),
            PackageRecord::new("C", "1", "/c", 200),
        ];
        let bars = chart_bars(&records, 2);

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].label, "B");
        assert_eq!(bars[0].size_bytes, 300);
        assert_eq!(bars[1].label, "C");
    }

    #[test]
    fn test_chart_bars_mib() {
        let records = vec![PackageRecord::new("big", "1", "/b", 3 * 1024 * 1024)];
        let bars = chart_bars(&records, 20);
        assert!((bars[0].size_mib - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("exactly-ten", 11), "exactly-ten");
        assert_eq!(truncate_label("a-very-long-package-name", 8), "a-very-…");
    }

    #[test]
    fn test_plasma_color_endpoints() {
        assert_eq!(plasma_color(0.0), Color::Rgb(13, 8, 135));
        assert_eq!(plasma_color(1.0), Color::Rgb(240, 249, 33));
    }

    #[test]
    fn test_plasma_color_clamps() {
        assert_eq!(plasma_color(-1.0), plasma_color(0.0));
        assert_eq!(plasma_color(7.5), plasma_color(1.0));
        assert_eq!(plasma_color(f64::NAN), plasma_color(0.0));
    }

    #[test]
    fn test_plasma_color_midpoint_is_a_stop() {
        assert_eq!(plasma_color(0.5), Color::Rgb(204, 71, 120));
    }
}
