use super::theme::Theme;
use crate::models::{ChartPayload, ChartSeries};

const BAR_WIDTH: usize = 30;
const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.2}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Scaled bar of at most [`BAR_WIDTH`] cells. Non-positive values get no bar.
fn bar(value: f64, max: f64) -> String {
    if value <= 0.0 || max <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let cells = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(cells.clamp(1, BAR_WIDTH))
}

/// One block per point, scaled between the series' min and max. Gaps are blank.
pub fn sparkline(data: &[Option<f64>]) -> String {
    let finite = data.iter().flatten().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    data.iter()
        .map(|point| match point {
            Some(v) if v.is_finite() => {
                if max > min {
                    let idx = ((v - min) / (max - min) * (SPARK.len() - 1) as f64).round() as usize;
                    SPARK[idx.min(SPARK.len() - 1)]
                } else {
                    SPARK[3]
                }
            }
            _ => ' ',
        })
        .collect()
}

/// Indices of the first minimum and first maximum, or `None` for a flat or empty series.
fn extremes(data: &[Option<f64>]) -> Option<(usize, usize)> {
    let mut points = data
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|v| v.is_finite()).map(|v| (i, v)));
    let first = points.next()?;
    let (min, max) = points.fold((first, first), |(min, max), point| {
        (
            if point.1 < min.1 { point } else { min },
            if point.1 > max.1 { point } else { max },
        )
    });
    (max.1 > min.1).then_some((min.0, max.0))
}

fn label_at(labels: &[String], index: usize) -> String {
    labels
        .get(index)
        .cloned()
        .unwrap_or_else(|| (index + 1).to_string())
}

fn format_point(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_else(|| "–".to_string())
}

fn label_width(labels: &[String]) -> usize {
    labels.iter().map(|l| l.chars().count()).max().unwrap_or(0)
}

fn pad(label: &str, width: usize) -> String {
    format!("{}{}", label, " ".repeat(width.saturating_sub(label.chars().count())))
}

fn render_bars(labels: &[String], series: &[ChartSeries], theme: Theme) -> Vec<String> {
    let width = label_width(labels);
    let max = series.iter().flat_map(ChartSeries::values).fold(0.0, f64::max);

    let mut lines = Vec::new();
    for s in series {
        if series.len() > 1 {
            lines.push(theme.cyan(&s.name));
        }
        for (label, value) in labels.iter().zip(&s.data) {
            let cells = value.map(|v| bar(v, max)).unwrap_or_default();
            lines.push(format!(
                "{} │{} {}",
                pad(label, width),
                theme.green(&cells),
                format_point(*value)
            ));
        }
    }
    lines
}

fn render_pie(labels: &[String], series: &ChartSeries, theme: Theme) -> Vec<String> {
    let width = label_width(labels);
    let total: f64 = series.values().filter(|v| *v > 0.0).sum();
    labels
        .iter()
        .zip(&series.data)
        .map(|(label, value)| match value {
            Some(value) => {
                let share = if total > 0.0 && *value > 0.0 {
                    value / total * 100.0
                } else {
                    0.0
                };
                format!(
                    "{} │{} {:.1}% ({})",
                    pad(label, width),
                    theme.green(&bar(share, 100.0)),
                    share,
                    format_number(*value)
                )
            }
            None => format!("{} │ –", pad(label, width)),
        })
        .collect()
}

/// Each series as a sparkline followed by one row per label, with the lowest
/// and highest points marked.
fn render_lines(labels: &[String], series: &[ChartSeries], theme: Theme) -> Vec<String> {
    let mut lines = Vec::new();
    for s in series.iter().filter(|s| s.values().next().is_some()) {
        lines.push(format!("{} {}", theme.cyan(&s.name), theme.green(&sparkline(&s.data))));

        let rows: Vec<(String, String)> = s
            .data
            .iter()
            .enumerate()
            .map(|(i, value)| (label_at(labels, i), format_point(*value)))
            .collect();
        let label_width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
        let value_width = rows.iter().map(|(_, v)| v.chars().count()).max().unwrap_or(0);
        let extremes = extremes(&s.data);

        for (i, (label, value)) in rows.iter().enumerate() {
            let marker = match extremes {
                Some((_, max)) if i == max => format!(" {}", theme.green("▲ max")),
                Some((min, _)) if i == min => format!(" {}", theme.yellow("▼ min")),
                _ => String::new(),
            };
            lines.push(format!(
                "  {} {:>width$}{}",
                pad(label, label_width),
                value,
                marker,
                width = value_width
            ));
        }
    }
    lines
}

/// Text rendition of a chart payload. Unknown chart types draw as bars.
pub fn render_chart(chart: &ChartPayload, theme: Theme) -> String {
    let mut lines = Vec::new();
    if let Some(title) = &chart.title {
        lines.push(theme.bold(title));
    }

    if chart.series.iter().all(|s| s.values().next().is_none()) {
        lines.push(theme.dim("(no chart data)"));
        return lines.join("\n");
    }

    match chart.chart_type.to_ascii_lowercase().as_str() {
        "pie" | "doughnut" | "donut" => {
            if let Some(first) = chart.series.first() {
                lines.extend(render_pie(&chart.labels, first, theme));
            }
        }
        "line" | "area" => lines.extend(render_lines(&chart.labels, &chart.series, theme)),
        _ => lines.extend(render_bars(&chart.labels, &chart.series, theme)),
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chart(value: serde_json::Value) -> ChartPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(3.14159), "3.14");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-7.0), "-7");
    }

    #[test]
    fn test_sparkline_spans_range() {
        assert_eq!(sparkline(&[Some(1.0), Some(2.0), Some(3.0)]), "▁▅█");
        assert_eq!(sparkline(&[Some(5.0), Some(5.0)]), "▄▄");
        assert_eq!(sparkline(&[Some(1.0), None, Some(3.0)]), "▁ █");
        assert_eq!(sparkline(&[]), "");
    }

    #[test]
    fn test_bar_chart_scales_to_max() {
        let out = render_chart(
            &chart(json!({
                "type": "bar",
                "title": "Revenue",
                "labels": ["2022", "2023"],
                "series": [{"name": "Revenue", "data": [50, 100]}]
            })),
            Theme::plain(),
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Revenue");
        assert_eq!(lines[1], format!("2022 │{} 50", "█".repeat(15)));
        assert_eq!(lines[2], format!("2023 │{} 100", "█".repeat(30)));
    }

    #[test]
    fn test_pie_chart_shows_shares() {
        let out = render_chart(
            &chart(json!({
                "type": "pie",
                "labels": ["Equity", "Bonds"],
                "series": [{"name": "Allocation", "data": [3, 1]}]
            })),
            Theme::plain(),
        );
        assert!(out.contains("75.0% (3)"));
        assert!(out.contains("25.0% (1)"));
    }

    #[test]
    fn test_line_chart_summarizes_series() {
        let out = render_chart(
            &chart(json!({
                "type": "line",
                "labels": ["Jan", "Feb", "Mar"],
                "series": [{"name": "AAPL", "data": [1, 2, 3]}]
            })),
            Theme::plain(),
        );
        assert_eq!(out, "AAPL ▁▅█\n  Jan 1 ▼ min\n  Feb 2\n  Mar 3 ▲ max");
    }

    #[test]
    fn test_line_chart_shows_gaps() {
        let out = render_chart(
            &chart(json!({
                "type": "line",
                "labels": ["Q1", "Q2", "Q3"],
                "series": [{"name": "EPS", "data": [2.5, null, 1]}]
            })),
            Theme::plain(),
        );
        assert_eq!(out, "EPS █ ▁\n  Q1 2.5 ▲ max\n  Q2   –\n  Q3   1 ▼ min");
    }

    #[test]
    fn test_flat_line_has_no_markers() {
        let out = render_chart(
            &chart(json!({
                "type": "line",
                "series": [{"name": "Rate", "data": [4, 4]}]
            })),
            Theme::plain(),
        );
        assert_eq!(out, "Rate ▄▄\n  1 4\n  2 4");
    }

    #[test]
    fn test_bar_chart_leaves_gaps_blank() {
        let out = render_chart(
            &chart(json!({
                "type": "bar",
                "labels": ["2022", "2023"],
                "series": [{"name": "Revenue", "data": [null, 100]}]
            })),
            Theme::plain(),
        );
        assert_eq!(out.lines().next(), Some("2022 │ –"));
    }

    #[test]
    fn test_all_null_series_counts_as_empty() {
        let out = render_chart(
            &chart(json!({"type": "line", "series": [{"name": "x", "data": [null]}]})),
            Theme::plain(),
        );
        assert_eq!(out, "(no chart data)");
    }

    #[test]
    fn test_empty_chart() {
        let out = render_chart(&chart(json!({"type": "bar", "series": []})), Theme::plain());
        assert_eq!(out, "(no chart data)");
    }
}
