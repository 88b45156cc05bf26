use serde_json::{Map, Value};

use super::theme::Theme;
use crate::models::TablePayload;
use crate::services::tables::{detect_date_column, group_rows_by_date, paginate, Page, RowGroup};

const MAX_CELL_WIDTH: usize = 32;

/// How a table payload is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub page: usize,
    pub page_size: usize,
    pub group_by_date: bool,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            group_by_date: true,
        }
    }
}

pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn is_numeric(cell: &str) -> bool {
    let cleaned = cell
        .trim()
        .trim_start_matches(['$', '€', '£', '¥'])
        .trim_end_matches('%')
        .replace(',', "");
    !cleaned.is_empty() && cleaned.parse::<f64>().is_ok()
}

fn truncate(cell: &str, width: usize) -> String {
    if cell.chars().count() <= width {
        return cell.to_string();
    }
    let mut out: String = cell.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn pad(cell: &str, width: usize, right: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(cell.chars().count()));
    if right {
        format!("{}{}", fill, cell)
    } else {
        format!("{}{}", cell, fill)
    }
}

/// Aligned text grid. Columns whose cells are all numeric are right-aligned.
pub fn render_grid(header: &[String], rows: &[Vec<String>], theme: Theme) -> String {
    let columns = header
        .len()
        .max(rows.iter().map(Vec::len).max().unwrap_or(0));
    if columns == 0 {
        return String::new();
    }

    let cell = |row: &[String], i: usize| {
        truncate(row.get(i).map(String::as_str).unwrap_or(""), MAX_CELL_WIDTH)
    };
    let header: Vec<String> = (0..columns).map(|i| cell(header, i)).collect();
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| (0..columns).map(|i| cell(row, i)).collect())
        .collect();

    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            body.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let numeric: Vec<bool> = (0..columns)
        .map(|i| {
            let mut cells = body.iter().map(|row| &row[i]).filter(|c| !c.is_empty()).peekable();
            cells.peek().is_some() && cells.all(|c| is_numeric(c))
        })
        .collect();

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| pad(c, widths[i], numeric[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&theme.bold(&line(&header)));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    out.push_str(&theme.dim(&rule.join("  ")));
    for row in &body {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}

pub fn render_rows(columns: &[String], rows: &[Map<String, Value>], theme: Theme) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(format_cell).unwrap_or_default())
                .collect()
        })
        .collect();
    render_grid(columns, &body, theme)
}

fn render_groups(columns: &[String], groups: &[RowGroup], theme: Theme) -> String {
    groups
        .iter()
        .map(|group| {
            let noun = if group.rows.len() == 1 { "row" } else { "rows" };
            format!(
                "{}\n{}",
                theme.cyan(&format!("▸ {} ({} {})", group.label, group.rows.len(), noun)),
                render_rows(columns, &group.rows, theme)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a table payload: title, one page of rows (grouped by date when a
/// date column exists and grouping is on), and a page footer.
pub fn render_table(table: &TablePayload, layout: TableLayout, theme: Theme) -> String {
    let columns = table.effective_columns();
    let mut out = String::new();
    if let Some(title) = &table.title {
        out.push_str(&theme.bold(title));
        out.push('\n');
    }
    if table.is_empty() {
        out.push_str(&theme.dim("(no rows)"));
        return out;
    }

    let date_column = if layout.group_by_date {
        detect_date_column(table)
    } else {
        None
    };

    match date_column {
        Some(column) => {
            let ordered: Vec<Map<String, Value>> = group_rows_by_date(table, &column)
                .into_iter()
                .flat_map(|g| g.rows)
                .collect();
            let page = paginate(&ordered, layout.page, layout.page_size);
            let page_table = TablePayload {
                title: None,
                columns: columns.clone(),
                rows: page.items.clone(),
            };
            out.push_str(&render_groups(
                &columns,
                &group_rows_by_date(&page_table, &column),
                theme,
            ));
            push_footer(&mut out, &page, theme);
        }
        None => {
            let page = paginate(&table.rows, layout.page, layout.page_size);
            out.push_str(&render_rows(&columns, &page.items, theme));
            push_footer(&mut out, &page, theme);
        }
    }
    out
}

fn push_footer<T>(out: &mut String, page: &Page<T>, theme: Theme) {
    let noun = if page.total_items == 1 { "row" } else { "rows" };
    let mut footer = format!(
        "Page {}/{} ({} {})",
        page.number, page.total_pages, page.total_items, noun
    );
    if page.total_pages > 1 {
        footer.push_str(" · /page <n> to navigate");
    }
    out.push('\n');
    out.push_str(&theme.dim(&footer));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prices(n: usize) -> TablePayload {
        let rows: Vec<Value> = (0..n)
            .map(|i| {
                json!({
                    "date": format!("2024-01-{:02}", i % 3 + 1),
                    "ticker": format!("T{}", i),
                    "close": 100 + i,
                })
            })
            .collect();
        serde_json::from_value(json!({
            "title": "Prices",
            "columns": ["date", "ticker", "close"],
            "rows": rows,
        }))
        .unwrap()
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(&json!(null)), "");
        assert_eq!(format_cell(&json!("AAPL")), "AAPL");
        assert_eq!(format_cell(&json!(12.5)), "12.5");
        assert_eq!(format_cell(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_grid_right_aligns_numbers() {
        let grid = render_grid(
            &["ticker".into(), "close".into()],
            &[
                vec!["AAPL".into(), "1,234.5".into()],
                vec!["MSFT".into(), "9".into()],
            ],
            Theme::plain(),
        );
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines[0], "ticker    close");
        assert_eq!(lines[2], "AAPL    1,234.5");
        assert_eq!(lines[3], "MSFT          9");
    }

    #[test]
    fn test_long_cells_are_truncated() {
        let long = "x".repeat(100);
        let grid = render_grid(&["a".into()], &[vec![long]], Theme::plain());
        let last = grid.lines().last().unwrap();
        assert_eq!(last.chars().count(), MAX_CELL_WIDTH);
        assert!(last.ends_with('…'));
    }

    #[test]
    fn test_flat_table_paginates() {
        let layout = TableLayout {
            page: 2,
            page_size: 4,
            group_by_date: false,
        };
        let out = render_table(&prices(10), layout, Theme::plain());
        assert!(out.starts_with("Prices\n"));
        assert!(out.contains("T4"));
        assert!(!out.contains("T3 "));
        assert!(out.contains("Page 2/3 (10 rows)"));
    }

    #[test]
    fn test_grouped_table_shows_sections_newest_first() {
        let out = render_table(&prices(6), TableLayout::default(), Theme::plain());
        let third = out.find("▸ 2024-01-03").unwrap();
        let first = out.find("▸ 2024-01-01").unwrap();
        assert!(third < first);
        assert!(out.contains("(2 rows)"));
        assert!(out.ends_with("Page 1/1 (6 rows)"));
    }

    #[test]
    fn test_integer_table_is_not_grouped_by_epoch() {
        let table: TablePayload = serde_json::from_value(json!({
            "columns": ["ticker", "shares"],
            "rows": [{"ticker": "AAPL", "shares": 1500}, {"ticker": "MSFT", "shares": 2300}]
        }))
        .unwrap();
        let out = render_table(&table, TableLayout::default(), Theme::plain());
        assert!(!out.contains("1970-01-01"));
        assert!(!out.contains('▸'));
        assert!(out.starts_with("ticker  shares"));
    }

    #[test]
    fn test_empty_table() {
        let table = TablePayload::default();
        assert_eq!(
            render_table(&table, TableLayout::default(), Theme::plain()),
            "(no rows)"
        );
    }
}
