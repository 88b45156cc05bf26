use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::models::TablePayload;

pub const UNKNOWN_DATE_GROUP: &str = "Unknown";

type Row = Map<String, Value>;

/// Rows that share a calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    /// `YYYY-MM-DD`, or [`UNKNOWN_DATE_GROUP`].
    pub label: String,
    pub date: Option<NaiveDate>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// 1-based.
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub items: Vec<T>,
}

/// Parse the calendar date out of a cell value.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => n.as_i64().and_then(date_from_timestamp),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    if s.chars().all(|c| c.is_ascii_digit()) && s.len() >= 10 {
        return s.parse::<i64>().ok().and_then(date_from_timestamp);
    }
    None
}

/// Seconds or milliseconds since the epoch, told apart by magnitude. Values
/// outside 2001 to 2286 are not timestamps.
fn date_from_timestamp(ts: i64) -> Option<NaiveDate> {
    let secs = match ts {
        1_000_000_000..=9_999_999_999 => ts,
        1_000_000_000_000..=9_999_999_999_999 => ts / 1000,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

/// Pick the column to group by: the first whose name suggests a date and
/// holds at least one date, else the first whose non-null values all parse
/// as dates.
pub fn detect_date_column(table: &TablePayload) -> Option<String> {
    let columns = table.effective_columns();
    let named = columns.iter().find(|c| {
        let lower = c.to_ascii_lowercase();
        ["date", "time", "day", "period"]
            .iter()
            .any(|hint| lower.contains(hint))
            && table
                .rows
                .iter()
                .any(|row| row.get(c.as_str()).and_then(parse_date).is_some())
    });
    if let Some(column) = named {
        return Some(column.clone());
    }

    columns
        .into_iter()
        .find(|column| {
            let mut values = table
                .rows
                .iter()
                .filter_map(|row| row.get(column))
                .filter(|v| !v.is_null())
                .peekable();
            values.peek().is_some() && values.all(|v| parse_date(v).is_some())
        })
}

/// Partition rows by calendar date. Groups run newest first with the
/// unparseable rows last; rows keep their input order within a group.
pub fn group_rows_by_date(table: &TablePayload, column: &str) -> Vec<RowGroup> {
    let mut dated: Vec<RowGroup> = Vec::new();
    let mut unknown: Vec<Row> = Vec::new();

    for row in &table.rows {
        match row.get(column).and_then(parse_date) {
            Some(date) => match dated.iter_mut().find(|g| g.date == Some(date)) {
                Some(group) => group.rows.push(row.clone()),
                None => dated.push(RowGroup {
                    label: date.format("%Y-%m-%d").to_string(),
                    date: Some(date),
                    rows: vec![row.clone()],
                }),
            },
            None => unknown.push(row.clone()),
        }
    }

    dated.sort_by(|a, b| b.date.cmp(&a.date));
    if !unknown.is_empty() {
        dated.push(RowGroup {
            label: UNKNOWN_DATE_GROUP.to_string(),
            date: None,
            rows: unknown,
        });
    }
    dated
}

pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    total_items.div_ceil(page_size).max(1)
}

/// Slice out one page. `page` is 1-based and clamped into range.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(items.len(), page_size);
    let number = page.clamp(1, total_pages);
    let start = (number - 1) * page_size;
    let end = (start + page_size).min(items.len());

    Page {
        number,
        total_pages,
        total_items: items.len(),
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(rows: Value) -> TablePayload {
        serde_json::from_value(json!({ "columns": ["date", "ticker", "close"], "rows": rows }))
            .unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        for value in [
            json!("2024-03-15"),
            json!("2024/03/15"),
            json!("2024-03-15T09:30:00Z"),
            json!("2024-03-15 16:00:00"),
            json!(1710460800),
            json!(1710460800000i64),
        ] {
            assert_eq!(parse_date(&value), expected, "value {}", value);
        }
        assert_eq!(parse_date(&json!("Q1 2024")), None);
        assert_eq!(parse_date(&json!(null)), None);
        assert_eq!(parse_date(&json!(12.5)), None);
    }

    #[test]
    fn test_small_integers_are_not_timestamps() {
        assert_eq!(parse_date(&json!(1500)), None);
        assert_eq!(parse_date(&json!(2023)), None);
        assert_eq!(parse_date(&json!(-1710460800)), None);
        assert_eq!(parse_date(&json!(99_999_999_999i64)), None);
    }

    #[test]
    fn test_group_rows_by_date_partitions_without_loss() {
        let t = table(json!([
            {"date": "2024-03-14", "ticker": "AAPL", "close": 173.0},
            {"date": "2024-03-15", "ticker": "AAPL", "close": 172.6},
            {"date": "n/a", "ticker": "MSFT", "close": 1.0},
            {"date": "2024-03-14", "ticker": "MSFT", "close": 425.2},
            {"ticker": "GOOG", "close": 141.2},
            {"date": "2024-03-15T20:00:00Z", "ticker": "MSFT", "close": 416.4},
        ]));
        let groups = group_rows_by_date(&t, "date");

        let labels: Vec<_> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-03-15", "2024-03-14", UNKNOWN_DATE_GROUP]);

        let tickers: Vec<_> = groups[1].rows.iter().map(|r| r["ticker"].clone()).collect();
        assert_eq!(tickers, vec![json!("AAPL"), json!("MSFT")]);

        let total: usize = groups.iter().map(|g| g.rows.len()).sum();
        assert_eq!(total, t.rows.len());
        for row in &t.rows {
            let hits = groups.iter().flat_map(|g| &g.rows).filter(|r| *r == row).count();
            assert_eq!(hits, 1);
        }
    }

    #[test]
    fn test_grouping_is_deterministic() {
        let t = table(json!([
            {"date": "2024-01-02", "ticker": "A"},
            {"date": "2023-12-29", "ticker": "B"},
            {"date": "2024-01-02", "ticker": "C"},
        ]));
        assert_eq!(group_rows_by_date(&t, "date"), group_rows_by_date(&t, "date"));
    }

    #[test]
    fn test_detect_date_column() {
        let t = table(json!([{"date": "2024-01-02", "ticker": "A", "close": 1}]));
        assert_eq!(detect_date_column(&t).as_deref(), Some("date"));

        let unnamed: TablePayload = serde_json::from_value(json!({
            "columns": ["ticker", "as_of"],
            "rows": [{"ticker": "A", "as_of": "2024-01-02"}, {"ticker": "B", "as_of": null}]
        }))
        .unwrap();
        assert_eq!(detect_date_column(&unnamed).as_deref(), Some("as_of"));

        let none: TablePayload = serde_json::from_value(json!({
            "columns": ["ticker", "close"],
            "rows": [{"ticker": "A", "close": 1.5}]
        }))
        .unwrap();
        assert_eq!(detect_date_column(&none), None);
    }

    #[test]
    fn test_integer_columns_are_not_dates() {
        let shares: TablePayload = serde_json::from_value(json!({
            "columns": ["ticker", "shares"],
            "rows": [{"ticker": "AAPL", "shares": 1500}, {"ticker": "MSFT", "shares": 2300}]
        }))
        .unwrap();
        assert_eq!(detect_date_column(&shares), None);
    }

    #[test]
    fn test_named_column_without_dates_is_skipped() {
        let audit: TablePayload = serde_json::from_value(json!({
            "columns": ["last_updated_by", "value"],
            "rows": [
                {"last_updated_by": "alice", "value": 1},
                {"last_updated_by": "bob", "value": 2}
            ]
        }))
        .unwrap();
        assert_eq!(detect_date_column(&audit), None);

        let fallthrough: TablePayload = serde_json::from_value(json!({
            "columns": ["updated_by", "as_of"],
            "rows": [{"updated_by": "alice", "as_of": "2024-01-02"}]
        }))
        .unwrap();
        assert_eq!(detect_date_column(&fallthrough).as_deref(), Some("as_of"));
    }

    #[test]
    fn test_paginate_covers_every_item_once() {
        let items: Vec<u32> = (1..=23).collect();
        let pages = total_pages(items.len(), 10);
        assert_eq!(pages, 3);

        let mut rebuilt = Vec::new();
        for n in 1..=pages {
            let page = paginate(&items, n, 10);
            assert_eq!(page.number, n);
            assert_eq!(page.total_items, 23);
            rebuilt.extend(page.items);
        }
        assert_eq!(rebuilt, items);
        assert_eq!(paginate(&items, 3, 10).items, vec![21, 22, 23]);
    }

    #[test]
    fn test_paginate_clamps_and_handles_empty() {
        let items = vec!["a", "b", "c"];
        assert_eq!(paginate(&items, 0, 2).number, 1);
        let last = paginate(&items, 99, 2);
        assert_eq!(last.number, 2);
        assert_eq!(last.items, vec!["c"]);

        let empty: Vec<u8> = Vec::new();
        let page = paginate(&empty, 1, 10);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());

        assert_eq!(paginate(&items, 1, 0).items, vec!["a"]);
    }
}
