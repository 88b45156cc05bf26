use crate::models::{ChartPayload, Conversation, Evidence, Message, TablePayload};
use crate::ui::chart_view::format_number;
use crate::ui::message_view::role_label;
use crate::ui::table_view::format_cell;

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn table_to_markdown(table: &TablePayload) -> String {
    let columns = table.effective_columns();
    let mut out = String::new();
    if let Some(title) = &table.title {
        out.push_str(&format!("**{}**\n\n", title));
    }
    if columns.is_empty() {
        out.push_str("_(empty table)_\n");
        return out;
    }

    let header: Vec<String> = columns.iter().map(|c| escape_cell(c)).collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!("|{}\n", " --- |".repeat(columns.len())));
    for row in &table.rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| escape_cell(&row.get(c).map(format_cell).unwrap_or_default()))
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

fn chart_to_markdown(chart: &ChartPayload) -> String {
    let mut out = match &chart.title {
        Some(title) => format!("**Chart ({}): {}**\n\n", chart.chart_type, title),
        None => format!("**Chart ({})**\n\n", chart.chart_type),
    };
    for series in &chart.series {
        let points: Vec<String> = chart
            .labels
            .iter()
            .zip(&series.data)
            .map(|(label, value)| match value {
                Some(value) => format!("{}: {}", label, format_number(*value)),
                None => format!("{}: n/a", label),
            })
            .collect();
        out.push_str(&format!("- {}: {}\n", series.name, points.join(", ")));
    }
    out
}

fn evidence_to_markdown(evidence: &[Evidence]) -> String {
    let mut out = String::from("**Sources**\n\n");
    for (i, item) in evidence.iter().enumerate() {
        let title = item.title.as_deref().unwrap_or(&item.source);
        let heading = match &item.url {
            Some(url) => format!("[{}]({})", title, url),
            None => title.to_string(),
        };
        if item.title.is_some() {
            out.push_str(&format!("{}. {} ({})\n", i + 1, heading, item.source));
        } else {
            out.push_str(&format!("{}. {}\n", i + 1, heading));
        }
        if let Some(snippet) = &item.snippet {
            out.push_str(&format!("   > {}\n", snippet.replace('\n', " ")));
        }
    }
    out
}

pub fn export_to_markdown(conversation: &Conversation, messages: &[Message]) -> String {
    let mut output = format!("# {}\n\n", conversation.title);
    output.push_str(&format!(
        "> Created: {} | Messages: {}\n\n",
        conversation.created_at.format("%Y-%m-%d %H:%M"),
        messages.len()
    ));
    output.push_str("---\n\n");

    for msg in messages {
        output.push_str(&format!("### {}\n\n", role_label(msg.role)));
        if msg.is_error {
            output.push_str(&format!("_{}_\n\n", msg.content));
        } else if !msg.content.is_empty() {
            output.push_str(&format!("{}\n\n", msg.content));
        }
        if let Some(table) = &msg.table {
            output.push_str(&table_to_markdown(table));
            output.push('\n');
        }
        if let Some(chart) = &msg.chart {
            output.push_str(&chart_to_markdown(chart));
            output.push('\n');
        }
        if let Some(evidence) = msg.evidence.as_deref().filter(|e| !e.is_empty()) {
            output.push_str(&evidence_to_markdown(evidence));
            output.push('\n');
        }
    }

    output
}
