use super::chart_view::render_chart;
use super::markdown::render_markdown;
use super::table_view::{render_table, TableLayout};
use super::theme::Theme;
use crate::models::{Evidence, Message, Role};

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Bot => "Assistant",
    }
}

pub fn render_evidence(evidence: &[Evidence], theme: Theme) -> String {
    let mut lines = vec![theme.bold("Sources")];
    for (i, item) in evidence.iter().enumerate() {
        let heading = match &item.title {
            Some(title) if !title.is_empty() => format!("{} · {}", title, item.source),
            _ => item.source.clone(),
        };
        lines.push(format!("[{}] {}", i + 1, heading));
        if let Some(snippet) = item.snippet.as_deref().filter(|s| !s.is_empty()) {
            lines.push(format!("    {}", theme.dim(snippet)));
        }
        if let Some(url) = item.url.as_deref().filter(|s| !s.is_empty()) {
            lines.push(format!("    {}", theme.cyan(url)));
        }
    }
    lines.join("\n")
}

/// Table, chart and evidence sections of a message, in that order.
pub fn render_attachments(message: &Message, layout: TableLayout, theme: Theme) -> Option<String> {
    let mut sections = Vec::new();
    if let Some(table) = &message.table {
        sections.push(render_table(table, layout, theme));
    }
    if let Some(chart) = &message.chart {
        sections.push(render_chart(chart, theme));
    }
    if let Some(evidence) = message.evidence.as_deref().filter(|e| !e.is_empty()) {
        sections.push(render_evidence(evidence, theme));
    }
    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

pub fn render_message(message: &Message, layout: TableLayout, theme: Theme) -> String {
    let time = message.created_at.with_timezone(&chrono::Local).format("%H:%M");
    let mut out = format!(
        "{} {}\n",
        theme.bold(role_label(message.role)),
        theme.dim(&time.to_string())
    );

    let body = if message.is_error {
        theme.red(&message.content)
    } else if message.content.trim().is_empty() && message.is_thinking {
        theme.dim("Thinking…")
    } else if message.role == Role::User {
        message.content.clone()
    } else {
        render_markdown(&message.content, theme)
    };
    out.push_str(&body);

    if let Some(attachments) = render_attachments(message, layout, theme) {
        if !body.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&attachments);
    }
    out
}
