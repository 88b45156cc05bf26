use chrono::{DateTime, Datelike, Utc};

use super::theme::Theme;
use crate::models::Conversation;

/// A row of the conversation list: a date header or a numbered conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum SidebarItem<'a> {
    Header(&'static str),
    Conversation(usize, &'a Conversation),
}

pub fn date_group(dt: &DateTime<Utc>, now: &DateTime<Utc>) -> &'static str {
    let today = now.date_naive();
    let date = dt.date_naive();

    if date == today {
        "Today"
    } else if date == today.pred_opt().unwrap_or(today) {
        "Yesterday"
    } else if date.iso_week() == today.iso_week() && date.year() == today.year() {
        "This Week"
    } else {
        "Older"
    }
}

/// Pinned conversations first, then the rest under date headers. Numbers are
/// 1-based positions in `conversations`, which is expected to be sorted.
pub fn sidebar_items<'a>(
    conversations: &'a [Conversation],
    now: &DateTime<Utc>,
) -> Vec<SidebarItem<'a>> {
    let (pinned, unpinned): (Vec<_>, Vec<_>) = conversations
        .iter()
        .enumerate()
        .map(|(i, c)| (i + 1, c))
        .partition(|(_, c)| c.is_pinned);

    let mut items = Vec::new();
    if !pinned.is_empty() {
        items.push(SidebarItem::Header("Pinned"));
        items.extend(pinned.into_iter().map(|(n, c)| SidebarItem::Conversation(n, c)));
    }

    let mut current_group: Option<&str> = None;
    for (n, conv) in unpinned {
        let group = date_group(&conv.updated_at, now);
        if current_group != Some(group) {
            current_group = Some(group);
            items.push(SidebarItem::Header(group));
        }
        items.push(SidebarItem::Conversation(n, conv));
    }
    items
}

pub fn render_conversation_list(
    conversations: &[Conversation],
    current_id: Option<&str>,
    now: &DateTime<Utc>,
    theme: Theme,
) -> String {
    if conversations.is_empty() {
        return theme.dim("No conversations yet.");
    }

    let mut lines = Vec::new();
    for item in sidebar_items(conversations, now) {
        match item {
            SidebarItem::Header(label) => {
                if !lines.is_empty() {
                    lines.push(String::new());
                }
                lines.push(theme.bold(label));
            }
            SidebarItem::Conversation(n, conv) => {
                let marker = if Some(conv.id.as_str()) == current_id { "*" } else { " " };
                let noun = if conv.message_count == 1 { "message" } else { "messages" };
                lines.push(format!(
                    "{}{:>3}. {} {}",
                    marker,
                    n,
                    conv.title,
                    theme.dim(&format!("({} {}) {}", conv.message_count, noun, conv.id))
                ));
            }
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn conv(id: &str, updated_at: DateTime<Utc>, pinned: bool) -> Conversation {
        let mut c = Conversation::new(id.to_string(), id);
        c.updated_at = updated_at;
        c.is_pinned = pinned;
        c
    }

    #[test]
    fn test_date_group() {
        // A Thursday
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();
        assert_eq!(date_group(&now, &now), "Today");
        assert_eq!(date_group(&(now - Duration::days(1)), &now), "Yesterday");
        assert_eq!(date_group(&(now - Duration::days(3)), &now), "This Week");
        assert_eq!(date_group(&(now - Duration::days(10)), &now), "Older");
    }

    #[test]
    fn test_sidebar_items_group_pinned_then_dates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();
        let convs = vec![
            conv("p", now - Duration::days(30), true),
            conv("a", now, false),
            conv("b", now - Duration::hours(1), false),
            conv("c", now - Duration::days(20), false),
        ];
        let items = sidebar_items(&convs, &now);
        let shape: Vec<String> = items
            .iter()
            .map(|i| match i {
                SidebarItem::Header(h) => h.to_string(),
                SidebarItem::Conversation(n, c) => format!("{}:{}", n, c.id),
            })
            .collect();
        assert_eq!(shape, vec!["Pinned", "1:p", "Today", "2:a", "3:b", "Older", "4:c"]);
    }

    #[test]
    fn test_render_marks_current() {
        let now = Utc::now();
        let mut a = conv("a", now, false);
        a.title = "Apple earnings".to_string();
        a.message_count = 2;
        let out = render_conversation_list(&[a], Some("a"), &now, Theme::plain());
        assert_eq!(out, "Today\n*  1. Apple earnings (2 messages) a");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(
            render_conversation_list(&[], None, &Utc::now(), Theme::plain()),
            "No conversations yet."
        );
    }
}
