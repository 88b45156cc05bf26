use std::io::{self, Write};

use super::message_view::{render_attachments, role_label};
use super::table_view::TableLayout;
use super::theme::Theme;
use crate::services::chat::ChatUpdate;

/// Prints a streaming answer as it is revealed. Only the new suffix of the
/// displayed text is written; a change that is not an extension (the server
/// replaced the text, or the turn failed) starts a fresh line.
pub struct TerminalView<W: Write> {
    out: W,
    theme: Theme,
    layout: TableLayout,
    printed: String,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, theme: Theme, layout: TableLayout) -> Self {
        Self {
            out,
            theme,
            layout,
            printed: String::new(),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn handle(&mut self, update: ChatUpdate<'_>) -> io::Result<()> {
        match update {
            ChatUpdate::Started(message) => {
                self.printed.clear();
                writeln!(self.out, "{}", self.theme.bold(role_label(message.role)))?;
            }
            ChatUpdate::Progress { message, displayed } => {
                if displayed == self.printed {
                    return Ok(());
                }
                let theme = self.theme;
                let paint = |text: &str| {
                    if message.is_error {
                        theme.red(text)
                    } else {
                        text.to_string()
                    }
                };
                if let Some(delta) = displayed.strip_prefix(self.printed.as_str()) {
                    write!(self.out, "{}", paint(delta))?;
                } else {
                    write!(self.out, "\n{}", paint(displayed))?;
                }
                self.printed = displayed.to_string();
            }
            ChatUpdate::Finished(message) => {
                if !self.printed.is_empty() {
                    writeln!(self.out)?;
                }
                if let Some(attachments) = render_attachments(message, self.layout, self.theme) {
                    writeln!(self.out, "\n{}", attachments)?;
                }
                self.printed.clear();
            }
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::STREAM_ERROR_MESSAGE;
    use crate::models::Message;

    fn view() -> TerminalView<Vec<u8>> {
        TerminalView::new(Vec::new(), Theme::plain(), TableLayout::default())
    }

    fn output(view: TerminalView<Vec<u8>>) -> String {
        String::from_utf8(view.into_inner()).unwrap()
    }

    #[test]
    fn test_prints_only_new_suffix() {
        let mut v = view();
        let mut msg = Message::placeholder("c1");
        v.handle(ChatUpdate::Started(&msg)).unwrap();
        msg.content = "Hello".into();
        for shown in ["H", "He", "He", "Hello"] {
            v.handle(ChatUpdate::Progress { message: &msg, displayed: shown }).unwrap();
        }
        msg.finish();
        v.handle(ChatUpdate::Finished(&msg)).unwrap();
        assert_eq!(output(v), "Assistant\nHello\n");
    }

    #[test]
    fn test_replaced_text_starts_new_line() {
        let mut v = view();
        let mut msg = Message::placeholder("c1");
        v.handle(ChatUpdate::Started(&msg)).unwrap();
        msg.content = "partial".into();
        v.handle(ChatUpdate::Progress { message: &msg, displayed: "partial" }).unwrap();
        msg.fail(STREAM_ERROR_MESSAGE);
        v.handle(ChatUpdate::Progress { message: &msg, displayed: STREAM_ERROR_MESSAGE }).unwrap();
        v.handle(ChatUpdate::Finished(&msg)).unwrap();
        assert_eq!(
            output(v),
            format!("Assistant\npartial\n{}\n", STREAM_ERROR_MESSAGE)
        );
    }

    #[test]
    fn test_finished_prints_attachments() {
        let mut v = view();
        let mut msg = Message::placeholder("c1");
        v.handle(ChatUpdate::Started(&msg)).unwrap();
        msg.chart = Some(
            serde_json::from_value(serde_json::json!({
                "type": "bar", "labels": ["A"], "series": [{"name": "s", "data": [1]}]
            }))
            .unwrap(),
        );
        msg.finish();
        v.handle(ChatUpdate::Finished(&msg)).unwrap();
        assert_eq!(output(v), format!("Assistant\n\nA │{} 1\n", "█".repeat(30)));
    }
}
