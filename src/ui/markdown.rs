use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use super::table_view::render_grid;
use super::theme::Theme;

/// Render Markdown as terminal text.
pub fn render_markdown(input: &str, theme: Theme) -> String {
    let options =
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS;
    let mut ctx = RenderContext::new(theme);
    for event in Parser::new_ext(input, options) {
        ctx.handle_event(event);
    }
    ctx.finish()
}

#[derive(Default)]
struct TableState {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

struct RenderContext {
    theme: Theme,
    out: String,
    // Written at the start of every line: quote bars and list indentation.
    prefixes: Vec<String>,
    lists: Vec<Option<u64>>,
    links: Vec<String>,
    table: Option<TableState>,
    bold: u32,
    italic: u32,
}

impl RenderContext {
    fn new(theme: Theme) -> Self {
        Self {
            theme,
            out: String::new(),
            prefixes: Vec::new(),
            lists: Vec::new(),
            links: Vec::new(),
            table: None,
            bold: 0,
            italic: 0,
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.handle_start(tag),
            Event::End(tag) => self.handle_end(tag),
            Event::Text(text) => {
                if self.table.is_some() {
                    self.write(&text);
                } else {
                    let styled = self.theme.emphasis(&text, self.bold > 0, self.italic > 0);
                    self.write(&styled);
                }
            }
            Event::Code(code) => {
                let code = if self.theme.color && self.table.is_none() {
                    self.theme.cyan(&code)
                } else {
                    format!("`{}`", code)
                };
                self.write(&code);
            }
            Event::SoftBreak => self.write(" "),
            Event::HardBreak => self.write("\n"),
            Event::Rule => {
                self.newline();
                let rule = self.theme.dim(&"─".repeat(40));
                self.write(&rule);
                self.blank_line();
            }
            Event::TaskListMarker(done) => self.write(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn handle_start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.newline();
                if level == HeadingLevel::H1 || level == HeadingLevel::H2 {
                    self.bold += 1;
                }
                self.bold += 1;
            }
            Tag::Strong => self.bold += 1,
            Tag::Emphasis => self.italic += 1,
            Tag::Link { dest_url, .. } => self.links.push(dest_url.to_string()),
            Tag::CodeBlock(kind) => {
                self.newline();
                if let CodeBlockKind::Fenced(lang) = kind {
                    let lang = lang.trim();
                    if !lang.is_empty() {
                        let label = self.theme.dim(lang);
                        self.write(&label);
                        self.write("\n");
                    }
                }
                self.prefixes.push("    ".to_string());
            }
            Tag::BlockQuote(_) => {
                self.newline();
                self.prefixes.push("│ ".to_string());
            }
            Tag::List(start) => {
                self.newline();
                self.lists.push(start);
            }
            Tag::Item => {
                self.newline();
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let bullet = format!("{}. ", n);
                        *n += 1;
                        bullet
                    }
                    _ => "• ".to_string(),
                };
                self.write(&bullet);
                self.prefixes.push(" ".repeat(bullet.chars().count()));
            }
            Tag::Table(_) => {
                self.newline();
                self.table = Some(TableState::default());
            }
            Tag::TableCell => {
                if let Some(table) = &mut self.table {
                    table.cell.clear();
                }
            }
            _ => {}
        }
    }

    fn handle_end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.blank_line();
                } else {
                    self.newline();
                }
            }
            TagEnd::Heading(level) => {
                if level == HeadingLevel::H1 || level == HeadingLevel::H2 {
                    self.bold = self.bold.saturating_sub(1);
                }
                self.bold = self.bold.saturating_sub(1);
                self.blank_line();
            }
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Link => {
                if let Some(url) = self.links.pop() {
                    if !url.is_empty() && !self.out.ends_with(url.as_str()) {
                        self.write(&format!(" ({})", url));
                    }
                }
            }
            TagEnd::CodeBlock => {
                self.prefixes.pop();
                self.blank_line();
            }
            TagEnd::BlockQuote(_) => {
                self.prefixes.pop();
                self.blank_line();
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                } else {
                    self.newline();
                }
            }
            TagEnd::Item => {
                self.prefixes.pop();
                self.newline();
            }
            TagEnd::TableCell => {
                if let Some(table) = &mut self.table {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = &mut self.table {
                    table.header = std::mem::take(&mut table.row);
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = &mut self.table {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    let grid = render_grid(&table.header, &table.rows, self.theme);
                    self.write(&grid);
                    self.blank_line();
                }
            }
            _ => {}
        }
    }

    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn write(&mut self, text: &str) {
        if let Some(table) = &mut self.table {
            table.cell.push_str(text);
            return;
        }
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            if part.is_empty() {
                continue;
            }
            if self.at_line_start() {
                let prefix = self.prefixes.concat();
                self.out.push_str(&prefix);
            }
            self.out.push_str(part);
        }
    }

    fn newline(&mut self) {
        if !self.at_line_start() {
            self.out.push('\n');
        }
    }

    fn blank_line(&mut self) {
        self.newline();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn finish(self) -> String {
        self.out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(input: &str) -> String {
        render_markdown(input, Theme::plain())
    }

    #[test]
    fn test_paragraphs_are_separated() {
        assert_eq!(plain("First line\nsame para.\n\nSecond."), "First line same para.\n\nSecond.");
    }

    #[test]
    fn test_lists() {
        assert_eq!(plain("- apples\n- pears"), "• apples\n• pears");
        assert_eq!(plain("3. three\n4. four"), "3. three\n4. four");
        assert_eq!(plain("- outer\n  - inner"), "• outer\n  • inner");
    }

    #[test]
    fn test_code_and_quotes() {
        assert_eq!(plain("Use `EPS` here"), "Use `EPS` here");
        assert_eq!(plain("```\nlet x = 1;\n```"), "    let x = 1;");
        assert_eq!(plain("> quoted\n> text"), "│ quoted text");
    }

    #[test]
    fn test_links_show_target() {
        assert_eq!(
            plain("See [the filing](https://sec.gov/x)."),
            "See the filing (https://sec.gov/x)."
        );
        assert_eq!(plain("<https://sec.gov>"), "https://sec.gov");
    }

    #[test]
    fn test_heading_and_emphasis_plain() {
        assert_eq!(plain("## Revenue\n\n**up** 5%"), "Revenue\n\nup 5%");
    }

    #[test]
    fn test_tables_render_as_grid() {
        let out = plain("| ticker | close |\n|---|---|\n| AAPL | 172.6 |");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ticker  close");
        assert_eq!(lines[2], "AAPL    172.6");
    }

    #[test]
    fn test_color_heading_is_bold() {
        let out = render_markdown("# Title", Theme { color: true });
        assert!(out.contains("\x1b[1mTitle"));
    }

    #[test]
    fn test_color_emphasis_and_code_close_their_styles() {
        let out = render_markdown("**up** and *flat* with `EPS`", Theme { color: true });
        assert_eq!(
            out,
            "\x1b[1mup\x1b[0m and \x1b[3mflat\x1b[0m with \x1b[36mEPS\x1b[0m"
        );
    }

    #[test]
    fn test_color_table_cells_stay_unstyled() {
        let out = render_markdown("| h |\n|---|\n| **x** |", Theme { color: true });
        assert_eq!(out.lines().last(), Some("x"));
    }
}
