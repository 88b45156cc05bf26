use console::Style;

/// Whether output carries ANSI styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub color: bool,
}

impl Theme {
    #[cfg(test)]
    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Follow console's terminal detection, and never color when `NO_COLOR` is set.
    pub fn detect() -> Self {
        Self {
            color: console::colors_enabled() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        style.force_styling(self.color).apply_to(text).to_string()
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint(Style::new().bold(), text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint(Style::new().dim(), text)
    }

    pub fn red(&self, text: &str) -> String {
        self.paint(Style::new().red(), text)
    }

    pub fn green(&self, text: &str) -> String {
        self.paint(Style::new().green(), text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint(Style::new().yellow(), text)
    }

    pub fn cyan(&self, text: &str) -> String {
        self.paint(Style::new().cyan(), text)
    }

    /// Inline Markdown text under the given strong/emphasis nesting.
    pub fn emphasis(&self, text: &str, bold: bool, italic: bool) -> String {
        let mut style = Style::new();
        if bold {
            style = style.bold();
        }
        if italic {
            style = style.italic();
        }
        self.paint(style, text)
    }
}
