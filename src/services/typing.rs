/// Reveals a target text one character per tick while a message streams.
///
/// The animator holds no timer itself; the chat loop owns the ticker and calls
/// [`Typewriter::tick`] on each interval while [`Typewriter::is_behind`].
#[derive(Debug, Clone)]
pub struct Typewriter {
    enabled: bool,
    target: String,
    displayed: String,
    streaming: bool,
}

impl Typewriter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            target: String::new(),
            displayed: String::new(),
            streaming: false,
        }
    }

    /// Forget the previous message and start over.
    pub fn reset(&mut self) {
        self.target.clear();
        self.displayed.clear();
        self.streaming = false;
    }

    /// Feed the latest state of the message. Once streaming ends the display
    /// snaps to the full target.
    pub fn update(&mut self, target: &str, streaming: bool) {
        if self.target != target {
            self.target = target.to_string();
        }
        self.streaming = streaming;
        if !streaming || !self.enabled {
            self.snap();
        }
    }

    pub fn snap(&mut self) {
        if self.displayed != self.target {
            self.displayed = self.target.clone();
        }
    }

    /// Whether a tick would change the display.
    pub fn is_behind(&self) -> bool {
        self.streaming && self.displayed != self.target
    }

    /// Advance by one character. Returns `true` if the display changed.
    pub fn tick(&mut self) -> bool {
        if !self.is_behind() {
            return false;
        }
        let next_len = self.displayed.chars().count() + 1;
        self.displayed = self.target.chars().take(next_len).collect();
        true
    }

    pub fn displayed(&self) -> &str {
        &self.displayed
    }
}
