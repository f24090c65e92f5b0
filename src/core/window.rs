//! Output window tracking
//!
//! Some transports can only capture everything they currently show (a tmux
//! pane, for instance) instead of only the bytes that arrived since the last
//! read. The tracker therefore keeps every capture in one growing buffer and
//! anchors on the echoed command text: the window is everything from the
//! right-most occurrence of the command to the end of the buffer.
//!
//! The anchor is approximate. If unrelated output happens to contain the
//! command text, the window starts there instead.

/// Accumulating response buffer with a command anchor
#[derive(Debug, Clone, Default)]
pub struct OutputWindow {
    buffer: String,
    last_command: Option<String>,
}

impl OutputWindow {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the text of the command that was just issued
    pub fn record_command(&mut self, command: &str) {
        self.last_command = Some(command.to_string());
    }

    /// Append newly captured text; prior content is never discarded
    pub fn append_capture(&mut self, raw: &str) {
        self.buffer.push_str(raw);
    }

    /// Text from the last echo of the most recent command to the end.
    ///
    /// Falls back to the whole buffer when no command was recorded or its text
    /// does not occur.
    pub fn window_since_last_command(&self) -> &str {
        let start = self
            .last_command
            .as_deref()
            .and_then(|cmd| self.buffer.rfind(cmd))
            .unwrap_or(0);
        &self.buffer[start..]
    }

    /// Whole accumulated buffer
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Buffer length in bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Nothing captured yet?
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
