//! Keystroke-level editing of the command line.

use crate::history::{CommandHistory, Recall};
use crate::style;
use crate::term::{TerminalSurface, ERASE_CHAR, ERASE_LINE, NEWLINE};

/// One decoded keystroke from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Char(char),
    Backspace,
    Enter,
    Interrupt,
    HistoryPrev,
    HistoryNext,
    /// Anything else the terminal reported (function keys, mouse, ...).
    Other,
}

/// What the session has to do after an event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    None,
    Submit(String),
    Interrupt,
}

#[derive(Debug, Clone)]
pub struct LineEditor {
    buffer: String,
    prompt: String,
}

impl LineEditor {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            buffer: String::new(),
            prompt: prompt.into(),
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn handle(
        &mut self,
        event: InputEvent,
        history: &mut CommandHistory,
        surface: &dyn TerminalSurface,
    ) -> EditorAction {
        match event {
            InputEvent::Char(c) => {
                if !c.is_control() {
                    self.buffer.push(c);
                    let mut utf8 = [0u8; 4];
                    surface.write(c.encode_utf8(&mut utf8));
                }
                EditorAction::None
            }
            InputEvent::Backspace => {
                if self.buffer.pop().is_some() {
                    surface.write(ERASE_CHAR);
                }
                EditorAction::None
            }
            InputEvent::Enter => {
                surface.write(NEWLINE);
                history.reset_browse();
                EditorAction::Submit(std::mem::take(&mut self.buffer))
            }
            InputEvent::Interrupt => {
                self.buffer.clear();
                history.reset_browse();
                EditorAction::Interrupt
            }
            InputEvent::HistoryPrev => {
                if let Some(entry) = history.previous() {
                    let entry = entry.to_string();
                    self.replace_line(entry, surface);
                }
                EditorAction::None
            }
            InputEvent::HistoryNext => {
                match history.next() {
                    Recall::Entry(entry) => {
                        let entry = entry.to_string();
                        self.replace_line(entry, surface);
                    }
                    Recall::Blank => self.replace_line(String::new(), surface),
                    Recall::Unchanged => {}
                }
                EditorAction::None
            }
            InputEvent::Other => EditorAction::None,
        }
    }

    fn replace_line(&mut self, text: String, surface: &dyn TerminalSurface) {
        surface.write(ERASE_LINE);
        surface.write(&style::prompt(&self.prompt));
        surface.write(&text);
        self.buffer = text;
    }
}
