//! Submitted command lines and the up/down browse cursor over them.

/// Append-only list of submitted commands.
///
/// The browse cursor counts back from the newest entry: `Some(0)` is the most
/// recent command, `None` means the user is not browsing.
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    entries: Vec<String>,
    browse: Option<usize>,
}

/// What a step towards the newer end of history produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recall<'a> {
    Entry(&'a str),
    /// Stepped past the newest entry: back to an empty line.
    Blank,
    /// Not browsing, nothing to do.
    Unchanged,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: impl Into<String>) {
        self.entries.push(command.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn browse_index(&self) -> Option<usize> {
        self.browse
    }

    pub fn reset_browse(&mut self) {
        self.browse = None;
    }

    fn at(&self, back: usize) -> &str {
        &self.entries[self.entries.len() - 1 - back]
    }

    /// Step to an older entry. `None` when already at the oldest one
    /// (or history is empty); the cursor does not move then.
    pub fn previous(&mut self) -> Option<&str> {
        let next = self.browse.map_or(0, |i| i + 1);
        if next >= self.entries.len() {
            return None;
        }
        self.browse = Some(next);
        Some(self.at(next))
    }

    /// Step to a newer entry.
    pub fn next(&mut self) -> Recall<'_> {
        match self.browse {
            None => Recall::Unchanged,
            Some(0) => {
                self.browse = None;
                Recall::Blank
            }
            Some(i) => {
                self.browse = Some(i - 1);
                Recall::Entry(self.at(i - 1))
            }
        }
    }
}
