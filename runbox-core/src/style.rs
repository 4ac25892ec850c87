//! ANSI colouring for lines shown on the terminal. Scrollback keeps the plain text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Info,
    Success,
    Warning,
    Error,
    Heading,
    Banner,
}

const RESET: &str = "\x1b[0m";

impl Tone {
    fn sgr(&self) -> Option<&'static str> {
        match self {
            Tone::Plain => None,
            Tone::Info => Some("\x1b[36m"),
            Tone::Success => Some("\x1b[32m"),
            Tone::Warning => Some("\x1b[33m"),
            Tone::Error => Some("\x1b[31m"),
            Tone::Heading => Some("\x1b[1;36m"),
            Tone::Banner => Some("\x1b[1;34m"),
        }
    }
}

pub fn paint(tone: Tone, text: &str) -> String {
    match tone.sgr() {
        Some(sgr) => format!("{}{}{}", sgr, text, RESET),
        None => text.to_string(),
    }
}

pub fn prompt(text: &str) -> String {
    format!("\x1b[1;32m{}{}", text, RESET)
}
