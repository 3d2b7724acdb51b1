//! The two-line screen the controller draws on.
//!
//! The prompt line tells the user what the listener is doing, the output line
//! shows the last recognized command (or the last error). Rendering goes
//! through the [`View`] trait so the controller does not know about terminals.

use std::io::{self, Write, stdout};

use crossterm::style::{Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, queue};
use log::error;
use notify_rust::Notification;

use crate::palette::Colour;

/// One coloured line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub colour: Colour,
}

impl Line {
    pub fn new(text: impl Into<String>, colour: Colour) -> Self {
        Self {
            text: text.into(),
            colour,
        }
    }
}

impl Default for Line {
    fn default() -> Self {
        Self::new("", Colour::Black)
    }
}

/// Everything that is on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Screen {
    pub prompt: Line,
    pub output: Line,
}

/// A surface the screen is drawn onto.
pub trait View {
    /// Redraws the whole screen.
    fn render(&mut self, screen: &Screen) -> io::Result<()>;

    /// Short-lived message announcing a recognized command.
    fn announce(&mut self, _text: &str) {}
}

/// Draws the screen in place at the bottom of the terminal.
pub struct TerminalView {
    drawn: bool,
    notify: bool,
}

impl TerminalView {
    pub fn new(notify: bool) -> Self {
        Self {
            drawn: false,
            notify,
        }
    }
}

impl View for TerminalView {
    fn render(&mut self, screen: &Screen) -> io::Result<()> {
        let mut out = stdout();
        if self.drawn {
            queue!(out, cursor::MoveUp(2))?;
        }
        queue!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::FromCursorDown)
        )?;
        for line in [&screen.prompt, &screen.output] {
            queue!(
                out,
                SetForegroundColor(line.colour.into()),
                Print(&line.text),
                ResetColor,
                Print("\r\n")
            )?;
        }
        out.flush()?;
        self.drawn = true;
        Ok(())
    }

    fn announce(&mut self, text: &str) {
        if !self.notify {
            return;
        }
        if let Err(err) = Notification::new()
            .summary(text)
            .icon("audio-input-microphone")
            .show()
        {
            error!("Cannot show notification: {err}, content was: {text}");
        }
    }
}
