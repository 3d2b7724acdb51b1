//! The list of spoken commands the listener reacts to.
//!
//! Commands are read once at startup from a newline separated file and never
//! change afterwards. Matching a hypothesis against them is a plain linear
//! scan: the keyword search has already reduced the transcript to one of the
//! listed phrases, so there is nothing to rank.

use std::path::Path;

use log::warn;

use crate::error::Error;
use crate::palette::{self, Colour};

/// Ordered, immutable list of trimmed command phrases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<String>,
}

impl CommandList {
    /// Parses a command file body.
    ///
    /// Lines are split on `'\n'` only and trimmed afterwards, so `\r\n` files
    /// work. Trimming strips spaces and ASCII control characters, not other
    /// Unicode whitespace. Every terminated line is kept, empty ones included, which keeps
    /// indices (and colours) aligned with the file. A trailing line without a
    /// newline is kept as long as it is not empty.
    pub fn parse(text: &str) -> Self {
        let mut commands = Vec::new();
        let mut rest = text;
        while let Some(end) = rest.find('\n') {
            commands.push(trim(&rest[..end]).to_string());
            rest = &rest[end + 1..];
        }
        if !rest.is_empty() {
            commands.push(trim(rest).to_string());
        }

        let list = Self { commands };
        if list.len() > palette::PALETTE.len() {
            warn!(
                "{} commands for {} colours, colours will repeat",
                list.len(),
                palette::PALETTE.len()
            );
        }
        list
    }

    /// Reads and parses a command file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Commands(format!("Reading {}: {e}", path.display())))?;
        Ok(Self::parse(&text))
    }

    /// Index of the first command equal to `hypothesis`.
    ///
    /// Comparison is exact and case-sensitive. An empty hypothesis never
    /// matches, even against an empty line of the file.
    pub fn find(&self, hypothesis: &str) -> Option<usize> {
        if hypothesis.is_empty() {
            return None;
        }
        self.commands.iter().position(|command| command == hypothesis)
    }

    /// Colour the command at `index` is displayed in.
    pub fn colour(&self, index: usize) -> Colour {
        palette::colour_for(index)
    }

    /// Non-empty phrases, in file order.
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.commands
            .iter()
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Strips every leading and trailing char up to and including `' '`.
fn trim(line: &str) -> &str {
    line.trim_matches(|c: char| c <= ' ')
}
