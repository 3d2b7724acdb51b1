//! Display colours.

use crossterm::style::Color;

/// The colours the two screen lines can be drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    Black,
    Red,
    Blue,
    Green,
    Cyan,
    Magenta,
}

/// Colours assigned to commands, cycled by list index.
pub const PALETTE: [Colour; 5] = [
    Colour::Blue,
    Colour::Green,
    Colour::Cyan,
    Colour::Magenta,
    Colour::Black,
];

/// Colour of the command at `index`.
pub fn colour_for(index: usize) -> Colour {
    PALETTE[index % PALETTE.len()]
}

impl From<Colour> for Color {
    fn from(value: Colour) -> Self {
        match value {
            // Black is invisible on most dark terminals.
            Colour::Black => Color::Reset,
            Colour::Red => Color::Red,
            Colour::Blue => Color::Blue,
            Colour::Green => Color::Green,
            Colour::Cyan => Color::Cyan,
            Colour::Magenta => Color::Magenta,
        }
    }
}
