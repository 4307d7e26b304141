//! Segmented Code Input
//!
//! Manages a fixed-length row of single-character cells for one-time codes.
//! Focus changes are not performed here; every edit returns a [`Focus`]
//! signal that the host translates into its own focus handling.

use serde::{Deserialize, Serialize};

/// Default number of cells in a code.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Characters a cell may hold.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CharClass {
    /// A single decimal digit
    #[default]
    Digit,
    /// An ASCII letter or digit
    Alphanumeric,
}

impl CharClass {
    /// Returns true if `c` may occupy a cell.
    pub fn accepts(self, c: char) -> bool {
        match self {
            Self::Digit => c.is_ascii_digit(),
            Self::Alphanumeric => c.is_ascii_alphanumeric(),
        }
    }

    /// Returns true if `text` is non-empty and every character is accepted.
    pub fn accepts_all(self, text: &str) -> bool {
        !text.is_empty() && text.chars().all(|c| self.accepts(c))
    }
}

/// Where the host should move input focus after an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Keep focus where it is
    Stay,
    /// Move focus to the cell at this index
    Cell(usize),
}

/// Result of an edit that may be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// Input was refused; no cell changed
    Rejected,
    /// Input was applied
    Accepted(Focus),
}

impl Edit {
    /// True if the edit was applied.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Where focus should move, if the edit was applied.
    pub fn focus(&self) -> Option<Focus> {
        match self {
            Self::Accepted(focus) => Some(*focus),
            Self::Rejected => None,
        }
    }
}

/// Ordered, fixed-length sequence of cells, each empty or holding one character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBuffer {
    cells: Vec<Option<char>>,
}

impl CodeBuffer {
    /// Creates a buffer of `length` empty cells.
    pub fn new(length: usize) -> Self {
        Self {
            cells: vec![None; length],
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns all cells in order.
    pub fn cells(&self) -> &[Option<char>] {
        &self.cells
    }

    /// Character in cell `index`, if filled.
    pub fn get(&self, index: usize) -> Option<char> {
        self.cells.get(index).copied().flatten()
    }

    /// Concatenation of all filled cells.
    pub fn value(&self) -> String {
        self.cells.iter().flatten().collect()
    }

    /// True iff no cell is empty.
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    fn first_empty(&self) -> Option<usize> {
        self.cells.iter().position(Option::is_none)
    }

    fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = None);
    }
}

/// Editing behavior for a [`CodeBuffer`]: per-cell entry with focus
/// advancement, backspace retreat, and whole-code paste.
///
/// # Example
///
/// ```
/// use otpflow::input::{Edit, Focus, SegmentedCodeInput};
///
/// let mut input = SegmentedCodeInput::new(6);
/// assert_eq!(input.set_cell(0, "4"), Edit::Accepted(Focus::Cell(1)));
/// assert_eq!(input.paste("123456"), Edit::Accepted(Focus::Cell(5)));
/// assert!(input.is_complete());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedCodeInput {
    buffer: CodeBuffer,
    class: CharClass,
}

impl Default for SegmentedCodeInput {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

impl SegmentedCodeInput {
    /// Creates a digit-only input with `length` cells.
    pub fn new(length: usize) -> Self {
        Self::with_class(length, CharClass::Digit)
    }

    /// Creates an empty input accepting characters of `class`.
    pub fn with_class(length: usize, class: CharClass) -> Self {
        Self {
            buffer: CodeBuffer::new(length),
            class,
        }
    }

    /// Returns the underlying cells.
    pub fn buffer(&self) -> &CodeBuffer {
        &self.buffer
    }

    /// Character class accepted by each cell.
    pub fn class(&self) -> CharClass {
        self.class
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True for a zero-length input.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Concatenation of the filled cells.
    pub fn value(&self) -> String {
        self.buffer.value()
    }

    /// True iff every cell is filled.
    pub fn is_complete(&self) -> bool {
        self.buffer.is_complete()
    }

    /// Sets one cell from raw keyboard input.
    ///
    /// An empty `raw` clears the cell. Anything longer than one character,
    /// or a character outside the class, is rejected.
    pub fn set_cell(&mut self, index: usize, raw: &str) -> Edit {
        if index >= self.buffer.len() {
            return Edit::Rejected;
        }

        let mut chars = raw.chars();
        let value = match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(c), None) if self.class.accepts(c) => Some(c),
            _ => return Edit::Rejected,
        };

        self.buffer.cells[index] = value;

        if value.is_some() && index + 1 < self.buffer.len() {
            Edit::Accepted(Focus::Cell(index + 1))
        } else {
            Edit::Accepted(Focus::Stay)
        }
    }

    /// Handles backspace on a cell.
    ///
    /// On an empty cell past the first, focus retreats to the previous cell
    /// and nothing is cleared. Otherwise the cell is cleared in place.
    pub fn clear_cell_on_backspace(&mut self, index: usize) -> Focus {
        let Some(cell) = self.buffer.cells.get_mut(index) else {
            return Focus::Stay;
        };

        if cell.is_none() && index > 0 {
            return Focus::Cell(index - 1);
        }

        *cell = None;
        Focus::Stay
    }

    /// Distributes pasted text over the cells from index 0.
    ///
    /// The text is truncated to the code length and rejected as a whole if
    /// any character is outside the class. A short paste leaves the trailing
    /// cells as they were. Focus goes to the first empty cell, or the last
    /// cell when all are filled.
    pub fn paste(&mut self, raw: &str) -> Edit {
        let pasted: String = raw.chars().take(self.buffer.len()).collect();
        if !self.class.accepts_all(&pasted) {
            return Edit::Rejected;
        }

        for (cell, c) in self.buffer.cells.iter_mut().zip(pasted.chars()) {
            *cell = Some(c);
        }

        let focus = self
            .buffer
            .first_empty()
            .unwrap_or_else(|| self.buffer.len().saturating_sub(1));
        Edit::Accepted(Focus::Cell(focus))
    }

    /// Clears all cells and sends focus back to the first.
    pub fn reset(&mut self) -> Focus {
        self.buffer.clear();
        Focus::Cell(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(code: &str) -> SegmentedCodeInput {
        let mut input = SegmentedCodeInput::new(6);
        input.paste(code);
        input
    }

    #[test]
    fn test_set_cell_advances_focus() {
        let mut input = SegmentedCodeInput::new(6);
        assert_eq!(input.set_cell(0, "1"), Edit::Accepted(Focus::Cell(1)));
        assert_eq!(input.buffer().get(0), Some('1'));
    }

    #[test]
    fn test_set_last_cell_keeps_focus() {
        let mut input = SegmentedCodeInput::new(6);
        assert_eq!(input.set_cell(5, "9"), Edit::Accepted(Focus::Stay));
    }

    #[test]
    fn test_set_cell_rejects_non_digit() {
        let mut input = SegmentedCodeInput::new(6);
        input.set_cell(2, "7");

        assert_eq!(input.set_cell(2, "a"), Edit::Rejected);
        assert_eq!(input.set_cell(2, "12"), Edit::Rejected);
        assert_eq!(input.buffer().get(2), Some('7'));
    }

    #[test]
    fn test_set_cell_empty_clears_without_advancing() {
        let mut input = SegmentedCodeInput::new(6);
        input.set_cell(1, "3");
        assert_eq!(input.set_cell(1, ""), Edit::Accepted(Focus::Stay));
        assert_eq!(input.buffer().get(1), None);
    }

    #[test]
    fn test_set_cell_out_of_range() {
        let mut input = SegmentedCodeInput::new(6);
        assert_eq!(input.set_cell(6, "1"), Edit::Rejected);
    }

    #[test]
    fn test_alphanumeric_class() {
        let mut input = SegmentedCodeInput::with_class(4, CharClass::Alphanumeric);
        assert!(input.set_cell(0, "x").is_accepted());
        assert!(!input.set_cell(1, "-").is_accepted());
    }

    #[test]
    fn test_backspace_on_empty_cell_moves_back() {
        let mut input = SegmentedCodeInput::new(6);
        input.set_cell(2, "5");

        assert_eq!(input.clear_cell_on_backspace(3), Focus::Cell(2));
        assert_eq!(input.buffer().get(2), Some('5'));
    }

    #[test]
    fn test_backspace_on_filled_cell_clears_in_place() {
        let mut input = SegmentedCodeInput::new(6);
        input.set_cell(3, "5");

        assert_eq!(input.clear_cell_on_backspace(3), Focus::Stay);
        assert_eq!(input.buffer().get(3), None);
    }

    #[test]
    fn test_backspace_on_first_empty_cell_stays() {
        let mut input = SegmentedCodeInput::new(6);
        assert_eq!(input.clear_cell_on_backspace(0), Focus::Stay);
    }

    #[test]
    fn test_paste_full_code() {
        let input = filled("123456");
        assert!(input.is_complete());
        assert_eq!(input.value(), "123456");
    }

    #[test]
    fn test_paste_focuses_last_cell_when_full() {
        let mut input = SegmentedCodeInput::new(6);
        assert_eq!(input.paste("123456"), Edit::Accepted(Focus::Cell(5)));
    }

    #[test]
    fn test_paste_with_invalid_character_is_rejected() {
        let mut input = filled("999999");
        assert_eq!(input.paste("12a456"), Edit::Rejected);
        assert_eq!(input.value(), "999999");
    }

    #[test]
    fn test_short_paste_leaves_trailing_cells() {
        let mut input = SegmentedCodeInput::new(6);
        input.set_cell(4, "8");

        assert_eq!(input.paste("123"), Edit::Accepted(Focus::Cell(3)));
        assert_eq!(input.buffer().cells()[..3], [Some('1'), Some('2'), Some('3')]);
        assert_eq!(input.buffer().get(3), None);
        assert_eq!(input.buffer().get(4), Some('8'));
        assert_eq!(input.buffer().get(5), None);
        assert!(!input.is_complete());
    }

    #[test]
    fn test_long_paste_is_truncated() {
        let mut input = SegmentedCodeInput::new(6);
        assert!(input.paste("12345678").is_accepted());
        assert_eq!(input.value(), "123456");
    }

    #[test]
    fn test_paste_checks_only_truncated_text() {
        let mut input = SegmentedCodeInput::new(6);
        assert!(input.paste("123456-trailing").is_accepted());
    }

    #[test]
    fn test_empty_paste_is_rejected() {
        let mut input = SegmentedCodeInput::new(6);
        assert_eq!(input.paste(""), Edit::Rejected);
    }

    #[test]
    fn test_reset_clears_all_cells() {
        let mut input = filled("123456");
        assert_eq!(input.reset(), Focus::Cell(0));
        assert_eq!(input.value(), "");
        assert!(input.buffer().cells().iter().all(Option::is_none));
    }
}
