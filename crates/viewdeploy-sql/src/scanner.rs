//! Lexical scanning over free-form SQL text
//!
//! The scanner walks the text one byte at a time through a small state
//! machine so that parentheses and keywords hidden inside quoted literals,
//! quoted identifiers and comments are never mistaken for code.
//!
//! All delimiters are ASCII, so byte offsets returned here always fall on
//! `char` boundaries of the scanned `&str`.

use std::ops::Range;

use crate::error::{Malformed, Result};

/// Lexical mode of the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plain SQL code
    Normal,

    /// Inside a segment opened by the given quote byte (`` ` ``, `'` or `"`)
    Quoted(u8),

    /// Inside `-- ...` up to the end of the line
    LineComment,

    /// Inside `/* ... */`
    BlockComment,
}

/// Transition table: given the current mode, the current byte and the byte
/// after it, returns the next mode and how many bytes were consumed.
fn transition(mode: Mode, byte: u8, next: Option<u8>) -> (Mode, usize) {
    match (mode, byte, next) {
        (Mode::Normal, b'-', Some(b'-')) => (Mode::LineComment, 2),
        (Mode::Normal, b'/', Some(b'*')) => (Mode::BlockComment, 2),
        (Mode::Normal, b'`' | b'\'' | b'"', _) => (Mode::Quoted(byte), 1),
        (Mode::Normal, _, _) => (Mode::Normal, 1),

        // Backslash escapes apply to string literals, not backtick identifiers
        (Mode::Quoted(quote), b'\\', Some(_)) if quote != b'`' => (mode, 2),
        (Mode::Quoted(quote), _, _) if byte == quote => (Mode::Normal, 1),
        (Mode::Quoted(_), _, _) => (mode, 1),

        (Mode::LineComment, b'\n', _) => (Mode::Normal, 1),
        (Mode::LineComment, _, _) => (mode, 1),

        (Mode::BlockComment, b'*', Some(b'/')) => (Mode::Normal, 2),
        (Mode::BlockComment, _, _) => (mode, 1),
    }
}

/// Iterator over the code bytes of a SQL text
///
/// Yields `(offset, byte)` for every byte that is plain code. Quote
/// delimiters, quoted content and comments are consumed silently.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    mode: Mode,
}

impl<'a> Scanner<'a> {
    /// Scan `text` from its beginning
    pub fn new(text: &'a str) -> Self {
        Self::starting_at(text, 0)
    }

    /// Scan `text` from `offset`, assuming plain code at that point
    pub fn starting_at(text: &'a str, offset: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: offset,
            mode: Mode::Normal,
        }
    }

    /// Current lexical mode
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl Iterator for Scanner<'_> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.bytes.len() {
            let at = self.pos;
            let byte = self.bytes[at];
            let (mode, width) = transition(self.mode, byte, self.bytes.get(at + 1).copied());
            let is_code = self.mode == Mode::Normal && mode == Mode::Normal;

            self.mode = mode;
            self.pos += width;

            if is_code {
                return Some((at, byte));
            }
        }
        None
    }
}

/// Find the close parenthesis matching an already-consumed open parenthesis
///
/// `start` is the offset immediately after the `(`; the running depth starts
/// at 1. Returns the offset of the matching `)`.
pub fn find_matching_paren(text: &str, start: usize) -> Result<usize> {
    let mut depth = 1usize;

    for (offset, byte) in Scanner::starting_at(text, start) {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(offset);
                }
            }
            _ => {}
        }
    }

    Err(Malformed::UnclosedParen { offset: start.saturating_sub(1) }.into())
}

/// Identifier bytes: ASCII word characters plus any non-ASCII byte
pub(crate) fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte >= 0x80
}

/// Find the first code occurrence of `keyword` as a whole word (ASCII case-insensitive)
pub fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let word = keyword.as_bytes();

    Scanner::new(text)
        .map(|(offset, _)| offset)
        .find(|&offset| {
            let end = offset + word.len();
            end <= bytes.len()
                && bytes[offset..end].eq_ignore_ascii_case(word)
                && (offset == 0 || !is_ident_byte(bytes[offset - 1]))
                && bytes.get(end).map_or(true, |&b| !is_ident_byte(b))
        })
}

/// Per-byte flags telling whether each offset of `text` is plain code
pub fn code_mask(text: &str) -> Vec<bool> {
    let mut mask = vec![false; text.len()];
    for (offset, _) in Scanner::new(text) {
        mask[offset] = true;
    }
    mask
}

/// A bracket-qualified reference such as `[warehouse].orders`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedRef<'a> {
    /// Span of the whole reference, from `[` to the end of the name
    pub span: Range<usize>,

    /// Qualifier text between the brackets
    pub qualifier: &'a str,

    /// Referenced name
    pub name: &'a str,
}

/// Find every `[qualifier].name` reference that starts in plain code
///
/// The qualifier may not contain brackets; the name is the full identifier
/// following the dot.
pub fn qualified_references(text: &str) -> Vec<QualifiedRef<'_>> {
    let bytes = text.as_bytes();
    let mut refs = Vec::new();

    for (open, byte) in Scanner::new(text) {
        if byte != b'[' {
            continue;
        }

        let Some(close) = bytes[open + 1..]
            .iter()
            .position(|&b| b == b'[' || b == b']')
            .map(|n| open + 1 + n)
        else {
            break;
        };

        if bytes[close] != b']' || bytes.get(close + 1) != Some(&b'.') {
            continue;
        }

        let name_start = close + 2;
        let name_end = bytes[name_start..]
            .iter()
            .position(|&b| !is_ident_byte(b))
            .map_or(bytes.len(), |n| name_start + n);

        if name_end > name_start {
            refs.push(QualifiedRef {
                span: open..name_end,
                qualifier: &text[open + 1..close],
                name: &text[name_start..name_end],
            });
        }
    }

    refs
}
