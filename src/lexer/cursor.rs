// Modelled on `rustc_lexer`'s cursor.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

pub(crate) const EOF_CHAR: char = '\0';

/// Peekable iterator over the chars of a single source line.
#[derive(Clone)]
pub struct Cursor<'a> {
    /// Length of the input, used to work out absolute positions
    input_len: usize,
    /// Remaining bytes when the current token started
    len_remaining: usize,
    chars: Chars<'a>,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            input_len: input.len(),
            len_remaining: input.len(),
            chars: input.chars(),
        }
    }

    /// Peek the next char without consuming it, or [`EOF_CHAR`] at the end.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    pub fn second(&self) -> char {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().unwrap_or(EOF_CHAR)
    }

    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    /// Eat chars while `predicate` holds.
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while predicate(self.first()) && !self.is_eof() {
            self.bump();
        }
    }

    /// Bytes consumed since the last [`Cursor::reset_pos`].
    pub fn pos_in_token(&self) -> usize {
        self.len_remaining - self.chars.as_str().len()
    }

    /// Byte offset of the start of the current token.
    pub fn token_start(&self) -> usize {
        self.input_len - self.len_remaining
    }

    pub fn reset_pos(&mut self) {
        self.len_remaining = self.chars.as_str().len();
    }
}
