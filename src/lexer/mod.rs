use std::borrow::Cow;

use crate::lexer::cursor::Cursor;
use crate::span::{Idx, Span};

pub mod cursor;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LiteralKind {
    /// `$FF`
    Hex,
    /// `255`
    Dec,
    /// `%11111111`
    Bin,
    /// `'A'`
    Char { terminated: bool },
    /// `"text"`
    Str { terminated: bool },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    Ident,
    Lit(LiteralKind),
    /// `.ORG`, `.BYTE`, ...
    Direc,
    Hash,
    Comma,
    Colon,
    Equals,
    OpenParen,
    CloseParen,
    /// Low byte operator
    Lt,
    /// High byte operator
    Gt,
    Plus,
    Minus,
    Comment,
    Whitespace,
    Unknown,
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Ident => "identifier",
            TokenKind::Lit(LiteralKind::Str { .. }) => "string literal",
            TokenKind::Lit(LiteralKind::Char { .. }) => "character literal",
            TokenKind::Lit(_) => "numeric literal",
            TokenKind::Direc => "directive",
            TokenKind::Hash => "`#`",
            TokenKind::Comma => "`,`",
            TokenKind::Colon => "`:`",
            TokenKind::Equals => "`=`",
            TokenKind::OpenParen => "`(`",
            TokenKind::CloseParen => "`)`",
            TokenKind::Lt => "`<`",
            TokenKind::Gt => "`>`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Comment => "comment",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Unknown => "unknown character",
            TokenKind::Eof => "end of line",
        };
        f.write_str(name)
    }
}

/// Every token in `input`, trivia included. Spans are relative to the start of `input`.
pub fn tokenize(input: &str) -> impl Iterator<Item = Token> + '_ {
    let mut cursor = Cursor::new(input);
    std::iter::from_fn(move || {
        let token = cursor.advance_token();
        if token.kind != TokenKind::Eof {
            Some(token)
        } else {
            None
        }
    })
}

pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

pub(crate) fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_id(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> Token {
        let first_char = match self.bump() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, Span::new(Idx(self.token_start()), 0)),
        };
        let kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                TokenKind::Comment
            }
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                TokenKind::Whitespace
            }
            '$' => {
                self.take_while(|c| c.is_ascii_hexdigit());
                TokenKind::Lit(LiteralKind::Hex)
            }
            '%' => {
                self.take_while(|c| c == '0' || c == '1');
                TokenKind::Lit(LiteralKind::Bin)
            }
            c if c.is_ascii_digit() => {
                self.take_while(|c| c.is_ascii_digit());
                TokenKind::Lit(LiteralKind::Dec)
            }
            c if is_id_start(c) => {
                self.take_while(is_id);
                TokenKind::Ident
            }
            '.' => {
                self.take_while(is_id);
                TokenKind::Direc
            }
            '"' => {
                let terminated = self.quoted('"');
                TokenKind::Lit(LiteralKind::Str { terminated })
            }
            '\'' => {
                let terminated = self.quoted('\'');
                TokenKind::Lit(LiteralKind::Char { terminated })
            }
            '#' => TokenKind::Hash,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '=' => TokenKind::Equals,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            _ => TokenKind::Unknown,
        };
        let token = Token::new(kind, Span::new(Idx(self.token_start()), self.pos_in_token()));
        self.reset_pos();
        token
    }

    /// Eat the rest of a quoted literal, returning whether the closing quote was found.
    fn quoted(&mut self, quote: char) -> bool {
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    // Skip whatever is escaped, including a quote
                    self.bump();
                }
                c if c == quote => return true,
                '\n' => return false,
                _ => {}
            }
        }
        false
    }
}

/// Resolve escape sequences in the body of a string or character literal. Unknown escapes are
/// kept as written.
pub fn unescape(s: &str) -> Cow<str> {
    if !s.contains('\\') {
        return Cow::Borrowed(s);
    }
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some(c) => {
                result.push('\\');
                result.push(c);
            }
            // Trailing backslash
            None => result.push('\\'),
        }
    }
    Cow::Owned(result)
}
