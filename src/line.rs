//! Parsing of a single source line into a label, a statement and typed operands.

use std::fmt;
use std::str::FromStr;

use crate::lexer::{tokenize, unescape, LiteralKind, Token, TokenKind};
use crate::span::{Idx, Span};

/// Upper-cased name with the span it was written at.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    /// `<`
    Low,
    /// `>`
    High,
    /// `-`
    Neg,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp {
    Add,
    Sub,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Expr {
    Number(i64),
    Symbol(Ident),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate with `lookup` resolving symbols. Fails with the first symbol it could not
    /// resolve.
    pub fn eval<F>(&self, lookup: &mut F) -> Result<i64, &Ident>
    where
        F: FnMut(&Ident) -> Option<i64>,
    {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Symbol(ident) => lookup(ident).ok_or(ident),
            Expr::Unary(op, inner) => {
                let val = inner.eval(lookup)?;
                Ok(match op {
                    UnaryOp::Low => val & 0xFF,
                    UnaryOp::High => (val >> 8) & 0xFF,
                    UnaryOp::Neg => val.wrapping_neg(),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval(lookup)?;
                let rhs = rhs.eval(lookup)?;
                Ok(match op {
                    BinOp::Add => lhs.wrapping_add(rhs),
                    BinOp::Sub => lhs.wrapping_sub(rhs),
                })
            }
        }
    }

    /// Every symbol referenced, in source order.
    pub fn symbols(&self) -> Vec<&Ident> {
        match self {
            Expr::Number(_) => Vec::new(),
            Expr::Symbol(ident) => vec![ident],
            Expr::Unary(_, inner) => inner.symbols(),
            Expr::Binary(_, lhs, rhs) => {
                let mut syms = lhs.symbols();
                syms.extend(rhs.symbols());
                syms
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IndexRegister {
    X,
    Y,
}

impl fmt::Display for IndexRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexRegister::X => f.write_str("X"),
            IndexRegister::Y => f.write_str("Y"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum OperandKind {
    /// `#expr`
    Immediate(Expr),
    /// `expr`
    Value(Expr),
    /// `(expr)`
    Indirect(Expr),
    /// `X` or `Y` following a comma
    Register(IndexRegister),
    /// `"text"`, escapes resolved
    Str(String),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Operand {
    pub kind: OperandKind,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Directive {
    Org,
    Byte,
    Word,
    Asciiz,
}

impl FromStr for Directive {
    type Err = ();

    /// Expects the leading `.` and an upper-cased name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ".ORG" => Ok(Directive::Org),
            ".BYTE" => Ok(Directive::Byte),
            ".WORD" => Ok(Directive::Word),
            ".ASCIIZ" => Ok(Directive::Asciiz),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Directive::Org => ".ORG",
            Directive::Byte => ".BYTE",
            Directive::Word => ".WORD",
            Directive::Asciiz => ".ASCIIZ",
        };
        f.write_str(name)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Statement {
    /// `NAME = expr`
    Constant { name: Ident, value: Expr },
    /// `.NAME operands`, name kept with its dot
    Directive { name: Ident, operands: Vec<Operand> },
    Instruction { mnemonic: Ident, operands: Vec<Operand> },
}

/// One parsed source line. Blank and comment-only lines have neither field set.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Line {
    pub label: Option<Ident>,
    pub statement: Option<Statement>,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.statement.is_none()
    }
}

/// Why a line could not be parsed. The span is relative to the line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LineError {
    pub reason: String,
    pub span: Span,
}

impl LineError {
    fn new(reason: impl Into<String>, span: Span) -> Self {
        LineError {
            reason: reason.into(),
            span,
        }
    }
}

/// Parse one line of assembly. Spans in the result are relative to the start of `raw`.
pub fn parse_line(raw: &str) -> Result<Line, LineError> {
    let toks: Vec<Token> = tokenize(raw)
        .filter(|tok| !matches!(tok.kind, TokenKind::Whitespace | TokenKind::Comment))
        .collect();
    LineParser {
        src: raw,
        toks,
        pos: 0,
    }
    .parse()
}

struct LineParser<'a> {
    src: &'a str,
    toks: Vec<Token>,
    pos: usize,
}

impl LineParser<'_> {
    fn parse(mut self) -> Result<Line, LineError> {
        self.check_tokens()?;

        let label = match (self.peek_kind(0), self.peek_kind(1)) {
            (TokenKind::Ident, TokenKind::Colon) => {
                let label = self.ident();
                self.pos += 1;
                Some(label)
            }
            _ => None,
        };

        let Some(tok) = self.peek() else {
            return Ok(Line {
                label,
                statement: None,
            });
        };

        let statement = match tok.kind {
            TokenKind::Ident if self.peek_kind(1) == TokenKind::Equals => {
                if let Some(label) = &label {
                    return Err(LineError::new(
                        "a constant definition cannot be labelled",
                        label.span,
                    ));
                }
                let name = self.ident();
                self.pos += 1;
                let value = self.expr()?;
                Statement::Constant { name, value }
            }
            TokenKind::Ident => {
                let mnemonic = self.ident();
                let operands = self.operands()?;
                Statement::Instruction { mnemonic, operands }
            }
            TokenKind::Direc => {
                let name = self.ident();
                let operands = self.operands()?;
                Statement::Directive { name, operands }
            }
            other => {
                return Err(LineError::new(
                    format!("expected an instruction, directive or constant, found {other}"),
                    tok.span,
                ))
            }
        };

        if let Some(extra) = self.peek() {
            return Err(LineError::new(
                format!("unexpected {} at end of line", extra.kind),
                extra.span,
            ));
        }

        Ok(Line {
            label,
            statement: Some(statement),
        })
    }

    /// Reject characters and literals the lexer could not make sense of.
    fn check_tokens(&self) -> Result<(), LineError> {
        for tok in &self.toks {
            match tok.kind {
                TokenKind::Unknown => {
                    return Err(LineError::new(
                        format!("unexpected character `{}`", self.text(tok.span)),
                        tok.span,
                    ))
                }
                TokenKind::Lit(LiteralKind::Str { terminated: false })
                | TokenKind::Lit(LiteralKind::Char { terminated: false }) => {
                    return Err(LineError::new("unterminated literal", tok.span))
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn text(&self, span: Span) -> &str {
        &self.src[span.as_range()]
    }

    fn peek(&self) -> Option<Token> {
        self.toks.get(self.pos).copied()
    }

    fn peek_kind(&self, ahead: usize) -> TokenKind {
        self.toks
            .get(self.pos + ahead)
            .map_or(TokenKind::Eof, |tok| tok.kind)
    }

    /// Span just past the last token, for errors at the end of the line.
    fn end_span(&self) -> Span {
        let end = self.toks.last().map_or(0, |tok| tok.span.end());
        Span::new(Idx(end), 0)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, LineError> {
        match self.next() {
            Some(tok) if tok.kind == kind => Ok(tok),
            Some(tok) => Err(LineError::new(
                format!("expected {kind}, found {}", tok.kind),
                tok.span,
            )),
            None => Err(LineError::new(
                format!("expected {kind}, found end of line"),
                self.end_span(),
            )),
        }
    }

    /// Consume an identifier or directive token, upper-casing it.
    fn ident(&mut self) -> Ident {
        let tok = self.toks[self.pos];
        self.pos += 1;
        Ident {
            name: self.text(tok.span).to_ascii_uppercase(),
            span: tok.span,
        }
    }

    fn operands(&mut self) -> Result<Vec<Operand>, LineError> {
        let mut operands = Vec::new();
        if self.peek().is_none() {
            return Ok(operands);
        }
        loop {
            operands.push(self.operand(!operands.is_empty())?);
            match self.peek_kind(0) {
                TokenKind::Comma => self.pos += 1,
                _ => return Ok(operands),
            }
        }
    }

    fn operand(&mut self, after_comma: bool) -> Result<Operand, LineError> {
        let Some(first) = self.peek() else {
            return Err(LineError::new("expected an operand", self.end_span()));
        };
        let kind = match first.kind {
            TokenKind::Hash => {
                self.pos += 1;
                OperandKind::Immediate(self.expr()?)
            }
            TokenKind::OpenParen => {
                self.pos += 1;
                let expr = self.expr()?;
                self.expect(TokenKind::CloseParen)?;
                OperandKind::Indirect(expr)
            }
            TokenKind::Lit(LiteralKind::Str { .. }) => {
                self.pos += 1;
                let text = self.text(first.span);
                OperandKind::Str(unescape(&text[1..text.len() - 1]).into_owned())
            }
            TokenKind::Ident
                if after_comma && matches!(self.peek_kind(1), TokenKind::Comma | TokenKind::Eof) =>
            {
                match self.text(first.span).to_ascii_uppercase().as_str() {
                    "X" => {
                        self.pos += 1;
                        OperandKind::Register(IndexRegister::X)
                    }
                    "Y" => {
                        self.pos += 1;
                        OperandKind::Register(IndexRegister::Y)
                    }
                    _ => OperandKind::Value(self.expr()?),
                }
            }
            _ => OperandKind::Value(self.expr()?),
        };
        let last = self.toks[self.pos - 1];
        Ok(Operand {
            kind,
            span: first.span.to(last.span),
        })
    }

    fn expr(&mut self) -> Result<Expr, LineError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek_kind(0) {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, LineError> {
        let Some(tok) = self.next() else {
            return Err(LineError::new("expected an expression", self.end_span()));
        };
        let unary = |op, parser: &mut Self| -> Result<Expr, LineError> {
            Ok(Expr::Unary(op, Box::new(parser.term()?)))
        };
        match tok.kind {
            TokenKind::Lt => unary(UnaryOp::Low, self),
            TokenKind::Gt => unary(UnaryOp::High, self),
            TokenKind::Minus => unary(UnaryOp::Neg, self),
            TokenKind::Ident => Ok(Expr::Symbol(Ident {
                name: self.text(tok.span).to_ascii_uppercase(),
                span: tok.span,
            })),
            TokenKind::Lit(kind) => self.number(kind, tok.span).map(Expr::Number),
            other => Err(LineError::new(
                format!("expected an expression, found {other}"),
                tok.span,
            )),
        }
    }

    fn number(&self, kind: LiteralKind, span: Span) -> Result<i64, LineError> {
        let text = self.text(span);
        let (digits, radix) = match kind {
            LiteralKind::Hex => (&text[1..], 16),
            LiteralKind::Bin => (&text[1..], 2),
            LiteralKind::Dec => (text, 10),
            LiteralKind::Char { .. } => {
                let body = unescape(&text[1..text.len() - 1]);
                let mut chars = body.chars();
                return match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c as i64),
                    _ => Err(LineError::new(
                        "character literals hold exactly one character",
                        span,
                    )),
                };
            }
            LiteralKind::Str { .. } => {
                return Err(LineError::new(
                    "strings are only allowed as directive operands",
                    span,
                ))
            }
        };
        if digits.is_empty() {
            return Err(LineError::new("expected digits after prefix", span));
        }
        i64::from_str_radix(digits, radix)
            .map_err(|_| LineError::new(format!("number `{text}` is too large"), span))
    }
}
