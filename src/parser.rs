//! First assembler pass: symbol table construction and sizing.

use crate::air::{Air, AirKind, AirStmt, DataItem};
use crate::error::AsmError;
use crate::line::{
    parse_line, Directive, Expr, Ident, IndexRegister, Line, Operand, OperandKind, Statement,
};
use crate::opcodes::{AddressingMode, Mnemonic};
use crate::span::Span;
use crate::symbol::{SymbolKind, SymbolTable};

/// One past the highest address.
const ADDRESS_LIMIT: u32 = 0x10000;

/// Walks the source line by line, assigning addresses and collecting symbols.
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    symbols: SymbolTable,
    stmts: Vec<AirStmt>,
    errors: Vec<AsmError>,
    /// Address the next byte will be placed at
    cursor: u32,
    /// Tracker for current line
    line: usize,
    /// Offset of the current line in the source
    offset: usize,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Self {
        AsmParser {
            src,
            symbols: SymbolTable::new(),
            stmts: Vec::new(),
            errors: Vec::new(),
            cursor: 0,
            line: 0,
            offset: 0,
        }
    }

    /// Create AIR out of the source. Every error in the file is reported, not just the first.
    pub fn parse(mut self) -> Result<Air, Vec<AsmError>> {
        let mut offset = 0;
        for (idx, raw) in self.src.split('\n').enumerate() {
            self.line = idx + 1;
            self.offset = offset;
            offset += raw.len() + 1;

            match parse_line(raw) {
                Ok(line) => self.process(line),
                Err(err) => {
                    let err = AsmError::SyntaxError {
                        reason: err.reason,
                        line: self.line,
                        span: self.span(err.span),
                    };
                    self.errors.push(err);
                }
            }
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        log::debug!(
            "pass 1 sized {} statements and {} symbols",
            self.stmts.len(),
            self.symbols.len()
        );
        Ok(Air::new(self.stmts, self.symbols))
    }

    fn span(&self, span: Span) -> miette::SourceSpan {
        span.shifted(self.offset).into()
    }

    fn process(&mut self, line: Line) {
        let Line { label, statement } = line;
        match statement {
            Some(Statement::Constant { name, value }) => self.define_constant(name, &value),
            Some(Statement::Directive { name, operands }) => match name.name.parse() {
                Ok(Directive::Org) => {
                    self.set_origin(&name, &operands);
                    self.define_label(label);
                }
                Ok(directive) => {
                    self.define_label(label);
                    if let Some(kind) = self.data(directive, &name, operands) {
                        self.push(kind, name.span);
                    }
                }
                Err(()) => {
                    self.define_label(label);
                    self.errors.push(AsmError::UnknownInstruction {
                        text: name.name,
                        line: self.line,
                        span: self.span(name.span),
                    });
                }
            },
            Some(Statement::Instruction { mnemonic, operands }) => {
                self.define_label(label);
                let span = operands
                    .last()
                    .map_or(mnemonic.span, |op| mnemonic.span.to(op.span));
                if let Some(kind) = self.instruction(&mnemonic, operands, span) {
                    self.push(kind, span);
                }
            }
            None => self.define_label(label),
        }
    }

    fn define_label(&mut self, label: Option<Ident>) {
        let Some(label) = label else {
            return;
        };
        if self.cursor >= ADDRESS_LIMIT {
            self.errors.push(AsmError::AddressOverflow {
                address: self.cursor,
                line: self.line,
                span: self.span(label.span),
            });
            return;
        }
        self.add_symbol(&label, self.cursor as i64, SymbolKind::Label);
    }

    fn add_symbol(&mut self, ident: &Ident, value: i64, kind: SymbolKind) {
        if let Err(existing) = self.symbols.add_symbol(&ident.name, value, kind, self.line) {
            log::debug!("{} was first defined on line {}", ident.name, existing.line);
            self.errors.push(AsmError::DuplicateSymbol {
                name: ident.name.clone(),
                line: self.line,
                span: self.span(ident.span),
            });
        }
    }

    /// Constants may only refer to constants defined above them.
    fn define_constant(&mut self, name: Ident, value: &Expr) {
        let symbols = &self.symbols;
        let result = value.eval(&mut |ident: &Ident| symbols.constant(&ident.name));
        match result {
            Ok(value) => self.add_symbol(&name, value, SymbolKind::Constant),
            Err(ident) => {
                let help = match symbols.lookup_symbol(&ident.name) {
                    Some(sym) if sym.kind == SymbolKind::Label => {
                        "constant definitions cannot refer to labels".to_string()
                    }
                    _ => "constants must be defined before they are used".to_string(),
                };
                let err = AsmError::UndefinedSymbol {
                    name: ident.name.clone(),
                    line: self.line,
                    span: self.span(ident.span),
                    help: Some(help),
                };
                self.errors.push(err);
            }
        }
    }

    /// Evaluate against everything defined so far.
    fn eval_known(&self, expr: &Expr) -> Result<i64, AsmError> {
        expr.eval(&mut |ident: &Ident| self.symbols.value(&ident.name))
            .map_err(|ident| AsmError::UndefinedSymbol {
                name: ident.name.clone(),
                line: self.line,
                span: self.span(ident.span),
                help: Some("symbols used by .ORG must be defined above it".to_string()),
            })
    }

    fn set_origin(&mut self, name: &Ident, operands: &[Operand]) {
        let expr = match operands {
            [Operand {
                kind: OperandKind::Value(expr),
                ..
            }] => expr,
            _ => {
                self.directive_error(name, "expected a single address", name.span);
                return;
            }
        };
        match self.eval_known(expr) {
            Ok(addr) if (0..ADDRESS_LIMIT as i64).contains(&addr) => {
                log::debug!("line {}: origin set to {addr:#06x}", self.line);
                self.cursor = addr as u32;
            }
            Ok(addr) => {
                let span = operands[0].span;
                self.directive_error(
                    name,
                    &format!("origin {addr:#x} is outside $0000-$FFFF"),
                    span,
                );
            }
            Err(err) => self.errors.push(err),
        }
    }

    fn directive_error(&mut self, name: &Ident, reason: &str, span: Span) {
        self.errors.push(AsmError::InvalidDirectiveSyntax {
            directive: name.name.clone(),
            reason: reason.to_string(),
            line: self.line,
            span: self.span(span),
        });
    }

    /// Build a data directive, reporting malformed operands.
    fn data(&mut self, directive: Directive, name: &Ident, operands: Vec<Operand>) -> Option<AirKind> {
        if operands.is_empty() {
            self.directive_error(name, "expected at least one operand", name.span);
            return None;
        }
        match directive {
            Directive::Org => None,
            Directive::Byte => {
                let mut items = Vec::with_capacity(operands.len());
                for op in operands {
                    match op.kind {
                        OperandKind::Value(expr) => items.push(DataItem::Value(expr, op.span)),
                        OperandKind::Str(s) => items.push(DataItem::Str(s)),
                        _ => {
                            self.directive_error(name, "expected a value or a string", op.span);
                            return None;
                        }
                    }
                }
                Some(AirKind::Bytes(items))
            }
            Directive::Word => {
                let mut words = Vec::with_capacity(operands.len());
                for op in operands {
                    match op.kind {
                        OperandKind::Value(expr) => words.push((expr, op.span)),
                        _ => {
                            self.directive_error(name, "expected a value", op.span);
                            return None;
                        }
                    }
                }
                Some(AirKind::Words(words))
            }
            Directive::Asciiz => match <[Operand; 1]>::try_from(operands) {
                Ok([Operand {
                    kind: OperandKind::Str(s),
                    ..
                }]) => Some(AirKind::Asciiz(s)),
                _ => {
                    self.directive_error(name, "expected a single string", name.span);
                    None
                }
            },
        }
    }

    /// Pick the addressing mode from the operand shape.
    fn instruction(
        &mut self,
        mnemonic_ident: &Ident,
        operands: Vec<Operand>,
        span: Span,
    ) -> Option<AirKind> {
        let unknown = |parser: &Self| AsmError::UnknownInstruction {
            text: parser.src[span.shifted(parser.offset).as_range()].to_string(),
            line: parser.line,
            span: parser.span(span),
        };
        let Ok(mnemonic) = mnemonic_ident.name.parse::<Mnemonic>() else {
            self.errors.push(AsmError::UnknownInstruction {
                text: mnemonic_ident.name.clone(),
                line: self.line,
                span: self.span(mnemonic_ident.span),
            });
            return None;
        };

        let mut operands = operands.into_iter();
        let (mode, operand) = match (operands.next(), operands.next(), operands.next()) {
            (None, ..) => (AddressingMode::Implied, None),
            (Some(op), None, _) => match op.kind {
                OperandKind::Immediate(expr) => (AddressingMode::Immediate, Some((expr, op.span))),
                OperandKind::Value(expr) => {
                    let mode = self.direct_mode(mnemonic, &expr);
                    (mode, Some((expr, op.span)))
                }
                _ => {
                    let err = unknown(self);
                    self.errors.push(err);
                    return None;
                }
            },
            (Some(op), Some(index), None) => match (op.kind, index.kind) {
                (OperandKind::Value(expr), OperandKind::Register(IndexRegister::X)) => {
                    (AddressingMode::AbsoluteX, Some((expr, op.span)))
                }
                (OperandKind::Value(expr), OperandKind::Register(IndexRegister::Y)) => {
                    (AddressingMode::AbsoluteY, Some((expr, op.span)))
                }
                (OperandKind::Indirect(expr), OperandKind::Register(IndexRegister::Y)) => {
                    (AddressingMode::IndirectY, Some((expr, op.span)))
                }
                _ => {
                    let err = unknown(self);
                    self.errors.push(err);
                    return None;
                }
            },
            _ => {
                let err = unknown(self);
                self.errors.push(err);
                return None;
            }
        };

        if !mnemonic.supports(mode) {
            let err = unknown(self);
            self.errors.push(err);
            return None;
        }
        Some(AirKind::Instr {
            mnemonic,
            mode,
            operand,
        })
    }

    /// Mode for a bare operand: relative for branches, zero page when the value is already known
    /// to fit, absolute otherwise.
    fn direct_mode(&self, mnemonic: Mnemonic, expr: &Expr) -> AddressingMode {
        if mnemonic.is_branch() {
            return AddressingMode::Relative;
        }
        if !mnemonic.supports(AddressingMode::ZeroPage) {
            return AddressingMode::Absolute;
        }
        match self.eval_known(expr) {
            Ok(value) if (0..=0xFF).contains(&value) => AddressingMode::ZeroPage,
            _ => AddressingMode::Absolute,
        }
    }

    /// Place a statement at the cursor and advance past it.
    fn push(&mut self, kind: AirKind, span: Span) {
        let stmt = AirStmt {
            line: self.line,
            addr: 0,
            offset: self.offset,
            span,
            kind,
        };
        let end = self.cursor + stmt.size();
        if end > ADDRESS_LIMIT {
            self.errors.push(AsmError::AddressOverflow {
                address: end - 1,
                line: self.line,
                span: self.span(span),
            });
            return;
        }
        self.stmts.push(AirStmt {
            addr: self.cursor as u16,
            ..stmt
        });
        self.cursor = end;
    }
}
