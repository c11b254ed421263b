//! Assembly intermediate representation and code generation (pass 2).

use std::collections::BTreeMap;

use crate::error::AsmError;
use crate::line::{Expr, Ident};
use crate::opcodes::{self, AddressingMode, Mnemonic};
use crate::span::Span;
use crate::symbol::SymbolTable;

/// Output of the first pass: every byte-producing line with its address fixed, plus the
/// complete symbol table.
#[derive(Debug)]
pub struct Air {
    stmts: Vec<AirStmt>,
    symbols: SymbolTable,
}

/// A sized, addressed source line.
#[derive(Clone, PartialEq, Debug)]
pub struct AirStmt {
    /// 1-based source line
    pub line: usize,
    pub addr: u16,
    /// Offset of the line in the source. Spans below are relative to it.
    pub offset: usize,
    /// Span of the whole statement
    pub span: Span,
    pub kind: AirKind,
}

#[derive(Clone, PartialEq, Debug)]
pub enum AirKind {
    Instr {
        mnemonic: Mnemonic,
        /// Mode chosen while sizing, reused unchanged for encoding
        mode: AddressingMode,
        operand: Option<(Expr, Span)>,
    },
    /// `.BYTE`
    Bytes(Vec<DataItem>),
    /// `.WORD`
    Words(Vec<(Expr, Span)>),
    /// `.ASCIIZ`, without the terminator
    Asciiz(String),
}

#[derive(Clone, PartialEq, Debug)]
pub enum DataItem {
    Value(Expr, Span),
    Str(String),
}

impl AirStmt {
    /// Bytes this statement occupies.
    pub fn size(&self) -> u32 {
        match &self.kind {
            AirKind::Instr { mode, .. } => mode.size() as u32,
            AirKind::Bytes(items) => items
                .iter()
                .map(|item| match item {
                    DataItem::Value(..) => 1,
                    DataItem::Str(s) => s.len() as u32,
                })
                .sum(),
            AirKind::Words(words) => words.len() as u32 * 2,
            AirKind::Asciiz(s) => s.len() as u32 + 1,
        }
    }
}

impl Air {
    pub fn new(stmts: Vec<AirStmt>, symbols: SymbolTable) -> Self {
        Air { stmts, symbols }
    }

    pub fn stmts(&self) -> &[AirStmt] {
        &self.stmts
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Encode every statement. Errors are collected across all lines; no program is produced
    /// if there are any.
    pub fn emit(self) -> Result<Program, Vec<AsmError>> {
        let mut program = Program::new();
        let mut errors = Vec::new();

        for stmt in &self.stmts {
            match self.encode(stmt) {
                Ok(bytes) => {
                    for (i, byte) in bytes.into_iter().enumerate() {
                        program.write(stmt.addr as usize + i, byte, stmt.line);
                    }
                }
                Err(err) => errors.push(err),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        let mut symbols = self.symbols;
        symbols.sort();
        program.symbols = symbols;
        log::debug!(
            "pass 2 emitted {} bytes from {} statements",
            program.bytes.len(),
            self.stmts.len()
        );
        Ok(program)
    }

    fn encode(&self, stmt: &AirStmt) -> Result<Vec<u8>, AsmError> {
        match &stmt.kind {
            AirKind::Instr {
                mnemonic,
                mode,
                operand,
            } => {
                let opcode = opcodes::opcode_for(*mnemonic, *mode).ok_or_else(|| {
                    AsmError::UnknownInstruction {
                        text: format!("{mnemonic} {mode}"),
                        line: stmt.line,
                        span: stmt.span.shifted(stmt.offset).into(),
                    }
                })?;
                let mut bytes = vec![opcode];
                let Some((expr, span)) = operand else {
                    return Ok(bytes);
                };
                let value = self.resolve(stmt, expr)?;
                match mode {
                    AddressingMode::Implied => {}
                    AddressingMode::Immediate
                    | AddressingMode::ZeroPage
                    | AddressingMode::IndirectY => bytes.push(value as u8),
                    AddressingMode::Absolute
                    | AddressingMode::AbsoluteX
                    | AddressingMode::AbsoluteY => bytes.extend(word(value)),
                    AddressingMode::Relative => {
                        let offset = value - (stmt.addr as i64 + 2);
                        if !(-128..=127).contains(&offset) {
                            return Err(AsmError::BranchOutOfRange {
                                offset,
                                line: stmt.line,
                                span: span.shifted(stmt.offset).into(),
                            });
                        }
                        bytes.push(offset as i8 as u8);
                    }
                }
                Ok(bytes)
            }
            AirKind::Bytes(items) => {
                let mut bytes = Vec::new();
                for item in items {
                    match item {
                        DataItem::Value(expr, _) => bytes.push(self.resolve(stmt, expr)? as u8),
                        DataItem::Str(s) => bytes.extend_from_slice(s.as_bytes()),
                    }
                }
                Ok(bytes)
            }
            AirKind::Words(words) => {
                let mut bytes = Vec::with_capacity(words.len() * 2);
                for (expr, _) in words {
                    bytes.extend(word(self.resolve(stmt, expr)?));
                }
                Ok(bytes)
            }
            AirKind::Asciiz(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.push(0);
                Ok(bytes)
            }
        }
    }

    fn resolve(&self, stmt: &AirStmt, expr: &Expr) -> Result<i64, AsmError> {
        expr.eval(&mut |ident: &Ident| self.symbols.value(&ident.name))
            .map_err(|ident| AsmError::UndefinedSymbol {
                name: ident.name.clone(),
                line: stmt.line,
                span: ident.span.shifted(stmt.offset).into(),
                help: None,
            })
    }
}

/// Little-endian low 16 bits.
fn word(value: i64) -> [u8; 2] {
    (value as u16).to_le_bytes()
}

/// Assembled machine code: a sparse address to byte map plus the final symbol table.
#[derive(Clone, Default, Debug)]
pub struct Program {
    bytes: BTreeMap<u16, u8>,
    symbols: SymbolTable,
    overlaps: Vec<u16>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins. Overwrites are logged and remembered.
    fn write(&mut self, addr: usize, byte: u8, line: usize) {
        // Addresses were bounds checked while sizing
        let addr = addr as u16;
        if let Some(old) = self.bytes.insert(addr, byte) {
            log::warn!(
                "line {line}: overwriting ${old:02X} at ${addr:04X} with ${byte:02X}"
            );
            self.overlaps.push(addr);
        }
    }

    pub fn get(&self, addr: u16) -> Option<u8> {
        self.bytes.get(&addr).copied()
    }

    /// Lowest written address.
    pub fn origin(&self) -> Option<u16> {
        self.bytes.keys().next().copied()
    }

    /// One past the highest written address.
    pub fn end(&self) -> usize {
        self.bytes
            .keys()
            .next_back()
            .map_or(0, |addr| *addr as usize + 1)
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Contiguous image from address 0 through the highest written address, gaps zero-filled.
    pub fn to_binary(&self) -> Vec<u8> {
        let mut image = vec![0; self.end()];
        for (addr, byte) in &self.bytes {
            image[*addr as usize] = *byte;
        }
        image
    }

    /// Runs of consecutively written bytes with their start addresses, lowest first.
    pub fn segments(&self) -> Vec<(u16, Vec<u8>)> {
        let mut segments: Vec<(u16, Vec<u8>)> = Vec::new();
        for (&addr, &byte) in &self.bytes {
            match segments.last_mut() {
                Some((start, bytes)) if *start as usize + bytes.len() == addr as usize => {
                    bytes.push(byte)
                }
                _ => segments.push((addr, vec![byte])),
            }
        }
        segments
    }

    /// Symbols ordered by value.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Addresses written more than once, in the order the overwrites happened.
    pub fn overlaps(&self) -> &[u16] {
        &self.overlaps
    }
}
