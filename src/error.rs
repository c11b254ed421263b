use std::fmt;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

// Runtime errors

/// Failure of a memory access or bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Diagnostic)]
pub enum MemoryError {
    #[error("memory access out of range: {addr:#06x} (memory is {size:#x} bytes)")]
    #[diagnostic(code(mem::out_of_range))]
    OutOfRange { addr: usize, size: usize },

    #[error("program of {len} bytes at {start:#06x} does not fit in {size:#x} bytes of memory")]
    #[diagnostic(
        code(mem::capacity),
        help("choose a lower load address or shrink the program")
    )]
    CapacityExceeded { start: usize, len: usize, size: usize },

    #[error("program of {len} bytes at {start:#06x} overlaps the font ROM")]
    #[diagnostic(
        code(mem::rom_overlap),
        help("the font ROM occupies $F000-$F3FF and cannot be overwritten")
    )]
    RomOverlap { start: usize, len: usize },
}

// Assembler errors

/// A single problem found while assembling, tied to a source line.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum AsmError {
    #[error("line {line}: symbol `{name}` is defined more than once")]
    #[diagnostic(
        code(asm::duplicate_symbol),
        help("labels and constants share one namespace and may only be defined once")
    )]
    DuplicateSymbol {
        name: String,
        line: usize,
        #[label("redefined here")]
        span: SourceSpan,
    },

    #[error("line {line}: undefined symbol `{name}`")]
    #[diagnostic(code(asm::undefined_symbol))]
    UndefinedSymbol {
        name: String,
        line: usize,
        #[label("not defined")]
        span: SourceSpan,
        #[help]
        help: Option<String>,
    },

    #[error("line {line}: unknown instruction `{text}`")]
    #[diagnostic(
        code(asm::unknown_instruction),
        help("check the mnemonic and the addressing modes it supports")
    )]
    UnknownInstruction {
        text: String,
        line: usize,
        #[label("unknown mnemonic or addressing mode")]
        span: SourceSpan,
    },

    #[error("line {line}: branch target is {offset} bytes away")]
    #[diagnostic(
        code(asm::branch_range),
        help("relative branches reach from -128 to +127 bytes; use JMP for longer jumps")
    )]
    BranchOutOfRange {
        offset: i64,
        line: usize,
        #[label("out of range")]
        span: SourceSpan,
    },

    #[error("line {line}: invalid {directive} directive: {reason}")]
    #[diagnostic(code(asm::directive))]
    InvalidDirectiveSyntax {
        directive: String,
        reason: String,
        line: usize,
        #[label("invalid directive")]
        span: SourceSpan,
    },

    #[error("line {line}: {reason}")]
    #[diagnostic(code(asm::syntax))]
    SyntaxError {
        reason: String,
        line: usize,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("line {line}: address {address:#x} is past the end of memory")]
    #[diagnostic(code(asm::address_overflow), help("addresses must stay below $10000"))]
    AddressOverflow {
        address: u32,
        line: usize,
        #[label("does not fit")]
        span: SourceSpan,
    },
}

impl AsmError {
    /// 1-based source line the error was found on.
    pub fn line(&self) -> usize {
        match self {
            AsmError::DuplicateSymbol { line, .. }
            | AsmError::UndefinedSymbol { line, .. }
            | AsmError::UnknownInstruction { line, .. }
            | AsmError::BranchOutOfRange { line, .. }
            | AsmError::InvalidDirectiveSyntax { line, .. }
            | AsmError::SyntaxError { line, .. }
            | AsmError::AddressOverflow { line, .. } => *line,
        }
    }

    pub fn span(&self) -> SourceSpan {
        match self {
            AsmError::DuplicateSymbol { span, .. }
            | AsmError::UndefinedSymbol { span, .. }
            | AsmError::UnknownInstruction { span, .. }
            | AsmError::BranchOutOfRange { span, .. }
            | AsmError::InvalidDirectiveSyntax { span, .. }
            | AsmError::SyntaxError { span, .. }
            | AsmError::AddressOverflow { span, .. } => *span,
        }
    }
}

/// Assembler pass which produced errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Symbol table construction and sizing.
    Symbols,
    /// Code generation.
    CodeGen,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Symbols => f.write_str("pass 1 (symbols)"),
            Pass::CodeGen => f.write_str("pass 2 (code generation)"),
        }
    }
}

/// Every error collected by a failed assembler pass, ready to be rendered against the source.
#[derive(Debug, Error, Diagnostic)]
#[error("{pass} failed with {count} error(s)", count = .errors.len())]
#[diagnostic(code(asm::failed))]
pub struct AssembleError {
    pub pass: Pass,
    #[source_code]
    src: NamedSource<String>,
    #[related]
    errors: Vec<AsmError>,
}

impl AssembleError {
    pub fn new(pass: Pass, name: impl AsRef<str>, src: &str, errors: Vec<AsmError>) -> Self {
        AssembleError {
            pass,
            src: NamedSource::new(name, src.to_string()),
            errors,
        }
    }

    pub fn errors(&self) -> &[AsmError] {
        &self.errors
    }
}
