// Machine
pub mod font;
pub mod memory;
pub mod opcodes;
pub mod registers;
mod runtime;
pub use runtime::{Cpu, CpuState, HaltReason};

// Assembling
mod lexer;
pub mod line;
mod parser;
pub use parser::AsmParser;
mod air;
pub use air::{Air, AirStmt, Program};
pub mod symbol;

mod span;

pub mod error;
pub use error::{AsmError, AssembleError, MemoryError, Pass};

pub mod env;
pub mod output;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;

/// Run both assembler passes over `src`. Pass 2 only runs when pass 1 found no errors.
pub fn assemble(src: &str) -> Result<Program, AssembleError> {
    assemble_named("<source>", src)
}

/// As [`assemble`], with `name` used when rendering diagnostics.
pub fn assemble_named(name: &str, src: &str) -> Result<Program, AssembleError> {
    let air = AsmParser::new(src)
        .parse()
        .map_err(|errors| AssembleError::new(Pass::Symbols, name, src, errors))?;
    air.emit()
        .map_err(|errors| AssembleError::new(Pass::CodeGen, name, src, errors))
}
