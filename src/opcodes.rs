//! Opcode table shared by the CPU and the assembler.
//!
//! The table is a 256-entry array indexed by opcode byte and built once at compile time from
//! [`INSTRUCTIONS`]. Empty entries are undefined opcodes, which halt the CPU.

use std::fmt;
use std::str::FromStr;

use crate::runtime::Cpu;

/// Rule for locating an instruction's operand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AddressingMode {
    Implied,
    Immediate,
    ZeroPage,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// `(zp),Y`
    IndirectY,
    Relative,
}

impl AddressingMode {
    /// Bytes following the opcode.
    pub const fn operand_len(self) -> u16 {
        match self {
            AddressingMode::Implied => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::IndirectY
            | AddressingMode::Relative => 1,
            AddressingMode::Absolute | AddressingMode::AbsoluteX | AddressingMode::AbsoluteY => 2,
        }
    }

    /// Full instruction size in bytes.
    pub const fn size(self) -> u16 {
        1 + self.operand_len()
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressingMode::Implied => "implied",
            AddressingMode::Immediate => "immediate",
            AddressingMode::ZeroPage => "zero page",
            AddressingMode::Absolute => "absolute",
            AddressingMode::AbsoluteX => "absolute,X",
            AddressingMode::AbsoluteY => "absolute,Y",
            AddressingMode::IndirectY => "(indirect),Y",
            AddressingMode::Relative => "relative",
        };
        f.pad(name)
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Mnemonic {
    ADC,
    BCC,
    BCS,
    BEQ,
    BMI,
    BNE,
    BPL,
    BVC,
    BVS,
    CLC,
    CMP,
    CPX,
    CPY,
    DEX,
    DEY,
    INC,
    INX,
    INY,
    JMP,
    JSR,
    LDA,
    LDX,
    LDY,
    NOP,
    PHA,
    PLA,
    RTS,
    SEC,
    STA,
    STX,
    STY,
    TAX,
    TAY,
    TXA,
    TYA,
}

impl Mnemonic {
    pub const ALL: [Mnemonic; 35] = [
        Mnemonic::ADC,
        Mnemonic::BCC,
        Mnemonic::BCS,
        Mnemonic::BEQ,
        Mnemonic::BMI,
        Mnemonic::BNE,
        Mnemonic::BPL,
        Mnemonic::BVC,
        Mnemonic::BVS,
        Mnemonic::CLC,
        Mnemonic::CMP,
        Mnemonic::CPX,
        Mnemonic::CPY,
        Mnemonic::DEX,
        Mnemonic::DEY,
        Mnemonic::INC,
        Mnemonic::INX,
        Mnemonic::INY,
        Mnemonic::JMP,
        Mnemonic::JSR,
        Mnemonic::LDA,
        Mnemonic::LDX,
        Mnemonic::LDY,
        Mnemonic::NOP,
        Mnemonic::PHA,
        Mnemonic::PLA,
        Mnemonic::RTS,
        Mnemonic::SEC,
        Mnemonic::STA,
        Mnemonic::STX,
        Mnemonic::STY,
        Mnemonic::TAX,
        Mnemonic::TAY,
        Mnemonic::TXA,
        Mnemonic::TYA,
    ];

    pub fn is_branch(self) -> bool {
        self.supports(AddressingMode::Relative)
    }

    /// Whether any opcode exists for this mnemonic in `mode`.
    pub fn supports(self, mode: AddressingMode) -> bool {
        opcode_for(self, mode).is_some()
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for Mnemonic {
    type Err = ();

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mnemonic::ALL
            .into_iter()
            .find(|m| s.eq_ignore_ascii_case(&m.to_string()))
            .ok_or(())
    }
}

/// Executes an instruction after its opcode has been fetched.
pub type Handler = fn(&mut Cpu, AddressingMode);

/// Static description of one opcode.
#[derive(Clone, Copy)]
pub struct Instruction {
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    /// Cycle cost before page-crossing and branch penalties.
    pub cycles: u8,
    pub handler: Handler,
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("opcode", &format_args!("{:#04x}", self.opcode))
            .field("mnemonic", &self.mnemonic)
            .field("mode", &self.mode)
            .field("cycles", &self.cycles)
            .finish()
    }
}

const fn op(
    opcode: u8,
    mnemonic: Mnemonic,
    mode: AddressingMode,
    cycles: u8,
    handler: Handler,
) -> Instruction {
    Instruction {
        opcode,
        mnemonic,
        mode,
        cycles,
        handler,
    }
}

use AddressingMode::*;
use Mnemonic::*;

/// Every supported opcode.
#[rustfmt::skip]
pub const INSTRUCTIONS: [Instruction; 59] = [
    op(0xEA, NOP, Implied, 2, Cpu::nop),

    op(0x69, ADC, Immediate, 2, Cpu::adc),
    op(0x65, ADC, ZeroPage,  3, Cpu::adc),
    op(0x6D, ADC, Absolute,  4, Cpu::adc),

    op(0x90, BCC, Relative, 2, Cpu::bcc),
    op(0xB0, BCS, Relative, 2, Cpu::bcs),
    op(0xF0, BEQ, Relative, 2, Cpu::beq),
    op(0x30, BMI, Relative, 2, Cpu::bmi),
    op(0xD0, BNE, Relative, 2, Cpu::bne),
    op(0x10, BPL, Relative, 2, Cpu::bpl),
    op(0x50, BVC, Relative, 2, Cpu::bvc),
    op(0x70, BVS, Relative, 2, Cpu::bvs),

    op(0x18, CLC, Implied, 2, Cpu::clc),
    op(0x38, SEC, Implied, 2, Cpu::sec),

    op(0xC9, CMP, Immediate, 2, Cpu::cmp),
    op(0xC5, CMP, ZeroPage,  3, Cpu::cmp),
    op(0xCD, CMP, Absolute,  4, Cpu::cmp),
    op(0xE0, CPX, Immediate, 2, Cpu::cpx),
    op(0xE4, CPX, ZeroPage,  3, Cpu::cpx),
    op(0xEC, CPX, Absolute,  4, Cpu::cpx),
    op(0xC0, CPY, Immediate, 2, Cpu::cpy),
    op(0xC4, CPY, ZeroPage,  3, Cpu::cpy),
    op(0xCC, CPY, Absolute,  4, Cpu::cpy),

    op(0xCA, DEX, Implied,  2, Cpu::dex),
    op(0x88, DEY, Implied,  2, Cpu::dey),
    op(0xE8, INX, Implied,  2, Cpu::inx),
    op(0xC8, INY, Implied,  2, Cpu::iny),
    op(0xE6, INC, ZeroPage, 5, Cpu::inc),
    op(0xEE, INC, Absolute, 6, Cpu::inc),

    op(0x4C, JMP, Absolute, 3, Cpu::jmp),
    op(0x20, JSR, Absolute, 6, Cpu::jsr),
    op(0x60, RTS, Implied,  6, Cpu::rts),

    op(0xA9, LDA, Immediate, 2, Cpu::lda),
    op(0xA5, LDA, ZeroPage,  3, Cpu::lda),
    op(0xAD, LDA, Absolute,  4, Cpu::lda),
    op(0xBD, LDA, AbsoluteX, 4, Cpu::lda),
    op(0xB9, LDA, AbsoluteY, 4, Cpu::lda),
    op(0xB1, LDA, IndirectY, 5, Cpu::lda),
    op(0xA2, LDX, Immediate, 2, Cpu::ldx),
    op(0xA6, LDX, ZeroPage,  3, Cpu::ldx),
    op(0xAE, LDX, Absolute,  4, Cpu::ldx),
    op(0xA0, LDY, Immediate, 2, Cpu::ldy),
    op(0xA4, LDY, ZeroPage,  3, Cpu::ldy),
    op(0xAC, LDY, Absolute,  4, Cpu::ldy),

    op(0x85, STA, ZeroPage,  3, Cpu::sta),
    op(0x8D, STA, Absolute,  4, Cpu::sta),
    op(0x9D, STA, AbsoluteX, 5, Cpu::sta),
    op(0x99, STA, AbsoluteY, 5, Cpu::sta),
    op(0x91, STA, IndirectY, 6, Cpu::sta),
    op(0x86, STX, ZeroPage,  3, Cpu::stx),
    op(0x8E, STX, Absolute,  4, Cpu::stx),
    op(0x84, STY, ZeroPage,  3, Cpu::sty),
    op(0x8C, STY, Absolute,  4, Cpu::sty),

    op(0x48, PHA, Implied, 3, Cpu::pha),
    op(0x68, PLA, Implied, 4, Cpu::pla),

    op(0xAA, TAX, Implied, 2, Cpu::tax),
    op(0xA8, TAY, Implied, 2, Cpu::tay),
    op(0x8A, TXA, Implied, 2, Cpu::txa),
    op(0x98, TYA, Implied, 2, Cpu::tya),
];

const fn build_table() -> [Option<Instruction>; 256] {
    let mut table: [Option<Instruction>; 256] = [None; 256];
    let mut i = 0;
    while i < INSTRUCTIONS.len() {
        let instr = INSTRUCTIONS[i];
        table[instr.opcode as usize] = Some(instr);
        i += 1;
    }
    table
}

/// Opcode byte to instruction. `None` marks an undefined opcode.
pub static OPCODE_TABLE: [Option<Instruction>; 256] = build_table();

/// Decode an opcode byte.
pub fn lookup(opcode: u8) -> Option<&'static Instruction> {
    OPCODE_TABLE[opcode as usize].as_ref()
}

/// Encode a mnemonic in an addressing mode.
pub fn opcode_for(mnemonic: Mnemonic, mode: AddressingMode) -> Option<u8> {
    OPCODE_TABLE
        .iter()
        .flatten()
        .find(|instr| instr.mnemonic == mnemonic && instr.mode == mode)
        .map(|instr| instr.opcode)
}
