use std::fmt;

use crate::error::MemoryError;
use crate::font::{self, FONT_ROM, FONT_ROM_SIZE, FONT_ROM_START, VRAM_SIZE, VRAM_START};
use crate::memory::Memory;
use crate::opcodes::{self, AddressingMode};
use crate::registers::{Flag, Registers};

/// Why the CPU stopped executing for good.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HaltReason {
    /// No instruction is defined for `opcode`, fetched from `address`.
    UnknownOpcode { opcode: u8, address: u16 },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::UnknownOpcode { opcode, address } => {
                write!(f, "unknown opcode ${opcode:02X} at ${address:04X}")
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CpuState {
    Idle,
    Running,
    Halted(HaltReason),
}

impl fmt::Display for CpuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuState::Idle => f.write_str("idle"),
            CpuState::Running => f.write_str("running"),
            CpuState::Halted(reason) => write!(f, "halted: {reason}"),
        }
    }
}

/// Represents complete machine state during runtime.
pub struct Cpu {
    /// 64KB of system memory, font ROM included
    memory: Memory,
    registers: Registers,
    state: CpuState,
    /// Cycles spent by the last instruction
    cycles: u32,
    total_cycles: u64,
    /// Log every executed instruction
    trace: bool,
}

impl Cpu {
    pub fn new() -> Self {
        let mut cpu = Cpu {
            memory: Memory::new(),
            registers: Registers::new(),
            state: CpuState::Idle,
            cycles: 0,
            total_cycles: 0,
            trace: false,
        };
        cpu.reset();
        cpu
    }

    /// Enable per-instruction trace logging.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Return to the power-on state: memory cleared, registers restored and the font ROM
    /// loaded.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.registers.reset();
        self.state = CpuState::Idle;
        self.cycles = 0;
        self.total_cycles = 0;
        if let Err(err) = self.memory.load_program(&FONT_ROM, FONT_ROM_START as usize) {
            log::error!("could not load font ROM: {err}");
        }
        log::debug!("cpu reset");
    }

    /// Copy a program into memory. The font ROM cannot be loaded over.
    pub fn load_program(&mut self, program: &[u8], start: u16) -> Result<(), MemoryError> {
        let start = start as usize;
        let rom = font::font_rom_range();
        let touches_rom = !program.is_empty()
            && start <= *rom.end() as usize
            && start + program.len() > *rom.start() as usize;
        if touches_rom {
            return Err(MemoryError::RomOverlap {
                start,
                len: program.len(),
            });
        }
        self.memory.load_program(program, start)
    }

    /// Write a single byte from outside the CPU, respecting the font ROM.
    pub fn poke(&mut self, addr: u16, value: u8) -> Result<(), MemoryError> {
        if font::font_rom_range().contains(&addr) {
            return Err(MemoryError::RomOverlap {
                start: addr as usize,
                len: 1,
            });
        }
        self.memory.write(addr as usize, value as u16)
    }

    /// Execute exactly one instruction. Does nothing once halted.
    pub fn step(&mut self) {
        if let CpuState::Halted(_) = self.state {
            return;
        }
        let address = self.registers.pc;
        let opcode = self.fetch_byte();

        let Some(instr) = opcodes::lookup(opcode) else {
            let reason = HaltReason::UnknownOpcode { opcode, address };
            log::warn!("{reason}, halting");
            self.cycles = 1;
            self.total_cycles += 1;
            self.state = CpuState::Halted(reason);
            return;
        };

        if self.trace {
            log::trace!(
                "{address:04X}  {:02X}  {} {:<12} A={:02X} X={:02X} Y={:02X} SP={:02X} P={:08b}",
                opcode,
                instr.mnemonic,
                instr.mode,
                self.registers.a,
                self.registers.x,
                self.registers.y,
                self.registers.sp,
                self.registers.status(),
            );
        }

        self.cycles = instr.cycles as u32;
        (instr.handler)(self, instr.mode);
        self.total_cycles += self.cycles as u64;
    }

    /// Run until the CPU halts.
    pub fn run(&mut self) {
        self.run_with(|_| {});
    }

    /// Run until the CPU halts or `hook` calls [`Cpu::stop`]. The hook is called after every
    /// instruction.
    pub fn run_with<F>(&mut self, mut hook: F)
    where
        F: FnMut(&mut Cpu),
    {
        if !self.start() {
            return;
        }
        while self.state == CpuState::Running {
            self.step();
            if self.state == CpuState::Running {
                hook(self);
            }
        }
    }

    /// Run at most `max_steps` instructions, returning how many were executed.
    pub fn run_for(&mut self, max_steps: usize) -> usize {
        if max_steps == 0 || self.is_halted() {
            return 0;
        }
        let mut steps = 0;
        self.run_with(|cpu| {
            steps += 1;
            if steps >= max_steps {
                cpu.stop();
            }
        });
        // The halting step never reaches the hook
        if matches!(self.state, CpuState::Halted(_)) {
            steps += 1;
        }
        steps
    }

    /// Leave the running state at the next instruction boundary.
    pub fn stop(&mut self) {
        if self.state == CpuState::Running {
            self.state = CpuState::Idle;
        }
    }

    fn start(&mut self) -> bool {
        match self.state {
            CpuState::Halted(_) => false,
            _ => {
                self.state = CpuState::Running;
                true
            }
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, CpuState::Halted(_))
    }

    /// Cycles taken by the last executed instruction.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Character codes of the 40x25 text screen, row-major.
    pub fn video_memory(&self) -> &[u8] {
        self.memory.slice(VRAM_START as usize, VRAM_SIZE)
    }

    pub fn font_rom(&self) -> &[u8] {
        self.memory.slice(FONT_ROM_START as usize, FONT_ROM_SIZE)
    }

    // Bus

    fn read(&self, addr: u16) -> u8 {
        self.memory.read(addr as usize).unwrap_or_else(|err| {
            log::warn!("{err}");
            0
        })
    }

    fn write(&mut self, addr: u16, value: u8) {
        if font::font_rom_range().contains(&addr) {
            log::warn!("ignored write of ${value:02X} to font ROM at ${addr:04X}");
            return;
        }
        if let Err(err) = self.memory.write(addr as usize, value as u16) {
            log::warn!("{err}");
        }
    }

    fn fetch_byte(&mut self) -> u8 {
        let value = self.read(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);
        value
    }

    /// Little-endian.
    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        hi << 8 | lo
    }

    fn push(&mut self, value: u8) {
        let addr = self.registers.stack_addr();
        self.write(addr, value);
        self.registers.sp = self.registers.sp.wrapping_sub(1);
    }

    fn pop(&mut self) -> u8 {
        self.registers.sp = self.registers.sp.wrapping_add(1);
        self.read(self.registers.stack_addr())
    }

    // Addressing

    /// Effective address of the operand. Indexed reads that cross a page cost an extra cycle.
    fn resolve(&mut self, mode: AddressingMode, is_read: bool) -> u16 {
        match mode {
            AddressingMode::Immediate => {
                let addr = self.registers.pc;
                self.registers.pc = addr.wrapping_add(1);
                addr
            }
            AddressingMode::ZeroPage => self.fetch_byte() as u16,
            AddressingMode::Absolute => self.fetch_word(),
            AddressingMode::AbsoluteX => {
                let base = self.fetch_word();
                self.index(base, self.registers.x, is_read)
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_word();
                self.index(base, self.registers.y, is_read)
            }
            AddressingMode::IndirectY => {
                let ptr = self.fetch_byte();
                let lo = self.read(ptr as u16) as u16;
                let hi = self.read(ptr.wrapping_add(1) as u16) as u16;
                self.index(hi << 8 | lo, self.registers.y, is_read)
            }
            AddressingMode::Implied | AddressingMode::Relative => {
                unreachable!("{mode} operands have no effective address")
            }
        }
    }

    fn index(&mut self, base: u16, offset: u8, is_read: bool) -> u16 {
        let addr = base.wrapping_add(offset as u16);
        if is_read && page(addr) != page(base) {
            self.cycles += 1;
        }
        addr
    }

    fn read_operand(&mut self, mode: AddressingMode) -> u8 {
        let addr = self.resolve(mode, true);
        self.read(addr)
    }

    fn branch(&mut self, taken: bool) {
        let offset = self.fetch_byte() as i8;
        if !taken {
            return;
        }
        let from = self.registers.pc;
        let target = from.wrapping_add(offset as i16 as u16);
        self.cycles += 1;
        if page(target) != page(from) {
            self.cycles += 1;
        }
        self.registers.pc = target;
    }

    fn compare(&mut self, register: u8, mode: AddressingMode) {
        let value = self.read_operand(mode);
        let diff = register.wrapping_sub(value);
        self.registers.set_flag(Flag::Zero, register == value);
        self.registers.set_flag(Flag::Negative, diff & 0x80 != 0);
        self.registers.set_flag(Flag::Carry, register >= value);
    }

    // Instructions

    pub(crate) fn adc(&mut self, mode: AddressingMode) {
        let a = self.registers.a;
        let m = self.read_operand(mode);
        let sum = a as u16 + m as u16 + self.registers.carry() as u16;
        let result = sum as u8;
        self.registers.set_flag(Flag::Carry, sum > 0xFF);
        self.registers
            .set_flag(Flag::Overflow, !(a ^ m) & (a ^ result) & 0x80 != 0);
        self.registers.set_zn(result);
        self.registers.a = result;
    }

    pub(crate) fn bcc(&mut self, _: AddressingMode) {
        self.branch(!self.registers.carry());
    }

    pub(crate) fn bcs(&mut self, _: AddressingMode) {
        self.branch(self.registers.carry());
    }

    pub(crate) fn beq(&mut self, _: AddressingMode) {
        self.branch(self.registers.zero());
    }

    pub(crate) fn bmi(&mut self, _: AddressingMode) {
        self.branch(self.registers.negative());
    }

    pub(crate) fn bne(&mut self, _: AddressingMode) {
        self.branch(!self.registers.zero());
    }

    pub(crate) fn bpl(&mut self, _: AddressingMode) {
        self.branch(!self.registers.negative());
    }

    pub(crate) fn bvc(&mut self, _: AddressingMode) {
        self.branch(!self.registers.overflow());
    }

    pub(crate) fn bvs(&mut self, _: AddressingMode) {
        self.branch(self.registers.overflow());
    }

    pub(crate) fn clc(&mut self, _: AddressingMode) {
        self.registers.set_flag(Flag::Carry, false);
    }

    pub(crate) fn sec(&mut self, _: AddressingMode) {
        self.registers.set_flag(Flag::Carry, true);
    }

    pub(crate) fn cmp(&mut self, mode: AddressingMode) {
        self.compare(self.registers.a, mode);
    }

    pub(crate) fn cpx(&mut self, mode: AddressingMode) {
        self.compare(self.registers.x, mode);
    }

    pub(crate) fn cpy(&mut self, mode: AddressingMode) {
        self.compare(self.registers.y, mode);
    }

    pub(crate) fn dex(&mut self, _: AddressingMode) {
        self.registers.x = self.registers.x.wrapping_sub(1);
        self.registers.set_zn(self.registers.x);
    }

    pub(crate) fn dey(&mut self, _: AddressingMode) {
        self.registers.y = self.registers.y.wrapping_sub(1);
        self.registers.set_zn(self.registers.y);
    }

    pub(crate) fn inx(&mut self, _: AddressingMode) {
        self.registers.x = self.registers.x.wrapping_add(1);
        self.registers.set_zn(self.registers.x);
    }

    pub(crate) fn iny(&mut self, _: AddressingMode) {
        self.registers.y = self.registers.y.wrapping_add(1);
        self.registers.set_zn(self.registers.y);
    }

    pub(crate) fn inc(&mut self, mode: AddressingMode) {
        let addr = self.resolve(mode, false);
        let value = self.read(addr).wrapping_add(1);
        self.write(addr, value);
        self.registers.set_zn(value);
    }

    pub(crate) fn jmp(&mut self, mode: AddressingMode) {
        self.registers.pc = self.resolve(mode, false);
    }

    pub(crate) fn jsr(&mut self, mode: AddressingMode) {
        let target = self.resolve(mode, false);
        let ret = self.registers.pc.wrapping_sub(1);
        self.push((ret >> 8) as u8);
        self.push(ret as u8);
        self.registers.pc = target;
    }

    pub(crate) fn rts(&mut self, _: AddressingMode) {
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        self.registers.pc = (hi << 8 | lo).wrapping_add(1);
    }

    pub(crate) fn lda(&mut self, mode: AddressingMode) {
        self.registers.a = self.read_operand(mode);
        self.registers.set_zn(self.registers.a);
    }

    pub(crate) fn ldx(&mut self, mode: AddressingMode) {
        self.registers.x = self.read_operand(mode);
        self.registers.set_zn(self.registers.x);
    }

    pub(crate) fn ldy(&mut self, mode: AddressingMode) {
        self.registers.y = self.read_operand(mode);
        self.registers.set_zn(self.registers.y);
    }

    pub(crate) fn nop(&mut self, _: AddressingMode) {}

    pub(crate) fn pha(&mut self, _: AddressingMode) {
        self.push(self.registers.a);
    }

    pub(crate) fn pla(&mut self, _: AddressingMode) {
        self.registers.a = self.pop();
        self.registers.set_zn(self.registers.a);
    }

    pub(crate) fn sta(&mut self, mode: AddressingMode) {
        let addr = self.resolve(mode, false);
        self.write(addr, self.registers.a);
    }

    pub(crate) fn stx(&mut self, mode: AddressingMode) {
        let addr = self.resolve(mode, false);
        self.write(addr, self.registers.x);
    }

    pub(crate) fn sty(&mut self, mode: AddressingMode) {
        let addr = self.resolve(mode, false);
        self.write(addr, self.registers.y);
    }

    pub(crate) fn tax(&mut self, _: AddressingMode) {
        self.registers.x = self.registers.a;
        self.registers.set_zn(self.registers.x);
    }

    pub(crate) fn tay(&mut self, _: AddressingMode) {
        self.registers.y = self.registers.a;
        self.registers.set_zn(self.registers.y);
    }

    pub(crate) fn txa(&mut self, _: AddressingMode) {
        self.registers.a = self.registers.x;
        self.registers.set_zn(self.registers.a);
    }

    pub(crate) fn tya(&mut self, _: AddressingMode) {
        self.registers.a = self.registers.y;
        self.registers.set_zn(self.registers.a);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn page(addr: u16) -> u16 {
    addr & 0xFF00
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_with(program: &[u8]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(program, 0x0200).unwrap();
        cpu.registers_mut().pc = 0x0200;
        cpu
    }

    #[test]
    fn reset_loads_font() {
        let cpu = Cpu::new();
        assert_eq!(cpu.font_rom(), &FONT_ROM[..]);
        assert_eq!(cpu.state(), CpuState::Idle);
        assert_eq!(cpu.registers().sp, 0xFF);
        assert_eq!(cpu.video_memory().len(), 1000);
    }

    #[test]
    fn immediate_load_cycles() {
        let mut cpu = cpu_with(&[0xA9, 0x00, 0xA2, 0x80]);
        cpu.step();
        assert_eq!(cpu.registers().a, 0);
        assert!(cpu.registers().zero());
        assert_eq!(cpu.cycles(), 2);
        cpu.step();
        assert_eq!(cpu.registers().x, 0x80);
        assert!(cpu.registers().negative());
        assert_eq!(cpu.total_cycles(), 4);
        assert_eq!(cpu.registers().pc, 0x0204);
    }

    #[test]
    fn indexed_page_cross_penalty() {
        // LDA $02FF,X with X=1 crosses into page 3
        let mut cpu = cpu_with(&[0xBD, 0xFF, 0x02, 0x9D, 0xFF, 0x02]);
        cpu.registers_mut().x = 1;
        cpu.step();
        assert_eq!(cpu.cycles(), 5);
        // Stores never pay the penalty
        cpu.step();
        assert_eq!(cpu.cycles(), 5);
    }

    #[test]
    fn indirect_indexed() {
        // LDA ($10),Y
        let mut cpu = cpu_with(&[0xB1, 0x10]);
        cpu.poke(0x10, 0x00).unwrap();
        cpu.poke(0x11, 0x30).unwrap();
        cpu.poke(0x3005, 0x42).unwrap();
        cpu.registers_mut().y = 5;
        cpu.step();
        assert_eq!(cpu.registers().a, 0x42);
        assert_eq!(cpu.cycles(), 5);
    }

    #[test]
    fn indirect_pointer_wraps_in_zero_page() {
        let mut cpu = cpu_with(&[0xB1, 0xFF]);
        cpu.poke(0xFF, 0x34).unwrap();
        cpu.poke(0x00, 0x12).unwrap();
        cpu.poke(0x1234, 0x99).unwrap();
        cpu.step();
        assert_eq!(cpu.registers().a, 0x99);
    }

    #[test]
    fn stack_push_pull() {
        // LDA #$5A; PHA; LDA #0; PLA
        let mut cpu = cpu_with(&[0xA9, 0x5A, 0x48, 0xA9, 0x00, 0x68]);
        cpu.run_for(4);
        assert_eq!(cpu.registers().a, 0x5A);
        assert_eq!(cpu.registers().sp, 0xFF);
        assert_eq!(cpu.memory().read(0x01FF), Ok(0x5A));
    }

    #[test]
    fn taken_branch_cycles() {
        // BNE +2 (taken, same page)
        let mut cpu = cpu_with(&[0xD0, 0x02]);
        cpu.step();
        assert_eq!(cpu.registers().pc, 0x0204);
        assert_eq!(cpu.cycles(), 3);

        // BNE back across a page boundary
        let mut cpu = cpu_with(&[0xD0, 0xF0]);
        cpu.step();
        assert_eq!(cpu.registers().pc, 0x01F2);
        assert_eq!(cpu.cycles(), 4);
    }

    #[test]
    fn rom_is_read_only() {
        // STA $F000
        let mut cpu = cpu_with(&[0xA9, 0xFF, 0x8D, 0x00, 0xF0]);
        cpu.run_for(2);
        assert_eq!(cpu.memory().read(0xF000), Ok(FONT_ROM[0]));
        assert!(cpu.poke(0xF3FF, 1).is_err());
        assert!(matches!(
            cpu.load_program(&[0; 4], 0xEFFE),
            Err(MemoryError::RomOverlap { start: 0xEFFE, len: 4 })
        ));
        assert!(cpu.load_program(&[0; 4], 0xEFFC).is_ok());
        assert!(cpu.load_program(&[0; 4], 0xF400).is_ok());
    }

    #[test]
    fn run_for_counts_steps() {
        // JMP $0200
        let mut cpu = cpu_with(&[0x4C, 0x00, 0x02]);
        assert_eq!(cpu.run_for(10), 10);
        assert_eq!(cpu.state(), CpuState::Idle);
        assert_eq!(cpu.total_cycles(), 30);

        let mut cpu = cpu_with(&[0xEA, 0xEA, 0x02]);
        assert_eq!(cpu.run_for(10), 3);
        assert!(cpu.is_halted());
    }

    #[test]
    fn hook_can_stop() {
        let mut cpu = cpu_with(&[0xE8, 0xE8, 0xE8, 0xE8]);
        cpu.run_with(|cpu| {
            if cpu.registers().x == 2 {
                cpu.stop();
            }
        });
        assert_eq!(cpu.registers().x, 2);
        assert_eq!(cpu.registers().pc, 0x0202);
    }
}
