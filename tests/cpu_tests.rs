use rasm8::font::{FONT_ROM, FONT_ROM_START, VRAM_START};
use rasm8::registers::Flag;
use rasm8::{Cpu, CpuState, HaltReason, MemoryError};

/// CPU with `program` loaded at address 0 and PC pointing at it.
fn cpu_with(program: &[u8]) -> Cpu {
    let mut cpu = Cpu::new();
    cpu.load_program(program, 0).unwrap();
    cpu
}

fn adc(a: u8, m: u8, carry: bool) -> Cpu {
    let mut cpu = cpu_with(&[0x69, m]);
    cpu.registers_mut().a = a;
    cpu.registers_mut().set_flag(Flag::Carry, carry);
    cpu.step();
    cpu
}

#[test]
fn adc_simple() {
    let cpu = adc(0x20, 0x10, false);
    let regs = cpu.registers();
    assert_eq!(regs.a, 0x30);
    assert!(!regs.carry());
    assert!(!regs.zero());
    assert!(!regs.negative());
    assert!(!regs.overflow());
}

#[test]
fn adc_carry_and_overflow() {
    let cpu = adc(0x80, 0x80, false);
    let regs = cpu.registers();
    assert_eq!(regs.a, 0x00);
    assert!(regs.carry());
    assert!(regs.zero());
    assert!(!regs.negative());
    assert!(regs.overflow());
}

#[test]
fn adc_signed_overflow() {
    let cpu = adc(0x01, 0x7F, false);
    let regs = cpu.registers();
    assert_eq!(regs.a, 0x80);
    assert!(!regs.carry());
    assert!(regs.negative());
    assert!(regs.overflow());
}

#[test]
fn adc_carry_in() {
    let cpu = adc(0xFF, 0x00, true);
    let regs = cpu.registers();
    assert_eq!(regs.a, 0x00);
    assert!(regs.carry());
    assert!(regs.zero());
    assert!(!regs.overflow());
}

#[test]
fn cpy_less_than() {
    let mut cpu = cpu_with(&[0xC0, 0x80]);
    cpu.registers_mut().y = 0x10;
    cpu.step();
    let regs = cpu.registers();
    assert!(!regs.zero());
    assert!(regs.negative());
    assert!(!regs.carry());
    assert_eq!(regs.y, 0x10);
}

#[test]
fn cmp_equal_and_greater() {
    let mut cpu = cpu_with(&[0xC9, 0x42, 0xC9, 0x01]);
    cpu.registers_mut().a = 0x42;
    cpu.step();
    assert!(cpu.registers().zero());
    assert!(cpu.registers().carry());
    assert!(!cpu.registers().negative());
    cpu.step();
    assert!(!cpu.registers().zero());
    assert!(cpu.registers().carry());
}

#[test]
fn cpx_zero_page() {
    let mut cpu = cpu_with(&[0xE4, 0x80]);
    cpu.poke(0x80, 0x05).unwrap();
    cpu.registers_mut().x = 0x05;
    cpu.step();
    assert!(cpu.registers().zero());
    assert_eq!(cpu.cycles(), 3);
}

#[test]
fn jsr_and_rts() {
    let mut cpu = cpu_with(&[0x20, 0x34, 0x12]);
    cpu.poke(0x1234, 0x60).unwrap();

    cpu.step();
    assert_eq!(cpu.registers().pc, 0x1234);
    assert_eq!(cpu.registers().sp, 0xFD);
    // Return address minus one, high byte pushed first
    assert_eq!(cpu.memory().read(0x01FF), Ok(0x00));
    assert_eq!(cpu.memory().read(0x01FE), Ok(0x02));
    assert_eq!(cpu.cycles(), 6);

    cpu.step();
    assert_eq!(cpu.registers().pc, 0x0003);
    assert_eq!(cpu.registers().sp, 0xFF);
    assert_eq!(cpu.cycles(), 6);
}

#[test]
fn beq_forward_limit() {
    let mut cpu = cpu_with(&[0xF0, 0x7F]);
    cpu.registers_mut().set_flag(Flag::Zero, true);
    cpu.step();
    assert_eq!(cpu.registers().pc, 0x0081);
}

#[test]
fn beq_backward_wraps() {
    let mut cpu = cpu_with(&[0xF0, 0x80]);
    cpu.registers_mut().set_flag(Flag::Zero, true);
    cpu.step();
    assert_eq!(cpu.registers().pc, 0xFF82);
    // Taken and crossed a page
    assert_eq!(cpu.cycles(), 4);
}

#[test]
fn branch_not_taken() {
    let mut cpu = cpu_with(&[0xF0, 0x10]);
    cpu.step();
    assert_eq!(cpu.registers().pc, 0x0002);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn every_branch_condition() {
    // (opcode, flag, branches when flag is set)
    let cases = [
        (0x90, Flag::Carry, false),
        (0xB0, Flag::Carry, true),
        (0xF0, Flag::Zero, true),
        (0xD0, Flag::Zero, false),
        (0x30, Flag::Negative, true),
        (0x10, Flag::Negative, false),
        (0x50, Flag::Overflow, false),
        (0x70, Flag::Overflow, true),
    ];
    for (opcode, flag, when_set) in cases {
        for set in [false, true] {
            let mut cpu = cpu_with(&[opcode, 0x10]);
            cpu.registers_mut().set_flag(flag, set);
            cpu.step();
            let expected = if set == when_set { 0x12 } else { 0x02 };
            assert_eq!(
                cpu.registers().pc,
                expected,
                "opcode {opcode:#04x} with {flag:?}={set}"
            );
        }
    }
}

#[test]
fn unknown_opcode_halts() {
    let mut cpu = cpu_with(&[0xEA, 0x02, 0xEA]);
    cpu.step();
    cpu.step();
    let halted = CpuState::Halted(HaltReason::UnknownOpcode {
        opcode: 0x02,
        address: 0x0001,
    });
    assert_eq!(cpu.state(), halted);
    assert_eq!(cpu.registers().pc, 0x0002);

    // Halted CPUs stay put
    cpu.step();
    assert_eq!(cpu.registers().pc, 0x0002);
    cpu.run();
    assert_eq!(cpu.state(), halted);
    assert_eq!(cpu.run_for(10), 0);
}

#[test]
fn reset_clears_everything_but_font() {
    let mut cpu = cpu_with(&[0xA9, 0x05, 0x85, 0x10, 0x02]);
    cpu.run();
    assert!(cpu.is_halted());
    assert_eq!(cpu.memory().read(0x10), Ok(0x05));

    cpu.reset();
    assert_eq!(cpu.state(), CpuState::Idle);
    assert_eq!(cpu.registers().a, 0);
    assert_eq!(cpu.registers().pc, 0);
    assert_eq!(cpu.registers().status(), 0b0010_0100);
    assert_eq!(cpu.total_cycles(), 0);
    assert_eq!(cpu.memory().read(0x10), Ok(0));
    assert_eq!(cpu.font_rom(), &FONT_ROM[..]);
}

#[test]
fn font_rom_is_immutable() {
    // LDA #$FF; STA $F000; STA $F3FF,X (X=0); INC $F001
    let mut cpu = cpu_with(&[
        0xA9, 0xFF, 0x8D, 0x00, 0xF0, 0x9D, 0xFF, 0xF3, 0xEE, 0x01, 0xF0, 0x02,
    ]);
    cpu.run();
    assert!(cpu.is_halted());
    assert_eq!(cpu.font_rom(), &FONT_ROM[..]);

    assert_eq!(
        cpu.poke(FONT_ROM_START, 0),
        Err(MemoryError::RomOverlap {
            start: FONT_ROM_START as usize,
            len: 1
        })
    );
    assert!(cpu.load_program(&[1, 2, 3], 0xF3FE).is_err());
    assert_eq!(cpu.font_rom(), &FONT_ROM[..]);
}

#[test]
fn loads_past_end_of_memory_are_rejected() {
    let mut cpu = Cpu::new();
    let res = cpu.load_program(&[0xEA; 4], 0xFFFE);
    assert!(matches!(res, Err(MemoryError::CapacityExceeded { .. })));
    assert_eq!(cpu.memory().read(0xFFFE), Ok(0));
}

#[test]
fn stack_pointer_wraps() {
    // PHA with SP at the bottom of the stack page
    let mut cpu = cpu_with(&[0x48, 0x68]);
    cpu.registers_mut().a = 0x99;
    cpu.registers_mut().sp = 0x00;
    cpu.step();
    assert_eq!(cpu.memory().read(0x0100), Ok(0x99));
    assert_eq!(cpu.registers().sp, 0xFF);
    cpu.registers_mut().a = 0;
    cpu.step();
    assert_eq!(cpu.registers().a, 0x99);
    assert_eq!(cpu.registers().sp, 0x00);
    assert!(cpu.registers().negative());
}

#[test]
fn increments_wrap() {
    // INC $20; DEX; INY
    let mut cpu = cpu_with(&[0xE6, 0x20, 0xCA, 0xC8]);
    cpu.poke(0x20, 0xFF).unwrap();
    cpu.registers_mut().y = 0x7F;
    cpu.step();
    assert_eq!(cpu.memory().read(0x20), Ok(0x00));
    assert!(cpu.registers().zero());
    assert_eq!(cpu.cycles(), 5);
    cpu.step();
    assert_eq!(cpu.registers().x, 0xFF);
    assert!(cpu.registers().negative());
    cpu.step();
    assert_eq!(cpu.registers().y, 0x80);
    assert!(cpu.registers().negative());
}

#[test]
fn transfers_set_flags() {
    // TAX; TAY; LDX #0; TXA; LDY #$80; TYA
    let mut cpu = cpu_with(&[0xAA, 0xA8, 0xA2, 0x00, 0x8A, 0xA0, 0x80, 0x98]);
    cpu.registers_mut().a = 0x33;
    cpu.run_for(2);
    assert_eq!((cpu.registers().x, cpu.registers().y), (0x33, 0x33));
    cpu.run_for(2);
    assert_eq!(cpu.registers().a, 0);
    assert!(cpu.registers().zero());
    cpu.run_for(2);
    assert_eq!(cpu.registers().a, 0x80);
    assert!(cpu.registers().negative());
}

#[test]
fn flag_instructions() {
    let mut cpu = cpu_with(&[0x38, 0x18]);
    cpu.step();
    assert!(cpu.registers().carry());
    cpu.step();
    assert!(!cpu.registers().carry());
    assert!(cpu.registers().flag(Flag::Unused));
}

#[test]
fn stores_leave_flags_alone() {
    // STA $0400; STX $0401; STY $0402
    let mut cpu = cpu_with(&[0x8D, 0x00, 0x04, 0x8E, 0x01, 0x04, 0x8C, 0x02, 0x04]);
    cpu.registers_mut().a = 0;
    cpu.registers_mut().x = 0x80;
    cpu.registers_mut().y = b'C';
    let status = cpu.registers().status();
    cpu.run_for(3);
    assert_eq!(cpu.registers().status(), status);
    assert_eq!(&cpu.video_memory()[..3], &[0, 0x80, b'C']);
    assert_eq!(cpu.memory().read(VRAM_START as usize + 2), Ok(b'C'));
}

#[test]
fn absolute_y_and_indirect_cycles() {
    // LDA $10F0,Y; LDA ($40),Y
    let mut cpu = cpu_with(&[0xB9, 0xF0, 0x10, 0xB1, 0x40]);
    cpu.poke(0x40, 0xF0).unwrap();
    cpu.poke(0x41, 0x20).unwrap();
    cpu.poke(0x1100, 0x11).unwrap();
    cpu.poke(0x2100, 0x22).unwrap();
    cpu.registers_mut().y = 0x10;
    cpu.step();
    assert_eq!(cpu.registers().a, 0x11);
    assert_eq!(cpu.cycles(), 5);
    cpu.step();
    assert_eq!(cpu.registers().a, 0x22);
    assert_eq!(cpu.cycles(), 6);
}

#[test]
fn indexed_addresses_wrap() {
    // LDA $FFFF,X with X=2 reads $0001
    let mut cpu = cpu_with(&[0xBD, 0xFF, 0xFF]);
    cpu.registers_mut().x = 2;
    cpu.step();
    assert_eq!(cpu.registers().a, 0xFF);
}

#[test]
fn runs_counting_loop() {
    // LDX #5; loop: DEX; BNE loop; halt
    let mut cpu = cpu_with(&[0xA2, 0x05, 0xCA, 0xD0, 0xFD, 0x02]);
    cpu.run();
    assert_eq!(cpu.registers().x, 0);
    assert_eq!(
        cpu.state(),
        CpuState::Halted(HaltReason::UnknownOpcode {
            opcode: 0x02,
            address: 0x0005
        })
    );
    // LDX 2, 5 * DEX 2, 4 taken BNE 3, 1 untaken BNE 2, halt 1
    assert_eq!(cpu.total_cycles(), 2 + 10 + 12 + 2 + 1);
}

#[test]
fn assembled_program_runs() {
    let program = rasm8::assemble(
        "
        SCREEN = $0400
                .ORG $0200
                LDX #0
        loop:   LDA text,X
                BEQ done
                STA SCREEN,X
                INX
                BNE loop
        done:   .BYTE $02
        text:   .ASCIIZ \"OK\"
        ",
    )
    .unwrap();

    let mut cpu = Cpu::new();
    for (start, bytes) in program.segments() {
        cpu.load_program(&bytes, start).unwrap();
    }
    cpu.registers_mut().pc = program.origin().unwrap();
    cpu.run_for(1000);
    assert!(cpu.is_halted());
    assert_eq!(&cpu.video_memory()[..3], b"OK\0");
    assert_eq!(cpu.registers().x, 2);
}
