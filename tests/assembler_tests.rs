use rasm8::opcodes::{self, AddressingMode, Mnemonic};
use rasm8::symbol::SymbolKind;
use rasm8::{assemble, AsmError, Pass, Program};

fn bytes(src: &str) -> Vec<u8> {
    assemble(src).unwrap().to_binary()
}

#[test]
fn assembling_twice_is_identical() {
    let src = include_str!("files/hello.asm");
    let first = assemble(src).unwrap();
    let second = assemble(src).unwrap();
    assert_eq!(first.to_binary(), second.to_binary());
    assert_eq!(first.segments(), second.segments());
}

#[test]
fn forward_branch() {
    assert_eq!(
        bytes("BEQ skip\nNOP\nskip: NOP"),
        vec![0xF0, 0x01, 0xEA, 0xEA]
    );
}

#[test]
fn backward_branch() {
    assert_eq!(bytes("loop: DEX\nBNE loop"), vec![0xCA, 0xD0, 0xFD]);
}

#[test]
fn branch_limits() {
    let src = format!("BNE far\n.ORG {}\nfar: NOP", 2 + 127);
    assert_eq!(assemble(&src).unwrap().get(1), Some(0x7F));

    let src = format!("BNE far\n.ORG {}\nfar: NOP", 2 + 128);
    let err = assemble(&src).unwrap_err();
    assert_eq!(err.pass, Pass::CodeGen);
    assert!(matches!(
        err.errors(),
        [AsmError::BranchOutOfRange { offset: 128, line: 1, .. }]
    ));
}

#[test]
fn data_directives() {
    let program = assemble(
        ".ORG $10\n\
         .BYTE 1, $FF, %101, 'A', \"hi\"\n\
         .WORD $1234, end\n\
         .ASCIIZ \"ok\\n\"\n\
         end:",
    )
    .unwrap();
    let data: Vec<u8> = program.segments().into_iter().flat_map(|(_, b)| b).collect();
    assert_eq!(program.origin(), Some(0x10));
    assert_eq!(
        data,
        vec![
            1, 0xFF, 0b101, b'A', b'h', b'i', //
            0x34, 0x12, 0x1E, 0x00, //
            b'o', b'k', b'\n', 0
        ]
    );
    assert_eq!(program.symbols().value("END"), Some(0x1E));
}

#[test]
fn low_and_high_byte_operators() {
    assert_eq!(bytes("LDA #<$0400"), vec![0xA9, 0x00]);
    assert_eq!(bytes("LDA #>$0400"), vec![0xA9, 0x04]);
    assert_eq!(
        bytes("VEC = $1234\nLDX #<VEC\nLDY #>VEC"),
        vec![0xA2, 0x34, 0xA0, 0x12]
    );
}

#[test]
fn expressions() {
    assert_eq!(
        bytes("BASE = $0400\nSTA BASE+41\nLDA #-1"),
        vec![0x8D, 0x29, 0x04, 0xA9, 0xFF]
    );
}

#[test]
fn org_leaves_zero_gap() {
    let program = assemble(".ORG $0003\nNOP").unwrap();
    assert_eq!(program.to_binary(), vec![0, 0, 0, 0xEA]);
    assert_eq!(program.segments(), vec![(3, vec![0xEA])]);
    assert_eq!(program.get(0), None);
}

#[test]
fn zero_page_selection() {
    // Known small values use zero page, forward references stay absolute
    assert_eq!(
        bytes("PTR = $20\nLDA PTR\nLDA later\nlater: NOP"),
        vec![0xA5, 0x20, 0xAD, 0x05, 0x00, 0xEA]
    );
    // JMP has no zero page form
    assert_eq!(bytes("JMP $0010"), vec![0x4C, 0x10, 0x00]);
}

#[test]
fn indexed_and_indirect() {
    assert_eq!(
        bytes("LDA $0400,X\nSTA $0500,Y\nLDA ($40),Y"),
        vec![0xBD, 0x00, 0x04, 0x99, 0x00, 0x05, 0xB1, 0x40]
    );
}

#[test]
fn symbol_errors_block_code_generation() {
    let err = assemble(include_str!("files/bad.asm")).unwrap_err();
    assert_eq!(err.pass, Pass::Symbols);
    let errors = err.errors();
    assert_eq!(errors.len(), 2);
    assert!(matches!(
        &errors[0],
        AsmError::DuplicateSymbol { name, line: 2, .. } if name == "START"
    ));
    assert!(matches!(
        &errors[1],
        AsmError::UnknownInstruction { text, line: 3, .. } if text.contains("FOO")
    ));
}

#[test]
fn undefined_symbol_in_code_generation() {
    let err = assemble("NOP\nJMP nowhere").unwrap_err();
    assert_eq!(err.pass, Pass::CodeGen);
    assert!(matches!(
        err.errors(),
        [AsmError::UndefinedSymbol { name, line: 2, .. }] if name == "NOWHERE"
    ));
    assert_eq!(err.errors()[0].line(), 2);
}

#[test]
fn errors_point_into_source() {
    let src = "NOP\nLDA #1\nBOGUS";
    let err = assemble(src).unwrap_err();
    let span = err.errors()[0].span();
    assert_eq!(&src[span.offset()..span.offset() + span.len()], "BOGUS");
}

#[test]
fn overlapping_origins_last_wins() {
    let program: Program = assemble(".ORG $10\nNOP\nNOP\n.ORG $11\nINX").unwrap();
    assert_eq!(program.get(0x10), Some(0xEA));
    assert_eq!(program.get(0x11), Some(0xE8));
    assert_eq!(program.overlaps(), &[0x11]);
}

#[test]
fn symbols_sorted_by_value() {
    let program = assemble(include_str!("files/hello.asm")).unwrap();
    let listing: Vec<(&str, i64, SymbolKind)> = program
        .symbols()
        .iter()
        .map(|(name, sym)| (name, sym.value, sym.kind))
        .collect();
    assert_eq!(
        listing,
        [
            ("START", 0x0200, SymbolKind::Label),
            ("LOOP", 0x0202, SymbolKind::Label),
            ("DONE", 0x020E, SymbolKind::Label),
            ("MESSAGE", 0x020F, SymbolKind::Label),
            ("SCREEN", 0x0400, SymbolKind::Constant),
        ]
    );
}

#[test]
fn case_insensitive() {
    assert_eq!(
        bytes("Start: lda #$0a\n  bne START\n  .byte 1"),
        bytes("START: LDA #$0A\n  BNE start\n  .BYTE 1"),
    );
}

#[test]
fn every_encodable_instruction_executes() {
    // Each mnemonic and mode the assembler can emit must decode back to itself
    for mnemonic in Mnemonic::ALL {
        for mode in [
            AddressingMode::Implied,
            AddressingMode::Immediate,
            AddressingMode::ZeroPage,
            AddressingMode::Absolute,
            AddressingMode::AbsoluteX,
            AddressingMode::AbsoluteY,
            AddressingMode::IndirectY,
            AddressingMode::Relative,
        ] {
            if let Some(opcode) = opcodes::opcode_for(mnemonic, mode) {
                let instr = opcodes::lookup(opcode).unwrap();
                assert_eq!((instr.mnemonic, instr.mode), (mnemonic, mode));
            }
        }
    }
}
