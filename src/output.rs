use std::fmt::Write;

use crate::font::SCREEN_COLUMNS;
use crate::registers::Registers;
use crate::symbol::SymbolTable;
use crate::Cpu;

/// Register dump shown after a run. `minimal` output is plain `NAME value` lines, suited for
/// blackbox tests.
pub fn registers(cpu: &Cpu, minimal: bool) -> String {
    let regs = cpu.registers();
    let mut out = String::new();
    if minimal {
        for (name, value) in byte_registers(regs) {
            let _ = writeln!(out, "{name} {value}");
        }
        let _ = writeln!(out, "PC {}", regs.pc);
        let _ = writeln!(out, "P {:08b}", regs.status());
        let _ = writeln!(out, "CYCLES {}", cpu.total_cycles());
        return out;
    }

    out.push_str("\x1b[2m┌────────────────────────────────────┐\x1b[0m\n");
    out.push_str("\x1b[2m│        \x1b[3mhex   uint   int   char\x1b[0m\x1b[2m      │\x1b[0m\n");
    for (name, value) in byte_registers(regs) {
        let _ = writeln!(
            out,
            "\x1b[2m│\x1b[0m \x1b[1m{name:<2}\x1b[0m    0x{value:02x}  {value:>4}  {:>4}   {}       \x1b[2m│\x1b[0m",
            value as i8,
            char_display(value),
        );
    }
    let _ = writeln!(
        out,
        "\x1b[2m│\x1b[0m \x1b[1mPC\x1b[0m  0x{:04x}      \x1b[1mP\x1b[0m  {}  \x1b[2m│\x1b[0m",
        regs.pc,
        flags(regs),
    );
    out.push_str("\x1b[2m└────────────────────────────────────┘\x1b[0m\n");
    out
}

fn byte_registers(regs: &Registers) -> [(&'static str, u8); 4] {
    [("A", regs.a), ("X", regs.x), ("Y", regs.y), ("SP", regs.sp)]
}

/// Status byte as `NV-BDIZC`, clear flags shown as `.`
pub fn flags(regs: &Registers) -> String {
    const NAMES: [char; 8] = ['N', 'V', '-', 'B', 'D', 'I', 'Z', 'C'];
    let status = regs.status();
    NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if status & (0x80 >> i) != 0 {
                *name
            } else {
                '.'
            }
        })
        .collect()
}

/// Always three characters wide.
fn char_display(value: u8) -> String {
    match value {
        // ASCII control characters which are arbitrarily considered significant
        0x00 => "NUL".into(),
        0x08 => "BS ".into(),
        0x09 => "HT ".into(),
        0x0a => "LF ".into(),
        0x0d => "CR ".into(),
        0x1b => "ESC".into(),
        0x7f => "DEL".into(),
        0x20 => "[_]".into(),
        0x21..=0x7e => format!("{:<3}", value as char),
        0x00..=0x7f => "\x1b[2m───\x1b[0m".into(),
        0x80.. => "\x1b[2m┄┄┄\x1b[0m".into(),
    }
}

/// Video memory as text, one line per screen row. Unprintable codes show as `.` and trailing
/// blanks are trimmed.
pub fn screen(video: &[u8]) -> String {
    let mut out = String::with_capacity(video.len() + video.len() / SCREEN_COLUMNS);
    for row in video.chunks(SCREEN_COLUMNS) {
        let line: String = row
            .iter()
            .map(|&code| match code {
                0 => ' ',
                0x20..=0x7e => code as char,
                _ => '.',
            })
            .collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Symbol table listing in table order.
pub fn symbols(table: &SymbolTable) -> String {
    let mut out = String::new();
    for (name, sym) in table.iter() {
        let _ = writeln!(out, "{:>6}  {name:<16} {}", format!("${:04X}", sym.value), sym.kind);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolKind;

    #[test]
    fn minimal_registers() {
        let mut cpu = Cpu::new();
        cpu.registers_mut().a = 0x42;
        cpu.registers_mut().pc = 0x0203;
        let out = registers(&cpu, true);
        assert_eq!(
            out,
            "A 66\nX 0\nY 0\nSP 255\nPC 515\nP 00100100\nCYCLES 0\n"
        );
    }

    #[test]
    fn boxed_registers_mention_everything() {
        let cpu = Cpu::new();
        let out = registers(&cpu, false);
        assert!(out.contains("0x00"));
        assert!(out.contains("0xff"));
        assert!(out.contains("..-..I.."));
    }

    #[test]
    fn screen_rows() {
        let mut video = vec![0u8; 80];
        video[..2].copy_from_slice(b"HI");
        video[41] = 0x01;
        let out = screen(&video);
        assert_eq!(out, "HI\n .\n");
    }

    #[test]
    fn symbol_listing() {
        let mut table = SymbolTable::new();
        table.add_symbol("START", 0x200, SymbolKind::Label, 1).unwrap();
        let out = symbols(&table);
        assert!(out.contains("$0200"));
        assert!(out.contains("START"));
        assert!(out.contains("label"));
    }

    #[test]
    fn char_display_width() {
        assert_eq!(char_display(b'A'), "A  ");
        assert_eq!(char_display(0), "NUL");
        assert_eq!(char_display(b' '), "[_]");
    }
}
