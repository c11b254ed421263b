use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, Result};
use simple_logger::SimpleLogger;

use rasm8::{output, Cpu, CpuState, Program};

/// Assembler and emulator for a compact 6502-style 8-bit computer.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a `.asm` file into a raw binary image
    Assemble {
        /// `.asm` file to assemble
        name: PathBuf,
        /// Destination for the binary
        dest: PathBuf,
    },
    /// Check a `.asm` file without outputting binary
    Check {
        /// File to check
        name: PathBuf,
        /// Print the symbol table
        #[arg(short, long)]
        symbols: bool,
    },
    /// Run a `.asm` file or a raw binary and print the final machine state
    Run {
        /// `.asm` file or binary image to run
        name: PathBuf,
        /// Address a binary image is loaded at
        #[arg(short, long, value_parser = parse_address, default_value = "0")]
        load_address: u16,
        /// Address execution starts at; defaults to the program origin
        #[arg(short, long, value_parser = parse_address)]
        start: Option<u16>,
        /// Maximum number of instructions to execute
        #[arg(long)]
        max_steps: Option<usize>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Print video memory as text after the run
        #[arg(long)]
        screen: bool,
    },
}

fn main() -> Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
        .into_diagnostic()?;
    rasm8::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(rasm8::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    match args.command {
        Command::Assemble { name, dest } => {
            file_message(Green, "Assembling", &name);
            let program = assemble(&name)?;
            let binary = program.to_binary();
            fs::write(&dest, &binary).into_diagnostic()?;
            message(Green, "Finished", &format!("emit {} bytes", binary.len()));
            file_message(Green, "Saved", &dest);
            Ok(())
        }
        Command::Check { name, symbols } => {
            file_message(Green, "Checking", &name);
            let program = assemble(&name)?;
            if symbols {
                print!("{}", output::symbols(program.symbols()));
            }
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Run {
            name,
            load_address,
            start,
            max_steps,
            minimal,
            screen,
        } => {
            let mut cpu = Cpu::new();
            cpu.set_trace(rasm8::env::is_trace_enabled());

            let origin = if is_source(&name) {
                if !minimal {
                    file_message(Green, "Assembling", &name);
                }
                let program = assemble(&name)?;
                load_program(&mut cpu, &program)?
            } else {
                let binary = fs::read(&name).into_diagnostic()?;
                cpu.load_program(&binary, load_address)?;
                load_address
            };
            cpu.registers_mut().pc = start.unwrap_or(origin);

            let max_steps = max_steps.unwrap_or_else(rasm8::env::max_steps);
            if !minimal {
                message(Green, "Running", &format!("from ${:04X}", cpu.registers().pc));
            }
            let steps = cpu.run_for(max_steps);

            match cpu.state() {
                CpuState::Halted(reason) if !minimal => {
                    message(Cyan, "Halted", &format!("{reason} after {steps} steps"))
                }
                CpuState::Halted(_) => {}
                _ => message(Red, "Stopped", &format!("step limit of {max_steps} reached")),
            }
            print!("{}", output::registers(&cpu, minimal));
            if !minimal {
                message(
                    Cyan,
                    "Cycles",
                    &format!("{} total, {} last", cpu.total_cycles(), cpu.cycles()),
                );
            }
            if screen {
                print!("{}", output::screen(cpu.video_memory()));
            }
            Ok(())
        }
    }
}

enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn is_source(name: &Path) -> bool {
    name.extension().is_some_and(|ext| ext == "asm")
}

/// Assemble a source file, rendering every error against it on failure.
fn assemble(name: &Path) -> Result<Program> {
    let src = fs::read_to_string(name).into_diagnostic()?;
    let program = rasm8::assemble_named(&name.display().to_string(), &src)?;
    if !program.overlaps().is_empty() {
        log::warn!(
            "{} address(es) were written more than once",
            program.overlaps().len()
        );
    }
    Ok(program)
}

/// Load every assembled segment at its own address, returning the origin.
fn load_program(cpu: &mut Cpu, program: &Program) -> Result<u16> {
    let Some(origin) = program.origin() else {
        bail!("program is empty, nothing to run");
    };
    for (start, bytes) in program.segments() {
        cpu.load_program(&bytes, start)?;
    }
    Ok(origin)
}

fn parse_address(s: &str) -> std::result::Result<u16, String> {
    let (digits, radix) = match s.strip_prefix('$').or_else(|| s.strip_prefix("0x")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    u16::from_str_radix(digits, radix).map_err(|err| format!("invalid address `{s}`: {err}"))
}
