use clap::Parser;
use color_eyre::Result;
use facet_pretty::FacetPretty;
use fed9u_board::{info::FedInfo, opcodes};
use fed9u_io::{
    Access, Controller, Register, SpaceHex, Target,
    bits,
    codec::{self, HEADER_BITS},
    fake_backend::FakeFed,
    units::Bits,
};
use strum::VariantArray;

use crate::cli_helpers::{OpcodeArg, TargetArg, Word, parse_value};

mod cli_helpers;

#[derive(clap::Parser)]
struct Args {
    #[command(flatten)]
    global: GlobalOpts,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Args)]
struct GlobalOpts {
    /// Print every bus transaction of the simulated board
    #[arg(long, global = true)]
    log: bool,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Build the words of a serial command without sending it
    Encode(Encode),
    /// Split serial command words into header fields and payload
    Decode(Decode),
    /// Undo the extra clocked bit of a raw serial read
    Reassemble(Reassemble),
    /// List every opcode and register
    List,
    /// Write to the simulated board, then read the value back. Broadcast
    /// writes are read back from fe0.
    Write(Write),
    /// Read from the simulated board
    Read(Read),
    /// Read a snapshot of the whole simulated board
    Info,
}

#[derive(clap::Args)]
struct Encode {
    op: OpcodeArg,
    target: TargetArg,
    /// Elements, decimal or 0x-prefixed hex. Omit to build a read header.
    #[arg(value_parser = parse_value)]
    args: Vec<u32>,
}

#[derive(clap::Args)]
struct Decode {
    /// Clocked length: header plus payload, plus one for reads
    len: u32,
    words: Vec<Word>,
    #[arg(long)]
    right_align: bool,
}

#[derive(clap::Args)]
struct Reassemble {
    /// Data bits, not counting the extra bit
    len: u32,
    words: Vec<Word>,
}

#[derive(clap::Args)]
struct Write {
    op: OpcodeArg,
    target: TargetArg,
    #[arg(value_parser = parse_value, required = true)]
    args: Vec<u32>,
}

#[derive(clap::Args)]
struct Read {
    op: OpcodeArg,
    target: TargetArg,
    /// Stream the board returns, in place of zeros
    #[arg(long, num_args = 1..)]
    respond: Vec<Word>,
}

fn main() -> Result<()> {
    init_logging()?;
    let Args { global, command } = Args::parse();

    let mut cont = Controller::new(FakeFed::new());
    let result = run(command, &mut cont);
    if global.log {
        print!("{}", cont.backend_mut().consume_log());
    }
    result
}

fn run(command: CliCommand, cont: &mut Controller<FakeFed>) -> Result<()> {
    match command {
        // no board
        CliCommand::Encode(args) => encode(args)?,
        CliCommand::Decode(args) => decode(args)?,
        CliCommand::Reassemble(args) => reassemble(args)?,
        CliCommand::List => list(),

        // simulated board
        CliCommand::Write(args) => {
            let OpcodeArg(op) = args.op;
            let target = args.target.0;
            cont.write(op, target, &args.args)?;
            if op.access != Access::WriteOnly {
                let target = match target {
                    Target::AllFe => Target::fe(0)?,
                    target => target,
                };
                let values = cont.read(op, target)?;
                println!("{}", values_line(&values));
            }
        }
        CliCommand::Read(args) => {
            let OpcodeArg(op) = args.op;
            if !args.respond.is_empty() {
                let stream = args.respond.iter().map(|w| w.0).collect();
                cont.backend_mut()
                    .respond(args.target.0, op.designator, stream);
            }
            let values = cont.read(op, args.target.0)?;
            println!("{}", values_line(&values));
        }
        CliCommand::Info => {
            let info: FedInfo = fed9u_board::read(cont)?;
            println!("{}", info.pretty());
        }
    }

    Ok(())
}

fn encode(args: Encode) -> Result<()> {
    let OpcodeArg(op) = args.op;
    let command = if args.args.is_empty() {
        op.read(args.target.0)?
    } else {
        op.write(args.target.0, &args.args)?
    };
    println!("{}", SpaceHex(&command.words));
    println!(
        "{} clocked, {}",
        command.len,
        if command.right_align { "right-aligned" } else { "left-aligned" }
    );
    Ok(())
}

fn decode(args: Decode) -> Result<()> {
    let words: Vec<u32> = args.words.iter().map(|w| w.0).collect();
    let decoded = codec::decode(&words, Bits(args.len), args.right_align)?;
    println!("    target: {}", decoded.target);
    println!("      read: {}", decoded.read);
    println!("designator: {}", decoded.designator);
    println!("   payload: {} ({})", SpaceHex(&decoded.payload), decoded.len);
    if let Some(op) = opcodes::ALL
        .iter()
        .find(|op| op.unit == decoded.target.unit() && op.designator == decoded.designator)
    {
        println!("    opcode: {}", op.name);
    }
    Ok(())
}

fn reassemble(args: Reassemble) -> Result<()> {
    let len = Bits(args.len);
    let raw: Vec<u32> = args.words.iter().map(|w| w.0).collect();
    let words = bits::reassemble(&raw, len)?;
    println!("reassembled: {}", SpaceHex(&words));
    let stream = bits::left_align_tail(words, len);
    println!("     stream: {}", SpaceHex(&stream));
    Ok(())
}

fn list() {
    println!("{:<22} {:>3} {:>5} {:>4} {:>10}  access", "opcode", "des", "bits", "n", "max");
    for op in opcodes::ALL {
        let access = match op.access {
            Access::ReadWrite => "rw",
            Access::ReadOnly => "r",
            Access::WriteOnly => "w",
        };
        println!(
            "{:<22} {:>3} {:>5} {:>4} {:>#10x}  {access}",
            op.name, op.designator, op.bits.0, op.count, op.max
        );
    }
    println!();
    for reg in Register::VARIANTS {
        println!("{:<22} {:#06x}", reg.to_string(), reg.address());
    }
    println!();
    println!("header: {HEADER_BITS} bits, payload up to {}", codec::MAX_PAYLOAD);
}

fn values_line(values: &[u32]) -> String {
    match values {
        [value] => format!("{value:#x}"),
        values => format!("[{}] {}", values.len(), SpaceHex(values)),
    }
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .with(tracing_error::ErrorLayer::default())
        .init();
    color_eyre::install()?;
    Ok(())
}
