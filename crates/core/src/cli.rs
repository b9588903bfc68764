use clap::Parser;

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ss", about = "A bytecode interpreter for the ss scripting language")]
pub struct Cli {
    /// Script to compile and run; starts a REPL when omitted
    pub file: Option<PathBuf>,

    /// Disassemble the compiled chunk instead of running it
    #[arg(short, long)]
    pub disassemble: bool,
}
