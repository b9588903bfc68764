use ss_core::cli::Cli;
use ss_core::{repl, runner};

use ss_vm::config::VmConfig;

use clap::Parser;

use std::process::exit;

fn main() {
    env_logger::init();

    let arguments = Cli::parse();

    let code = match &arguments.file {
        Some(file) if arguments.disassemble => runner::disassemble_file(file),

        Some(file) => {
            let mut vm = runner::new_vm(VmConfig::basic());

            runner::run_file(&mut vm, file)
        }

        None => repl::start(VmConfig::basic()),
    };

    exit(code);
}
