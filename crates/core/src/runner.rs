use ss_bytecode::chunk::Chunk;
use ss_bytecode::compiler;
use ss_bytecode::disassembler;
use ss_bytecode::value::{NativeFunction, Value};

use ss_errors::SsError;

use ss_vm::config::VmConfig;
use ss_vm::VirtualMachine;

use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A machine with the host natives installed.
pub fn new_vm(config: VmConfig) -> VirtualMachine {
    let mut vm = VirtualMachine::new(config);

    vm.set_global(
        "clock",
        Value::Native(Rc::new(NativeFunction {
            name: "clock".to_owned(),
            arity: 0,
            function: Box::new(|_| {
                let seconds = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|elapsed| elapsed.as_secs_f64())
                    .unwrap_or(0.0);

                Value::Number(seconds)
            }),
        })),
    );

    vm
}

pub fn run_file(vm: &mut VirtualMachine, file_path: &Path) -> i32 {
    match vm.run_file(file_path) {
        Ok(Value::Number(number)) => {
            let message = format!("got {}", Value::Number(number));
            vm.config_mut().write_line(message);

            number as i32
        }

        Ok(_) => 0,

        Err(err @ SsError::Compile { .. }) => {
            let message = format!("compile error: {}", err);
            vm.config_mut().write_line(message);

            1
        }

        Err(err) => {
            let message = format!("runtime error: {}", err);
            vm.config_mut().write_line(message);

            1
        }
    }
}

pub fn disassemble_file(file_path: &Path) -> i32 {
    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,

        Err(err) => {
            println!("unable to read '{}': {}", file_path.display(), err);

            return 1;
        }
    };

    let mut chunk = Chunk::new();

    match compiler::compile(&source, &mut chunk, file_path) {
        Ok(()) => {
            println!(
                "{}",
                disassembler::disassemble(&file_path.to_string_lossy(), &chunk)
            );

            0
        }

        Err(err) => {
            println!("compile error: {}", err);

            1
        }
    }
}
