use crate::runner;

use ss_errors::SsError;

use ss_vm::config::VmConfig;
use ss_vm::VirtualMachine;

pub fn start(config: VmConfig) -> i32 {
    let mut vm = runner::new_vm(config);

    run(&mut vm)
}

/// One line per iteration; globals persist, the line number advances only
/// after a successful line. End of input terminates.
pub fn run(vm: &mut VirtualMachine) -> i32 {
    let mut line_number: usize = 1;

    loop {
        let prompt = format!("ss(main):{}> ", line_number);
        vm.config_mut().write(prompt);

        let Some(line) = vm.config_mut().read_line() else {
            break;
        };

        match vm.run_line(&line) {
            Ok(_) => line_number += 1,

            Err(err @ SsError::Compile { .. }) => {
                let message = format!("compile error: {}", err);
                vm.config_mut().write_line(message);
            }

            Err(err) => {
                let message = format!("runtime error: {}", err);
                vm.config_mut().write_line(message);
            }
        }
    }

    0
}
