use ss_core::{repl, runner};

use ss_vm::config::{SharedBuffer, VmConfig};
use ss_vm::VirtualMachine;

use std::env;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

fn scripted_vm(input: &str) -> (VirtualMachine, SharedBuffer) {
    let output = SharedBuffer::new();
    let config = VmConfig::new(
        Box::new(Cursor::new(input.to_owned())),
        Box::new(output.clone()),
    );

    (runner::new_vm(config), output)
}

#[test]
fn the_prompt_carries_the_line_number() {
    let (mut vm, output) = scripted_vm("print 1;\nprint 2;\n");

    assert_eq!(repl::run(&mut vm), 0);

    let output = output.contents();

    assert!(output.contains("ss(main):1> "), "{output}");
    assert!(output.contains("ss(main):2> "), "{output}");
    assert!(output.contains("ss(main):3> "), "{output}");
}

#[test]
fn globals_persist_between_lines() {
    let (mut vm, output) = scripted_vm("let x = 2;\nprint x * 21;\n");

    repl::run(&mut vm);

    assert!(output.contents().contains("42\n"));
}

#[test]
fn a_compile_error_is_reported_and_the_loop_continues() {
    let (mut vm, output) = scripted_vm("print ;\nprint 1;\n");

    repl::run(&mut vm);

    let output = output.contents();

    assert!(output.contains("compile error: 1:7 -> expected an expression"), "{output}");
    assert!(output.contains("1\n"), "{output}");
}

#[test]
fn a_failed_line_does_not_advance_the_line_number() {
    let (mut vm, output) = scripted_vm("print missing;\nprint 1;\n");

    repl::run(&mut vm);

    let output = output.contents();

    assert!(output.contains("runtime error: variable 'missing' is undefined"), "{output}");

    // the second prompt repeats line 1, the third is line 2
    assert_eq!(output.matches("ss(main):1> ").count(), 2, "{output}");
    assert!(output.contains("ss(main):2> "), "{output}");
}

#[test]
fn the_clock_native_is_predefined() {
    let (mut vm, output) = scripted_vm("print clock() > 0;\n");

    repl::run(&mut vm);

    assert!(output.contents().contains("true\n"));
}

fn temp_script(name: &str, contents: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("ss-core-tests-{}", std::process::id()));

    fs::create_dir_all(&dir).unwrap();

    let path = dir.join(name);

    fs::write(&path, contents).unwrap();

    path
}

#[test]
fn running_a_file_exits_zero_on_success() {
    let script = temp_script("ok.ss", "let x = 1;\nprint x;\n");

    let (mut vm, output) = scripted_vm("");

    assert_eq!(runner::run_file(&mut vm, &script), 0);
    assert_eq!(output.contents(), "1\n");
}

#[test]
fn running_a_broken_file_reports_a_compile_error() {
    let script = temp_script("broken.ss", "let = 1;\n");

    let (mut vm, output) = scripted_vm("");

    assert_eq!(runner::run_file(&mut vm, &script), 1);
    assert!(output.contents().starts_with("compile error: "), "{}", output.contents());
}

#[test]
fn a_runtime_failure_reports_and_exits_one() {
    let script = temp_script("fails.ss", "print missing;\n");

    let (mut vm, output) = scripted_vm("");

    assert_eq!(runner::run_file(&mut vm, &script), 1);
    assert!(
        output.contents().contains("runtime error: variable 'missing' is undefined"),
        "{}",
        output.contents()
    );
}
