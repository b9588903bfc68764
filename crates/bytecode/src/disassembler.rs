use crate::chunk::Chunk;
use crate::instruction::Instruction;

use std::fmt::Write;

pub fn disassemble(name: &str, chunk: &Chunk) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "<< {} >>", name);

    for (offset, instruction) in chunk.code.iter().enumerate() {
        let _ = writeln!(output, "{}", disassemble_instruction(chunk, *instruction, offset));
    }

    let _ = writeln!(output, "<< END >>");

    output
}

pub fn disassemble_instruction(chunk: &Chunk, instruction: Instruction, offset: usize) -> String {
    let line = if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        "   |".to_owned()
    } else {
        format!("{:4}", chunk.line_at(offset))
    };

    format!(
        "0x{:04x} {} {}",
        offset,
        line,
        describe(chunk, instruction)
    )
}

fn describe(chunk: &Chunk, instruction: Instruction) -> String {
    match instruction {
        Instruction::NoOp => "NO_OP".to_owned(),

        Instruction::Constant { index } => constant(chunk, "CONSTANT", index),

        Instruction::Nil => "NIL".to_owned(),
        Instruction::True => "TRUE".to_owned(),
        Instruction::False => "FALSE".to_owned(),

        Instruction::Pop => "POP".to_owned(),
        Instruction::PopN { count } => payload("POP_N", count),

        Instruction::LookupLocal { slot } => local(chunk, "LOOKUP_LOCAL", slot),
        Instruction::AssignLocal { slot } => local(chunk, "ASSIGN_LOCAL", slot),

        Instruction::LookupGlobal { index } => constant(chunk, "LOOKUP_GLOBAL", index),
        Instruction::DefineGlobal { index } => constant(chunk, "DEFINE_GLOBAL", index),
        Instruction::AssignGlobal { index } => constant(chunk, "ASSIGN_GLOBAL", index),

        Instruction::Equal => "EQUAL".to_owned(),
        Instruction::NotEqual => "NOT_EQUAL".to_owned(),
        Instruction::Greater => "GREATER".to_owned(),
        Instruction::GreaterEqual => "GREATER_EQUAL".to_owned(),
        Instruction::Less => "LESS".to_owned(),
        Instruction::LessEqual => "LESS_EQUAL".to_owned(),
        Instruction::Check => "CHECK".to_owned(),

        Instruction::Add => "ADD".to_owned(),
        Instruction::Sub => "SUB".to_owned(),
        Instruction::Mul => "MUL".to_owned(),
        Instruction::Div => "DIV".to_owned(),
        Instruction::Mod => "MOD".to_owned(),

        Instruction::Not => "NOT".to_owned(),
        Instruction::Negate => "NEGATE".to_owned(),

        Instruction::Print => "PRINT".to_owned(),

        Instruction::Swap => "SWAP".to_owned(),
        Instruction::Move { depth } => payload("MOVE", depth),

        Instruction::Jump { offset } => payload("JUMP", offset),
        Instruction::JumpIfFalse { offset } => payload("JUMP_IF_FALSE", offset),
        Instruction::Loop { offset } => payload("LOOP", offset),
        Instruction::Or { offset } => payload("OR", offset),
        Instruction::And { offset } => payload("AND", offset),

        Instruction::PushSp { arguments } => payload("PUSH_SP", arguments),
        Instruction::Call { arguments } => payload("CALL", arguments),
        Instruction::Return { locals } => payload("RETURN", locals),

        Instruction::End => "END".to_owned(),
    }
}

fn payload(name: &str, value: usize) -> String {
    format!("{:<16} {:4}", name, value)
}

fn constant(chunk: &Chunk, name: &str, index: usize) -> String {
    format!("{:<16} {:4} '{}'", name, index, chunk.constant_at(index))
}

fn local(chunk: &Chunk, name: &str, slot: usize) -> String {
    match chunk.local_name(slot) {
        Some(local_name) => format!("{:<16} {:4} '{}'", name, slot, local_name),
        None => payload(name, slot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::compiler;

    use std::path::Path;

    #[test]
    fn disassembly_shows_offsets_lines_and_constants() {
        let mut chunk = Chunk::new();

        compiler::compile("print 1 + 2;", &mut chunk, Path::new("test")).unwrap();

        let output = disassemble("test", &chunk);

        assert!(output.starts_with("<< test >>\n"));
        assert!(output.ends_with("<< END >>\n"));
        assert!(output.contains("CONSTANT"));
        assert!(output.contains("'1'"));
        assert!(output.contains("ADD"));
        assert!(output.contains("PRINT"));

        // instructions after the first on a line show a pipe instead
        assert!(output.contains(" | "));
    }

    #[test]
    fn globals_and_locals_are_named() {
        let mut chunk = Chunk::new();

        compiler::compile(
            "let answer = 42; { let inner = answer; print inner; }",
            &mut chunk,
            Path::new("test"),
        )
        .unwrap();

        let output = disassemble("test", &chunk);

        assert!(output.contains("DEFINE_GLOBAL"));
        assert!(output.contains("'answer'"));
        assert!(output.contains("LOOKUP_LOCAL"));
        assert!(output.contains("'inner'"));
    }
}
