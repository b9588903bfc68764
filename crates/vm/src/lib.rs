pub mod config;

use config::VmConfig;

use ss_bytecode::chunk::Chunk;
use ss_bytecode::compiler;
use ss_bytecode::disassembler;
use ss_bytecode::instruction::Instruction;
use ss_bytecode::value::Value;

use ss_errors::SsError;

use std::env;
use std::fs;
use std::path::Path;

pub struct VirtualMachine {
    config: VmConfig,

    chunk: Chunk,
    ip: usize,
    sp: usize,
}

impl VirtualMachine {
    pub fn new(config: VmConfig) -> VirtualMachine {
        VirtualMachine {
            config,

            chunk: Chunk::new(),
            ip: 0,
            sp: 0,
        }
    }

    pub fn config_mut(&mut self) -> &mut VmConfig {
        &mut self.config
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.chunk.set_global(name.to_owned(), value);
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.chunk.find_global(name).cloned()
    }

    pub fn run_file(&mut self, file_path: &Path) -> Result<Value, SsError> {
        let source = fs::read_to_string(file_path).map_err(|err| {
            SsError::runtime(format!("unable to read '{}': {}", file_path.display(), err))
        })?;

        self.run_script(&source, file_path)
    }

    /// Compiles `source` into the shared chunk and executes the newly
    /// appended code. Globals persist across calls; the stack does not.
    pub fn run_script(&mut self, source: &str, file_path: &Path) -> Result<Value, SsError> {
        self.chunk.prepare();
        self.sp = 0;

        let offset = self.chunk.instruction_count();

        compiler::compile(source, &mut self.chunk, file_path)?;

        log::debug!(
            "{}",
            disassembler::disassemble(&file_path.to_string_lossy(), &self.chunk)
        );

        self.ip = offset;

        self.execute()
    }

    pub fn run_line(&mut self, line: &str) -> Result<Value, SsError> {
        let cwd = env::current_dir().unwrap_or_default();

        self.run_script(line, &cwd)
    }

    pub fn execute(&mut self) -> Result<Value, SsError> {
        while self.ip < self.chunk.instruction_count() {
            let instruction = self.chunk.code[self.ip];

            log::trace!(
                "{}",
                disassembler::disassemble_instruction(&self.chunk, instruction, self.ip)
            );

            match instruction {
                Instruction::NoOp => {}

                Instruction::Constant { index } => {
                    let value = self.chunk.constant_at(index).clone();

                    self.chunk.push_stack(value);
                }

                Instruction::Nil => self.chunk.push_stack(Value::Nil),
                Instruction::True => self.chunk.push_stack(Value::Bool(true)),
                Instruction::False => self.chunk.push_stack(Value::Bool(false)),

                Instruction::Pop => {
                    self.chunk.pop_stack();
                }

                Instruction::PopN { count } => self.chunk.pop_stack_n(count),

                Instruction::LookupLocal { slot } => {
                    let value = self.chunk.index_stack(self.sp + slot).clone();

                    self.chunk.push_stack(value);
                }

                Instruction::AssignLocal { slot } => {
                    let value = self.chunk.peek_stack(0).clone();

                    *self.chunk.index_stack_mut(self.sp + slot) = value;
                }

                Instruction::LookupGlobal { index } => self.lookup_global(index)?,
                Instruction::DefineGlobal { index } => self.define_global(index)?,
                Instruction::AssignGlobal { index } => self.assign_global(index)?,

                Instruction::Equal => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(Value::Bool(a == b));
                }

                Instruction::NotEqual => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(Value::Bool(a != b));
                }

                Instruction::Greater => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(a.greater(&b));
                }

                Instruction::GreaterEqual => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(a.greater_equal(&b));
                }

                Instruction::Less => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(a.less(&b));
                }

                Instruction::LessEqual => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(a.less_equal(&b));
                }

                Instruction::Check => {
                    let value = self.chunk.pop_stack();
                    let matches = Value::Bool(*self.chunk.peek_stack(0) == value);

                    self.chunk.push_stack(matches);
                }

                Instruction::Add => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(a.add(&b)?);
                }

                Instruction::Sub => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(a.sub(&b)?);
                }

                Instruction::Mul => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(a.mul(&b)?);
                }

                Instruction::Div => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(a.div(&b)?);
                }

                Instruction::Mod => {
                    let (a, b) = self.pop_pair();

                    self.chunk.push_stack(a.rem(&b)?);
                }

                Instruction::Not => {
                    let value = self.chunk.pop_stack();

                    self.chunk.push_stack(value.not());
                }

                Instruction::Negate => {
                    let value = self.chunk.pop_stack();

                    self.chunk.push_stack(value.negate()?);
                }

                Instruction::Print => {
                    let value = self.chunk.pop_stack();

                    self.config.write_line(value);
                }

                Instruction::Swap => {
                    let a = self.chunk.pop_stack();
                    let b = self.chunk.pop_stack();

                    self.chunk.push_stack(a);
                    self.chunk.push_stack(b);
                }

                Instruction::Move { depth } => {
                    let top = self.chunk.peek_stack(0).clone();
                    let at = self.chunk.stack_size() - 1 - depth;

                    *self.chunk.index_stack_mut(at) = top;
                }

                Instruction::Jump { offset } => {
                    self.ip += offset;
                    continue;
                }

                Instruction::JumpIfFalse { offset } => {
                    if !self.chunk.peek_stack(0).is_truthy() {
                        self.ip += offset;
                        continue;
                    }
                }

                Instruction::Loop { offset } => {
                    self.ip -= offset;
                    continue;
                }

                Instruction::Or { offset } => {
                    if self.chunk.peek_stack(0).is_truthy() {
                        self.ip += offset;
                        continue;
                    }

                    self.chunk.pop_stack();
                }

                Instruction::And { offset } => {
                    if !self.chunk.peek_stack(0).is_truthy() {
                        self.ip += offset;
                        continue;
                    }

                    self.chunk.pop_stack();
                }

                Instruction::PushSp { arguments } => {
                    self.chunk.push_stack(Value::Address(self.sp));

                    // the frame pointer lands on the callee slot
                    self.sp = self.chunk.stack_size() - arguments - 2;
                }

                Instruction::Call { arguments } => {
                    if self.call(arguments)? {
                        continue;
                    }
                }

                Instruction::Return { locals } => {
                    self.ret(locals)?;
                    continue;
                }

                Instruction::End => {
                    return Ok(if self.chunk.stack_empty() {
                        Value::Nil
                    } else {
                        self.chunk.pop_stack()
                    });
                }
            }

            self.ip += 1;
        }

        Ok(Value::Nil)
    }

    #[inline]
    fn pop_pair(&mut self) -> (Value, Value) {
        let b = self.chunk.pop_stack();
        let a = self.chunk.pop_stack();

        (a, b)
    }

    fn global_name(&self, index: usize) -> Result<String, SsError> {
        match self.chunk.constant_at(index) {
            Value::String(name) => Ok(name.as_ref().clone()),

            _ => Err(SsError::runtime(
                "invalid type for variable name".to_owned(),
            )),
        }
    }

    fn lookup_global(&mut self, index: usize) -> Result<(), SsError> {
        let name = self.global_name(index)?;

        match self.chunk.find_global(&name) {
            Some(value) => {
                let value = value.clone();

                self.chunk.push_stack(value);

                Ok(())
            }

            None => Err(SsError::undefined(&name)),
        }
    }

    fn define_global(&mut self, index: usize) -> Result<(), SsError> {
        let name = self.global_name(index)?;

        if self.chunk.find_global(&name).is_some() {
            return Err(SsError::already_defined(&name));
        }

        let value = self.chunk.pop_stack();

        self.chunk.set_global(name, value);

        Ok(())
    }

    fn assign_global(&mut self, index: usize) -> Result<(), SsError> {
        let name = self.global_name(index)?;

        if self.chunk.find_global(&name).is_none() {
            return Err(SsError::undefined(&name));
        }

        let value = self.chunk.peek_stack(0).clone();

        self.chunk.set_global(name, value);

        Ok(())
    }

    /// Returns true when execution was redirected into a scripted function,
    /// in which case `ip` must not advance this cycle.
    fn call(&mut self, arguments: usize) -> Result<bool, SsError> {
        let callee = self.chunk.peek_stack(arguments + 2).clone();

        match callee {
            Value::Function(function) => {
                if arguments != function.arity {
                    return Err(arity_mismatch(function.arity, arguments));
                }

                self.ip = function.instruction_ptr;

                Ok(true)
            }

            Value::Native(native) => {
                if arguments != native.arity {
                    return Err(arity_mismatch(native.arity, arguments));
                }

                // natives run inline: unwind the frame the caller set up,
                // then continue right after CALL
                let _return_address = self.chunk.pop_stack();

                let saved_sp = self.chunk.pop_stack();
                let Value::Address(previous_sp) = saved_sp else {
                    return Err(SsError::runtime(format!(
                        "trying to set the stack pointer to an invalid value: {}",
                        saved_sp
                    )));
                };
                self.sp = previous_sp;

                let arguments = self.chunk.split_off_stack(arguments);

                // the callee itself
                self.chunk.pop_stack();

                let result = (native.function)(arguments);

                self.chunk.push_stack(result);

                Ok(false)
            }

            value => Err(SsError::runtime(format!(
                "tried calling non-function: {}",
                value
            ))),
        }
    }

    fn ret(&mut self, locals: usize) -> Result<(), SsError> {
        let result = self.chunk.pop_stack();

        let return_address = self.chunk.pop_stack();
        let Value::Address(address) = return_address else {
            return Err(SsError::runtime(format!(
                "trying to return to an invalid value: {}",
                return_address
            )));
        };
        self.ip = address;

        let saved_sp = self.chunk.pop_stack();
        let Value::Address(previous_sp) = saved_sp else {
            return Err(SsError::runtime(format!(
                "trying to set the stack pointer to an invalid value: {}",
                saved_sp
            )));
        };
        self.sp = previous_sp;

        // the arguments and the callee
        self.chunk.pop_stack_n(locals + 1);

        self.chunk.push_stack(result);

        Ok(())
    }
}

fn arity_mismatch(expected: usize, got: usize) -> SsError {
    SsError::runtime(format!(
        "tried calling function with incorrect number of args, expected {}, got {}",
        expected, got
    ))
}
