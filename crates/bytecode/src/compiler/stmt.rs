use crate::compiler::{FunctionContext, Local, LoopContext, Parser};
use crate::instruction::Instruction;
use crate::value::{Function, Value};

use ss_errors::SsError;
use ss_lexer::token::{Token, TokenKind};
use ss_lexer::Scanner;

use thin_vec::ThinVec;

use std::env;
use std::fs;
use std::mem;
use std::path::PathBuf;
use std::rc::Rc;

impl<'src, 'ctx> Parser<'src, 'ctx> {
    pub(crate) fn declaration(&mut self) -> Result<(), SsError> {
        if self.advance_if_matches(TokenKind::Let) {
            self.let_statement()
        } else if self.advance_if_matches(TokenKind::Fn) {
            self.function_declaration()
        } else {
            self.statement()
        }
    }

    fn statement(&mut self) -> Result<(), SsError> {
        if self.advance_if_matches(TokenKind::Print) {
            self.print_statement()
        } else if self.advance_if_matches(TokenKind::If) {
            self.if_statement()
        } else if self.advance_if_matches(TokenKind::While) {
            self.while_statement()
        } else if self.advance_if_matches(TokenKind::Loop) {
            self.loop_statement()
        } else if self.advance_if_matches(TokenKind::For) {
            self.for_statement()
        } else if self.advance_if_matches(TokenKind::Match) {
            self.match_statement()
        } else if self.advance_if_matches(TokenKind::Return) {
            self.return_statement()
        } else if self.advance_if_matches(TokenKind::Break) {
            self.break_statement()
        } else if self.advance_if_matches(TokenKind::Continue) {
            self.continue_statement()
        } else if self.advance_if_matches(TokenKind::Load) {
            self.load_statement(false)
        } else if self.advance_if_matches(TokenKind::Loadr) {
            self.load_statement(true)
        } else if self.advance_if_matches(TokenKind::LeftBrace) {
            self.block_statement()
        } else {
            self.expression_statement()
        }
    }

    fn let_statement(&mut self) -> Result<(), SsError> {
        self.consume(TokenKind::Identifier, "expected variable name")?;
        let name = self.previous();

        if self.scope_depth > 0 {
            // the initializer's result is the local's stack slot
            self.declare_variable(name)?;

            self.variable_initializer()?;

            self.define_variable();
        } else {
            let index = self.chunk.add_ident(name.lexeme);

            self.variable_initializer()?;

            self.emit(Instruction::DefineGlobal { index });
        }

        Ok(())
    }

    fn variable_initializer(&mut self) -> Result<(), SsError> {
        if self.advance_if_matches(TokenKind::Equal) {
            self.expression()?;
        } else {
            self.emit(Instruction::Nil);
        }

        self.consume(TokenKind::Semicolon, "expected ';' after variable declaration")
    }

    fn print_statement(&mut self) -> Result<(), SsError> {
        self.expression()?;

        self.consume(TokenKind::Semicolon, "expected ';' after value")?;

        self.emit(Instruction::Print);

        Ok(())
    }

    fn expression_statement(&mut self) -> Result<(), SsError> {
        self.expression()?;

        self.consume(TokenKind::Semicolon, "expected ';' after expression")?;

        self.emit(Instruction::Pop);

        Ok(())
    }

    fn block_statement(&mut self) -> Result<(), SsError> {
        self.scoped(|parser| {
            while !parser.check(TokenKind::RightBrace) && !parser.check(TokenKind::EndOfFile) {
                parser.declaration()?;
            }

            parser.consume(TokenKind::RightBrace, "expected '}' after block")
        })
    }

    fn if_statement(&mut self) -> Result<(), SsError> {
        self.expression()?;

        let else_jump = self.emit_jump(Instruction::JumpIfFalse { offset: 0 });
        self.emit(Instruction::Pop);

        self.consume(TokenKind::LeftBrace, "expected '{' after condition")?;
        self.block_statement()?;

        if self.advance_if_matches(TokenKind::Else) {
            let end_jump = self.emit_jump(Instruction::Jump { offset: 0 });

            self.patch_jump(else_jump);
            self.emit(Instruction::Pop);

            self.statement()?;

            self.patch_jump(end_jump);
        } else {
            self.patch_jump(else_jump);
            self.emit(Instruction::Pop);
        }

        Ok(())
    }

    fn while_statement(&mut self) -> Result<(), SsError> {
        let loop_start = self.chunk.instruction_count();

        self.expression()?;

        let exit_jump = self.emit_jump(Instruction::JumpIfFalse { offset: 0 });
        self.emit(Instruction::Pop);

        self.consume(TokenKind::LeftBrace, "expected '{' after condition")?;

        let break_jumps = self.looped(loop_start, |parser| parser.block_statement())?;

        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit(Instruction::Pop);

        for jump in break_jumps {
            self.patch_jump(jump);
        }

        Ok(())
    }

    fn loop_statement(&mut self) -> Result<(), SsError> {
        let loop_start = self.chunk.instruction_count();

        self.consume(TokenKind::LeftBrace, "expected '{' after 'loop'")?;

        let break_jumps = self.looped(loop_start, |parser| parser.block_statement())?;

        self.emit_loop(loop_start);

        for jump in break_jumps {
            self.patch_jump(jump);
        }

        Ok(())
    }

    fn for_statement(&mut self) -> Result<(), SsError> {
        self.consume(TokenKind::LeftParen, "expected '(' after 'for'")?;

        self.scoped(|parser| {
            if parser.advance_if_matches(TokenKind::Semicolon) {
                // no initializer
            } else if parser.advance_if_matches(TokenKind::Let) {
                parser.let_statement()?;
            } else {
                parser.expression_statement()?;
            }

            let mut loop_start = parser.chunk.instruction_count();

            let exit_jump = if parser.advance_if_matches(TokenKind::Semicolon) {
                None
            } else {
                parser.expression()?;
                parser.consume(TokenKind::Semicolon, "expected ';' after loop condition")?;

                let exit = parser.emit_jump(Instruction::JumpIfFalse { offset: 0 });
                parser.emit(Instruction::Pop);

                Some(exit)
            };

            // the step runs before every loop tail but is skipped on the way in
            if !parser.check(TokenKind::RightParen) {
                let body_jump = parser.emit_jump(Instruction::Jump { offset: 0 });

                let step_start = parser.chunk.instruction_count();

                parser.expression()?;
                parser.emit(Instruction::Pop);
                parser.emit_loop(loop_start);

                loop_start = step_start;

                parser.patch_jump(body_jump);
            }

            parser.consume(TokenKind::RightParen, "expected ')' after for clauses")?;
            parser.consume(TokenKind::LeftBrace, "expected '{' after for clauses")?;

            let break_jumps = parser.looped(loop_start, |parser| parser.block_statement())?;

            parser.emit_loop(loop_start);

            if let Some(exit_jump) = exit_jump {
                parser.patch_jump(exit_jump);
                parser.emit(Instruction::Pop);
            }

            for jump in break_jumps {
                parser.patch_jump(jump);
            }

            Ok(())
        })
    }

    fn match_statement(&mut self) -> Result<(), SsError> {
        self.expression()?;

        // the tested value stays on the stack across the arms; an anonymous
        // local keeps slot numbering and unwind counts aligned with it
        self.locals.push(Local {
            name: "",
            depth: self.scope_depth,
            initialized: true,
        });

        let result = self.match_arms();

        self.locals.pop();

        result
    }

    fn match_arms(&mut self) -> Result<(), SsError> {
        self.consume(TokenKind::LeftBrace, "expected '{' after match value")?;

        let mut end_jumps = ThinVec::new();

        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::EndOfFile) {
            self.expression()?;

            self.consume(TokenKind::EqualGreater, "expected '=>' after match pattern")?;

            self.emit(Instruction::Check);

            let next_jump = self.emit_jump(Instruction::JumpIfFalse { offset: 0 });
            self.emit(Instruction::Pop);

            self.statement()?;

            end_jumps.push(self.emit_jump(Instruction::Jump { offset: 0 }));

            self.patch_jump(next_jump);
            self.emit(Instruction::Pop);
        }

        self.consume(TokenKind::RightBrace, "expected '}' after match arms")?;

        for jump in end_jumps {
            self.patch_jump(jump);
        }

        // discard the tested value
        self.emit(Instruction::Pop);

        Ok(())
    }

    fn function_declaration(&mut self) -> Result<(), SsError> {
        self.consume(TokenKind::Identifier, "expected function name")?;
        let name = self.previous();

        // top-level flow bypasses the body
        let body_jump = self.emit_jump(Instruction::Jump { offset: 0 });

        let instruction_ptr = self.chunk.instruction_count();

        self.consume(TokenKind::LeftParen, "expected '(' after function name")?;

        let mut parameters = ThinVec::new();

        if !self.check(TokenKind::RightParen) {
            loop {
                self.consume(TokenKind::Identifier, "expected parameter name")?;
                parameters.push(self.previous());

                if !self.advance_if_matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightParen, "expected ')' after parameters")?;
        self.consume(TokenKind::LeftBrace, "expected '{' before function body")?;

        let arity = parameters.len();

        self.function_body(name, parameters)?;

        self.patch_jump(body_jump);

        let function = Function {
            name: name.lexeme.to_owned(),
            arity,
            instruction_ptr,
        };

        if self.scope_depth > 0 {
            self.declare_variable(name)?;
            self.emit_constant(Value::Function(Rc::new(function)));
            self.define_variable();
        } else {
            let index = self.chunk.add_ident(name.lexeme);
            self.emit_constant(Value::Function(Rc::new(function)));
            self.emit(Instruction::DefineGlobal { index });
        }

        Ok(())
    }

    fn function_body(
        &mut self,
        name: Token<'src>,
        parameters: ThinVec<Token<'src>>,
    ) -> Result<(), SsError> {
        let arity = parameters.len();

        // frame layout under the body's locals: the callee (slot 0, named
        // after the function so recursion resolves to it), the parameters,
        // the saved frame pointer and the return address
        let mut locals = ThinVec::new();

        locals.push(Local {
            name: name.lexeme,
            depth: 1,
            initialized: true,
        });

        for parameter in parameters.iter() {
            for local in locals.iter() {
                if local.name == parameter.lexeme {
                    return Err(self.error(
                        *parameter,
                        &format!("parameter '{}' is already declared", parameter.lexeme),
                    ));
                }
            }

            locals.push(Local {
                name: parameter.lexeme,
                depth: 1,
                initialized: true,
            });
        }

        for _ in 0..2 {
            locals.push(Local {
                name: "",
                depth: 1,
                initialized: true,
            });
        }

        let enclosing_locals = mem::replace(&mut self.locals, locals);
        let enclosing_depth = mem::replace(&mut self.scope_depth, 1);
        let enclosing_loop = self.loop_context.take();
        let enclosing_function = self.function.replace(FunctionContext { arity });

        let result = self.function_block();

        self.locals = enclosing_locals;
        self.scope_depth = enclosing_depth;
        self.loop_context = enclosing_loop;
        self.function = enclosing_function;

        result
    }

    fn function_block(&mut self) -> Result<(), SsError> {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::EndOfFile) {
            self.declaration()?;
        }

        self.consume(TokenKind::RightBrace, "expected '}' after function body")?;

        let context = self.function.unwrap_or(FunctionContext { arity: 0 });
        let count = self.locals.len() - context.locals_base();

        self.emit(Instruction::PopN { count });
        self.emit(Instruction::Nil);
        self.emit(Instruction::Return {
            locals: context.arity,
        });

        Ok(())
    }

    fn return_statement(&mut self) -> Result<(), SsError> {
        let Some(context) = self.function else {
            return Err(self.error_at_previous("return outside a function"));
        };

        if self.advance_if_matches(TokenKind::Semicolon) {
            self.emit(Instruction::Nil);
        } else {
            self.expression()?;
            self.consume(TokenKind::Semicolon, "expected ';' after return value")?;
        }

        // slide the result below the dead block locals before unwinding
        let count = self.locals.len() - context.locals_base();

        if count > 0 {
            self.emit(Instruction::Move { depth: count });
            self.emit(Instruction::PopN { count });
        }

        self.emit(Instruction::Return {
            locals: context.arity,
        });

        Ok(())
    }

    fn break_statement(&mut self) -> Result<(), SsError> {
        let Some(entry_locals) = self.loop_context.as_ref().map(|context| context.entry_locals)
        else {
            return Err(self.error_at_previous("break outside a loop"));
        };

        self.consume(TokenKind::Semicolon, "expected ';' after 'break'")?;

        let count = self.locals.len() - entry_locals;

        if count > 0 {
            self.emit(Instruction::PopN { count });
        }

        let jump = self.emit_jump(Instruction::Jump { offset: 0 });

        if let Some(context) = self.loop_context.as_mut() {
            context.break_jumps.push(jump);
        }

        Ok(())
    }

    fn continue_statement(&mut self) -> Result<(), SsError> {
        let Some((entry_locals, continue_target)) = self
            .loop_context
            .as_ref()
            .map(|context| (context.entry_locals, context.continue_target))
        else {
            return Err(self.error_at_previous("continue outside a loop"));
        };

        self.consume(TokenKind::Semicolon, "expected ';' after 'continue'")?;

        let count = self.locals.len() - entry_locals;

        if count > 0 {
            self.emit(Instruction::PopN { count });
        }

        self.emit_loop(continue_target);

        Ok(())
    }

    fn looped<F>(&mut self, continue_target: usize, body: F) -> Result<ThinVec<usize>, SsError>
    where
        F: FnOnce(&mut Self) -> Result<(), SsError>,
    {
        let enclosing = self.loop_context.replace(LoopContext {
            entry_locals: self.locals.len(),
            continue_target,
            break_jumps: ThinVec::new(),
        });

        let result = body(self);

        let context = mem::replace(&mut self.loop_context, enclosing);

        result?;

        Ok(context.map(|context| context.break_jumps).unwrap_or_default())
    }

    fn load_statement(&mut self, relative: bool) -> Result<(), SsError> {
        let keyword = self.previous();

        if self.scope_depth > 0 || self.function.is_some() {
            return Err(self.error(keyword, "load is only allowed at global scope"));
        }

        self.consume(TokenKind::String, "expected a file path string")?;
        let path_token = self.previous();

        self.consume(TokenKind::Semicolon, "expected ';' after file path")?;

        let path = if relative {
            self.current_file
                .parent()
                .map(|directory| directory.join(path_token.lexeme))
                .filter(|path| path.is_file())
        } else {
            library_search_path()
                .into_iter()
                .map(|directory| directory.join(path_token.lexeme))
                .find(|path| path.is_file())
        };

        let Some(path) = path else {
            return Err(self.error(
                path_token,
                &format!("unable to locate '{}'", path_token.lexeme),
            ));
        };

        // include-once keeps mutual loads from recursing forever
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());

        if !self.included.insert(canonical) {
            return Ok(());
        }

        log::debug!("loading '{}'", path.display());

        let source = fs::read_to_string(&path).map_err(|err| {
            self.error(
                path_token,
                &format!("unable to read '{}': {}", path.display(), err),
            )
        })?;

        let tokens = Scanner::new(&source).scan()?;

        let result = Parser::new(tokens, &mut *self.chunk, path, &mut *self.included).parse_body();
        result
    }
}

fn library_search_path() -> Vec<PathBuf> {
    match env::var("SS_LIB") {
        Ok(paths) => env::split_paths(&paths).collect(),

        Err(_) => match env::var("HOME") {
            Ok(home) => vec![PathBuf::from(home).join(".simple")],
            Err(_) => Vec::new(),
        },
    }
}
