mod expr;
mod stmt;

use crate::chunk::Chunk;
use crate::instruction::Instruction;
use crate::value::Value;

use ss_errors::SsError;
use ss_lexer::token::{Token, TokenKind};
use ss_lexer::Scanner;

use rustc_hash::FxHashSet;
use thin_vec::ThinVec;

use std::path::{Path, PathBuf};

/// Compiles `source` into `chunk` in a single pass: tokens in, bytecode out.
/// `file_path` anchors `loadr` includes.
pub fn compile(source: &str, chunk: &mut Chunk, file_path: &Path) -> Result<(), SsError> {
    let tokens = Scanner::new(source).scan()?;

    let mut included = FxHashSet::default();
    included.insert(
        file_path
            .canonicalize()
            .unwrap_or_else(|_| file_path.to_path_buf()),
    );

    Parser::new(tokens, chunk, file_path.to_path_buf(), &mut included).parse()
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub(crate) enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // / * %
    Unary,      // - !
    Call,       // ()
    Primary,
}

impl Precedence {
    pub(crate) fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Prefix {
    Grouping,
    Unary,
    Literal,
    Number,
    String,
    Variable,
}

#[derive(Clone, Copy)]
pub(crate) enum Infix {
    Binary,
    And,
    Or,
    Call,
}

pub(crate) struct ParseRule {
    pub prefix: Option<Prefix>,
    pub infix: Option<Infix>,
    pub precedence: Precedence,
}

const fn rule(prefix: Option<Prefix>, infix: Option<Infix>, precedence: Precedence) -> ParseRule {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

pub(crate) fn rule_for(kind: TokenKind) -> ParseRule {
    match kind {
        TokenKind::LeftParen => rule(Some(Prefix::Grouping), Some(Infix::Call), Precedence::Call),

        TokenKind::Minus => rule(Some(Prefix::Unary), Some(Infix::Binary), Precedence::Term),
        TokenKind::Plus => rule(None, Some(Infix::Binary), Precedence::Term),
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => {
            rule(None, Some(Infix::Binary), Precedence::Factor)
        }

        TokenKind::Bang => rule(Some(Prefix::Unary), None, Precedence::None),
        TokenKind::BangEqual | TokenKind::EqualEqual => {
            rule(None, Some(Infix::Binary), Precedence::Equality)
        }
        TokenKind::Greater
        | TokenKind::GreaterEqual
        | TokenKind::Less
        | TokenKind::LessEqual => rule(None, Some(Infix::Binary), Precedence::Comparison),

        TokenKind::Identifier => rule(Some(Prefix::Variable), None, Precedence::None),
        TokenKind::String => rule(Some(Prefix::String), None, Precedence::None),
        TokenKind::Number => rule(Some(Prefix::Number), None, Precedence::None),

        TokenKind::Nil | TokenKind::True | TokenKind::False => {
            rule(Some(Prefix::Literal), None, Precedence::None)
        }

        TokenKind::And => rule(None, Some(Infix::And), Precedence::And),
        TokenKind::Or => rule(None, Some(Infix::Or), Precedence::Or),

        _ => rule(None, None, Precedence::None),
    }
}

#[derive(Debug)]
pub(crate) struct Local<'src> {
    pub name: &'src str,
    pub depth: usize,
    pub initialized: bool,
}

pub(crate) struct LoopContext {
    pub entry_locals: usize,
    pub continue_target: usize,
    pub break_jumps: ThinVec<usize>,
}

#[derive(Clone, Copy)]
pub(crate) struct FunctionContext {
    pub arity: usize,
}

impl FunctionContext {
    /// Frame-local slots below the first block local: the callee, the
    /// parameters, the saved frame pointer and the return address.
    pub fn locals_base(&self) -> usize {
        self.arity + 3
    }
}

pub(crate) struct Parser<'src, 'ctx> {
    tokens: Vec<Token<'src>>,
    position: usize,

    pub(crate) chunk: &'ctx mut Chunk,

    pub(crate) locals: ThinVec<Local<'src>>,
    pub(crate) scope_depth: usize,
    pub(crate) loop_context: Option<LoopContext>,
    pub(crate) function: Option<FunctionContext>,

    pub(crate) current_file: PathBuf,
    pub(crate) included: &'ctx mut FxHashSet<PathBuf>,
}

impl<'src, 'ctx> Parser<'src, 'ctx> {
    pub(crate) fn new(
        tokens: Vec<Token<'src>>,
        chunk: &'ctx mut Chunk,
        current_file: PathBuf,
        included: &'ctx mut FxHashSet<PathBuf>,
    ) -> Parser<'src, 'ctx> {
        Parser {
            tokens,
            position: 0,

            chunk,

            locals: ThinVec::new(),
            scope_depth: 0,
            loop_context: None,
            function: None,

            current_file,
            included,
        }
    }

    pub(crate) fn parse(&mut self) -> Result<(), SsError> {
        self.parse_body()?;

        self.emit(Instruction::End);

        Ok(())
    }

    /// Declarations until end of input, without the terminating `END`; a
    /// `load` splices another file's body into the same chunk through here.
    pub(crate) fn parse_body(&mut self) -> Result<(), SsError> {
        while !self.check(TokenKind::EndOfFile) {
            self.declaration()?;
        }

        Ok(())
    }

    #[inline]
    pub(crate) fn current(&self) -> Token<'src> {
        self.tokens[self.position]
    }

    #[inline]
    pub(crate) fn previous(&self) -> Token<'src> {
        self.tokens[self.position.saturating_sub(1)]
    }

    pub(crate) fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    #[inline]
    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    pub(crate) fn advance_if_matches(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }

        self.advance();

        true
    }

    pub(crate) fn consume(&mut self, kind: TokenKind, message: &str) -> Result<(), SsError> {
        if self.check(kind) {
            self.advance();

            Ok(())
        } else {
            Err(self.error(self.current(), message))
        }
    }

    pub(crate) fn error(&self, token: Token, message: &str) -> SsError {
        SsError::compile(token.location, message.to_owned())
    }

    pub(crate) fn error_at_previous(&self, message: &str) -> SsError {
        self.error(self.previous(), message)
    }

    fn line(&self) -> usize {
        self.previous().location.line
    }

    pub(crate) fn emit(&mut self, instruction: Instruction) {
        self.chunk.write(instruction, self.line());
    }

    pub(crate) fn emit_constant(&mut self, value: Value) {
        self.chunk.write_constant(value, self.line());
    }

    pub(crate) fn emit_jump(&mut self, instruction: Instruction) -> usize {
        self.emit(instruction);

        self.chunk.instruction_count() - 1
    }

    pub(crate) fn emit_loop(&mut self, target: usize) {
        let offset = self.chunk.instruction_count() - target;

        self.emit(Instruction::Loop { offset });
    }

    /// Rewrites the forward jump at `at` to land on the next instruction to
    /// be emitted.
    pub(crate) fn patch_jump(&mut self, at: usize) {
        let offset = self.chunk.instruction_count() - at;

        self.chunk.code[at] = match self.chunk.code[at] {
            Instruction::Jump { .. } => Instruction::Jump { offset },
            Instruction::JumpIfFalse { .. } => Instruction::JumpIfFalse { offset },
            Instruction::And { .. } => Instruction::And { offset },
            Instruction::Or { .. } => Instruction::Or { offset },

            _ => unreachable!("patched an instruction that is not a forward jump"),
        };
    }

    pub(crate) fn expression(&mut self) -> Result<(), SsError> {
        self.parse_precedence(Precedence::Assignment)
    }

    pub(crate) fn parse_precedence(&mut self, precedence: Precedence) -> Result<(), SsError> {
        self.advance();

        let Some(prefix) = rule_for(self.previous().kind).prefix else {
            return Err(self.error_at_previous("expected an expression"));
        };

        let can_assign = precedence <= Precedence::Assignment;

        self.run_prefix(prefix, can_assign)?;

        while precedence <= rule_for(self.current().kind).precedence {
            self.advance();

            if let Some(infix) = rule_for(self.previous().kind).infix {
                self.run_infix(infix)?;
            }
        }

        if can_assign && self.advance_if_matches(TokenKind::Equal) {
            return Err(self.error_at_previous("invalid assignment target"));
        }

        Ok(())
    }

    pub(crate) fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    pub(crate) fn end_scope(&mut self) {
        let count = self
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth == self.scope_depth)
            .count();

        self.emit(Instruction::PopN { count });

        self.locals.truncate(self.locals.len() - count);
        self.scope_depth -= 1;
    }

    /// Wraps `action` in a lexical scope; the matching `POP_N` and locals
    /// truncation run on error exits as well.
    pub(crate) fn scoped<F>(&mut self, action: F) -> Result<(), SsError>
    where
        F: FnOnce(&mut Self) -> Result<(), SsError>,
    {
        self.begin_scope();

        let result = action(self);

        self.end_scope();

        result
    }

    pub(crate) fn declare_variable(&mut self, name: Token<'src>) -> Result<(), SsError> {
        for local in self.locals.iter().rev() {
            if local.depth < self.scope_depth {
                break;
            }

            if local.name == name.lexeme {
                return Err(self.error(
                    name,
                    &format!("variable '{}' is already declared in this scope", name.lexeme),
                ));
            }
        }

        self.locals.push(Local {
            name: name.lexeme,
            depth: self.scope_depth,
            initialized: false,
        });

        self.chunk.cache_local(self.locals.len() - 1, name.lexeme);

        Ok(())
    }

    pub(crate) fn define_variable(&mut self) {
        if let Some(local) = self.locals.last_mut() {
            local.initialized = true;
        }
    }

    pub(crate) fn resolve_local(&self, name: Token) -> Result<Option<usize>, SsError> {
        for (slot, local) in self.locals.iter().enumerate().rev() {
            if local.name == name.lexeme {
                if !local.initialized {
                    return Err(self.error(name, "can't read variable in its own initializer"));
                }

                return Ok(Some(slot));
            }
        }

        Ok(None)
    }
}
