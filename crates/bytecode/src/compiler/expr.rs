use crate::compiler::{rule_for, Infix, Parser, Precedence, Prefix};
use crate::instruction::Instruction;
use crate::value::Value;

use ss_errors::SsError;
use ss_lexer::token::{Token, TokenKind};

impl<'src, 'ctx> Parser<'src, 'ctx> {
    pub(crate) fn run_prefix(&mut self, prefix: Prefix, can_assign: bool) -> Result<(), SsError> {
        match prefix {
            Prefix::Grouping => self.grouping(),
            Prefix::Unary => self.unary(),
            Prefix::Literal => self.literal(),
            Prefix::Number => self.number(),
            Prefix::String => self.string(),
            Prefix::Variable => self.variable(can_assign),
        }
    }

    pub(crate) fn run_infix(&mut self, infix: Infix) -> Result<(), SsError> {
        match infix {
            Infix::Binary => self.binary(),
            Infix::And => self.and_expr(),
            Infix::Or => self.or_expr(),
            Infix::Call => self.call(),
        }
    }

    fn grouping(&mut self) -> Result<(), SsError> {
        self.expression()?;

        self.consume(TokenKind::RightParen, "expected ')' after expression")
    }

    fn unary(&mut self) -> Result<(), SsError> {
        let operator = self.previous();

        self.parse_precedence(Precedence::Unary)?;

        match operator.kind {
            TokenKind::Bang => self.emit(Instruction::Not),
            TokenKind::Minus => self.emit(Instruction::Negate),

            _ => return Err(self.error(operator, "invalid unary operator")),
        }

        Ok(())
    }

    fn binary(&mut self) -> Result<(), SsError> {
        let operator = self.previous();

        self.parse_precedence(rule_for(operator.kind).precedence.next())?;

        match operator.kind {
            TokenKind::EqualEqual => self.emit(Instruction::Equal),
            TokenKind::BangEqual => self.emit(Instruction::NotEqual),
            TokenKind::Greater => self.emit(Instruction::Greater),
            TokenKind::GreaterEqual => self.emit(Instruction::GreaterEqual),
            TokenKind::Less => self.emit(Instruction::Less),
            TokenKind::LessEqual => self.emit(Instruction::LessEqual),
            TokenKind::Plus => self.emit(Instruction::Add),
            TokenKind::Minus => self.emit(Instruction::Sub),
            TokenKind::Star => self.emit(Instruction::Mul),
            TokenKind::Slash => self.emit(Instruction::Div),
            TokenKind::Percent => self.emit(Instruction::Mod),

            _ => return Err(self.error(operator, "invalid binary operator")),
        }

        Ok(())
    }

    fn literal(&mut self) -> Result<(), SsError> {
        match self.previous().kind {
            TokenKind::Nil => self.emit(Instruction::Nil),
            TokenKind::True => self.emit(Instruction::True),
            TokenKind::False => self.emit(Instruction::False),

            _ => return Err(self.error_at_previous("invalid literal")),
        }

        Ok(())
    }

    fn number(&mut self) -> Result<(), SsError> {
        let token = self.previous();

        let value: f64 = token
            .lexeme
            .parse()
            .map_err(|_| self.error(token, "unparsable number"))?;

        self.emit_constant(Value::Number(value));

        Ok(())
    }

    fn string(&mut self) -> Result<(), SsError> {
        let value = Value::string(self.previous().lexeme);

        self.emit_constant(value);

        Ok(())
    }

    fn variable(&mut self, can_assign: bool) -> Result<(), SsError> {
        self.named_variable(self.previous(), can_assign)
    }

    fn named_variable(&mut self, name: Token<'src>, can_assign: bool) -> Result<(), SsError> {
        if let Some(slot) = self.resolve_local(name)? {
            if can_assign && self.advance_if_matches(TokenKind::Equal) {
                self.expression()?;
                self.emit(Instruction::AssignLocal { slot });
            } else {
                self.emit(Instruction::LookupLocal { slot });
            }
        } else {
            let index = self.chunk.add_ident(name.lexeme);

            if can_assign && self.advance_if_matches(TokenKind::Equal) {
                self.expression()?;
                self.emit(Instruction::AssignGlobal { index });
            } else {
                self.emit(Instruction::LookupGlobal { index });
            }
        }

        Ok(())
    }

    fn and_expr(&mut self) -> Result<(), SsError> {
        let shortcut = self.emit_jump(Instruction::And { offset: 0 });

        self.parse_precedence(Precedence::And)?;

        self.patch_jump(shortcut);

        Ok(())
    }

    fn or_expr(&mut self) -> Result<(), SsError> {
        let shortcut = self.emit_jump(Instruction::Or { offset: 0 });

        self.parse_precedence(Precedence::Or)?;

        self.patch_jump(shortcut);

        Ok(())
    }

    fn call(&mut self) -> Result<(), SsError> {
        let mut arguments = 0;

        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression()?;
                arguments += 1;

                if !self.advance_if_matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightParen, "expected ')' after arguments")?;

        self.emit(Instruction::PushSp { arguments });

        // the caller resumes at the instruction after CALL
        let return_address = self.chunk.instruction_count() + 2;
        self.emit_constant(Value::Address(return_address));

        self.emit(Instruction::Call { arguments });

        Ok(())
    }
}
