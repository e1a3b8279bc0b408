use civm::Opcode::{self, *};

use crate::compiler::Compiler;
use crate::error::{CompileError, ErrorKind};
use crate::symbol::Class;
use crate::token::Token;
use crate::types::{CHAR, INT, PTR};

impl<'a> Compiler<'a> {
    /// Compiles one expression by precedence climbing: a leading operand,
    /// then operators as long as the current token binds at least as
    /// tightly as `lev`. The compiled value ends up in the accumulator and
    /// its type in `self.ty`.
    pub(crate) fn expr(&mut self, lev: Token) -> Result<(), CompileError> {
        self.leading_operand()?;

        while self.tok >= lev {
            let t = self.ty;
            match self.tok {
                Token::Assign => {
                    self.next();
                    match self.text.last_op() {
                        Some(LC) | Some(LI) => self.text.rewrite_last(PSH),
                        _ => return Err(self.err(ErrorKind::BadLvalue("assignment"))),
                    }
                    self.expr(Token::Assign)?;
                    self.ty = t;
                    self.text.emit(if self.ty == CHAR { SC } else { SI });
                }
                Token::Cond => {
                    self.next();
                    self.text.emit(BZ);
                    let hole = self.text.hole();
                    self.expr(Token::Assign)?;
                    self.expect(b':', ErrorKind::ColonExpected)?;
                    // Skip past the jump that ends the then-arm.
                    self.text.patch(hole, self.text.pos() + 2);
                    self.text.emit(JMP);
                    let hole = self.text.hole();
                    self.expr(Token::Cond)?;
                    self.text.patch(hole, self.text.pos());
                }
                Token::Lor => {
                    self.next();
                    self.text.emit(BNZ);
                    let hole = self.text.hole();
                    self.expr(Token::Lan)?;
                    self.text.patch(hole, self.text.pos());
                    self.ty = INT;
                }
                Token::Lan => {
                    self.next();
                    self.text.emit(BZ);
                    let hole = self.text.hole();
                    self.expr(Token::Or)?;
                    self.text.patch(hole, self.text.pos());
                    self.ty = INT;
                }
                Token::Or => self.binary(Token::Xor, OR)?,
                Token::Xor => self.binary(Token::And, XOR)?,
                Token::And => self.binary(Token::Eq, AND)?,
                Token::Eq => self.binary(Token::Lt, EQ)?,
                Token::Ne => self.binary(Token::Lt, NE)?,
                Token::Lt => self.binary(Token::Shl, LT)?,
                Token::Gt => self.binary(Token::Shl, GT)?,
                Token::Le => self.binary(Token::Shl, LE)?,
                Token::Ge => self.binary(Token::Shl, GE)?,
                Token::Shl => self.binary(Token::Add, SHL)?,
                Token::Shr => self.binary(Token::Add, SHR)?,
                Token::Add => {
                    self.next();
                    self.text.emit(PSH);
                    self.expr(Token::Mul)?;
                    self.ty = t;
                    if self.ty > PTR {
                        self.scale_index();
                    }
                    self.text.emit(ADD);
                }
                Token::Sub => {
                    self.next();
                    self.text.emit(PSH);
                    self.expr(Token::Mul)?;
                    self.ty = t;
                    if self.ty > PTR {
                        self.scale_index();
                    }
                    self.text.emit(SUB);
                }
                Token::Mul => self.binary(Token::Inc, MUL)?,
                Token::Div => self.binary(Token::Inc, DIV)?,
                Token::Mod => self.binary(Token::Inc, MOD)?,
                Token::Inc | Token::Dec => {
                    // Postfix: apply the step, then undo it in the
                    // accumulator so the expression keeps the old value.
                    let op = self.tok;
                    self.reload_lvalue("post-increment")?;
                    self.text.emit(PSH);
                    self.text.emit_with(IMM, self.step());
                    self.text.emit(if op == Token::Inc { ADD } else { SUB });
                    self.text.emit(if self.ty == CHAR { SC } else { SI });
                    self.text.emit(PSH);
                    self.text.emit_with(IMM, self.step());
                    self.text.emit(if op == Token::Inc { SUB } else { ADD });
                    self.next();
                }
                Token::Brak => {
                    self.next();
                    self.text.emit(PSH);
                    self.expr(Token::Assign)?;
                    self.expect(b']', ErrorKind::CloseBracketExpected)?;
                    if t > PTR {
                        self.scale_index();
                    } else if t < PTR {
                        return Err(self.err(ErrorKind::PointerExpected));
                    }
                    self.text.emit(ADD);
                    self.ty = t - PTR;
                    self.text.emit(if self.ty == CHAR { LC } else { LI });
                }
                _ => return Err(self.err(ErrorKind::Internal)),
            }
        }
        Ok(())
    }

    fn leading_operand(&mut self) -> Result<(), CompileError> {
        match self.tok {
            Token::Eof => return Err(self.err(ErrorKind::UnexpectedEof)),
            Token::Num => {
                self.text.emit_with(IMM, self.ival);
                self.next();
                self.ty = INT;
            }
            Token::Punct(b'"') => {
                self.text.emit_with(IMM, self.ival);
                self.next();
                // Adjacent literals concatenate; their bytes are already
                // laid out back to back in the data segment.
                while self.tok == Token::Punct(b'"') {
                    self.next();
                }
                self.data.seal_string();
                self.ty = PTR;
            }
            Token::Id => {
                let d = self.cur;
                self.next();
                if self.tok == Token::Punct(b'(') {
                    self.call(d)?;
                } else if self.syms[d].class == Class::Num {
                    self.text.emit_with(IMM, self.syms[d].val);
                    self.ty = INT;
                } else {
                    match self.syms[d].class {
                        Class::Loc => {
                            let offset = self.loc - self.syms[d].val;
                            self.text.emit_with(LEA, offset);
                        }
                        Class::Glo => self.text.emit_with(LGB, self.syms[d].val),
                        _ => return Err(self.err(ErrorKind::UndefinedVariable)),
                    }
                    self.ty = self.syms[d].ty;
                    self.text.emit(if self.ty == CHAR { LC } else { LI });
                }
            }
            Token::Punct(b'(') => {
                self.next();
                if self.tok == Token::Int || self.tok == Token::Char {
                    let mut cast = if self.tok == Token::Int { INT } else { CHAR };
                    self.next();
                    while self.tok == Token::Mul {
                        self.next();
                        cast += PTR;
                    }
                    if self.tok != Token::Punct(b')') {
                        return Err(self.err(ErrorKind::BadCast));
                    }
                    self.next();
                    self.expr(Token::Inc)?;
                    self.ty = cast;
                } else {
                    self.expr(Token::Assign)?;
                    self.expect(b')', ErrorKind::CloseParenExpected)?;
                }
            }
            Token::Mul => {
                self.next();
                self.expr(Token::Inc)?;
                if self.ty > INT {
                    self.ty -= PTR;
                } else {
                    return Err(self.err(ErrorKind::BadDereference));
                }
                self.text.emit(if self.ty == CHAR { LC } else { LI });
            }
            Token::And => {
                self.next();
                self.expr(Token::Inc)?;
                match self.text.last_op() {
                    Some(LC) | Some(LI) => self.text.rewind(),
                    _ => return Err(self.err(ErrorKind::BadAddressOf)),
                }
                self.ty += PTR;
            }
            Token::Punct(b'!') => {
                self.next();
                self.expr(Token::Inc)?;
                self.text.emit(PSH);
                self.text.emit_with(IMM, 0);
                self.text.emit(EQ);
                self.ty = INT;
            }
            Token::Punct(b'~') => {
                self.next();
                self.expr(Token::Inc)?;
                self.text.emit(PSH);
                self.text.emit_with(IMM, -1);
                self.text.emit(XOR);
                self.ty = INT;
            }
            Token::Add => {
                self.next();
                self.expr(Token::Inc)?;
                self.ty = INT;
            }
            Token::Sub => {
                self.next();
                if self.tok == Token::Num {
                    self.text.emit_with(IMM, self.ival.wrapping_neg());
                    self.next();
                } else {
                    self.text.emit_with(IMM, -1);
                    self.text.emit(PSH);
                    self.expr(Token::Inc)?;
                    self.text.emit(MUL);
                }
                self.ty = INT;
            }
            Token::Inc | Token::Dec => {
                let op = self.tok;
                self.next();
                self.expr(Token::Inc)?;
                self.reload_lvalue("pre-increment")?;
                self.text.emit(PSH);
                self.text.emit_with(IMM, self.step());
                self.text.emit(if op == Token::Inc { ADD } else { SUB });
                self.text.emit(if self.ty == CHAR { SC } else { SI });
            }
            Token::Punct(b) => return Err(self.err(ErrorKind::BadExpression(b as char))),
            _ => return Err(self.err(ErrorKind::Internal)),
        }
        Ok(())
    }

    /// Compiles a call: arguments left to right, each pushed, then either
    /// the host-call opcode or a subroutine jump, then the stack adjust.
    fn call(&mut self, d: usize) -> Result<(), CompileError> {
        self.next();
        let mut argn = 0;
        while self.tok != Token::Eof && self.tok != Token::Punct(b')') {
            self.expr(Token::Assign)?;
            self.text.emit(PSH);
            argn += 1;
            if self.tok == Token::Punct(b',') {
                self.next();
            }
        }
        self.next();

        match self.syms[d].class {
            Class::Sys => self.text.emit_word(self.syms[d].val),
            Class::Fun => {
                let target = self.syms[d].val;
                self.text.emit_with(JSR, target);
            }
            _ => return Err(self.err(ErrorKind::BadFunctionCall)),
        }
        if argn > 0 {
            self.text.emit_with(ADJ, argn);
        }
        self.ty = self.syms[d].ty;
        Ok(())
    }

    /// One ordinary binary operator: push the left value, compile the
    /// right side at the next level, combine.
    fn binary(&mut self, rhs_lev: Token, op: Opcode) -> Result<(), CompileError> {
        self.next();
        self.text.emit(PSH);
        self.expr(rhs_lev)?;
        self.text.emit(op);
        self.ty = INT;
        Ok(())
    }

    /// The lvalue just compiled ends in a load; turn it into "push the
    /// address, then load" so a store can follow.
    fn reload_lvalue(&mut self, context: &'static str) -> Result<(), CompileError> {
        match self.text.last_op() {
            Some(op @ LC) | Some(op @ LI) => {
                self.text.rewrite_last(PSH);
                self.text.emit(op);
                Ok(())
            }
            _ => Err(self.err(ErrorKind::BadLvalue(context))),
        }
    }

    /// Element size for pointer arithmetic on the current left-hand type.
    fn step(&self) -> i32 {
        if self.ty > PTR {
            4
        } else {
            1
        }
    }

    /// Multiplies the index in the accumulator by the word size.
    fn scale_index(&mut self) {
        self.text.emit(PSH);
        self.text.emit_with(IMM, 4);
        self.text.emit(MUL);
    }
}
