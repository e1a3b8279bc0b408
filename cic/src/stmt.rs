use civm::Opcode::{BZ, JMP, LEV};

use crate::compiler::Compiler;
use crate::error::{CompileError, ErrorKind};
use crate::token::Token;

impl<'a> Compiler<'a> {
    /// Compiles one statement. Branch operands start as holes and are
    /// patched to relative deltas as soon as the targets are known.
    pub(crate) fn stmt(&mut self) -> Result<(), CompileError> {
        match self.tok {
            Token::If => {
                self.next();
                self.expect(b'(', ErrorKind::OpenParenExpected)?;
                self.expr(Token::Assign)?;
                self.expect(b')', ErrorKind::CloseParenExpected)?;

                self.text.emit(BZ);
                let mut hole = self.text.hole();
                self.stmt()?;
                if self.tok == Token::Else {
                    // False path lands past the jump that ends the
                    // then-arm.
                    self.text.patch(hole, self.text.pos() + 2);
                    self.text.emit(JMP);
                    hole = self.text.hole();
                    self.next();
                    self.stmt()?;
                }
                self.text.patch(hole, self.text.pos());
            }
            Token::While => {
                self.next();
                let top = self.text.pos();
                self.expect(b'(', ErrorKind::OpenParenExpected)?;
                self.expr(Token::Assign)?;
                self.expect(b')', ErrorKind::CloseParenExpected)?;

                self.text.emit(BZ);
                let hole = self.text.hole();
                self.stmt()?;
                self.text.emit(JMP);
                let back = self.text.hole();
                self.text.patch(back, top);
                self.text.patch(hole, self.text.pos());
            }
            Token::Return => {
                self.next();
                if self.tok != Token::Punct(b';') {
                    self.expr(Token::Assign)?;
                }
                self.text.emit(LEV);
                self.expect(b';', ErrorKind::SemicolonExpected)?;
            }
            Token::Punct(b'{') => {
                self.next();
                while self.tok != Token::Eof && self.tok != Token::Punct(b'}') {
                    self.stmt()?;
                }
                self.next();
            }
            Token::Punct(b';') => self.next(),
            _ => {
                self.expr(Token::Assign)?;
                self.expect(b';', ErrorKind::SemicolonExpected)?;
            }
        }
        Ok(())
    }
}
