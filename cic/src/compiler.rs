use cifile::Image;
use civm::Opcode;

use crate::emit::{DataSegment, TextSegment};
use crate::error::{CompileError, ErrorKind};
use crate::symbol::{Class, SymbolTable};
use crate::token::Token;
use crate::types::{Type, CHAR, INT, PTR};

/// All state of one compilation pass: the source cursor, the current
/// token, the symbol table and the two output segments.
pub(crate) struct Compiler<'a> {
    pub(crate) src: &'a [u8],
    pub(crate) pos: usize,
    pub(crate) line_start: usize,
    pub(crate) line: i32,
    pub(crate) tok: Token,
    /// Value of the current `Num` token, or the data offset of the current
    /// string literal.
    pub(crate) ival: i32,
    /// Symbol of the most recently lexed identifier.
    pub(crate) cur: usize,
    /// Type of the most recently compiled expression.
    pub(crate) ty: Type,
    /// Frame index one past the parameters of the function being compiled.
    pub(crate) loc: i32,
    pub(crate) listing: bool,
    /// Index of the last word already shown in the listing.
    pub(crate) listed: usize,
    pub(crate) syms: SymbolTable,
    pub(crate) text: TextSegment,
    pub(crate) data: DataSegment,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(src: &'a [u8], listing: bool) -> Compiler<'a> {
        Compiler {
            src,
            pos: 0,
            line_start: 0,
            line: 1,
            tok: Token::Eof,
            ival: 0,
            cur: 0,
            ty: INT,
            loc: 0,
            listing,
            listed: 0,
            syms: SymbolTable::new(),
            text: TextSegment::new(),
            data: DataSegment::new(),
        }
    }

    pub(crate) fn err(&self, kind: ErrorKind) -> CompileError {
        CompileError {
            line: self.line,
            kind,
        }
    }

    pub(crate) fn expect(&mut self, punct: u8, kind: ErrorKind) -> Result<(), CompileError> {
        if self.tok == Token::Punct(punct) {
            self.next();
            Ok(())
        } else {
            Err(self.err(kind))
        }
    }

    /// Compiles the whole source: a sequence of enum declarations, global
    /// variables and function definitions.
    pub(crate) fn parse(&mut self) -> Result<(), CompileError> {
        self.line = 1;
        self.next();
        while self.tok != Token::Eof {
            let mut base = INT;
            if self.tok == Token::Int {
                self.next();
            } else if self.tok == Token::Char {
                self.next();
                base = CHAR;
            } else if self.tok == Token::Enum {
                self.enum_declaration()?;
            }

            while self.tok != Token::Punct(b';') && self.tok != Token::Punct(b'}') {
                let mut ty = base;
                while self.tok == Token::Mul {
                    self.next();
                    ty += PTR;
                }
                if self.tok != Token::Id {
                    return Err(self.err(ErrorKind::BadGlobalDeclaration));
                }
                let d = self.cur;
                if self.syms[d].class != Class::None {
                    return Err(self.err(ErrorKind::DuplicateGlobal));
                }
                self.next();
                self.syms[d].ty = ty;

                if self.tok == Token::Punct(b'(') {
                    self.function(d)?;
                } else {
                    self.syms[d].class = Class::Glo;
                    self.syms[d].val = self.data.pos();
                    self.data.reserve_global();
                    if self.tok == Token::Punct(b',') {
                        self.next();
                    }
                }
            }
            self.next();
        }
        Ok(())
    }

    /// Parses `enum tag? { NAME (= Num)?, ... }`. Each name becomes an int
    /// constant, counting on from the last explicit initializer.
    fn enum_declaration(&mut self) -> Result<(), CompileError> {
        self.next();
        if self.tok != Token::Punct(b'{') {
            // skip the tag
            self.next();
        }
        if self.tok == Token::Punct(b'{') {
            self.next();
            let mut value = 0;
            while self.tok != Token::Punct(b'}') {
                if self.tok != Token::Id {
                    return Err(self.err(ErrorKind::BadEnumIdentifier));
                }
                let d = self.cur;
                self.next();
                if self.tok == Token::Assign {
                    self.next();
                    if self.tok != Token::Num {
                        return Err(self.err(ErrorKind::BadEnumInitializer));
                    }
                    value = self.ival;
                    self.next();
                }
                let entry = &mut self.syms[d];
                entry.class = Class::Num;
                entry.ty = INT;
                entry.val = value;
                value += 1;
                if self.tok == Token::Punct(b',') {
                    self.next();
                }
            }
            self.next();
        }
        Ok(())
    }

    /// Compiles a function definition. Parameters and then leading local
    /// declarations shadow outer bindings and get ascending frame indices;
    /// the body follows, and finally every shadowed name is restored.
    fn function(&mut self, d: usize) -> Result<(), CompileError> {
        self.syms[d].class = Class::Fun;
        self.syms[d].val = self.text.pos();

        self.next();
        let mut index = 0;
        while self.tok != Token::Punct(b')') {
            let mut ty = INT;
            if self.tok == Token::Int {
                self.next();
            } else if self.tok == Token::Char {
                self.next();
                ty = CHAR;
            }
            while self.tok == Token::Mul {
                self.next();
                ty += PTR;
            }
            if self.tok != Token::Id {
                return Err(self.err(ErrorKind::BadParameterDeclaration));
            }
            let p = self.cur;
            if self.syms[p].class == Class::Loc {
                return Err(self.err(ErrorKind::DuplicateParameter));
            }
            self.syms[p].shadow();
            let entry = &mut self.syms[p];
            entry.class = Class::Loc;
            entry.ty = ty;
            entry.val = index;
            index += 1;
            self.next();
            if self.tok == Token::Punct(b',') {
                self.next();
            }
        }
        self.next();

        if self.tok != Token::Punct(b'{') {
            return Err(self.err(ErrorKind::BadFunctionDefinition));
        }
        index += 1;
        self.loc = index;
        self.next();

        while self.tok == Token::Int || self.tok == Token::Char {
            let base = if self.tok == Token::Int { INT } else { CHAR };
            self.next();
            while self.tok != Token::Punct(b';') {
                let mut ty = base;
                while self.tok == Token::Mul {
                    self.next();
                    ty += PTR;
                }
                if self.tok != Token::Id {
                    return Err(self.err(ErrorKind::BadLocalDeclaration));
                }
                let l = self.cur;
                if self.syms[l].class == Class::Loc {
                    return Err(self.err(ErrorKind::DuplicateLocal));
                }
                self.syms[l].shadow();
                index += 1;
                let entry = &mut self.syms[l];
                entry.class = Class::Loc;
                entry.ty = ty;
                entry.val = index;
                self.next();
                if self.tok == Token::Punct(b',') {
                    self.next();
                }
            }
            self.next();
        }

        self.text.emit_with(Opcode::ENT, index - self.loc);
        while self.tok != Token::Punct(b'}') {
            self.stmt()?;
        }
        if self.text.last_op() != Some(Opcode::LEV) {
            self.text.emit(Opcode::LEV);
        }

        self.syms.restore_locals();
        Ok(())
    }

    /// Finishes the pass: locates `main` and packages the segments.
    pub(crate) fn into_image(self) -> Result<Image, CompileError> {
        match self.syms.find("main") {
            Some(main) if main.class == Class::Fun => Ok(Image::from(
                main.val,
                self.text.into_words(),
                self.data.into_bytes(),
            )),
            _ => Err(CompileError {
                line: 0,
                kind: ErrorKind::MainNotDefined,
            }),
        }
    }
}
