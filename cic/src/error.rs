use std::error::Error;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    UnexpectedEof,
    BadEnumIdentifier,
    BadEnumInitializer,
    BadGlobalDeclaration,
    DuplicateGlobal,
    BadParameterDeclaration,
    DuplicateParameter,
    BadFunctionDefinition,
    BadLocalDeclaration,
    DuplicateLocal,
    OpenParenExpected,
    CloseParenExpected,
    SemicolonExpected,
    ColonExpected,
    CloseBracketExpected,
    BadCast,
    BadDereference,
    BadAddressOf,
    /// Carries the construct that required an lvalue, e.g. "assignment".
    BadLvalue(&'static str),
    PointerExpected,
    UndefinedVariable,
    BadFunctionCall,
    /// Carries the offending token byte.
    BadExpression(char),
    MainNotDefined,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::UnexpectedEof => write!(f, "unexpected eof in expression"),
            ErrorKind::BadEnumIdentifier => write!(f, "bad enum identifier"),
            ErrorKind::BadEnumInitializer => write!(f, "bad enum initializer"),
            ErrorKind::BadGlobalDeclaration => write!(f, "bad global declaration"),
            ErrorKind::DuplicateGlobal => write!(f, "duplicate global definition"),
            ErrorKind::BadParameterDeclaration => write!(f, "bad parameter declaration"),
            ErrorKind::DuplicateParameter => write!(f, "duplicate parameter definition"),
            ErrorKind::BadFunctionDefinition => write!(f, "bad function definition"),
            ErrorKind::BadLocalDeclaration => write!(f, "bad local declaration"),
            ErrorKind::DuplicateLocal => write!(f, "duplicate local definition"),
            ErrorKind::OpenParenExpected => write!(f, "open paren expected"),
            ErrorKind::CloseParenExpected => write!(f, "close paren expected"),
            ErrorKind::SemicolonExpected => write!(f, "semicolon expected"),
            ErrorKind::ColonExpected => write!(f, "conditional missing colon"),
            ErrorKind::CloseBracketExpected => write!(f, "close bracket expected"),
            ErrorKind::BadCast => write!(f, "bad cast"),
            ErrorKind::BadDereference => write!(f, "bad dereference"),
            ErrorKind::BadAddressOf => write!(f, "bad address-of"),
            ErrorKind::BadLvalue(context) => write!(f, "bad lvalue in {}", context),
            ErrorKind::PointerExpected => write!(f, "pointer type expected"),
            ErrorKind::UndefinedVariable => write!(f, "undefined variable"),
            ErrorKind::BadFunctionCall => write!(f, "bad function call"),
            ErrorKind::BadExpression(token) => write!(f, "bad expression {}", token),
            ErrorKind::MainNotDefined => write!(f, "main() not defined"),
            ErrorKind::Internal => write!(f, "compiler error"),
        }
    }
}

/// A fatal diagnostic, carrying the 1-based source line it was raised on.
/// Line 0 marks errors without a source position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CompileError {
    pub line: i32,
    pub kind: ErrorKind,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}: {}", self.line, self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl Error for CompileError {}
