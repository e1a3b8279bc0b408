//! Compiler for a small C subset targeting the [civm](../civm/index.html)
//! stack machine.
//!
//! [`compile`](fn.compile.html) translates one source buffer into an
//! [`Image`](../cifile/struct.Image.html) in a single left-to-right pass:
//! the recursive-descent parser emits code words while it reads tokens,
//! patching branch holes as soon as their targets are known. There is no
//! syntax tree. [`listing`](fn.listing.html) runs the same pass while
//! echoing each source line together with the words emitted for it.
//!
//! # Accepted language
//!
//! Types are `char`, `int` and pointers derived from them. A program is a
//! sequence of global declarations:
//!
//! * global variables, each occupying a 4-byte cell in the data segment,
//! * `enum { NAME, NAME = 3, ... }` constant lists,
//! * functions with parameter lists; declarations of `int`/`char` locals
//!   may only appear at the start of a body.
//!
//! Statements are `if`/`else`, `while`, `return`, blocks, the empty
//! statement and expression statements. Expressions cover the usual C
//! operator set: assignment, `?:`, `||`, `&&`, bitwise and relational
//! operators, shifts, arithmetic, prefix and postfix `++`/`--`, casts,
//! `*`/`&`/`!`/`~`, indexing and calls. Pointer arithmetic scales by the
//! element size (4 for word pointers, 1 for `char*`).
//!
//! Literals are decimal and `0x` hexadecimal integers, character literals
//! and string literals; adjacent string literals are concatenated. Only the
//! `\n` escape is translated, any other backslash escape keeps the escaped
//! character. `//` comments and `#`-prefixed lines are skipped.
//!
//! The eight host calls `fopen`, `fread`, `fclose`, `printf`, `malloc`,
//! `memset`, `memcmp` and `exit` are pre-registered; calling one emits its
//! opcode directly instead of a subroutine jump.
//!
//! The first error aborts compilation and reports the offending line.

mod compiler;
mod dump;
mod emit;
mod error;
mod expr;
mod lexer;
mod stmt;
mod symbol;
mod token;
mod types;

#[cfg(test)]
mod test;

pub use error::{CompileError, ErrorKind};

use cifile::Image;
use compiler::Compiler;

/// Compiles `source` into a program image.
pub fn compile(source: &str) -> Result<Image, CompileError> {
    let mut compiler = Compiler::new(source.as_bytes(), false);
    compiler.parse()?;
    compiler.into_image()
}

/// Compiles `source` while printing each line and its emitted words.
pub fn listing(source: &str) -> Result<(), CompileError> {
    let mut compiler = Compiler::new(source.as_bytes(), true);
    compiler.parse()
}
