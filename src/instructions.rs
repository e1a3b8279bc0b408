use crate::Word;
use num::traits::ToPrimitive;
use num_derive::{FromPrimitive, ToPrimitive};

/// Machine instruction set.
///
/// An instruction is one opcode word. Opcodes up to and including [`LGB`]
/// carry one operand word; all others are a single word. The numeric order
/// of the variants is part of the image format and must not change.
///
/// [`LGB`]: #variant.LGB
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, FromPrimitive, ToPrimitive)]
pub enum Opcode {
    /// Load local address. Sets `a` to the byte address of the frame slot
    /// `bp + 4 * operand`. Parameters sit at positive operands, locals at
    /// negative ones.
    LEA,
    /// Load immediate. Sets `a` to the operand.
    IMM,
    /// Jump. Adds the operand word to the program counter.
    JMP,
    /// Jump to subroutine. Pushes the return address and sets the program
    /// counter to the operand, a word offset from the text base.
    JSR,
    /// Branch if zero. Adds the operand to the program counter when `a` is
    /// zero, otherwise skips the operand.
    BZ,
    /// Branch if not zero. Mirror image of [`BZ`](#variant.BZ).
    BNZ,
    /// Enter subroutine. Pushes `bp`, makes the current `sp` the new frame
    /// base and reserves `operand` words for locals.
    ENT,
    /// Stack adjust. Pops `operand` words, discarding call arguments.
    ADJ,
    /// Load global address. Sets `a` to the data segment address of the
    /// operand offset.
    LGB,
    /// Leave subroutine. Unwinds the frame and resumes at the saved return
    /// address.
    LEV,
    /// Load the int at address `a` into `a`.
    LI,
    /// Load the byte at address `a` into `a`.
    LC,
    /// Store `a` as an int at the popped address.
    SI,
    /// Store `a` as a byte at the popped address. `a` keeps the stored
    /// byte value.
    SC,
    /// Push `a` onto the stack.
    PSH,
    /// Bitwise or of the popped word and `a`.
    OR,
    /// Bitwise exclusive-or of the popped word and `a`.
    XOR,
    /// Bitwise and of the popped word and `a`.
    AND,
    /// Equality comparison, yielding 0 or 1.
    EQ,
    /// Inequality comparison, yielding 0 or 1.
    NE,
    /// Signed less-than comparison, yielding 0 or 1.
    LT,
    /// Signed greater-than comparison, yielding 0 or 1.
    GT,
    /// Signed less-or-equal comparison, yielding 0 or 1.
    LE,
    /// Signed greater-or-equal comparison, yielding 0 or 1.
    GE,
    /// Shift the popped word left by `a`.
    SHL,
    /// Shift the popped word right by `a`, inserting the sign bit.
    SHR,
    /// Wrapping addition of the popped word and `a`.
    ADD,
    /// Wrapping subtraction of `a` from the popped word.
    SUB,
    /// Wrapping multiplication of the popped word and `a`.
    MUL,
    /// Signed division of the popped word by `a`.
    DIV,
    /// Signed remainder of the popped word by `a`.
    MOD,
    /// Host call `fopen(name, mode)`. Yields a nonzero file handle, or 0.
    OPEN,
    /// Host call `fread(buf, size, count, handle)`. Yields the number of
    /// whole items read.
    READ,
    /// Host call `fclose(handle)`.
    CLOS,
    /// Host call `printf(fmt, ...)`. Yields the number of bytes written.
    PRTF,
    /// Host call `malloc(size)`. Yields a heap address, or 0.
    MALC,
    /// Host call `memset(buf, value, count)`.
    MSET,
    /// Host call `memcmp(left, right, count)`.
    MCMP,
    /// Host call `exit(code)`. Reports the cycle count and stops.
    EXIT,
}

/// The eight host calls, in the order their names are pre-registered by the
/// compiler.
pub const SYSCALLS: [Opcode; 8] = [
    Opcode::OPEN,
    Opcode::READ,
    Opcode::CLOS,
    Opcode::PRTF,
    Opcode::MALC,
    Opcode::MSET,
    Opcode::MCMP,
    Opcode::EXIT,
];

impl Opcode {
    /// Whether one operand word follows the opcode word.
    pub fn has_operand(self) -> bool {
        self <= Opcode::LGB
    }
}

#[inline]
pub fn opcode_word(op: Opcode) -> Word {
    op.to_i32().unwrap()
}

macro_rules! impl_enum_display {
    ($e:ty) => {
        impl std::fmt::Display for $e {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Debug::fmt(self, f)
            }
        }
    };
}

impl_enum_display!(Opcode);
