use std::convert::TryFrom;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};

use num::FromPrimitive;

use crate::constants::{HEAP_SIZE, STACK_SIZE};
use crate::{opcode_word, Memory, Opcode, Word};

/// Why the machine stopped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExitCode {
    /// The program called `exit`; carries the program's exit code.
    Exit(Word),
    /// A dispatched word is not a known opcode.
    InvalidOpcode(Word),
    /// A load or store touched an address outside program memory.
    BadMemoryAccess(Word),
    /// The program counter left the text segment.
    BadJump,
    /// The call stack grew past its region.
    StackOverflow,
    /// Integer division or remainder by zero.
    DivisionByZero,
}

/// Stack machine executing one program image.
///
/// Memory is a single flat byte region laid out as data segment (address 0),
/// bump-allocated heap, then the call stack at the top, growing downward in
/// word cells. The program counter indexes words in the text segment; code
/// and data never mix.
///
/// A two-word `PSH; EXIT` epilogue is appended to the working copy of the
/// text, and `main` is entered with a synthetic frame whose return address
/// is that epilogue. When `main` returns, its result is pushed and `exit`
/// reports it.
pub struct Machine<W = io::Stdout> {
    text: Vec<Word>,
    memory: Memory,
    epilogue: usize,
    main_offset: Word,
    stack_floor: u32,
    heap_next: u32,
    files: Vec<Option<File>>,
    out: W,
    trace: bool,
    a: Word,
    pc: usize,
    sp: u32,
    bp: u32,
    cycle: u64,
}

impl Machine<io::Stdout> {
    pub fn new(text: &[Word], data: &[u8], main_offset: Word) -> Machine<io::Stdout> {
        Machine::with_output(text, data, main_offset, io::stdout())
    }
}

impl<W: Write> Machine<W> {
    pub fn with_output(text: &[Word], data: &[u8], main_offset: Word, out: W) -> Machine<W> {
        let data_top = (data.len() as u32 + 3) & !3;
        let stack_floor = data_top + HEAP_SIZE;
        let mut memory = Memory::new(stack_floor + STACK_SIZE);

        memory
            .slice_mut(0, data.len() as u32)
            .unwrap()
            .copy_from_slice(data);

        let mut text = text.to_vec();
        let epilogue = text.len();
        text.push(opcode_word(Opcode::PSH));
        text.push(opcode_word(Opcode::EXIT));

        let sp = memory.len();
        Machine {
            text,
            memory,
            epilogue,
            main_offset,
            stack_floor,
            // Keep the first heap address nonzero so a successful malloc
            // can never look like a failed one.
            heap_next: data_top.max(4),
            files: Vec::new(),
            out,
            trace: false,
            a: 0,
            pc: 0,
            sp,
            bp: sp,
            cycle: 0,
        }
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs the program to completion. `args` become `argc`/`argv` of the
    /// program's `main`.
    pub fn run(&mut self, args: &[String]) -> ExitCode {
        match self.exec(args) {
            Ok(code) => code,
            Err(stop) => {
                self.report(stop);
                stop
            }
        }
    }

    fn exec(&mut self, args: &[String]) -> Result<ExitCode, ExitCode> {
        use crate::Opcode::*;

        self.setup_stack(args)?;

        loop {
            let word = self.fetch()?;
            self.cycle += 1;

            let op = match Opcode::from_i32(word) {
                Some(op) => op,
                None => return Err(ExitCode::InvalidOpcode(word)),
            };

            if self.trace {
                self.trace_instruction(op);
            }

            match op {
                LEA => {
                    let n = self.fetch()?;
                    self.a = (self.bp as Word).wrapping_add(n.wrapping_mul(4));
                }
                IMM => {
                    self.a = self.fetch()?;
                }
                JMP => {
                    let slot = self.pc as i64;
                    let delta = self.fetch()?;
                    self.set_pc(slot + delta as i64)?;
                }
                JSR => {
                    let target = self.fetch()?;
                    self.push(self.pc as Word)?;
                    self.set_pc(target as i64)?;
                }
                BZ => {
                    let slot = self.pc as i64;
                    let delta = self.fetch()?;
                    if self.a == 0 {
                        self.set_pc(slot + delta as i64)?;
                    }
                }
                BNZ => {
                    let slot = self.pc as i64;
                    let delta = self.fetch()?;
                    if self.a != 0 {
                        self.set_pc(slot + delta as i64)?;
                    }
                }
                ENT => {
                    let n = self.fetch()?;
                    self.push(self.bp as Word)?;
                    self.bp = self.sp;
                    self.set_sp(self.sp as i64 - n as i64 * 4)?;
                }
                ADJ => {
                    let n = self.fetch()?;
                    self.set_sp(self.sp as i64 + n as i64 * 4)?;
                }
                LGB => {
                    // The data segment starts at address 0, so the operand
                    // offset already is the address.
                    self.a = self.fetch()?;
                }
                LEV => {
                    self.set_sp(self.bp as i64)?;
                    let saved = self.pop()?;
                    self.bp = to_addr(saved)?;
                    let ret = self.pop()?;
                    self.set_pc(ret as i64)?;
                }
                LI => self.a = self.read_word(self.a)?,
                LC => self.a = self.read_byte(self.a)? as Word,
                SI => {
                    let at = self.pop()?;
                    self.write_word(at, self.a)?;
                }
                SC => {
                    let at = self.pop()?;
                    self.write_byte(at, self.a as u8)?;
                    self.a &= 0xff;
                }
                PSH => self.push(self.a)?,

                OR => self.a = self.pop()? | self.a,
                XOR => self.a = self.pop()? ^ self.a,
                AND => self.a = self.pop()? & self.a,
                EQ => self.a = (self.pop()? == self.a) as Word,
                NE => self.a = (self.pop()? != self.a) as Word,
                LT => self.a = (self.pop()? < self.a) as Word,
                GT => self.a = (self.pop()? > self.a) as Word,
                LE => self.a = (self.pop()? <= self.a) as Word,
                GE => self.a = (self.pop()? >= self.a) as Word,
                SHL => self.a = self.pop()?.wrapping_shl(self.a as u32),
                SHR => self.a = self.pop()?.wrapping_shr(self.a as u32),
                ADD => self.a = self.pop()?.wrapping_add(self.a),
                SUB => self.a = self.pop()?.wrapping_sub(self.a),
                MUL => self.a = self.pop()?.wrapping_mul(self.a),
                DIV => {
                    let lhs = self.pop()?;
                    if self.a == 0 {
                        return Err(ExitCode::DivisionByZero);
                    }
                    self.a = lhs.wrapping_div(self.a);
                }
                MOD => {
                    let lhs = self.pop()?;
                    if self.a == 0 {
                        return Err(ExitCode::DivisionByZero);
                    }
                    self.a = lhs.wrapping_rem(self.a);
                }

                OPEN => {
                    let name = self.read_cstring(self.arg(1)?)?;
                    let mode = self.read_cstring(self.arg(0)?)?;
                    self.a = self.host_open(&name, &mode);
                }
                READ => {
                    let buf = self.arg(3)?;
                    let size = self.arg(2)?;
                    let count = self.arg(1)?;
                    let handle = self.arg(0)?;
                    self.a = self.host_read(buf, size, count, handle)?;
                }
                CLOS => {
                    let handle = self.arg(0)?;
                    self.a = self.host_close(handle);
                }
                PRTF => {
                    // The operand of the stack adjust following the call
                    // holds the argument count.
                    let argn = self.text.get(self.pc + 1).copied().unwrap_or(0);
                    self.a = self.host_printf(argn)?;
                }
                MALC => {
                    let size = self.arg(0)?;
                    self.a = self.host_malloc(size);
                }
                MSET => {
                    let buf = self.arg(2)?;
                    let value = self.arg(1)?;
                    let count = self.arg(0)?;
                    let slice = self
                        .memory
                        .slice_mut(to_addr(buf)?, to_addr(count)?)
                        .map_err(|_| ExitCode::BadMemoryAccess(buf))?;
                    for b in slice.iter_mut() {
                        *b = value as u8;
                    }
                    self.a = buf;
                }
                MCMP => {
                    let left = self.arg(2)?;
                    let right = self.arg(1)?;
                    let count = to_addr(self.arg(0)?)?;
                    let l = self
                        .memory
                        .slice(to_addr(left)?, count)
                        .map_err(|_| ExitCode::BadMemoryAccess(left))?;
                    let r = self
                        .memory
                        .slice(to_addr(right)?, count)
                        .map_err(|_| ExitCode::BadMemoryAccess(right))?;
                    self.a = l
                        .iter()
                        .zip(r)
                        .find_map(|(a, b)| {
                            if a != b {
                                Some(*a as Word - *b as Word)
                            } else {
                                None
                            }
                        })
                        .unwrap_or(0);
                }
                EXIT => {
                    let code = self.arg(0)?;
                    let _ = writeln!(self.out, "exit({}) cycle = {}", code, self.cycle);
                    return Ok(ExitCode::Exit(code));
                }
            }
        }
    }

    /// Builds the synthetic frame `main` returns from: `argc` and `argv`
    /// as arguments, the epilogue as return address.
    fn setup_stack(&mut self, args: &[String]) -> Result<(), ExitCode> {
        self.sp = self.memory.len();
        self.bp = self.sp;

        let mut pointers = Vec::with_capacity(args.len());
        for arg in args {
            let at = self.host_malloc(arg.len() as Word + 1);
            if at == 0 {
                return Err(ExitCode::BadMemoryAccess(at));
            }
            self.memory
                .slice_mut(at as u32, arg.len() as u32)
                .map_err(|_| ExitCode::BadMemoryAccess(at))?
                .copy_from_slice(arg.as_bytes());
            pointers.push(at);
        }

        let argv = self.host_malloc(pointers.len() as Word * 4);
        for (i, at) in pointers.iter().enumerate() {
            self.write_word(argv + i as Word * 4, *at)?;
        }

        self.push(args.len() as Word)?;
        self.push(argv)?;
        self.push(self.epilogue as Word)?;
        self.set_pc(self.main_offset as i64)
    }

    fn fetch(&mut self) -> Result<Word, ExitCode> {
        let word = self.text.get(self.pc).copied().ok_or(ExitCode::BadJump)?;
        self.pc += 1;
        Ok(word)
    }

    fn set_pc(&mut self, target: i64) -> Result<(), ExitCode> {
        if target < 0 || target >= self.text.len() as i64 {
            return Err(ExitCode::BadJump);
        }
        self.pc = target as usize;
        Ok(())
    }

    fn set_sp(&mut self, target: i64) -> Result<(), ExitCode> {
        if target < self.stack_floor as i64 {
            return Err(ExitCode::StackOverflow);
        }
        if target > self.memory.len() as i64 {
            return Err(ExitCode::BadMemoryAccess(target as Word));
        }
        self.sp = target as u32;
        Ok(())
    }

    fn push(&mut self, value: Word) -> Result<(), ExitCode> {
        self.set_sp(self.sp as i64 - 4)?;
        self.memory
            .write_word(self.sp, value)
            .map_err(|_| ExitCode::BadMemoryAccess(self.sp as Word))
    }

    fn pop(&mut self) -> Result<Word, ExitCode> {
        let value = self.read_word(self.sp as Word)?;
        self.sp += 4;
        Ok(value)
    }

    /// Reads the `index`-th word above the stack pointer, where the last
    /// pushed call argument is index 0.
    fn arg(&self, index: Word) -> Result<Word, ExitCode> {
        self.read_word((self.sp as i64 + index as i64 * 4) as Word)
    }

    fn read_word(&self, at: Word) -> Result<Word, ExitCode> {
        self.memory
            .read_word(to_addr(at)?)
            .map_err(|_| ExitCode::BadMemoryAccess(at))
    }

    fn write_word(&mut self, at: Word, value: Word) -> Result<(), ExitCode> {
        self.memory
            .write_word(to_addr(at)?, value)
            .map_err(|_| ExitCode::BadMemoryAccess(at))
    }

    fn read_byte(&self, at: Word) -> Result<u8, ExitCode> {
        self.memory
            .read_byte(to_addr(at)?)
            .map_err(|_| ExitCode::BadMemoryAccess(at))
    }

    fn write_byte(&mut self, at: Word, value: u8) -> Result<(), ExitCode> {
        self.memory
            .write_byte(to_addr(at)?, value)
            .map_err(|_| ExitCode::BadMemoryAccess(at))
    }

    fn read_cstring(&self, at: Word) -> Result<Vec<u8>, ExitCode> {
        self.memory
            .read_cstring(to_addr(at)?)
            .map_err(|_| ExitCode::BadMemoryAccess(at))
    }

    fn host_open(&mut self, name: &[u8], mode: &[u8]) -> Word {
        let name = String::from_utf8_lossy(name).into_owned();
        let file = match mode.first() {
            Some(b'w') => File::create(name),
            Some(b'a') => OpenOptions::new().append(true).create(true).open(name),
            _ => File::open(name),
        };

        match file {
            Ok(file) => {
                self.files.push(Some(file));
                self.files.len() as Word
            }
            Err(_) => 0,
        }
    }

    fn host_read(
        &mut self,
        buf: Word,
        size: Word,
        count: Word,
        handle: Word,
    ) -> Result<Word, ExitCode> {
        if size <= 0 || count <= 0 {
            return Ok(0);
        }

        let file = match usize::try_from(handle)
            .ok()
            .and_then(|h| h.checked_sub(1))
            .and_then(|h| self.files.get_mut(h))
            .and_then(Option::as_mut)
        {
            Some(file) => file,
            None => return Ok(0),
        };

        let total = (size as i64 * count as i64).min(u32::max_value() as i64) as u32;
        let dst = self
            .memory
            .slice_mut(to_addr(buf)?, total)
            .map_err(|_| ExitCode::BadMemoryAccess(buf))?;

        let mut got = 0;
        while got < dst.len() {
            match file.read(&mut dst[got..]) {
                Ok(0) | Err(_) => break,
                Ok(n) => got += n,
            }
        }

        Ok(got as Word / size)
    }

    fn host_close(&mut self, handle: Word) -> Word {
        let closed = usize::try_from(handle)
            .ok()
            .and_then(|h| h.checked_sub(1))
            .and_then(|h| self.files.get_mut(h))
            .map_or(false, |slot| slot.take().is_some());

        if closed {
            0
        } else {
            -1
        }
    }

    /// Renders the format string against the pushed arguments. Supports
    /// `%d`, `%x`, `%c`, `%s` and `%%`; anything else is copied through.
    fn host_printf(&mut self, argn: Word) -> Result<Word, ExitCode> {
        let fmt = self.read_cstring(self.arg(argn - 1)?)?;
        let mut rendered = Vec::with_capacity(fmt.len());
        let mut used = 0;

        let mut bytes = fmt.iter();
        while let Some(&b) = bytes.next() {
            if b != b'%' {
                rendered.push(b);
                continue;
            }
            let conversion = bytes.next().copied();
            match conversion {
                Some(b'd') => {
                    let value = self.arg(argn - 2 - used)?;
                    used += 1;
                    rendered.extend_from_slice(value.to_string().as_bytes());
                }
                Some(b'x') => {
                    let value = self.arg(argn - 2 - used)?;
                    used += 1;
                    rendered.extend_from_slice(format!("{:x}", value).as_bytes());
                }
                Some(b'c') => {
                    let value = self.arg(argn - 2 - used)?;
                    used += 1;
                    rendered.push(value as u8);
                }
                Some(b's') => {
                    let value = self.arg(argn - 2 - used)?;
                    used += 1;
                    let s = self.read_cstring(value)?;
                    rendered.extend_from_slice(&s);
                }
                Some(b'%') => rendered.push(b'%'),
                Some(other) => {
                    rendered.push(b'%');
                    rendered.push(other);
                }
                None => rendered.push(b'%'),
            }
        }

        let _ = self.out.write_all(&rendered);
        Ok(rendered.len() as Word)
    }

    fn host_malloc(&mut self, size: Word) -> Word {
        if size < 0 {
            return 0;
        }

        let mut rounded = (size as u32).wrapping_add(3) & !3;
        if rounded == 0 {
            rounded = 4;
        }

        match self.heap_next.checked_add(rounded) {
            Some(next) if next <= self.stack_floor => {
                let at = self.heap_next;
                self.heap_next = next;
                at as Word
            }
            _ => 0,
        }
    }

    fn trace_instruction(&mut self, op: Opcode) {
        let at = self.pc - 1;
        let result = if op.has_operand() {
            let operand = self.text.get(self.pc).copied().unwrap_or(0);
            writeln!(self.out, "{}> {}: {} {}", self.cycle, at, op, operand)
        } else {
            writeln!(self.out, "{}> {}: {}", self.cycle, at, op)
        };
        let _ = result;
    }

    fn report(&mut self, stop: ExitCode) {
        let result = match stop {
            ExitCode::Exit(_) => Ok(()),
            ExitCode::InvalidOpcode(word) => writeln!(
                self.out,
                "unknown instruction = {}! cycle = {}",
                word, self.cycle
            ),
            ExitCode::BadMemoryAccess(at) => writeln!(
                self.out,
                "bad memory access at {}! cycle = {}",
                at, self.cycle
            ),
            ExitCode::BadJump => writeln!(self.out, "bad jump! cycle = {}", self.cycle),
            ExitCode::StackOverflow => {
                writeln!(self.out, "stack overflow! cycle = {}", self.cycle)
            }
            ExitCode::DivisionByZero => {
                writeln!(self.out, "division by zero! cycle = {}", self.cycle)
            }
        };
        let _ = result;
    }
}

fn to_addr(value: Word) -> Result<u32, ExitCode> {
    u32::try_from(value).map_err(|_| ExitCode::BadMemoryAccess(value))
}
