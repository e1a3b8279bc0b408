use civm::Opcode;
use num::FromPrimitive;

use crate::compiler::Compiler;

impl<'a> Compiler<'a> {
    /// Echoes the source line that just ended, then disassembles the words
    /// emitted while compiling it.
    pub(crate) fn dump_line(&mut self) {
        let line = String::from_utf8_lossy(&self.src[self.line_start..self.pos]);
        print!("{}: {}", self.line, line);

        let mut count = 1;
        while self.listed + 1 < self.text.len() {
            self.listed += 1;
            let at = self.listed;
            let word = self.text.word(at);

            match Opcode::from_i32(word) {
                Some(op) if op.has_operand() => {
                    self.listed += 1;
                    let operand = self.text.word(self.listed);
                    if op == Opcode::LGB {
                        println!(
                            ">{:>7} {:>4}: {:<4} {:>6}\t; {}",
                            at,
                            count,
                            op.to_string(),
                            operand,
                            self.operand_comment(operand)
                        );
                    } else {
                        println!(
                            ">{:>7} {:>4}: {:<4} {:>6}",
                            at,
                            count,
                            op.to_string(),
                            operand
                        );
                    }
                }
                Some(op) => println!(">{:>7} {:>4}: {:<4}", at, count, op.to_string()),
                None => println!(">{:>7} {:>4}: {:<4}", at, count, word),
            }
            count += 1;
        }
    }

    /// Resolves a data segment offset to a global name, or failing that to
    /// an escaped rendering of the string stored there.
    fn operand_comment(&self, offset: i32) -> String {
        if let Some(name) = self.syms.global_name(offset) {
            return name.to_string();
        }

        let mut rendered = String::new();
        let mut at = offset as usize;
        while let Some(&b) = self.data.bytes().get(at) {
            if b == 0 {
                break;
            }
            match b {
                b'\n' => rendered.push_str("\\n"),
                b'\t' => rendered.push_str("\\t"),
                _ => rendered.push(b as char),
            }
            at += 1;
        }
        rendered
    }
}
