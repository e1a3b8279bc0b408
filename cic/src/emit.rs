use civm::constants::TEXT_MAGIC;
use civm::{opcode_word, Opcode, Word};
use num::FromPrimitive;

/// Append-only code emitter.
///
/// Index 0 holds the magic sentinel, so the first instruction sits at
/// offset 1 and function addresses are never zero. Branch operands are
/// written as holes and patched to relative deltas once the target is
/// known, keeping the text segment position independent.
pub struct TextSegment {
    words: Vec<Word>,
    last_op: Option<Opcode>,
}

impl TextSegment {
    pub fn new() -> TextSegment {
        TextSegment {
            words: vec![TEXT_MAGIC],
            last_op: None,
        }
    }

    /// Index of the next word to be emitted.
    pub fn pos(&self) -> i32 {
        self.words.len() as i32
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn word(&self, at: usize) -> Word {
        self.words[at]
    }

    pub fn emit(&mut self, op: Opcode) {
        self.words.push(opcode_word(op));
        self.last_op = Some(op);
    }

    pub fn emit_with(&mut self, op: Opcode, operand: Word) {
        self.emit(op);
        self.words.push(operand);
    }

    /// Emits a raw instruction word, e.g. a host-call opcode taken from a
    /// symbol binding.
    pub fn emit_word(&mut self, word: Word) {
        self.words.push(word);
        self.last_op = Opcode::from_i32(word);
    }

    /// Reserves a branch operand slot to be patched later.
    pub fn hole(&mut self) -> usize {
        self.words.push(0);
        self.last_op = None;
        self.words.len() - 1
    }

    /// Patches the operand at `slot` with the relative delta reaching
    /// `target`, so that `slot + delta == target`.
    pub fn patch(&mut self, slot: usize, target: i32) {
        self.words[slot] = target - slot as i32;
    }

    /// The last emitted instruction, if the last word is one.
    pub fn last_op(&self) -> Option<Opcode> {
        self.last_op
    }

    /// Replaces the last emitted instruction. Used to turn the load that
    /// would have read an lvalue into a push of its address.
    pub fn rewrite_last(&mut self, op: Opcode) {
        if let Some(word) = self.words.last_mut() {
            *word = opcode_word(op);
        }
        self.last_op = Some(op);
    }

    /// Discards the last emitted word. Address-of cancels the load that
    /// would have read the lvalue, leaving the address in the accumulator.
    pub fn rewind(&mut self) {
        self.words.pop();
        self.last_op = None;
    }

    pub fn into_words(self) -> Vec<Word> {
        self.words
    }
}

/// Append-only data segment image: global cells and string literals.
pub struct DataSegment {
    bytes: Vec<u8>,
}

impl DataSegment {
    pub fn new() -> DataSegment {
        DataSegment { bytes: Vec::new() }
    }

    /// Offset of the next byte to be written.
    pub fn pos(&self) -> i32 {
        self.bytes.len() as i32
    }

    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    /// Reserves the 4-byte zeroed cell of one global variable. Globals use
    /// a full cell whatever their declared type, matching the machine's
    /// uniform word addressing.
    pub fn reserve_global(&mut self) {
        self.bytes.extend_from_slice(&[0; 4]);
    }

    /// Ends the current string literal run: pads with NUL bytes up to the
    /// next word boundary, always appending at least one, which doubles as
    /// the string terminator.
    pub fn seal_string(&mut self) {
        let aligned = (self.bytes.len() + 4) & !3;
        self.bytes.resize(aligned, 0);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn patched_slot_reaches_its_target() {
        let mut text = TextSegment::new();
        text.emit(Opcode::BZ);
        let slot = text.hole();
        text.emit_with(Opcode::IMM, 7);

        let target = text.pos();
        text.patch(slot, target);

        assert_eq!(slot as i32 + text.word(slot), target);
    }

    #[test]
    fn rewrite_tracks_the_last_instruction() {
        let mut text = TextSegment::new();
        text.emit_with(Opcode::LEA, 10);

        // An operand that happens to equal a load opcode is not a load.
        assert_eq!(text.last_op(), Some(Opcode::LEA));

        text.emit(Opcode::LI);
        text.rewrite_last(Opcode::PSH);
        assert_eq!(text.last_op(), Some(Opcode::PSH));

        text.rewind();
        assert_eq!(text.last_op(), None);
    }

    #[test]
    fn sealed_strings_are_word_aligned_and_terminated() {
        let mut data = DataSegment::new();
        for b in b"abc" {
            data.push(*b);
        }
        data.seal_string();

        assert_eq!(data.bytes(), b"abc\0");

        for b in b"word" {
            data.push(*b);
        }
        data.seal_string();

        assert_eq!(data.pos(), 12);
        assert_eq!(&data.bytes()[4..], b"word\0\0\0\0");
    }
}
