use byteorder::ByteOrder;
use util::Endian;

use crate::constants::WORD_BYTES;
use crate::Word;

/// Flat byte-addressable program memory.
///
/// The machine lays it out as data segment, heap, then the call stack at
/// the top. Every access is bounds checked; an out-of-range address is
/// reported to the caller instead of reaching the host.
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(size: u32) -> Memory {
        Memory {
            bytes: vec![0; size as usize],
        }
    }

    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn check_address(&self, address: u32, size: u32) -> bool {
        (address as usize) + (size as usize) <= self.bytes.len()
    }

    pub fn read_word(&self, address: u32) -> Result<Word, ()> {
        self.slice(address, WORD_BYTES).map(Endian::read_i32)
    }

    pub fn write_word(&mut self, address: u32, value: Word) -> Result<(), ()> {
        self.slice_mut(address, WORD_BYTES)
            .map(|s| Endian::write_i32(s, value))
    }

    pub fn read_byte(&self, address: u32) -> Result<u8, ()> {
        self.slice(address, 1).map(|s| s[0])
    }

    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), ()> {
        self.slice_mut(address, 1).map(|s| s[0] = value)
    }

    pub fn slice(&self, address: u32, size: u32) -> Result<&[u8], ()> {
        if self.check_address(address, size) {
            Ok(&self.bytes[address as usize..(address + size) as usize])
        } else {
            Err(())
        }
    }

    pub fn slice_mut(&mut self, address: u32, size: u32) -> Result<&mut [u8], ()> {
        if self.check_address(address, size) {
            Ok(&mut self.bytes[address as usize..(address + size) as usize])
        } else {
            Err(())
        }
    }

    /// Reads the NUL-terminated byte string starting at `address`.
    pub fn read_cstring(&self, address: u32) -> Result<Vec<u8>, ()> {
        let mut bytes = Vec::new();
        let mut at = address;
        loop {
            let b = self.read_byte(at)?;
            if b == 0 {
                return Ok(bytes);
            }
            bytes.push(b);
            at = at.checked_add(1).ok_or(())?;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn word_access_is_little_endian() {
        let mut memory = Memory::new(8);

        memory.write_word(4, 0x0403_0201).unwrap();

        assert_eq!(memory.read_byte(4), Ok(1));
        assert_eq!(memory.read_byte(7), Ok(4));
        assert_eq!(memory.read_word(4), Ok(0x0403_0201));
    }

    #[test]
    fn out_of_range_access_is_reported() {
        let mut memory = Memory::new(4);

        assert_eq!(memory.read_word(1), Err(()));
        assert_eq!(memory.write_byte(4, 0), Err(()));
        assert!(memory.check_address(0, 4));
        assert!(!memory.check_address(0, 5));
    }

    #[test]
    fn cstring_stops_at_terminator() {
        let mut memory = Memory::new(8);
        for (i, b) in b"hi\0junk".iter().enumerate() {
            memory.write_byte(i as u32, *b).unwrap();
        }

        assert_eq!(memory.read_cstring(0), Ok(b"hi".to_vec()));
    }
}
