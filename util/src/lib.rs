use byteorder::ByteOrder;

pub type Endian = byteorder::LittleEndian;

/// Serializes a word slice into its on-disk byte representation.
pub fn words_to_bytes(words: &[i32]) -> Vec<u8> {
    let mut bytes = vec![0u8; words.len() * 4];
    Endian::write_i32_into(words, &mut bytes);
    bytes
}

/// Rebuilds a word slice from its on-disk byte representation.
///
/// Returns `None` when the byte count is not a whole number of words.
pub fn bytes_to_words(bytes: &[u8]) -> Option<Vec<i32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }

    let mut words = vec![0i32; bytes.len() / 4];
    Endian::read_i32_into(bytes, &mut words);
    Some(words)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn word_bytes_round_trip() {
        let words = vec![1, -1, 0x7FFF_FFFF, -0x7FFF_FFFF - 1];
        let bytes = words_to_bytes(&words);

        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes_to_words(&bytes), Some(words));
    }

    #[test]
    fn ragged_byte_count_is_rejected() {
        assert_eq!(bytes_to_words(&[0, 1, 2]), None);
    }

    #[test]
    fn words_are_little_endian() {
        assert_eq!(words_to_bytes(&[0x0403_0201]), [1, 2, 3, 4]);
    }
}
