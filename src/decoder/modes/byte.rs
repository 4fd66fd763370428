use super::BitReader;

/// Byte mode (0100): 8 bits per character, charset resolved by the caller
pub struct ByteDecoder;

impl ByteDecoder {
    pub fn decode(reader: &mut BitReader<'_>, count: usize) -> Option<Vec<u8>> {
        (0..count).map(|_| reader.read_bits(8).map(|b| b as u8)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_decode() {
        let data = [0x48, 0x49];
        let mut reader = BitReader::new(&data);
        assert_eq!(ByteDecoder::decode(&mut reader, 2), Some(b"HI".to_vec()));
        let mut reader = BitReader::new(&data);
        assert_eq!(ByteDecoder::decode(&mut reader, 3), None);
    }
}
