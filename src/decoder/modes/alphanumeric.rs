use super::BitReader;

/// 0-9, A-Z, space, $%*+-./:
pub const ALPHANUMERIC_CHARSET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

/// Alphanumeric mode (0010): pairs in 11 bits, a trailing single in 6
pub struct AlphanumericDecoder;

impl AlphanumericDecoder {
    pub fn decode(reader: &mut BitReader<'_>, count: usize) -> Option<String> {
        let mut result = String::with_capacity(count);
        let mut remaining = count;

        while remaining >= 2 {
            let value = reader.read_bits(11)? as usize;
            let (first, second) = (value / 45, value % 45);
            if first >= 45 {
                return None;
            }
            result.push(ALPHANUMERIC_CHARSET[first] as char);
            result.push(ALPHANUMERIC_CHARSET[second] as char);
            remaining -= 2;
        }
        if remaining == 1 {
            let value = reader.read_bits(6)? as usize;
            result.push(*ALPHANUMERIC_CHARSET.get(value)? as char);
        }

        Some(result)
    }

    /// Position of `c` in the alphanumeric set
    pub fn index_of(c: char) -> Option<usize> {
        ALPHANUMERIC_CHARSET.iter().position(|&b| b as char == c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphanumeric_decode() {
        // "A1" = 10 * 45 + 1 = 451 = 00111000011, then "B" = 11 = 001011
        let data = [0b0011_1000, 0b0110_0101, 0b1000_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(AlphanumericDecoder::decode(&mut reader, 3).as_deref(), Some("A1B"));
    }

    #[test]
    fn test_index_of() {
        assert_eq!(AlphanumericDecoder::index_of('0'), Some(0));
        assert_eq!(AlphanumericDecoder::index_of(':'), Some(44));
        assert_eq!(AlphanumericDecoder::index_of('a'), None);
    }
}
