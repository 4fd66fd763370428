use super::BitReader;

/// Kanji mode (1000): 13-bit values expanded back to Shift_JIS byte pairs
pub struct KanjiDecoder;

impl KanjiDecoder {
    pub fn decode(reader: &mut BitReader<'_>, count: usize) -> Option<Vec<u8>> {
        let mut bytes = Vec::with_capacity(count * 2);
        for _ in 0..count {
            let value = reader.read_bits(13)?;
            let mut code = ((value / 0xC0) << 8) | (value % 0xC0);
            code += if code < 0x1F00 { 0x8140 } else { 0xC140 };
            bytes.push((code >> 8) as u8);
            bytes.push(code as u8);
        }
        Some(bytes)
    }

    /// Text for Shift_JIS bytes; `None` if they are not valid Shift_JIS
    pub fn to_text(bytes: &[u8]) -> Option<String> {
        let (text, had_errors) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(bytes);
        (!had_errors).then(|| text.into_owned())
    }
}
