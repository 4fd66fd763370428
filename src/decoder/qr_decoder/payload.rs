use crate::decoder::bitstream::BitstreamExtractor;
use crate::decoder::format::FormatInfo;
use crate::decoder::function_mask::FunctionMask;
use crate::decoder::modes::{
    AlphanumericDecoder, BitReader, ByteDecoder, KanjiDecoder, Mode, NumericDecoder,
};
use crate::decoder::reed_solomon::ReedSolomonDecoder;
use crate::decoder::tables::BlockLayout;
use crate::decoder::unmask::unmask;
use crate::models::{BitMatrix, ECLevel, Version};
use encoding_rs::Encoding;

/// Decoded segment data of one symbol
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct SymbolContent {
    pub bytes: Vec<u8>,
    pub text: String,
}

/// Unmask, read, error-correct and parse an oriented module grid
pub(super) fn decode_symbol(
    matrix: &BitMatrix,
    version: Version,
    format: &FormatInfo,
) -> Option<SymbolContent> {
    let func = FunctionMask::new(version);
    let mut unmasked = matrix.clone();
    unmask(&mut unmasked, format.mask_pattern, &func);

    let bits = BitstreamExtractor::extract(&unmasked, &func);
    let codewords = BitstreamExtractor::to_codewords(&bits);
    let data = deinterleave_and_correct(&codewords, version, format.ec_level)?;

    let content = decode_segments(&data, version)?;
    // A symbol with no segment data carries nothing to assess; callers see
    // it as no symbol rather than an empty string
    if content.bytes.is_empty() {
        return None;
    }
    Some(content)
}

/// Split interleaved codewords into blocks, correct each, and concatenate data
pub(crate) fn deinterleave_and_correct(
    codewords: &[u8],
    version: Version,
    ec_level: ECLevel,
) -> Option<Vec<u8>> {
    let layout = BlockLayout::new(version, ec_level);
    if codewords.len() < layout.total_codewords() {
        return None;
    }

    let long_len = layout.short_data_len + 1;
    let mut blocks: Vec<Vec<u8>> = (0..layout.num_blocks)
        .map(|b| Vec::with_capacity(layout.data_len(b) + layout.ecc_per_block))
        .collect();

    let mut stream = codewords.iter().copied();
    for i in 0..long_len {
        for (b, block) in blocks.iter_mut().enumerate() {
            if i < layout.data_len(b) {
                block.push(stream.next()?);
            }
        }
    }
    for _ in 0..layout.ecc_per_block {
        for block in blocks.iter_mut() {
            block.push(stream.next()?);
        }
    }

    let rs = ReedSolomonDecoder::new(layout.ecc_per_block);
    let mut data = Vec::with_capacity(layout.total_data_codewords());
    for (b, block) in blocks.iter_mut().enumerate() {
        match rs.decode(block) {
            Ok(corrected) if corrected > 0 => {
                tracing::trace!(block = b, corrected, "reed-solomon corrected block");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::trace!(block = b, %err, "block uncorrectable");
                return None;
            }
        }
        data.extend_from_slice(&block[..layout.data_len(b)]);
    }
    Some(data)
}

/// Parse the segment sequence of a symbol's data codewords
pub(crate) fn decode_segments(data: &[u8], version: Version) -> Option<SymbolContent> {
    let mut reader = BitReader::new(data);
    let mut content = SymbolContent::default();
    let mut charset: Option<CharacterSet> = None;
    let mut fnc1 = false;

    while reader.remaining() >= 4 {
        let mode = Mode::from_bits(reader.read_bits(4)? as u8)?;
        let count_bits = mode.char_count_bits(version);
        match mode {
            Mode::Terminator => break,
            Mode::Numeric => {
                let count = reader.read_bits(count_bits)? as usize;
                let digits = NumericDecoder::decode(&mut reader, count)?;
                content.bytes.extend_from_slice(digits.as_bytes());
                content.text.push_str(&digits);
            }
            Mode::Alphanumeric => {
                let count = reader.read_bits(count_bits)? as usize;
                let mut chars = AlphanumericDecoder::decode(&mut reader, count)?;
                if fnc1 {
                    chars = expand_fnc1_percent(&chars);
                }
                content.bytes.extend_from_slice(chars.as_bytes());
                content.text.push_str(&chars);
            }
            Mode::Byte => {
                let count = reader.read_bits(count_bits)? as usize;
                let raw = ByteDecoder::decode(&mut reader, count)?;
                content.text.push_str(&decode_bytes(&raw, charset));
                content.bytes.extend_from_slice(&raw);
            }
            Mode::Kanji => {
                let count = reader.read_bits(count_bits)? as usize;
                let raw = KanjiDecoder::decode(&mut reader, count)?;
                content.text.push_str(&KanjiDecoder::to_text(&raw)?);
                content.bytes.extend_from_slice(&raw);
            }
            Mode::Eci => {
                let designator = read_eci_designator(&mut reader)?;
                charset = CharacterSet::from_eci(designator);
                if charset.is_none() {
                    tracing::debug!(designator, "unsupported ECI, guessing byte charset");
                }
            }
            Mode::StructuredAppend => {
                // Sequence index, total and parity; single symbols are decoded as-is
                reader.read_bits(16)?;
            }
            Mode::Fnc1First => fnc1 = true,
            Mode::Fnc1Second => {
                reader.read_bits(8)?;
                fnc1 = true;
            }
        }
    }

    Some(content)
}

/// 1, 2 or 3 byte ECI assignment number
fn read_eci_designator(reader: &mut BitReader<'_>) -> Option<u32> {
    let first = reader.read_bits(8)?;
    if first & 0x80 == 0 {
        Some(first & 0x7F)
    } else if first & 0xC0 == 0x80 {
        Some(((first & 0x3F) << 8) | reader.read_bits(8)?)
    } else if first & 0xE0 == 0xC0 {
        Some(((first & 0x1F) << 16) | reader.read_bits(16)?)
    } else {
        None
    }
}

/// In FNC1 mode `%%` is a literal percent and a lone `%` is the GS separator
fn expand_fnc1_percent(chars: &str) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut iter = chars.chars().peekable();
    while let Some(c) = iter.next() {
        if c == '%' {
            if iter.peek() == Some(&'%') {
                iter.next();
                out.push('%');
            } else {
                out.push('\u{1D}');
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
enum CharacterSet {
    Utf8,
    Latin1,
    Other(&'static Encoding),
}

impl CharacterSet {
    fn from_eci(designator: u32) -> Option<Self> {
        use encoding_rs::*;
        let charset = match designator {
            1 | 3 | 27 | 170 => CharacterSet::Latin1,
            4 => CharacterSet::Other(ISO_8859_2),
            5 => CharacterSet::Other(ISO_8859_3),
            6 => CharacterSet::Other(ISO_8859_4),
            7 => CharacterSet::Other(ISO_8859_5),
            8 => CharacterSet::Other(ISO_8859_6),
            9 => CharacterSet::Other(ISO_8859_7),
            10 => CharacterSet::Other(ISO_8859_8),
            11 => CharacterSet::Other(WINDOWS_1254),
            12 => CharacterSet::Other(ISO_8859_10),
            13 => CharacterSet::Other(WINDOWS_874),
            15 => CharacterSet::Other(ISO_8859_13),
            16 => CharacterSet::Other(ISO_8859_14),
            17 => CharacterSet::Other(ISO_8859_15),
            18 => CharacterSet::Other(ISO_8859_16),
            20 => CharacterSet::Other(SHIFT_JIS),
            21 => CharacterSet::Other(WINDOWS_1250),
            22 => CharacterSet::Other(WINDOWS_1251),
            23 => CharacterSet::Other(WINDOWS_1252),
            24 => CharacterSet::Other(WINDOWS_1256),
            25 => CharacterSet::Other(UTF_16BE),
            26 => CharacterSet::Utf8,
            28 => CharacterSet::Other(BIG5),
            29 => CharacterSet::Other(GB18030),
            30 => CharacterSet::Other(EUC_KR),
            _ => return None,
        };
        Some(charset)
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Byte-segment text; without an ECI the charset is guessed (UTF-8, Shift_JIS, Latin-1)
fn decode_bytes(bytes: &[u8], charset: Option<CharacterSet>) -> String {
    match charset {
        Some(CharacterSet::Utf8) => String::from_utf8_lossy(bytes).into_owned(),
        Some(CharacterSet::Latin1) => latin1(bytes),
        Some(CharacterSet::Other(encoding)) => {
            encoding.decode_without_bom_handling(bytes).0.into_owned()
        }
        None => {
            if let Ok(text) = std::str::from_utf8(bytes) {
                return text.to_owned();
            }
            let (text, had_errors) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(bytes);
            if !had_errors {
                return text.into_owned();
            }
            latin1(bytes)
        }
    }
}
