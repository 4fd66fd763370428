use super::BitReader;

/// Numeric mode (0001): 3 digits per 10 bits, 2 per 7, 1 per 4
pub struct NumericDecoder;

impl NumericDecoder {
    /// Decode `count` digits; `None` on truncation or out-of-range groups
    pub fn decode(reader: &mut BitReader<'_>, count: usize) -> Option<String> {
        let mut result = String::with_capacity(count);
        let mut remaining = count;

        while remaining > 0 {
            let group = remaining.min(3);
            let (bits, limit) = match group {
                3 => (10, 1000),
                2 => (7, 100),
                _ => (4, 10),
            };
            let value = reader.read_bits(bits)?;
            if value >= limit {
                return None;
            }
            result.push_str(&format!("{value:0width$}", width = group));
            remaining -= group;
        }

        Some(result)
    }
}
