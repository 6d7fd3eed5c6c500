//! Unsigned 32-bit varints: 7-bit groups, least significant first, with
//! `0x80` as the continuation bit.

use bytes::BufMut;

/// Longest encoding of a `u32`.
pub const MAX_VARINT_LEN: usize = 5;

/// Why a varint could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarintError {
    /// The input ended before a terminating byte. More bytes may fix this.
    #[error("incomplete varint")]
    Incomplete,
    /// The encoding does not fit in 32 bits.
    #[error("varint exceeds 32 bits")]
    Overflow,
}

/// Append the encoding of `value` to `dst`.
pub fn encode(mut value: u32, dst: &mut impl BufMut) {
    loop {
        let group = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            dst.put_u8(group);
            return;
        }
        dst.put_u8(group | 0x80);
    }
}

/// Encode `value` into a fresh vector.
pub fn encode_to_vec(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(value));
    encode(value, &mut out);
    out
}

/// Number of bytes [`encode`] emits for `value`.
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Decode a varint from the front of `cursor`.
///
/// On success the cursor is advanced past the varint. On
/// [`VarintError::Incomplete`] the cursor is left untouched so the caller
/// can retry once more bytes arrive.
pub fn decode(cursor: &mut &[u8]) -> Result<u32, VarintError> {
    let mut value = 0u32;

    for (index, &byte) in cursor.iter().enumerate() {
        let group = u32::from(byte & 0x7F);
        if index == MAX_VARINT_LEN - 1 && (group > 0x0F || byte & 0x80 != 0) {
            return Err(VarintError::Overflow);
        }

        value |= group << (7 * index);
        if byte & 0x80 == 0 {
            *cursor = &cursor[index + 1..];
            return Ok(value);
        }
    }

    Err(VarintError::Incomplete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_encodings() {
        assert_eq!(encode_to_vec(0), vec![0x00]);
        assert_eq!(encode_to_vec(1), vec![0x01]);
        assert_eq!(encode_to_vec(127), vec![0x7F]);
        assert_eq!(encode_to_vec(128), vec![0x80, 0x01]);
        assert_eq!(encode_to_vec(300), vec![0xAC, 0x02]);
        assert_eq!(encode_to_vec(u32::MAX), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn group_boundaries_roundtrip() {
        for value in [
            0,
            0x7F,
            0x80,
            0x3FFF,
            0x4000,
            0x1F_FFFF,
            0x20_0000,
            0x0FFF_FFFF,
            0x1000_0000,
            u32::MAX,
        ] {
            let encoded = encode_to_vec(value);
            assert_eq!(encoded.len(), encoded_len(value), "length of {value:#x}");
            assert!(encoded.len() <= MAX_VARINT_LEN);

            let mut cursor = encoded.as_slice();
            assert_eq!(decode(&mut cursor), Ok(value));
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn decode_advances_past_value_only() {
        let bytes = [0xAC, 0x02, 0x07];
        let mut cursor = &bytes[..];
        assert_eq!(decode(&mut cursor), Ok(300));
        assert_eq!(cursor, &[0x07]);
    }

    #[test]
    fn incomplete_leaves_cursor_untouched() {
        let bytes = [0x80, 0x80];
        let mut cursor = &bytes[..];
        assert_eq!(decode(&mut cursor), Err(VarintError::Incomplete));
        assert_eq!(cursor.len(), 2);

        let mut empty: &[u8] = &[];
        assert_eq!(decode(&mut empty), Err(VarintError::Incomplete));
    }

    #[test]
    fn oversized_encodings_rejected() {
        let six_bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(decode(&mut &six_bytes[..]), Err(VarintError::Overflow));

        let high_bits = [0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
        assert_eq!(decode(&mut &high_bits[..]), Err(VarintError::Overflow));
    }
}
