//! Variable-length integers.
//!
//! EBML encodes element ids and sizes as big-endian integers whose length is
//! given by the position of the first set bit in the first byte. Ids keep
//! that marker bit; sizes and lace sizes drop it. A size with every value
//! bit set means "unknown".

use crate::{Error, Result};
use bytes::BufMut;

/// Largest value an 8-byte size field can carry (all-ones is reserved).
pub const MAX_SIZE: u64 = (1 << 56) - 2;

/// 8-byte encoding of the unknown size.
pub const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Encoded length of a vint from its first byte, or `None` for `0x00`.
pub fn vint_length(first: u8) -> Option<usize> {
    if first == 0 {
        None
    } else {
        Some(first.leading_zeros() as usize + 1)
    }
}

/// Decode an unsigned vint, dropping the marker bit.
///
/// Returns the value, its encoded length, and whether every value bit was set.
fn decode_raw(bytes: &[u8], max_len: usize) -> Result<(u64, usize, bool)> {
    let first = *bytes
        .first()
        .ok_or_else(|| Error::format("truncated variable-length integer"))?;
    let len = vint_length(first)
        .filter(|&len| len <= max_len)
        .ok_or_else(|| Error::format(format!("invalid vint lead byte 0x{first:02X}")))?;
    if bytes.len() < len {
        return Err(Error::format("truncated variable-length integer"));
    }

    let mut value = u64::from(first) & (0xFF >> len);
    for &b in &bytes[1..len] {
        value = (value << 8) | u64::from(b);
    }
    let all_ones = value == (1u64 << (7 * len)) - 1;
    Ok((value, len, all_ones))
}

/// Decode an unsigned vint, such as an EBML lace size or block track number.
pub fn decode_vint(bytes: &[u8]) -> Result<(u64, usize)> {
    let (value, len, _) = decode_raw(bytes, 8)?;
    Ok((value, len))
}

/// Decode an element size. `None` means unknown size.
pub fn decode_size(bytes: &[u8]) -> Result<(Option<u64>, usize)> {
    let (value, len, all_ones) = decode_raw(bytes, 8)?;
    Ok((if all_ones { None } else { Some(value) }, len))
}

/// Decode an element id, keeping the marker bit. Ids are at most 4 bytes.
pub fn decode_id(bytes: &[u8]) -> Result<(u32, usize)> {
    let first = *bytes
        .first()
        .ok_or_else(|| Error::format("truncated element id"))?;
    let len = vint_length(first)
        .filter(|&len| len <= 4)
        .ok_or_else(|| Error::format(format!("invalid element id lead byte 0x{first:02X}")))?;
    if bytes.len() < len {
        return Err(Error::format("truncated element id"));
    }
    let id = bytes[..len]
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
    Ok((id, len))
}

/// Decode a signed vint as used by EBML lacing deltas.
pub fn decode_signed_vint(bytes: &[u8]) -> Result<(i64, usize)> {
    let (value, len) = decode_vint(bytes)?;
    let bias = (1i64 << (7 * len - 1)) - 1;
    Ok((value as i64 - bias, len))
}

/// Number of bytes needed to encode `id`.
pub fn id_length(id: u32) -> usize {
    match id {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Smallest length that encodes `value` as a known size.
pub fn size_length(value: u64) -> usize {
    (1..=8)
        .find(|&len| value < (1u64 << (7 * len)) - 1)
        .unwrap_or(8)
}

/// Write an element id.
pub fn put_id(buf: &mut impl BufMut, id: u32) {
    let len = id_length(id);
    buf.put_slice(&id.to_be_bytes()[4 - len..]);
}

/// Write a size in its shortest form.
pub fn put_size(buf: &mut impl BufMut, value: u64) {
    put_size_fixed(buf, value, size_length(value));
}

/// Write a size using exactly `len` bytes.
pub fn put_size_fixed(buf: &mut impl BufMut, value: u64, len: usize) {
    buf.put_slice(&encode_size(value, len)[..len]);
}

/// Encode a size into `len` bytes, returned left-aligned in an 8-byte array.
pub fn encode_size(value: u64, len: usize) -> [u8; 8] {
    debug_assert!((1..=8).contains(&len));
    let marked = value | (1u64 << (7 * len));
    let be = marked.to_be_bytes();
    let mut out = [0u8; 8];
    out[..len].copy_from_slice(&be[8 - len..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_vint_length() {
        assert_eq!(vint_length(0x80), Some(1));
        assert_eq!(vint_length(0x40), Some(2));
        assert_eq!(vint_length(0x1A), Some(4));
        assert_eq!(vint_length(0x01), Some(8));
        assert_eq!(vint_length(0x00), None);
    }

    #[test]
    fn test_decode_id_keeps_marker() {
        let (id, len) = decode_id(&[0x1A, 0x45, 0xDF, 0xA3, 0x00]).unwrap();
        assert_eq!(id, 0x1A45_DFA3);
        assert_eq!(len, 4);

        let (id, len) = decode_id(&[0xA3]).unwrap();
        assert_eq!(id, 0xA3);
        assert_eq!(len, 1);

        assert!(decode_id(&[0x08, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_decode_size() {
        assert_eq!(decode_size(&[0x81]).unwrap(), (Some(1), 1));
        assert_eq!(decode_size(&[0x40, 0x02]).unwrap(), (Some(2), 2));
        assert_eq!(decode_size(&[0xFF]).unwrap(), (None, 1));
        assert_eq!(decode_size(&UNKNOWN_SIZE).unwrap(), (None, 8));
        assert!(decode_size(&[0x40]).is_err());
    }

    #[test]
    fn test_size_length_avoids_reserved_value() {
        assert_eq!(size_length(0), 1);
        assert_eq!(size_length(126), 1);
        // 127 is the all-ones pattern for one byte.
        assert_eq!(size_length(127), 2);
        assert_eq!(size_length(16_382), 2);
        assert_eq!(size_length(16_383), 3);
        assert_eq!(size_length(MAX_SIZE), 8);
    }

    #[test]
    fn test_put_size_encodings() {
        let mut buf = BytesMut::new();
        put_size(&mut buf, 5);
        put_size_fixed(&mut buf, 5, 8);
        put_size(&mut buf, 300);
        assert_eq!(
            &buf[..],
            &[0x85, 0x01, 0, 0, 0, 0, 0, 0, 0x05, 0x41, 0x2C]
        );
    }

    #[test]
    fn test_put_id() {
        let mut buf = BytesMut::new();
        put_id(&mut buf, 0x1F43_B675);
        put_id(&mut buf, 0xE7);
        put_id(&mut buf, 0x2A_D7B1);
        assert_eq!(&buf[..], &[0x1F, 0x43, 0xB6, 0x75, 0xE7, 0x2A, 0xD7, 0xB1]);
    }

    #[test]
    fn test_decode_signed_vint() {
        // One byte: bias 63.
        assert_eq!(decode_signed_vint(&[0xBF]).unwrap(), (0, 1));
        assert_eq!(decode_signed_vint(&[0xC0]).unwrap(), (1, 1));
        assert_eq!(decode_signed_vint(&[0xBE]).unwrap(), (-1, 1));
        // Two bytes: bias 8191.
        assert_eq!(decode_signed_vint(&[0x5F, 0xFF]).unwrap(), (0, 2));
    }
}
