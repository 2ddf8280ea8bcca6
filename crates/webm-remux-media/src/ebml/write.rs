//! Element writing into `BytesMut` buffers.

use super::vint::{put_id, put_size, put_size_fixed};
use super::ElementId;
use bytes::{BufMut, BytesMut};

/// Bytes used for size fields that are patched after the payload is known.
pub const PATCHED_SIZE_LEN: usize = 8;

/// Write an element header with a size in its shortest form.
pub fn put_header(buf: &mut BytesMut, id: ElementId, size: u64) {
    put_id(buf, id.0);
    put_size(buf, size);
}

/// Minimal big-endian byte count for an unsigned value (at least one).
fn uint_width(value: u64) -> usize {
    (8 - value.leading_zeros() as usize / 8).max(1)
}

/// Minimal byte count for a two's-complement value (at least one).
fn int_width(value: i64) -> usize {
    (1..=8)
        .find(|&n| {
            let bits = 8 * n as u32;
            bits == 64 || (value >= -(1i64 << (bits - 1)) && value < (1i64 << (bits - 1)))
        })
        .unwrap_or(8)
}

/// Write an unsigned integer element.
pub fn put_uint(buf: &mut BytesMut, id: ElementId, value: u64) {
    put_uint_fixed(buf, id, value, uint_width(value));
}

/// Write an unsigned integer element using exactly `width` payload bytes.
pub fn put_uint_fixed(buf: &mut BytesMut, id: ElementId, value: u64, width: usize) {
    put_header(buf, id, width as u64);
    buf.put_slice(&value.to_be_bytes()[8 - width..]);
}

/// Write a signed integer element.
pub fn put_int(buf: &mut BytesMut, id: ElementId, value: i64) {
    let width = int_width(value);
    put_header(buf, id, width as u64);
    buf.put_slice(&value.to_be_bytes()[8 - width..]);
}

/// Write an 8-byte float element.
pub fn put_float(buf: &mut BytesMut, id: ElementId, value: f64) {
    put_header(buf, id, 8);
    buf.put_f64(value);
}

/// Write a 4-byte float element.
pub fn put_float32(buf: &mut BytesMut, id: ElementId, value: f32) {
    put_header(buf, id, 4);
    buf.put_f32(value);
}

/// Write a UTF-8 string element.
pub fn put_string(buf: &mut BytesMut, id: ElementId, value: &str) {
    put_binary(buf, id, value.as_bytes());
}

/// Write a binary element.
pub fn put_binary(buf: &mut BytesMut, id: ElementId, value: &[u8]) {
    put_header(buf, id, value.len() as u64);
    buf.put_slice(value);
}

/// Open a master element whose size is patched by [`end_master`].
///
/// Returns the buffer offset of the size field.
pub fn start_master(buf: &mut BytesMut, id: ElementId) -> usize {
    put_id(buf, id.0);
    let size_pos = buf.len();
    buf.put_slice(&[0u8; PATCHED_SIZE_LEN]);
    size_pos
}

/// Close a master element opened with [`start_master`].
pub fn end_master(buf: &mut BytesMut, size_pos: usize) {
    let size = (buf.len() - size_pos - PATCHED_SIZE_LEN) as u64;
    let mut field = [0u8; PATCHED_SIZE_LEN];
    let mut cursor = &mut field[..];
    put_size_fixed(&mut cursor, size, PATCHED_SIZE_LEN);
    buf[size_pos..size_pos + PATCHED_SIZE_LEN].copy_from_slice(&field);
}

/// Write a Void element occupying exactly `total_len` bytes (at least 2).
pub fn put_void(buf: &mut BytesMut, total_len: usize) {
    debug_assert!(total_len >= 2);
    // One id byte; the rest is size field plus zero payload.
    let size_len = if total_len - 2 < 127 { 1 } else { PATCHED_SIZE_LEN };
    let payload = total_len - 1 - size_len;
    put_id(buf, ElementId::VOID.0);
    put_size_fixed(buf, payload as u64, size_len);
    buf.put_bytes(0, payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::read::{parse_children, read_float, read_int, read_uint};

    #[test]
    fn test_uint_width() {
        let mut buf = BytesMut::new();
        put_uint(&mut buf, ElementId::TRACK_NUMBER, 0);
        put_uint(&mut buf, ElementId::TIMECODE_SCALE, 1_000_000);
        assert_eq!(&buf[..3], &[0xD7, 0x81, 0x00]);
        assert_eq!(&buf[3..], &[0x2A, 0xD7, 0xB1, 0x83, 0x0F, 0x42, 0x40]);
    }

    #[test]
    fn test_int_width() {
        assert_eq!(int_width(0), 1);
        assert_eq!(int_width(127), 1);
        assert_eq!(int_width(128), 2);
        assert_eq!(int_width(-128), 1);
        assert_eq!(int_width(-129), 2);
        assert_eq!(int_width(i64::MIN), 8);
    }

    #[test]
    fn test_scalars_decode_back() {
        let mut buf = BytesMut::new();
        put_int(&mut buf, ElementId::DISCARD_PADDING, -6_500_000);
        put_float(&mut buf, ElementId::DURATION, 1234.5);
        put_uint(&mut buf, ElementId::CODEC_DELAY, 6_500_000);

        let children = parse_children(&buf).unwrap();
        assert_eq!(read_int(children[0].data).unwrap(), -6_500_000);
        assert_eq!(read_float(children[1].data).unwrap(), 1234.5);
        assert_eq!(read_uint(children[2].data).unwrap(), 6_500_000);
    }

    #[test]
    fn test_master_size_patch() {
        let mut buf = BytesMut::new();
        let pos = start_master(&mut buf, ElementId::TAG);
        put_string(&mut buf, ElementId::TAG_NAME, "TITLE");
        end_master(&mut buf, pos);

        let children = parse_children(&buf).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, ElementId::TAG);
        assert_eq!(children[0].data.len(), 3 + 5);
    }

    #[test]
    fn test_void_lengths() {
        for total in [2usize, 9, 128, 129, 300] {
            let mut buf = BytesMut::new();
            put_void(&mut buf, total);
            assert_eq!(buf.len(), total, "void of {total} bytes");
            let children = parse_children(&buf).unwrap();
            assert_eq!(children[0].id, ElementId::VOID);
        }
    }
}
