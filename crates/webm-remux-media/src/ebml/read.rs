//! Element reading.
//!
//! Two levels: headers are read straight from an [`MkvReader`] so large
//! elements (segments, clusters, blocks) never have to be loaded, and small
//! master elements (Info, Tracks, Tags) are loaded whole and walked as
//! slices.

use super::vint::{decode_id, decode_size};
use super::ElementId;
use crate::io::MkvReader;
use crate::{Error, Result};

/// Maximum element payload loaded into memory (64 MB).
pub const MAX_ELEMENT_DATA_SIZE: u64 = 64 * 1024 * 1024;

/// Longest possible header: 4-byte id plus 8-byte size.
const MAX_HEADER_LEN: u64 = 12;

/// Parsed element header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// Element id.
    pub id: ElementId,
    /// Stream offset of the first id byte.
    pub offset: u64,
    /// Length of id plus size field.
    pub header_len: u8,
    /// Payload size, `None` when unknown.
    pub size: Option<u64>,
}

impl ElementHeader {
    /// Stream offset where the payload starts.
    pub fn data_offset(&self) -> u64 {
        self.offset + u64::from(self.header_len)
    }

    /// Stream offset just past the payload, when the size is known.
    pub fn end(&self) -> Option<u64> {
        self.size.map(|size| self.data_offset() + size)
    }
}

/// Read the element header at `position`, not looking past `limit`.
pub fn read_element_header<R: MkvReader>(
    reader: &mut R,
    position: u64,
    limit: u64,
) -> Result<ElementHeader> {
    if position >= limit {
        return Err(Error::format(format!(
            "element header at {position} is past the end ({limit})"
        )));
    }

    let want = (limit - position).min(MAX_HEADER_LEN) as usize;
    let mut bytes = [0u8; MAX_HEADER_LEN as usize];
    reader.read(to_offset(position)?, &mut bytes[..want])?;

    let (id, id_len) = decode_id(&bytes[..want])
        .map_err(|e| Error::format(format!("at offset {position}: {e}")))?;
    let (size, size_len) = decode_size(&bytes[id_len..want])
        .map_err(|e| Error::format(format!("at offset {position}: {e}")))?;

    Ok(ElementHeader {
        id: ElementId(id),
        offset: position,
        header_len: (id_len + size_len) as u8,
        size,
    })
}

/// Load an element's payload, rejecting unknown or oversized elements.
pub fn read_element_data<R: MkvReader>(reader: &mut R, header: &ElementHeader) -> Result<Vec<u8>> {
    let size = header
        .size
        .ok_or_else(|| Error::format(format!("{} has unknown size", header.id)))?;
    if size > MAX_ELEMENT_DATA_SIZE {
        return Err(Error::format(format!(
            "{} data size {} exceeds maximum {}",
            header.id, size, MAX_ELEMENT_DATA_SIZE
        )));
    }

    let mut data = vec![0u8; size as usize];
    reader.read(to_offset(header.data_offset())?, &mut data)?;
    Ok(data)
}

/// Convert a stream offset into the signed form [`MkvReader`] takes.
pub fn to_offset(position: u64) -> Result<i64> {
    i64::try_from(position).map_err(|_| Error::format(format!("offset {position} out of range")))
}

/// A child element borrowed from a loaded master element.
#[derive(Debug, Clone, Copy)]
pub struct ElementSlice<'a> {
    /// Element id.
    pub id: ElementId,
    /// Payload bytes.
    pub data: &'a [u8],
}

/// Split a master element's payload into its children.
pub fn parse_children(data: &[u8]) -> Result<Vec<ElementSlice<'_>>> {
    let mut children = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let (id, id_len) = decode_id(&data[pos..])?;
        let (size, size_len) = decode_size(&data[pos + id_len..])?;
        let start = pos + id_len + size_len;
        let size = size.ok_or_else(|| {
            Error::format(format!("{} has unknown size inside a master element", ElementId(id)))
        })?;
        let end = usize::try_from(size)
            .ok()
            .and_then(|size| start.checked_add(size))
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                Error::format(format!("{} overruns its parent element", ElementId(id)))
            })?;

        children.push(ElementSlice {
            id: ElementId(id),
            data: &data[start..end],
        });
        pos = end;
    }

    Ok(children)
}

/// Decode an unsigned integer payload.
pub fn read_uint(data: &[u8]) -> Result<u64> {
    if data.len() > 8 {
        return Err(Error::format(format!(
            "unsigned integer of {} bytes",
            data.len()
        )));
    }
    Ok(data.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Decode a signed integer payload.
pub fn read_int(data: &[u8]) -> Result<i64> {
    if data.is_empty() {
        return Ok(0);
    }
    let raw = read_uint(data)?;
    let shift = 64 - 8 * data.len() as u32;
    Ok(((raw << shift) as i64) >> shift)
}

/// Decode a float payload (0, 4, or 8 bytes).
pub fn read_float(data: &[u8]) -> Result<f64> {
    match data.len() {
        0 => Ok(0.0),
        4 => Ok(f64::from(f32::from_be_bytes([
            data[0], data[1], data[2], data[3],
        ]))),
        8 => Ok(f64::from_be_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ])),
        n => Err(Error::format(format!("float of {n} bytes"))),
    }
}

/// Decode a string payload, dropping trailing NUL padding.
pub fn read_string(data: &[u8]) -> Result<String> {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8(data[..end].to_vec())
        .map_err(|e| Error::format(format!("invalid UTF-8 string: {e}")))
}
