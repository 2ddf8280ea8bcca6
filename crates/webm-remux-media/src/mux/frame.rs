//! Frames submitted to the output and their block encodings.

use crate::ebml::vint::put_size;
use crate::ebml::write::{end_master, put_header, put_int, start_master};
use crate::ebml::ElementId;
use bytes::{BufMut, BytesMut};

const FLAG_KEY: u8 = 0x80;

/// One frame to write, borrowing its payload.
#[derive(Debug, Clone, Copy)]
pub struct MuxFrame<'a> {
    pub data: &'a [u8],
    pub track_number: u64,
    /// Nanoseconds.
    pub timestamp: u64,
    pub key: bool,
    /// Nanoseconds, 0 for none.
    pub discard_padding: i64,
}

impl<'a> MuxFrame<'a> {
    /// Frame with no discard padding.
    pub fn new(data: &'a [u8], track_number: u64, timestamp: u64, key: bool) -> Self {
        Self {
            data,
            track_number,
            timestamp,
            key,
            discard_padding: 0,
        }
    }

    pub fn with_discard_padding(mut self, ns: i64) -> Self {
        self.discard_padding = ns;
        self
    }

    /// Whether the frame needs a BlockGroup rather than a SimpleBlock.
    pub fn needs_block_group(&self) -> bool {
        self.discard_padding != 0
    }
}

/// Block header: track vint, relative timecode, flags.
fn put_block_header(buf: &mut BytesMut, track: u64, relative: i16, flags: u8) {
    put_size(buf, track);
    buf.put_i16(relative);
    buf.put_u8(flags);
}

fn block_header_len(track: u64) -> u64 {
    crate::ebml::vint::size_length(track) as u64 + 3
}

/// Append a SimpleBlock.
pub(crate) fn put_simple_block(buf: &mut BytesMut, frame: &MuxFrame<'_>, relative: i16) {
    let size = block_header_len(frame.track_number) + frame.data.len() as u64;
    put_header(buf, ElementId::SIMPLE_BLOCK, size);
    let flags = if frame.key { FLAG_KEY } else { 0 };
    put_block_header(buf, frame.track_number, relative, flags);
    buf.put_slice(frame.data);
}

/// Append a BlockGroup. `reference` is the ReferenceBlock value in ticks
/// for non-key frames.
pub(crate) fn put_block_group(
    buf: &mut BytesMut,
    frame: &MuxFrame<'_>,
    relative: i16,
    reference: Option<i64>,
) {
    let group = start_master(buf, ElementId::BLOCK_GROUP);
    let size = block_header_len(frame.track_number) + frame.data.len() as u64;
    put_header(buf, ElementId::BLOCK, size);
    put_block_header(buf, frame.track_number, relative, 0);
    buf.put_slice(frame.data);
    if let Some(reference) = reference {
        put_int(buf, ElementId::REFERENCE_BLOCK, reference);
    }
    if frame.discard_padding != 0 {
        put_int(buf, ElementId::DISCARD_PADDING, frame.discard_padding);
    }
    end_master(buf, group);
}
