//! Clusters, blocks and frame references.
//!
//! Clusters are indexed once when the segment loads. Blocks are decoded
//! lazily from the reader as the caller walks a cluster, so only block
//! headers (and lace tables) are ever held in memory.

use crate::ebml::read::{
    read_element_data, read_element_header, read_int, to_offset, ElementHeader,
    MAX_ELEMENT_DATA_SIZE,
};
use crate::ebml::vint::{decode_signed_vint, decode_vint};
use crate::ebml::ElementId;
use crate::io::MkvReader;
use crate::{Error, Result};

/// Track number vint (up to 8 bytes), relative timecode and flags.
const MAX_BLOCK_HEADER_LEN: u64 = 11;

const FLAG_KEY: u8 = 0x80;
const LACING_MASK: u8 = 0x06;
const LACING_XIPH: u8 = 0x02;
const LACING_FIXED: u8 = 0x04;
const LACING_EBML: u8 = 0x06;

/// An indexed cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub(crate) offset: u64,
    pub(crate) data_offset: u64,
    pub(crate) end: u64,
    pub(crate) timecode: u64,
    pub(crate) timecode_scale: u64,
}

impl Cluster {
    /// Stream offset of the Cluster element.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Stream offset just past the cluster's last child.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Cluster Timestamp in timecode ticks.
    pub fn timecode(&self) -> u64 {
        self.timecode
    }

    /// Cluster start in nanoseconds.
    pub fn time_ns(&self) -> Result<i64> {
        ticks_to_ns(self.signed_timecode()?, self.timecode_scale)
    }

    fn signed_timecode(&self) -> Result<i64> {
        i64::try_from(self.timecode).map_err(|_| {
            Error::format(format!(
                "cluster at {} has out of range Timestamp {}",
                self.offset, self.timecode
            ))
        })
    }

    /// First block of the cluster, if any.
    pub fn first_block<R: MkvReader>(&self, reader: &mut R) -> Result<Option<Block>> {
        self.block_from(reader, self.data_offset)
    }

    /// Block following `prev`, or `None` at the end of the cluster.
    pub fn next_block<R: MkvReader>(&self, reader: &mut R, prev: &Block) -> Result<Option<Block>> {
        self.block_from(reader, prev.next)
    }

    fn block_from<R: MkvReader>(&self, reader: &mut R, mut pos: u64) -> Result<Option<Block>> {
        while pos < self.end {
            let header = read_element_header(reader, pos, self.end)?;
            let end = header
                .end()
                .filter(|&end| end <= self.end)
                .ok_or_else(|| {
                    Error::format(format!(
                        "{} at {} overruns its cluster",
                        header.id, header.offset
                    ))
                })?;

            match header.id {
                ElementId::SIMPLE_BLOCK => {
                    let payload = BlockPayload::read(reader, header.data_offset(), end)?;
                    let key = payload.flags & FLAG_KEY != 0;
                    return Ok(Some(payload.into_block(header.offset, end, key, 0)));
                }
                ElementId::BLOCK_GROUP => return parse_block_group(reader, &header, end).map(Some),
                _ => pos = end,
            }
        }
        Ok(None)
    }
}

/// A block header with its frame references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    offset: u64,
    next: u64,
    track_number: u64,
    timecode: i16,
    key: bool,
    discard_padding: i64,
    frames: Vec<FrameRef>,
}

impl Block {
    /// Stream offset of the SimpleBlock or BlockGroup element.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of the owning track.
    pub fn track_number(&self) -> u64 {
        self.track_number
    }

    /// Timecode relative to the cluster, in ticks.
    pub fn relative_timecode(&self) -> i16 {
        self.timecode
    }

    /// Absolute timestamp in nanoseconds.
    pub fn time_ns(&self, cluster: &Cluster) -> Result<i64> {
        let ticks = cluster
            .signed_timecode()?
            .checked_add(i64::from(self.timecode))
            .ok_or_else(|| {
                Error::format(format!("block at {} has out of range timecode", self.offset))
            })?;
        ticks_to_ns(ticks, cluster.timecode_scale)
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    /// Discard padding in nanoseconds, 0 when absent.
    pub fn discard_padding(&self) -> i64 {
        self.discard_padding
    }

    /// Frames carried by the block, in lace order.
    pub fn frames(&self) -> &[FrameRef] {
        &self.frames
    }

    /// Frame at `index`.
    pub fn frame(&self, index: usize) -> Option<&FrameRef> {
        self.frames.get(index)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

fn ticks_to_ns(ticks: i64, timecode_scale: u64) -> Result<i64> {
    i64::try_from(timecode_scale)
        .ok()
        .and_then(|scale| ticks.checked_mul(scale))
        .ok_or_else(|| {
            Error::format(format!(
                "timestamp of {ticks} ticks at scale {timecode_scale} overflows"
            ))
        })
}

/// Location of one frame's payload in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef {
    pub position: u64,
    pub len: u64,
}

impl FrameRef {
    /// Copy the frame into the front of `buf`, returning its length.
    pub fn read<R: MkvReader>(&self, reader: &mut R, buf: &mut [u8]) -> Result<usize> {
        let len = usize::try_from(self.len).map_err(|_| {
            Error::format(format!("frame of {} bytes does not fit in memory", self.len))
        })?;
        if buf.len() < len {
            return Err(Error::BufferUnderflow {
                need: len,
                have: buf.len(),
            });
        }
        reader.read(to_offset(self.position)?, &mut buf[..len])?;
        Ok(len)
    }
}

/// Decoded block header fields before the key flag is resolved.
struct BlockPayload {
    track_number: u64,
    timecode: i16,
    flags: u8,
    frames: Vec<FrameRef>,
}

impl BlockPayload {
    fn read<R: MkvReader>(reader: &mut R, start: u64, end: u64) -> Result<Self> {
        let size = end - start;
        let head_len = size.min(MAX_BLOCK_HEADER_LEN) as usize;
        let mut head = [0u8; MAX_BLOCK_HEADER_LEN as usize];
        reader.read(to_offset(start)?, &mut head[..head_len])?;

        let (track_number, track_len) = decode_vint(&head[..head_len])
            .map_err(|e| Error::format(format!("block at {start}: {e}")))?;
        if head_len < track_len + 3 {
            return Err(Error::format(format!("block at {start} is truncated")));
        }
        let timecode = i16::from_be_bytes([head[track_len], head[track_len + 1]]);
        let flags = head[track_len + 2];
        let header_len = (track_len + 3) as u64;

        let frames = match flags & LACING_MASK {
            0 => {
                if size == header_len {
                    return Err(Error::format(format!("block at {start} has no frame data")));
                }
                vec![FrameRef {
                    position: start + header_len,
                    len: size - header_len,
                }]
            }
            lacing => {
                if size > MAX_ELEMENT_DATA_SIZE {
                    return Err(Error::format(format!(
                        "laced block at {start} of {size} bytes exceeds maximum {MAX_ELEMENT_DATA_SIZE}"
                    )));
                }
                let mut payload = vec![0u8; size as usize];
                reader.read(to_offset(start)?, &mut payload)?;
                let (sizes, lace_end) = lace_sizes(lacing, &payload, header_len as usize)
                    .map_err(|e| Error::format(format!("block at {start}: {e}")))?;

                let mut position = start + lace_end as u64;
                let mut frames = Vec::with_capacity(sizes.len());
                for len in sizes {
                    frames.push(FrameRef { position, len });
                    position = position.checked_add(len).ok_or_else(|| {
                        Error::format(format!("laced frames of block at {start} overflow"))
                    })?;
                }
                frames
            }
        };

        Ok(Self {
            track_number,
            timecode,
            flags,
            frames,
        })
    }

    fn into_block(self, offset: u64, next: u64, key: bool, discard_padding: i64) -> Block {
        Block {
            offset,
            next,
            track_number: self.track_number,
            timecode: self.timecode,
            key,
            discard_padding,
            frames: self.frames,
        }
    }
}

fn parse_block_group<R: MkvReader>(
    reader: &mut R,
    group: &ElementHeader,
    end: u64,
) -> Result<Block> {
    let mut payload = None;
    let mut referenced = false;
    let mut discard_padding = 0;

    let mut pos = group.data_offset();
    while pos < end {
        let child = read_element_header(reader, pos, end)?;
        let child_end = child
            .end()
            .filter(|&e| e <= end)
            .ok_or_else(|| Error::format(format!("{} overruns its block group", child.id)))?;
        match child.id {
            ElementId::BLOCK => {
                payload = Some(BlockPayload::read(reader, child.data_offset(), child_end)?)
            }
            ElementId::REFERENCE_BLOCK => referenced = true,
            ElementId::DISCARD_PADDING => {
                discard_padding = read_int(&read_element_data(reader, &child)?)?
            }
            _ => {}
        }
        pos = child_end;
    }

    let payload = payload.ok_or_else(|| {
        Error::format(format!("block group at {} has no Block", group.offset))
    })?;
    Ok(payload.into_block(group.offset, end, !referenced, discard_padding))
}

/// Decode a lace table starting at `pos` (the frame count byte).
///
/// Returns each frame's size and the offset of the first frame.
fn lace_sizes(lacing: u8, payload: &[u8], mut pos: usize) -> Result<(Vec<u64>, usize)> {
    let count = usize::from(
        *payload
            .get(pos)
            .ok_or_else(|| Error::format("missing lace count"))?,
    ) + 1;
    pos += 1;

    let mut sizes = Vec::with_capacity(count);
    match lacing {
        LACING_FIXED => {
            let remaining = payload.len() - pos;
            if remaining % count != 0 {
                return Err(Error::format(format!(
                    "{remaining} bytes do not split into {count} equal frames"
                )));
            }
            sizes.resize(count, (remaining / count) as u64);
            return Ok((sizes, pos));
        }
        LACING_XIPH => {
            for _ in 1..count {
                let mut size = 0u64;
                loop {
                    let b = *payload
                        .get(pos)
                        .ok_or_else(|| Error::format("truncated Xiph lace table"))?;
                    pos += 1;
                    size += u64::from(b);
                    if b != 0xFF {
                        break;
                    }
                }
                sizes.push(size);
            }
        }
        LACING_EBML => {
            if count > 1 {
                let (first, len) = decode_vint(&payload[pos..])?;
                pos += len;
                check_lace_size(first, payload.len() - pos)?;
                sizes.push(first);
                let mut prev = first as i64;
                for _ in 2..count {
                    let (delta, len) = decode_signed_vint(&payload[pos..])?;
                    pos += len;
                    let size = prev
                        .checked_add(delta)
                        .filter(|&size| size >= 0)
                        .ok_or_else(|| Error::format("EBML lace size out of range"))?;
                    check_lace_size(size as u64, payload.len() - pos)?;
                    sizes.push(size as u64);
                    prev = size;
                }
            }
        }
        other => return Err(Error::format(format!("unknown lacing 0x{other:02X}"))),
    }

    let remaining = (payload.len() - pos) as u64;
    let laced = sizes
        .iter()
        .try_fold(0u64, |total, &size| total.checked_add(size))
        .filter(|&laced| laced <= remaining)
        .ok_or_else(|| {
            Error::format(format!(
                "lace sizes of {} frames exceed the {remaining} bytes that remain",
                sizes.len()
            ))
        })?;
    sizes.push(remaining - laced);
    Ok((sizes, pos))
}

/// A single laced frame can never be larger than the rest of the block.
fn check_lace_size(size: u64, remaining: usize) -> Result<()> {
    if size > remaining as u64 {
        return Err(Error::format(format!(
            "lace size {size} exceeds the {remaining} bytes that remain"
        )));
    }
    Ok(())
}
