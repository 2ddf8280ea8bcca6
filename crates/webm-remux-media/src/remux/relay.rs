//! Frame relay: clusters to blocks to frames to the output.

use super::translate::TrackMap;
use crate::demux::{Segment, TrackType};
use crate::io::{MkvReader, MkvWriter};
use crate::mux::{MuxFrame, MuxSegment};
use crate::{Error, Result};
use tracing::trace;

/// Reusable frame buffer. Grows to the largest frame seen; never shrinks.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current usable length.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Make room for a frame of `len` bytes.
    pub fn reserve_frame(&mut self, len: usize) -> &mut [u8] {
        if len > self.buf.len() {
            self.buf.resize(len, 0);
        }
        &mut self.buf[..]
    }
}

/// Counters collected while relaying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct RelayStats {
    pub clusters: u64,
    pub blocks: u64,
    pub frames: u64,
    /// Blocks of tracks that are not relayed.
    pub skipped_blocks: u64,
    pub payload_bytes: u64,
    pub max_frame_len: u64,
}

/// Walk every cluster and block, copying frames of active tracks.
pub fn relay<R: MkvReader, W: MkvWriter>(
    reader: &mut R,
    segment: &Segment,
    tracks: &TrackMap,
    output: &mut MuxSegment<W>,
    buffer: &mut FrameBuffer,
) -> Result<RelayStats> {
    let mut stats = RelayStats::default();

    for cluster in segment.clusters() {
        stats.clusters += 1;
        let mut next = cluster.first_block(reader)?;

        while let Some(block) = next {
            stats.blocks += 1;
            let track = segment.tracks().by_number(block.track_number()).ok_or_else(|| {
                Error::format(format!(
                    "block at {} references unknown track {}",
                    block.offset(),
                    block.track_number()
                ))
            })?;

            let routed = match track.track_type() {
                TrackType::Video | TrackType::Audio => tracks.route(track.number),
                TrackType::Other(_) => None,
            };
            let Some(output_track) = routed else {
                stats.skipped_blocks += 1;
                next = cluster.next_block(reader, &block)?;
                continue;
            };

            let time_ns = block.time_ns(cluster)?;
            let timestamp = u64::try_from(time_ns).map_err(|_| {
                Error::mux(format!(
                    "block at {} has negative timestamp {time_ns}",
                    block.offset()
                ))
            })?;

            for frame in block.frames() {
                let len = usize::try_from(frame.len).map_err(|_| {
                    Error::format(format!("frame of {} bytes does not fit in memory", frame.len))
                })?;
                let scratch = buffer.reserve_frame(len);
                let n = frame.read(reader, scratch)?;

                let mut out = MuxFrame::new(&scratch[..n], output_track, timestamp, block.is_key());
                if block.discard_padding() != 0 {
                    out = out.with_discard_padding(block.discard_padding());
                }
                output.add_frame(&out)?;

                stats.frames += 1;
                stats.payload_bytes += frame.len;
                stats.max_frame_len = stats.max_frame_len.max(frame.len);
            }

            trace!(
                track = block.track_number(),
                output_track,
                time_ns,
                frames = block.frame_count(),
                "Relayed block"
            );
            next = cluster.next_block(reader, &block)?;
        }
    }

    Ok(stats)
}
