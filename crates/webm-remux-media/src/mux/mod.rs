//! WebM output builder.
//!
//! A [`MuxSegment`] is configured with tracks, tags and options, fed frames
//! in presentation order, and finalized once. Clusters are assembled in
//! memory so each is written with its exact size; the segment size,
//! SeekHead and Duration are patched at finalize time.

mod cues;
mod frame;
mod info;
mod segment;
mod tags;
mod track;

pub use cues::{CuePoint, Cues};
pub use frame::MuxFrame;
pub use info::{OutputInfo, MUXING_APP};
pub use segment::{MuxSegment, SEEK_HEAD_RESERVED};
pub use tags::MuxTag;
pub use track::{Colour, MasteringMetadata, MuxTrack, TrackKind};

/// Output layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MuxMode {
    /// Sized, seekable file with Cues and Duration.
    #[default]
    File,
    /// Unknown-size Segment, no Cues, no seek back.
    Live,
}
