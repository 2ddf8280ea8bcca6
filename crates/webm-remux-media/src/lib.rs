//! Webm-Remux-Media: EBML/Matroska parsing, WebM serialization, and the
//! streaming remux core
//!
//! This crate rewrites a WebM (or Matroska) file into an equivalent,
//! well-formed, seekable WebM file without touching the coded frames. Its
//! typical input is a browser recording: unknown-size segment and clusters,
//! no Cues, no Duration.
//!
//! # Modules
//!
//! - `io` - The reader/writer interfaces the parser and the output builder use
//! - `transport` - Adapters from host byte primitives to those interfaces
//! - `ebml` - Element ids, variable-length integers, element read/write helpers
//! - `demux` - Header, segment, track, tag, cluster and block parsing
//! - `mux` - Output segment builder (tracks, tags, clusters, cues, finalize)
//! - `remux` - Metadata translation, frame relay, and the entry points
//!
//! # Architecture
//!
//! A remux is one synchronous pass:
//!
//! 1. Validate the EBML header and open the segment
//! 2. Load the segment: Info, Tracks and Tags, plus an index of clusters
//! 3. Copy tags and the first video and first audio track to the output
//! 4. Walk clusters and blocks, reading each frame into a reusable buffer
//!    and handing it to the output builder
//! 5. Finalize: write Cues, then seek back to patch sizes, SeekHead and
//!    Duration

pub mod demux;
pub mod ebml;
pub mod error;
pub mod io;
pub mod mux;
pub mod remux;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use demux::{EbmlHeader, Segment};
pub use error::{status_code, Error, ErrorKind, Result};
pub use io::{MkvReader, MkvWriter, StreamLength};
pub use mux::MuxSegment;
pub use remux::{remux, remux_callbacks, remux_transport, RemuxOptions, RemuxSummary};
