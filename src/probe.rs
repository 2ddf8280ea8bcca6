//! Read-only container summary.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use webm_remux_media::demux::{SegmentInfo, Tag, Track};
use webm_remux_media::transport::{StreamSource, TransportReader};
use webm_remux_media::{EbmlHeader, Segment};

/// Everything `probe` reports about one file.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub file_path: PathBuf,
    pub file_size: u64,
    pub header: EbmlHeader,
    /// Absent when the segment has no Info element.
    pub info: Option<SegmentInfo>,
    /// Segment size in bytes, `None` for unknown-size (live) segments.
    pub segment_size: Option<u64>,
    pub tracks: Vec<Track>,
    pub tags: Vec<Tag>,
    pub cluster_count: usize,
}

impl ProbeReport {
    /// Declared duration, if the Info element carries one.
    pub fn duration_secs(&self) -> Option<f64> {
        self.info
            .as_ref()
            .and_then(SegmentInfo::duration_ns)
            .map(|ns| ns / 1e9)
    }
}

/// Parse the header, segment metadata and cluster index of a file.
pub fn probe_file(path: &Path) -> Result<ProbeReport> {
    let file =
        File::open(path).with_context(|| format!("Failed to open input file: {:?}", path))?;
    let file_size = file.metadata()?.len();
    let mut reader = TransportReader::new(StreamSource::new(BufReader::new(file)));

    let (header, next) = EbmlHeader::parse(&mut reader)
        .with_context(|| format!("Not a WebM/Matroska file: {:?}", path))?;
    let mut segment = Segment::open(&mut reader, next).context("Failed to open segment")?;
    segment.load(&mut reader).context("Failed to load segment")?;

    tracing::debug!(
        tracks = segment.tracks().len(),
        clusters = segment.cluster_count(),
        "Probed {:?}",
        path
    );

    Ok(ProbeReport {
        file_path: path.to_path_buf(),
        file_size,
        header,
        info: segment.info().ok().cloned(),
        segment_size: segment.size(),
        tracks: segment.tracks().iter().cloned().collect(),
        tags: segment.tags().to_vec(),
        cluster_count: segment.cluster_count(),
    })
}
