//! Shared helpers for integration tests.
//!
//! Builds WebM inputs with the media crate's fixture builder and reads
//! outputs back through its parser.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use webm_remux_media::testing::{FixtureBlock, FixtureTrack, WebmFixture};
use webm_remux_media::transport::{MemorySource, TransportReader};
use webm_remux_media::{EbmlHeader, Segment};

/// A browser-style recording: unknown sizes, no cues, no duration.
pub fn live_recording() -> Vec<u8> {
    WebmFixture::new()
        .track(FixtureTrack::video(1, 1280, 720).codec_id("V_VP9").name("screen"))
        .track(
            FixtureTrack::audio(2, 48000.0, 2)
                .codec_private(b"OpusHead")
                .codec_delay(6_500_000)
                .seek_pre_roll(80_000_000),
        )
        .tag(&[("TITLE", "capture")])
        .live()
        .cluster(
            0,
            vec![
                FixtureBlock::video(0, true, b"vp9-key-0"),
                FixtureBlock::audio(0, b"opus-0"),
                FixtureBlock::audio(20, b"opus-1"),
                FixtureBlock::video(33, false, b"vp9-delta-1"),
            ],
        )
        .cluster(
            1000,
            vec![
                FixtureBlock::video(0, true, b"vp9-key-2"),
                FixtureBlock::audio(5, b"opus-2"),
            ],
        )
        .build()
}

/// Write `data` to `name` inside `dir`.
pub fn write_input(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Parse a remuxed file back into its header and loaded segment.
pub fn read_back(path: &Path) -> (EbmlHeader, Segment, TransportReader<MemorySource>) {
    let data = std::fs::read(path).unwrap();
    let mut reader = TransportReader::new(MemorySource::new(data));
    let (header, next) = EbmlHeader::parse(&mut reader).unwrap();
    let mut segment = Segment::open(&mut reader, next).unwrap();
    segment.load(&mut reader).unwrap();
    (header, segment, reader)
}

/// Every frame of a segment as (track, time_ns, payload).
pub fn frames(
    segment: &Segment,
    reader: &mut TransportReader<MemorySource>,
) -> Vec<(u64, i64, Vec<u8>)> {
    let mut out = Vec::new();
    for cluster in segment.clusters() {
        let mut next = cluster.first_block(reader).unwrap();
        while let Some(block) = next {
            for frame in block.frames() {
                let mut buf = vec![0u8; frame.len as usize];
                frame.read(reader, &mut buf).unwrap();
                out.push((block.track_number(), block.time_ns(cluster).unwrap(), buf));
            }
            next = cluster.next_block(reader, &block).unwrap();
        }
    }
    out
}
