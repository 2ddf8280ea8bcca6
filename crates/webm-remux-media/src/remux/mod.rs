//! The remux core.
//!
//! Parses the input, translates segment, track and tag metadata into a
//! fresh output segment, relays every frame of the active tracks, and
//! finalizes the output. Any failure aborts the whole run; the error is
//! logged once with the step it happened in, and output already written is
//! not usable.

mod finalize;
mod relay;
mod translate;

pub use relay::{FrameBuffer, RelayStats};
pub use translate::{ActiveTrack, TrackMap};

use crate::demux::{EbmlHeader, Segment};
use crate::error::status_code;
use crate::io::{MkvReader, MkvWriter, StreamLength};
use crate::mux::MuxSegment;
use crate::transport::{FnSink, FnSource, HostSink, HostSource, TransportReader, TransportWriter};
use crate::{Error, Result};
use std::fmt;
use std::io;
use tracing::{debug, error, info};

/// Writing application recorded when none is configured.
pub const DEFAULT_WRITING_APP: &str = "webm-remux";

/// Caller-controlled remux settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemuxOptions {
    /// WritingApp written into the output Info.
    pub writing_app: String,
    /// Start a new cluster after this many nanoseconds; 0 disables.
    pub max_cluster_duration_ns: u64,
}

impl Default for RemuxOptions {
    fn default() -> Self {
        Self {
            writing_app: DEFAULT_WRITING_APP.to_string(),
            max_cluster_duration_ns: 0,
        }
    }
}

/// What a successful remux produced.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct RemuxSummary {
    pub doc_type: String,
    pub timecode_scale: u64,
    /// Output number of the video track.
    pub video_track: Option<u64>,
    /// Output number of the audio track.
    pub audio_track: Option<u64>,
    pub tags: usize,
    pub relay: RelayStats,
    pub output_clusters: u64,
    pub cue_points: usize,
    pub duration_ns: u64,
    /// Final size of the frame buffer.
    pub buffer_capacity: usize,
}

/// Stage of a remux, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Header,
    OpenSegment,
    LoadSegment,
    SegmentInfo,
    Configure,
    Tags,
    Tracks,
    Cues,
    Relay,
    Finalize,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Header => "parse header",
            Step::OpenSegment => "open segment",
            Step::LoadSegment => "load segment",
            Step::SegmentInfo => "read segment info",
            Step::Configure => "configure output",
            Step::Tags => "copy tags",
            Step::Tracks => "copy tracks",
            Step::Cues => "register cues tracks",
            Step::Relay => "relay frames",
            Step::Finalize => "finalize output",
        };
        f.write_str(name)
    }
}

struct Failure {
    step: Step,
    error: Error,
}

trait AtStep<T> {
    fn at(self, step: Step) -> std::result::Result<T, Failure>;
}

impl<T> AtStep<T> for Result<T> {
    fn at(self, step: Step) -> std::result::Result<T, Failure> {
        self.map_err(|error| Failure { step, error })
    }
}

/// Remux one input stream into `writer`.
///
/// Nothing is written until the input's header, segment and Info have been
/// read successfully.
pub fn remux<R: MkvReader, W: MkvWriter>(
    reader: &mut R,
    writer: &mut W,
    options: &RemuxOptions,
) -> Result<RemuxSummary> {
    let mut buffer = FrameBuffer::new();
    let result = run(reader, writer, options, &mut buffer);
    // `buffer` is released here on every path.
    match result {
        Ok(summary) => {
            info!(
                frames = summary.relay.frames,
                clusters = summary.output_clusters,
                duration_ns = summary.duration_ns,
                "Remux complete"
            );
            Ok(summary)
        }
        Err(Failure { step, error }) => {
            error!(step = %step, kind = ?error.kind(), "Remux failed: {error}");
            Err(error)
        }
    }
}

fn run<R: MkvReader, W: MkvWriter>(
    reader: &mut R,
    writer: &mut W,
    options: &RemuxOptions,
    buffer: &mut FrameBuffer,
) -> std::result::Result<RemuxSummary, Failure> {
    let (header, next) = EbmlHeader::parse(reader).at(Step::Header)?;
    let mut segment = Segment::open(reader, next).at(Step::OpenSegment)?;
    segment.load(reader).at(Step::LoadSegment)?;
    let timecode_scale = segment.info().at(Step::SegmentInfo)?.timecode_scale;
    debug!(doc_type = %header.doc_type, timecode_scale, "Input parsed");

    let mut output = MuxSegment::new(writer);
    output.set_doc_type(&header.doc_type);
    let info = output.segment_info_mut();
    info.set_timecode_scale(timecode_scale);
    info.set_writing_app(&options.writing_app);
    finalize::configure_output(&mut output, options.max_cluster_duration_ns)
        .at(Step::Configure)?;

    translate::translate_tags(segment.tags(), &mut output).at(Step::Tags)?;
    let tracks = translate::translate_tracks(segment.tracks(), &mut output).at(Step::Tracks)?;
    finalize::register_cues_tracks(&mut output, &tracks).at(Step::Cues)?;

    let relay = relay::relay(reader, &segment, &tracks, &mut output, buffer).at(Step::Relay)?;
    finalize::finalize(&mut output).at(Step::Finalize)?;

    Ok(RemuxSummary {
        doc_type: header.doc_type,
        timecode_scale,
        video_track: tracks.video.map(|t| t.output),
        audio_track: tracks.audio.map(|t| t.output),
        tags: segment.tags().len(),
        relay,
        output_clusters: output.clusters_written(),
        cue_points: output.cues().len(),
        duration_ns: output.duration_ns(),
        buffer_capacity: buffer.capacity(),
    })
}

/// Remux between two host transports, returning the sink afterwards.
pub fn remux_transport<S: HostSource, K: HostSink>(
    source: S,
    sink: K,
    options: &RemuxOptions,
) -> Result<(RemuxSummary, K)> {
    let mut reader = TransportReader::new(source);
    let mut writer = TransportWriter::new(sink);
    let summary = remux(&mut reader, &mut writer, options)?;
    Ok((summary, writer.into_inner()))
}

/// Remux through five host primitives. Returns 0 on success, 1 on failure.
///
/// `read(buf, position)` fills `buf` from the input, `length()` reports the
/// input length, `write(buf)` appends to the output, `seek(position)` moves
/// the output offset and `position()` reports it.
pub fn remux_callbacks<Rd, Ln, Wr, Sk, Ps>(read: Rd, length: Ln, write: Wr, seek: Sk, position: Ps) -> i32
where
    Rd: FnMut(&mut [u8], u64) -> io::Result<usize>,
    Ln: FnMut() -> io::Result<StreamLength>,
    Wr: FnMut(&[u8]) -> io::Result<usize>,
    Sk: FnMut(u64) -> io::Result<()>,
    Ps: FnMut() -> u64,
{
    let source = FnSource::new(read, length);
    let sink = FnSink::new(write, seek, position);
    status_code(&remux_transport(source, sink, &RemuxOptions::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{EbmlHeader, Segment};
    use crate::ebml::read::{parse_children, read_element_data, read_element_header, read_uint};
    use crate::ebml::ElementId;
    use crate::testing::{FixtureBlock, FixtureTrack, WebmFixture};
    use crate::transport::{CountingSink, MemorySink, MemorySource};
    use crate::ErrorKind;
    use std::cell::RefCell;

    fn run_memory(input: Vec<u8>) -> Result<(RemuxSummary, Vec<u8>)> {
        let (summary, sink) =
            remux_transport(MemorySource::new(input), MemorySink::new(), &RemuxOptions::default())?;
        Ok((summary, sink.into_inner()))
    }

    /// (track, time_ns, key, discard padding, payload) for every frame.
    type Frames = Vec<(u64, i64, bool, i64, Vec<u8>)>;

    fn frames(data: Vec<u8>) -> (Segment, Frames) {
        let mut reader = TransportReader::new(MemorySource::new(data));
        let (_, next) = EbmlHeader::parse(&mut reader).unwrap();
        let mut segment = Segment::open(&mut reader, next).unwrap();
        segment.load(&mut reader).unwrap();

        let mut out = Vec::new();
        for cluster in segment.clusters() {
            let mut block = cluster.first_block(&mut reader).unwrap();
            while let Some(b) = block {
                for frame in b.frames() {
                    let mut buf = vec![0u8; frame.len as usize];
                    frame.read(&mut reader, &mut buf).unwrap();
                    out.push((b.track_number(), b.time_ns(cluster).unwrap(), b.is_key(), b.discard_padding(), buf));
                }
                block = cluster.next_block(&mut reader, &b).unwrap();
            }
        }
        (segment, out)
    }

    /// Stable sort by track so per-track order can be compared.
    fn by_track(mut frames: Frames) -> Frames {
        frames.sort_by_key(|f| f.0);
        frames
    }

    /// (CueTime, CueTrack) for every cue point in the output.
    fn cue_points(data: Vec<u8>) -> Vec<(u64, u64)> {
        let len = data.len() as u64;
        let mut reader = TransportReader::new(MemorySource::new(data));
        let (_, next) = EbmlHeader::parse(&mut reader).unwrap();
        let segment = Segment::open(&mut reader, next).unwrap();

        let mut position = segment.data_offset();
        let cues = loop {
            let header = read_element_header(&mut reader, position, len).unwrap();
            if header.id == ElementId::CUES {
                break read_element_data(&mut reader, &header).unwrap();
            }
            position = header.end().unwrap();
        };
        let mut points = Vec::new();
        for point in parse_children(&cues).unwrap() {
            let fields = parse_children(point.data).unwrap();
            let time = fields.iter().find(|f| f.id == ElementId::CUE_TIME).unwrap();
            let positions = fields
                .iter()
                .find(|f| f.id == ElementId::CUE_TRACK_POSITIONS)
                .unwrap();
            let track = parse_children(positions.data)
                .unwrap()
                .into_iter()
                .find(|f| f.id == ElementId::CUE_TRACK)
                .map(|f| read_uint(f.data).unwrap())
                .unwrap();
            points.push((read_uint(time.data).unwrap(), track));
        }
        points
    }

    fn av_input() -> Vec<u8> {
        WebmFixture::av()
            .cluster(
                0,
                vec![
                    FixtureBlock::video(0, true, b"v0"),
                    FixtureBlock::audio(0, b"a0"),
                    FixtureBlock::video(33, false, b"v1"),
                ],
            )
            .cluster(
                66,
                vec![
                    FixtureBlock::audio(0, b"a1"),
                    FixtureBlock::video(0, false, b"v2"),
                    FixtureBlock::audio(20, b"a2"),
                ],
            )
            .build()
    }

    #[test]
    fn test_av_scenario() {
        let (summary, output) = run_memory(av_input()).unwrap();
        assert_eq!(summary.video_track, Some(1));
        assert_eq!(summary.audio_track, Some(2));
        assert_eq!(summary.relay.frames, 6);
        assert_eq!(summary.relay.skipped_blocks, 0);
        assert!(summary.cue_points >= 2);
        assert_eq!(summary.doc_type, "webm");

        let cues = cue_points(output.clone());
        assert_eq!(cues.len(), summary.cue_points);
        assert!(cues.contains(&(0, 1)));
        assert!(cues.contains(&(0, 2)));

        let (segment, out) = frames(output);
        assert_eq!(segment.tracks().len(), 2);
        assert_eq!(segment.info().unwrap().writing_app.as_deref(), Some(DEFAULT_WRITING_APP));
        let (_, input) = frames(av_input());
        assert_eq!(by_track(out), by_track(input));
    }

    #[test]
    fn test_audio_before_keyframe_keeps_clusters_ordered() {
        let input = WebmFixture::av()
            .cluster(
                0,
                vec![FixtureBlock::video(0, true, b"v0"), FixtureBlock::audio(0, b"a0")],
            )
            .cluster(
                1000,
                vec![
                    FixtureBlock::video(0, true, b"v1"),
                    FixtureBlock::audio(-10, b"a1"),
                    FixtureBlock::video(33, false, b"v2"),
                ],
            )
            .build();
        let (summary, output) = run_memory(input.clone()).unwrap();
        assert_eq!(summary.relay.frames, 5);

        let cues = cue_points(output.clone());
        assert!(cues.windows(2).all(|w| w[0].0 <= w[1].0));

        let (segment, out) = frames(output);
        let cluster_times: Vec<_> = segment.clusters().map(|c| c.time_ns().unwrap()).collect();
        assert_eq!(cluster_times, vec![0, 1_000_000_000]);
        assert!(cluster_times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(by_track(out), by_track(frames(input).1));
    }

    #[test]
    fn test_timecode_scale_preserved() {
        let input = WebmFixture::av()
            .timecode_scale(100_000)
            .cluster(5, vec![FixtureBlock::video(3, true, b"v"), FixtureBlock::audio(7, b"a")])
            .build();
        let (summary, output) = run_memory(input.clone()).unwrap();
        assert_eq!(summary.timecode_scale, 100_000);

        let (segment, out) = frames(output);
        assert_eq!(segment.info().unwrap().timecode_scale, 100_000);
        let times: Vec<_> = out.iter().map(|f| f.1).collect();
        assert_eq!(times, vec![800_000, 1_200_000]);
        assert_eq!(frames(input).1, out);
    }

    #[test]
    fn test_unknown_track_is_format_error() {
        let input = WebmFixture::av()
            .cluster(
                0,
                vec![
                    FixtureBlock::video(0, true, b"v0"),
                    FixtureBlock::new(9, 10, true, b"x"),
                    FixtureBlock::audio(20, b"a0"),
                ],
            )
            .build();
        let err = run_memory(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("unknown track 9"));
    }

    #[test]
    fn test_timestamp_overflow_is_format_error() {
        let input = WebmFixture::av()
            .cluster(i64::MAX as u64, vec![FixtureBlock::video(5, true, b"v0")])
            .build();
        let err = run_memory(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_missing_info_writes_nothing() {
        let input = WebmFixture::av()
            .without_info()
            .cluster(0, vec![FixtureBlock::video(0, true, b"v0")])
            .build();
        for _ in 0..2 {
            let mut reader = TransportReader::new(MemorySource::new(input.clone()));
            let mut writer = TransportWriter::new(CountingSink::new());
            let err = remux(&mut reader, &mut writer, &RemuxOptions::default()).unwrap_err();
            assert!(matches!(err, Error::MissingElement("Info")));
            assert_eq!(err.kind(), ErrorKind::Format);
            assert!(writer.get_ref().is_empty());
        }
    }

    #[test]
    fn test_corrupt_header_status() {
        let mut input = av_input();
        input[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let input = RefCell::new(input);
        let written = RefCell::new(0usize);
        let status = remux_callbacks(
            |buf, pos| {
                let data = input.borrow();
                let start = (pos as usize).min(data.len());
                let n = buf.len().min(data.len() - start);
                buf[..n].copy_from_slice(&data[start..start + n]);
                Ok(n)
            },
            || Ok(StreamLength::complete(input.borrow().len() as u64)),
            |buf| {
                *written.borrow_mut() += buf.len();
                Ok(buf.len())
            },
            |_| Ok(()),
            || *written.borrow() as u64,
        );
        assert_eq!(status, 1);
        assert_eq!(*written.borrow(), 0);
    }

    #[test]
    fn test_callbacks_success() {
        let input = av_input();
        let output = RefCell::new(MemorySink::new());
        let status = remux_callbacks(
            |buf, pos| MemorySource::new(input.clone()).read_at(buf, pos),
            || Ok(StreamLength::complete(input.len() as u64)),
            |buf| output.borrow_mut().write(buf),
            |pos| output.borrow_mut().seek(pos),
            || output.borrow_mut().current_position(),
        );
        assert_eq!(status, 0);
        let (_, out) = frames(output.into_inner().into_inner());
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn test_extra_and_other_tracks_skipped() {
        let input = WebmFixture::av()
            .track(FixtureTrack::audio(3, 44100.0, 1))
            .track(FixtureTrack::other(4, 0x11))
            .cluster(
                0,
                vec![
                    FixtureBlock::video(0, true, b"v0"),
                    FixtureBlock::new(3, 0, true, b"second-audio"),
                    FixtureBlock::new(4, 0, true, b"subtitle"),
                    FixtureBlock::audio(10, b"a0"),
                ],
            )
            .build();
        let (summary, output) = run_memory(input).unwrap();
        assert_eq!(summary.relay.frames, 2);
        assert_eq!(summary.relay.skipped_blocks, 2);

        let (segment, out) = frames(output);
        assert_eq!(segment.tracks().len(), 2);
        let payloads: Vec<_> = out.iter().map(|f| f.4.clone()).collect();
        assert_eq!(payloads, vec![b"v0".to_vec(), b"a0".to_vec()]);
    }

    #[test]
    fn test_laced_padded_and_grouped_blocks() {
        let big = vec![0x5Au8; 5000];
        let input = WebmFixture::av()
            .tag(&[("TITLE", "laced")])
            .cluster(
                0,
                vec![
                    FixtureBlock::video(0, true, &big),
                    FixtureBlock::laced_audio(0, &[&b"f1"[..], &b"frame-2"[..], &b"3"[..]]),
                    FixtureBlock::audio(20, b"padded").with_discard_padding(2_500_000),
                    FixtureBlock::video(33, false, b"delta").in_group(),
                ],
            )
            .build();
        let (summary, output) = run_memory(input).unwrap();
        assert_eq!(summary.relay.frames, 6);
        assert_eq!(summary.relay.max_frame_len, 5000);
        assert!(summary.buffer_capacity >= 5000);
        assert_eq!(summary.tags, 1);

        let (segment, out) = frames(output);
        assert_eq!(segment.tags()[0].simple_tags[0].value, "laced");
        assert_eq!(out[0].4, big);
        let laced: Vec<_> = out[1..4].iter().map(|f| (f.1, f.4.clone())).collect();
        assert_eq!(
            laced,
            vec![(0, b"f1".to_vec()), (0, b"frame-2".to_vec()), (0, b"3".to_vec())]
        );
        assert_eq!(out[4].3, 2_500_000);
        assert!(!out[5].2);
    }

    #[test]
    fn test_live_input_remuxes_to_sized_output() {
        let input = WebmFixture::av()
            .live()
            .cluster(0, vec![FixtureBlock::video(0, true, b"v0"), FixtureBlock::audio(5, b"a0")])
            .cluster(40, vec![FixtureBlock::video(0, true, b"v1")])
            .build();
        let (_, output) = run_memory(input.clone()).unwrap();
        let (segment, out) = frames(output);
        assert!(segment.size().is_some());
        assert!(segment.info().unwrap().duration.unwrap() > 0.0);
        assert_eq!(out, frames(input).1);
    }

    #[test]
    fn test_measure_pass_matches_real_size() {
        let (measured, counting) = remux_transport(
            MemorySource::new(av_input()),
            CountingSink::new(),
            &RemuxOptions::default(),
        )
        .unwrap();
        let (summary, output) = run_memory(av_input()).unwrap();
        assert_eq!(counting.len(), output.len() as u64);
        assert_eq!(measured, summary);
    }
}
