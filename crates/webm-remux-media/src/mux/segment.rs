//! The output segment.

use super::cues::{CuePoint, Cues};
use super::frame::{put_block_group, put_simple_block, MuxFrame};
use super::info::OutputInfo;
use super::tags::{write_tags, MuxTag};
use super::track::{MuxTrack, TrackKind};
use super::MuxMode;
use crate::ebml::vint::{encode_size, id_length, put_id, put_size_fixed, size_length, UNKNOWN_SIZE};
use crate::ebml::write::{
    end_master, put_binary, put_header, put_string, put_uint, put_uint_fixed, put_void,
    start_master,
};
use crate::ebml::ElementId;
use crate::io::MkvWriter;
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Bytes reserved after the Segment header for the SeekHead.
pub const SEEK_HEAD_RESERVED: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Configuring,
    Writing,
    Finalized,
}

/// Where header pieces landed, for the finalize rewrite.
#[derive(Debug, Clone, Default)]
struct Layout {
    /// Absolute offset of the Segment size field.
    segment_size_pos: u64,
    /// Absolute offset of the Segment payload.
    data_start: u64,
    /// Absolute offsets of patch targets (File mode only).
    seek_head_pos: Option<u64>,
    duration_pos: Option<u64>,
    /// Offsets relative to `data_start`, for SeekHead entries.
    info: u64,
    tracks: u64,
    tags: Option<u64>,
    cues: Option<u64>,
    first_cluster: Option<u64>,
}

/// A cluster being filled.
#[derive(Debug)]
struct OpenCluster {
    timecode: u64,
    start_ns: u64,
    body: BytesMut,
    blocks: u64,
    /// (track, time in ticks, block number) of keyframes to index.
    cues: Vec<(u64, u64, u64)>,
}

impl OpenCluster {
    fn new(timecode: u64, start_ns: u64, fixed_size_timecode: bool) -> Self {
        let mut body = BytesMut::new();
        if fixed_size_timecode {
            put_uint_fixed(&mut body, ElementId::TIMESTAMP, timecode, 8);
        } else {
            put_uint(&mut body, ElementId::TIMESTAMP, timecode);
        }
        Self {
            timecode,
            start_ns,
            body,
            blocks: 0,
            cues: Vec::new(),
        }
    }

    fn has_cue(&self, track: u64) -> bool {
        self.cues.iter().any(|&(t, _, _)| t == track)
    }
}

/// A non-video frame held back until the next video frame.
#[derive(Debug)]
struct QueuedFrame {
    data: Vec<u8>,
    track_number: u64,
    timestamp: u64,
    key: bool,
    discard_padding: i64,
}

impl QueuedFrame {
    fn new(frame: &MuxFrame<'_>) -> Self {
        Self {
            data: frame.data.to_vec(),
            track_number: frame.track_number,
            timestamp: frame.timestamp,
            key: frame.key,
            discard_padding: frame.discard_padding,
        }
    }

    fn as_frame(&self) -> MuxFrame<'_> {
        MuxFrame::new(&self.data, self.track_number, self.timestamp, self.key)
            .with_discard_padding(self.discard_padding)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TrackTiming {
    last_ns: u64,
    last_ticks: u64,
    interval_ns: u64,
}

/// Builds one WebM segment on an [`MkvWriter`].
///
/// Tracks, tags and options are configured first; the first frame writes
/// the header, frames are then grouped into clusters, and
/// [`finalize`](Self::finalize) writes the index and patches the header.
#[derive(Debug)]
pub struct MuxSegment<W> {
    writer: W,
    info: OutputInfo,
    doc_type: String,
    mode: MuxMode,
    accurate_cluster_duration: bool,
    fixed_size_cluster_timecode: bool,
    output_cues: bool,
    max_cluster_duration: u64,
    tracks: Vec<MuxTrack>,
    tags: Vec<MuxTag>,
    cues: Cues,
    cues_tracks: Vec<u64>,
    state: State,
    layout: Layout,
    cluster: Option<OpenCluster>,
    /// Set when the header is written and a video track exists.
    has_video: bool,
    queued: Vec<QueuedFrame>,
    timing: BTreeMap<u64, TrackTiming>,
    frames_written: u64,
    clusters_written: u64,
}

impl<W: MkvWriter> MuxSegment<W> {
    /// Create a segment in File mode with cues enabled.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            info: OutputInfo::default(),
            doc_type: "webm".to_string(),
            mode: MuxMode::File,
            accurate_cluster_duration: false,
            fixed_size_cluster_timecode: false,
            output_cues: true,
            max_cluster_duration: 0,
            tracks: Vec::new(),
            tags: Vec::new(),
            cues: Cues::default(),
            cues_tracks: Vec::new(),
            state: State::Configuring,
            layout: Layout::default(),
            cluster: None,
            has_video: false,
            queued: Vec::new(),
            timing: BTreeMap::new(),
            frames_written: 0,
            clusters_written: 0,
        }
    }

    pub fn segment_info_mut(&mut self) -> &mut OutputInfo {
        &mut self.info
    }

    pub fn set_doc_type(&mut self, doc_type: &str) {
        self.doc_type = doc_type.to_string();
    }

    /// Select File or Live output. Only allowed before the first frame.
    pub fn set_mode(&mut self, mode: MuxMode) -> Result<()> {
        self.ensure_configuring("change the muxing mode")?;
        self.mode = mode;
        Ok(())
    }

    /// Extend each track's last frame by its previous frame interval when
    /// computing Duration.
    pub fn set_accurate_cluster_duration(&mut self, enabled: bool) {
        self.accurate_cluster_duration = enabled;
    }

    /// Write cluster Timestamps with a fixed 8-byte payload.
    pub fn use_fixed_size_cluster_timecode(&mut self, enabled: bool) {
        self.fixed_size_cluster_timecode = enabled;
    }

    /// Chunked output is not supported; only `false` is accepted.
    pub fn set_chunking(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            return Err(Error::mux("chunked output is not supported"));
        }
        Ok(())
    }

    pub fn set_output_cues(&mut self, enabled: bool) {
        self.output_cues = enabled;
    }

    pub fn cues(&self) -> &Cues {
        &self.cues
    }

    pub fn cues_mut(&mut self) -> &mut Cues {
        &mut self.cues
    }

    /// Start a new cluster once one spans `ns` nanoseconds. 0 disables.
    pub fn set_max_cluster_duration(&mut self, ns: u64) {
        self.max_cluster_duration = ns;
    }

    /// Index keyframes of `number` in the Cues.
    pub fn add_cues_track(&mut self, number: u64) -> Result<()> {
        if self.track(number).is_none() {
            return Err(Error::mux(format!("cues track {number} does not exist")));
        }
        if !self.cues_tracks.contains(&number) {
            self.cues_tracks.push(number);
        }
        Ok(())
    }

    /// Add a video track. `number == 0` picks the next free number.
    pub fn add_video_track(&mut self, width: u64, height: u64, number: u64) -> Result<u64> {
        if width == 0 || height == 0 {
            return Err(Error::mux(format!("invalid video dimensions {width}x{height}")));
        }
        self.add_track(
            number,
            TrackKind::Video {
                width,
                height,
                frame_rate: None,
                colour: None,
            },
        )
    }

    /// Add an audio track. `number == 0` picks the next free number.
    pub fn add_audio_track(&mut self, sample_rate: f64, channels: u64, number: u64) -> Result<u64> {
        if !(sample_rate > 0.0 && sample_rate.is_finite()) || channels == 0 {
            return Err(Error::mux(format!(
                "invalid audio settings {sample_rate} Hz, {channels} channels"
            )));
        }
        self.add_track(
            number,
            TrackKind::Audio {
                sample_rate,
                channels,
                bit_depth: None,
            },
        )
    }

    fn add_track(&mut self, number: u64, kind: TrackKind) -> Result<u64> {
        self.ensure_configuring("add a track")?;
        let number = if number == 0 {
            self.tracks.iter().map(MuxTrack::number).max().unwrap_or(0) + 1
        } else if self.track(number).is_some() {
            return Err(Error::mux(format!("track number {number} already in use")));
        } else {
            number
        };
        self.tracks.push(MuxTrack::new(number, kind));
        Ok(number)
    }

    pub fn tracks(&self) -> &[MuxTrack] {
        &self.tracks
    }

    pub fn track(&self, number: u64) -> Option<&MuxTrack> {
        self.tracks.iter().find(|t| t.number() == number)
    }

    /// Mutable access to a track, for setting attributes before the header
    /// is written.
    pub fn track_mut(&mut self, number: u64) -> Result<&mut MuxTrack> {
        self.ensure_configuring("modify a track")?;
        self.tracks
            .iter_mut()
            .find(|t| t.number() == number)
            .ok_or_else(|| Error::mux(format!("track {number} does not exist")))
    }

    /// Add an empty tag.
    pub fn add_tag(&mut self) -> Result<&mut MuxTag> {
        self.ensure_configuring("add a tag")?;
        self.tags.push(MuxTag::default());
        let last = self.tags.len() - 1;
        Ok(&mut self.tags[last])
    }

    pub fn tags(&self) -> &[MuxTag] {
        &self.tags
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn clusters_written(&self) -> u64 {
        self.clusters_written
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// End time of the longest track so far, in nanoseconds.
    pub fn duration_ns(&self) -> u64 {
        self.timing
            .values()
            .map(|t| {
                if self.accurate_cluster_duration {
                    t.last_ns + t.interval_ns
                } else {
                    t.last_ns
                }
            })
            .max()
            .unwrap_or(0)
    }

    fn ensure_configuring(&self, action: &str) -> Result<()> {
        match self.state {
            State::Configuring => Ok(()),
            State::Writing => Err(Error::mux(format!(
                "cannot {action} after the header was written"
            ))),
            State::Finalized => Err(Error::mux(format!(
                "cannot {action} after finalize"
            ))),
        }
    }

    /// Add one frame, writing the header first if needed.
    ///
    /// While a video track exists, other frames are held until the next
    /// video frame and then written ahead of it if they are older, so the
    /// audio that belongs to a video keyframe lands in its cluster.
    pub fn add_frame(&mut self, frame: &MuxFrame<'_>) -> Result<()> {
        if self.state == State::Finalized {
            return Err(Error::mux("frame added after finalize"));
        }
        let is_video = self
            .track(frame.track_number)
            .map(MuxTrack::is_video)
            .ok_or_else(|| Error::mux(format!("frame for unknown track {}", frame.track_number)))?;
        if frame.data.is_empty() {
            return Err(Error::mux(format!(
                "empty frame on track {}",
                frame.track_number
            )));
        }
        if self.state == State::Configuring {
            self.write_header()?;
        }

        if !is_video && self.has_video {
            self.queued.push(QueuedFrame::new(frame));
            return Ok(());
        }
        if is_video {
            self.write_queued(Some(frame.timestamp))?;
        }
        self.write_frame(frame, is_video)
    }

    /// Write held frames older than `before`, or all of them for `None`.
    fn write_queued(&mut self, before: Option<u64>) -> Result<()> {
        if self.queued.is_empty() {
            return Ok(());
        }
        let (ready, held): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queued)
            .into_iter()
            .partition(|q| before.map_or(true, |ts| q.timestamp < ts));
        self.queued = held;
        for queued in &ready {
            self.write_frame(&queued.as_frame(), false)?;
        }
        Ok(())
    }

    fn write_frame(&mut self, frame: &MuxFrame<'_>, is_video: bool) -> Result<()> {
        let ticks = frame
            .timestamp
            .checked_div(self.info.timecode_scale())
            .ok_or_else(|| Error::mux("timecode scale is zero"))?;
        if let Some(open) = &self.cluster {
            if ticks < open.timecode && open.timecode - ticks > i16::MIN.unsigned_abs() as u64 {
                return Err(Error::mux(format!(
                    "frame on track {} is {} ticks older than its cluster",
                    frame.track_number,
                    open.timecode - ticks
                )));
            }
        }

        let mut cluster = match self.cluster.take() {
            Some(open) if !self.starts_cluster(&open, ticks, frame, is_video) => open,
            previous => {
                if let Some(done) = previous {
                    self.write_cluster(done)?;
                }
                OpenCluster::new(ticks, frame.timestamp, self.fixed_size_cluster_timecode)
            }
        };

        // In range: older frames were checked above, newer ones split.
        let relative = (ticks as i64 - cluster.timecode as i64) as i16;
        let timing = self.timing.get(&frame.track_number).copied();

        if frame.needs_block_group() {
            let reference = (!frame.key).then(|| {
                timing
                    .map(|t| t.last_ticks as i64 - ticks as i64)
                    .filter(|&r| r < 0)
                    .unwrap_or(-1)
            });
            put_block_group(&mut cluster.body, frame, relative, reference);
        } else {
            put_simple_block(&mut cluster.body, frame, relative);
        }
        cluster.blocks += 1;

        if frame.key
            && self.output_cues
            && self.cues_tracks.contains(&frame.track_number)
            && !cluster.has_cue(frame.track_number)
        {
            cluster.cues.push((frame.track_number, ticks, cluster.blocks));
        }
        self.cluster = Some(cluster);

        let interval_ns = match timing {
            Some(t) if frame.timestamp > t.last_ns => frame.timestamp - t.last_ns,
            Some(t) => t.interval_ns,
            None => 0,
        };
        self.timing.insert(
            frame.track_number,
            TrackTiming {
                last_ns: frame.timestamp,
                last_ticks: ticks,
                interval_ns,
            },
        );
        self.frames_written += 1;

        trace!(
            track = frame.track_number,
            timestamp = frame.timestamp,
            key = frame.key,
            len = frame.data.len(),
            "Added frame"
        );
        Ok(())
    }

    fn starts_cluster(&self, open: &OpenCluster, ticks: u64, frame: &MuxFrame<'_>, is_video: bool) -> bool {
        if is_video && frame.key && open.blocks > 0 {
            return true;
        }
        if ticks > open.timecode && ticks - open.timecode > i16::MAX as u64 {
            return true;
        }
        self.max_cluster_duration > 0
            && frame.timestamp.saturating_sub(open.start_ns) >= self.max_cluster_duration
    }

    fn write_header(&mut self) -> Result<()> {
        if self.info.timecode_scale() == 0 {
            return Err(Error::mux("timecode scale is zero"));
        }
        let file_mode = self.mode == MuxMode::File;
        let start = self.writer.position()?;
        let mut buf = BytesMut::new();
        let mut notices = vec![(ElementId::EBML, start)];

        let ebml = start_master(&mut buf, ElementId::EBML);
        put_uint(&mut buf, ElementId::EBML_VERSION, 1);
        put_uint(&mut buf, ElementId::EBML_READ_VERSION, 1);
        put_uint(&mut buf, ElementId::EBML_MAX_ID_LENGTH, 4);
        put_uint(&mut buf, ElementId::EBML_MAX_SIZE_LENGTH, 8);
        put_string(&mut buf, ElementId::DOC_TYPE, &self.doc_type);
        put_uint(&mut buf, ElementId::DOC_TYPE_VERSION, 4);
        put_uint(&mut buf, ElementId::DOC_TYPE_READ_VERSION, 2);
        end_master(&mut buf, ebml);

        notices.push((ElementId::SEGMENT, start + buf.len() as u64));
        put_id(&mut buf, ElementId::SEGMENT.0);
        // Unknown until finalize patches it.
        let segment_size_pos = start + buf.len() as u64;
        buf.put_slice(&UNKNOWN_SIZE);
        let data_start = start + buf.len() as u64;
        let relative = |buf: &BytesMut| start + buf.len() as u64 - data_start;

        let mut layout = Layout {
            segment_size_pos,
            data_start,
            ..Layout::default()
        };

        if file_mode {
            layout.seek_head_pos = Some(data_start);
            put_void(&mut buf, SEEK_HEAD_RESERVED);
        }

        layout.info = relative(&buf);
        notices.push((ElementId::INFO, data_start + layout.info));
        layout.duration_pos = self
            .info
            .write(&mut buf, file_mode)
            .map(|pos| start + pos as u64);

        self.has_video = self.tracks.iter().any(MuxTrack::is_video);

        layout.tracks = relative(&buf);
        notices.push((ElementId::TRACKS, data_start + layout.tracks));
        let tracks = start_master(&mut buf, ElementId::TRACKS);
        for track in &self.tracks {
            track.write(&mut buf);
        }
        end_master(&mut buf, tracks);

        if !self.tags.is_empty() {
            let pos = relative(&buf);
            layout.tags = Some(pos);
            notices.push((ElementId::TAGS, data_start + pos));
            write_tags(&mut buf, &self.tags);
        }

        for (id, position) in notices {
            self.writer.element_start_notify(id.0, position);
        }
        self.writer.write(&buf)?;
        self.layout = layout;
        self.state = State::Writing;

        debug!(
            doc_type = %self.doc_type,
            tracks = self.tracks.len(),
            tags = self.tags.len(),
            header_bytes = buf.len(),
            "Wrote segment header"
        );
        Ok(())
    }

    fn write_cluster(&mut self, cluster: OpenCluster) -> Result<()> {
        let position = self.writer.position()?;
        let relative = position - self.layout.data_start;
        self.layout.first_cluster.get_or_insert(relative);

        self.writer.element_start_notify(ElementId::CLUSTER.0, position);
        let mut head = BytesMut::new();
        put_header(&mut head, ElementId::CLUSTER, cluster.body.len() as u64);
        self.writer.write(&head)?;
        self.writer.write(&cluster.body)?;

        for (track, time, block_number) in cluster.cues {
            self.cues.push(CuePoint {
                time,
                track,
                cluster_position: relative,
                block_number,
            });
        }
        self.clusters_written += 1;
        trace!(
            timecode = cluster.timecode,
            blocks = cluster.blocks,
            position,
            "Wrote cluster"
        );
        Ok(())
    }

    /// Flush the open cluster, write Cues and patch the header.
    ///
    /// In File mode this seeks back over written bytes, so the writer must
    /// be seekable. Finalizing twice is an error.
    pub fn finalize(&mut self) -> Result<()> {
        match self.state {
            State::Finalized => return Err(Error::mux("segment already finalized")),
            State::Configuring => self.write_header()?,
            State::Writing => {}
        }
        self.write_queued(None)?;
        if let Some(cluster) = self.cluster.take() {
            self.write_cluster(cluster)?;
        }

        if self.mode == MuxMode::Live {
            self.state = State::Finalized;
            debug!(frames = self.frames_written, "Finalized live segment");
            return Ok(());
        }

        if self.output_cues && !self.cues.is_empty() {
            let position = self.writer.position()?;
            self.layout.cues = Some(position - self.layout.data_start);
            self.writer.element_start_notify(ElementId::CUES.0, position);
            let mut buf = BytesMut::new();
            self.cues.write(&mut buf);
            self.writer.write(&buf)?;
        }

        if !self.writer.seekable() {
            return Err(Error::mux("finalize requires a seekable writer"));
        }

        let end = self.writer.position()?;
        let segment_size = end - self.layout.data_start;
        self.writer.seek(offset(self.layout.segment_size_pos)?)?;
        self.writer.write(&encode_size(segment_size, 8))?;

        if let Some(pos) = self.layout.seek_head_pos {
            let seek_head = self.seek_head()?;
            self.writer.seek(offset(pos)?)?;
            self.writer.write(&seek_head)?;
        }

        let duration_ticks = self.duration_ns() as f64 / self.info.timecode_scale() as f64;
        if let Some(pos) = self.layout.duration_pos {
            self.writer.seek(offset(pos)?)?;
            self.writer.write(&duration_ticks.to_be_bytes())?;
        }

        self.writer.seek(offset(end)?)?;
        self.state = State::Finalized;

        debug!(
            frames = self.frames_written,
            clusters = self.clusters_written,
            cues = self.cues.len(),
            duration_ticks,
            segment_size,
            "Finalized segment"
        );
        Ok(())
    }

    /// SeekHead padded with Void to exactly [`SEEK_HEAD_RESERVED`] bytes.
    fn seek_head(&self) -> Result<BytesMut> {
        let layout = &self.layout;
        let entries = [
            (ElementId::INFO, Some(layout.info)),
            (ElementId::TRACKS, Some(layout.tracks)),
            (ElementId::TAGS, layout.tags),
            (ElementId::CUES, layout.cues),
            (ElementId::CLUSTER, layout.first_cluster),
        ];

        let mut body = BytesMut::new();
        for (id, position) in entries {
            let Some(position) = position else { continue };
            let mut seek = BytesMut::new();
            let id_len = id_length(id.0);
            put_binary(&mut seek, ElementId::SEEK_ID, &id.0.to_be_bytes()[4 - id_len..]);
            put_uint(&mut seek, ElementId::SEEK_POSITION, position);
            put_binary(&mut body, ElementId::SEEK, &seek);
        }

        let mut size_len = size_length(body.len() as u64);
        let total = id_length(ElementId::SEEK_HEAD.0) + size_len + body.len();
        if total > SEEK_HEAD_RESERVED {
            return Err(Error::mux(format!(
                "SeekHead of {total} bytes does not fit the reserved {SEEK_HEAD_RESERVED}"
            )));
        }
        // A one-byte gap cannot hold a Void; widen the size field instead.
        if SEEK_HEAD_RESERVED - total == 1 {
            size_len += 1;
        }

        let mut out = BytesMut::with_capacity(SEEK_HEAD_RESERVED);
        put_id(&mut out, ElementId::SEEK_HEAD.0);
        put_size_fixed(&mut out, body.len() as u64, size_len);
        out.put_slice(&body);
        let remaining = SEEK_HEAD_RESERVED - out.len();
        if remaining > 0 {
            put_void(&mut out, remaining);
        }
        Ok(out)
    }
}

fn offset(position: u64) -> Result<i64> {
    i64::try_from(position).map_err(|_| Error::mux(format!("offset {position} out of range")))
}
