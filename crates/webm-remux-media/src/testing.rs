//! Fixture builder for well-formed WebM input streams.
//!
//! Produces small files the way a browser recorder lays them out: EBML
//! header, Segment, Info, Tracks, optional Tags, then clusters of
//! SimpleBlocks and BlockGroups.

use crate::demux::Colour;
use crate::ebml::vint::{put_id, put_size, UNKNOWN_SIZE};
use crate::ebml::write::{
    end_master, put_binary, put_float, put_int, put_string, put_uint, start_master,
};
use crate::ebml::ElementId;
use bytes::{BufMut, BytesMut};

/// A track entry to write.
#[derive(Debug, Clone)]
pub struct FixtureTrack {
    number: u64,
    track_type: u64,
    codec_id: String,
    name: Option<String>,
    codec_private: Option<Vec<u8>>,
    codec_delay: u64,
    seek_pre_roll: u64,
    width: u64,
    height: u64,
    frame_rate: f64,
    colour: Option<Colour>,
    sampling_rate: f64,
    channels: u64,
    bit_depth: u64,
}

impl FixtureTrack {
    fn base(number: u64, track_type: u64, codec_id: &str) -> Self {
        Self {
            number,
            track_type,
            codec_id: codec_id.to_string(),
            name: None,
            codec_private: None,
            codec_delay: 0,
            seek_pre_roll: 0,
            width: 0,
            height: 0,
            frame_rate: 0.0,
            colour: None,
            sampling_rate: 0.0,
            channels: 0,
            bit_depth: 0,
        }
    }

    /// VP8 video track.
    pub fn video(number: u64, width: u64, height: u64) -> Self {
        Self {
            width,
            height,
            ..Self::base(number, 1, "V_VP8")
        }
    }

    /// Opus audio track.
    pub fn audio(number: u64, sampling_rate: f64, channels: u64) -> Self {
        Self {
            sampling_rate,
            channels,
            ..Self::base(number, 2, "A_OPUS")
        }
    }

    /// Track of any other type (e.g. 0x11 for subtitles).
    pub fn other(number: u64, track_type: u64) -> Self {
        Self::base(number, track_type, "S_TEXT/WEBVTT")
    }

    pub fn codec_id(mut self, codec_id: &str) -> Self {
        self.codec_id = codec_id.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn codec_private(mut self, data: &[u8]) -> Self {
        self.codec_private = Some(data.to_vec());
        self
    }

    pub fn codec_delay(mut self, ns: u64) -> Self {
        self.codec_delay = ns;
        self
    }

    pub fn seek_pre_roll(mut self, ns: u64) -> Self {
        self.seek_pre_roll = ns;
        self
    }

    pub fn frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = fps;
        self
    }

    pub fn colour(mut self, colour: Colour) -> Self {
        self.colour = Some(colour);
        self
    }

    pub fn bit_depth(mut self, bits: u64) -> Self {
        self.bit_depth = bits;
        self
    }

    fn write(&self, buf: &mut BytesMut) {
        let entry = start_master(buf, ElementId::TRACK_ENTRY);
        put_uint(buf, ElementId::TRACK_NUMBER, self.number);
        put_uint(buf, ElementId::TRACK_UID, self.number * 1000 + 7);
        put_uint(buf, ElementId::TRACK_TYPE, self.track_type);
        put_string(buf, ElementId::CODEC_ID, &self.codec_id);
        if let Some(name) = &self.name {
            put_string(buf, ElementId::NAME, name);
        }
        if let Some(private) = &self.codec_private {
            put_binary(buf, ElementId::CODEC_PRIVATE, private);
        }
        if self.codec_delay > 0 {
            put_uint(buf, ElementId::CODEC_DELAY, self.codec_delay);
        }
        if self.seek_pre_roll > 0 {
            put_uint(buf, ElementId::SEEK_PRE_ROLL, self.seek_pre_roll);
        }

        match self.track_type {
            1 => {
                let video = start_master(buf, ElementId::VIDEO);
                put_uint(buf, ElementId::PIXEL_WIDTH, self.width);
                put_uint(buf, ElementId::PIXEL_HEIGHT, self.height);
                if self.frame_rate > 0.0 {
                    put_float(buf, ElementId::FRAME_RATE, self.frame_rate);
                }
                if let Some(colour) = &self.colour {
                    write_colour(buf, colour);
                }
                end_master(buf, video);
            }
            2 => {
                let audio = start_master(buf, ElementId::AUDIO);
                put_float(buf, ElementId::SAMPLING_FREQUENCY, self.sampling_rate);
                put_uint(buf, ElementId::CHANNELS, self.channels);
                if self.bit_depth > 0 {
                    put_uint(buf, ElementId::BIT_DEPTH, self.bit_depth);
                }
                end_master(buf, audio);
            }
            _ => {}
        }
        end_master(buf, entry);
    }
}

fn write_colour(buf: &mut BytesMut, colour: &Colour) {
    let master = start_master(buf, ElementId::COLOUR);
    let fields = [
        (ElementId::MATRIX_COEFFICIENTS, colour.matrix_coefficients),
        (ElementId::BITS_PER_CHANNEL, colour.bits_per_channel),
        (ElementId::RANGE, colour.range),
        (ElementId::TRANSFER_CHARACTERISTICS, colour.transfer_characteristics),
        (ElementId::PRIMARIES, colour.primaries),
        (ElementId::MAX_CLL, colour.max_cll),
        (ElementId::MAX_FALL, colour.max_fall),
    ];
    for (id, value) in fields {
        if let Some(value) = value {
            put_uint(buf, id, value);
        }
    }
    if let Some(mm) = &colour.mastering_metadata {
        let mastering = start_master(buf, ElementId::MASTERING_METADATA);
        for (id, value) in [
            (ElementId::LUMINANCE_MAX, mm.luminance_max),
            (ElementId::LUMINANCE_MIN, mm.luminance_min),
            (ElementId::WHITE_POINT_CHROMATICITY_X, mm.white_point_chromaticity_x),
            (ElementId::WHITE_POINT_CHROMATICITY_Y, mm.white_point_chromaticity_y),
        ] {
            if let Some(value) = value {
                put_float(buf, id, value);
            }
        }
        end_master(buf, mastering);
    }
    end_master(buf, master);
}

/// A block to write into a fixture cluster.
#[derive(Debug, Clone)]
pub struct FixtureBlock {
    track: u64,
    timecode: i16,
    key: bool,
    frames: Vec<Vec<u8>>,
    discard_padding: i64,
    group: bool,
}

impl FixtureBlock {
    /// Single-frame block on any track.
    pub fn new(track: u64, timecode: i16, key: bool, data: &[u8]) -> Self {
        Self {
            track,
            timecode,
            key,
            frames: vec![data.to_vec()],
            discard_padding: 0,
            group: false,
        }
    }

    /// Block on track 1.
    pub fn video(timecode: i16, key: bool, data: &[u8]) -> Self {
        Self::new(1, timecode, key, data)
    }

    /// Keyframe block on track 2.
    pub fn audio(timecode: i16, data: &[u8]) -> Self {
        Self::new(2, timecode, true, data)
    }

    /// Xiph-laced block on track 2.
    pub fn laced_audio(timecode: i16, frames: &[&[u8]]) -> Self {
        Self {
            frames: frames.iter().map(|f| f.to_vec()).collect(),
            ..Self::audio(timecode, &[])
        }
    }

    /// Write as a BlockGroup carrying DiscardPadding.
    pub fn with_discard_padding(mut self, ns: i64) -> Self {
        self.discard_padding = ns;
        self.group = true;
        self
    }

    /// Write as a BlockGroup (non-key blocks get a ReferenceBlock).
    pub fn in_group(mut self) -> Self {
        self.group = true;
        self
    }

    /// Payload of a SimpleBlock or Block element.
    fn payload(&self, simple: bool) -> BytesMut {
        let mut buf = BytesMut::new();
        put_size(&mut buf, self.track);
        buf.put_i16(self.timecode);

        let mut flags = 0u8;
        if simple && self.key {
            flags |= 0x80;
        }
        if self.frames.len() > 1 {
            flags |= 0x02;
        }
        buf.put_u8(flags);

        if self.frames.len() > 1 {
            buf.put_u8((self.frames.len() - 1) as u8);
            for frame in &self.frames[..self.frames.len() - 1] {
                let mut size = frame.len();
                while size >= 255 {
                    buf.put_u8(0xFF);
                    size -= 255;
                }
                buf.put_u8(size as u8);
            }
        }
        for frame in &self.frames {
            buf.put_slice(frame);
        }
        buf
    }

    fn write(&self, buf: &mut BytesMut) {
        if !self.group {
            put_binary(buf, ElementId::SIMPLE_BLOCK, &self.payload(true));
            return;
        }
        let group = start_master(buf, ElementId::BLOCK_GROUP);
        put_binary(buf, ElementId::BLOCK, &self.payload(false));
        if !self.key {
            put_int(buf, ElementId::REFERENCE_BLOCK, -33);
        }
        if self.discard_padding != 0 {
            put_int(buf, ElementId::DISCARD_PADDING, self.discard_padding);
        }
        end_master(buf, group);
    }
}

/// Builder for a complete input file.
#[derive(Debug, Clone)]
pub struct WebmFixture {
    doc_type: String,
    timecode_scale: u64,
    info: bool,
    live: bool,
    tracks: Vec<FixtureTrack>,
    tags: Vec<Vec<(String, String)>>,
    tags_after_clusters: bool,
    clusters: Vec<(u64, Vec<FixtureBlock>)>,
}

impl Default for WebmFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl WebmFixture {
    /// Empty `webm` file with millisecond timecodes and no tracks.
    pub fn new() -> Self {
        Self {
            doc_type: "webm".to_string(),
            timecode_scale: 1_000_000,
            info: true,
            live: false,
            tracks: Vec::new(),
            tags: Vec::new(),
            tags_after_clusters: false,
            clusters: Vec::new(),
        }
    }

    /// Video track 1 (640x360 VP8) and audio track 2 (48 kHz stereo Opus).
    pub fn av() -> Self {
        Self::new()
            .track(FixtureTrack::video(1, 640, 360))
            .track(FixtureTrack::audio(2, 48000.0, 2))
    }

    pub fn track(mut self, track: FixtureTrack) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn doc_type(mut self, doc_type: &str) -> Self {
        self.doc_type = doc_type.to_string();
        self
    }

    pub fn timecode_scale(mut self, scale: u64) -> Self {
        self.timecode_scale = scale;
        self
    }

    /// Omit the Info element.
    pub fn without_info(mut self) -> Self {
        self.info = false;
        self
    }

    /// Write Segment and Clusters with unknown sizes, as a live recorder does.
    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }

    /// Add a Tag with the given simple tags.
    pub fn tag(mut self, pairs: &[(&str, &str)]) -> Self {
        self.tags.push(
            pairs
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    /// Place the Tags element after the last cluster.
    pub fn tags_after_clusters(mut self) -> Self {
        self.tags_after_clusters = true;
        self
    }

    /// Add a cluster with the given Timestamp.
    pub fn cluster(mut self, timecode: u64, blocks: Vec<FixtureBlock>) -> Self {
        self.clusters.push((timecode, blocks));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();

        let ebml = start_master(&mut buf, ElementId::EBML);
        put_uint(&mut buf, ElementId::EBML_VERSION, 1);
        put_uint(&mut buf, ElementId::EBML_READ_VERSION, 1);
        put_uint(&mut buf, ElementId::EBML_MAX_ID_LENGTH, 4);
        put_uint(&mut buf, ElementId::EBML_MAX_SIZE_LENGTH, 8);
        put_string(&mut buf, ElementId::DOC_TYPE, &self.doc_type);
        put_uint(&mut buf, ElementId::DOC_TYPE_VERSION, 4);
        put_uint(&mut buf, ElementId::DOC_TYPE_READ_VERSION, 2);
        end_master(&mut buf, ebml);

        let segment = self.open(&mut buf, ElementId::SEGMENT);

        if self.info {
            let info = start_master(&mut buf, ElementId::INFO);
            put_uint(&mut buf, ElementId::TIMECODE_SCALE, self.timecode_scale);
            put_string(&mut buf, ElementId::MUXING_APP, "fixture");
            put_string(&mut buf, ElementId::WRITING_APP, "fixture");
            end_master(&mut buf, info);
        }

        if !self.tracks.is_empty() {
            let tracks = start_master(&mut buf, ElementId::TRACKS);
            for track in &self.tracks {
                track.write(&mut buf);
            }
            end_master(&mut buf, tracks);
        }

        if !self.tags_after_clusters {
            self.write_tags(&mut buf);
        }

        for (timecode, blocks) in &self.clusters {
            let cluster = self.open(&mut buf, ElementId::CLUSTER);
            put_uint(&mut buf, ElementId::TIMESTAMP, *timecode);
            for block in blocks {
                block.write(&mut buf);
            }
            self.close(&mut buf, cluster);
        }

        if self.tags_after_clusters {
            self.write_tags(&mut buf);
        }

        self.close(&mut buf, segment);
        buf.to_vec()
    }

    fn write_tags(&self, buf: &mut BytesMut) {
        if self.tags.is_empty() {
            return;
        }
        let tags = start_master(buf, ElementId::TAGS);
        for pairs in &self.tags {
            let tag = start_master(buf, ElementId::TAG);
            for (name, value) in pairs {
                let simple = start_master(buf, ElementId::SIMPLE_TAG);
                put_string(buf, ElementId::TAG_NAME, name);
                put_string(buf, ElementId::TAG_STRING, value);
                end_master(buf, simple);
            }
            end_master(buf, tag);
        }
        end_master(buf, tags);
    }

    fn open(&self, buf: &mut BytesMut, id: ElementId) -> Option<usize> {
        if self.live {
            put_id(buf, id.0);
            buf.put_slice(&UNKNOWN_SIZE);
            None
        } else {
            Some(start_master(buf, id))
        }
    }

    fn close(&self, buf: &mut BytesMut, size_pos: Option<usize>) {
        if let Some(pos) = size_pos {
            end_master(buf, pos);
        }
    }
}
