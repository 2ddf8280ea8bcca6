//! Output track descriptions.

use crate::ebml::write::{
    end_master, put_binary, put_float, put_float32, put_string, put_uint, start_master,
};
use crate::ebml::ElementId;
use crate::{Error, Result};
use bytes::BytesMut;

const MAX_CHROMATICITY: f32 = 1.0;
const MAX_LUMINANCE: f32 = 9999.99;
const MAX_LUMINANCE_MIN: f32 = 999.9999;

/// Mastering display metadata as written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasteringMetadata {
    pub primary_r_chromaticity_x: Option<f32>,
    pub primary_r_chromaticity_y: Option<f32>,
    pub primary_g_chromaticity_x: Option<f32>,
    pub primary_g_chromaticity_y: Option<f32>,
    pub primary_b_chromaticity_x: Option<f32>,
    pub primary_b_chromaticity_y: Option<f32>,
    pub white_point_chromaticity_x: Option<f32>,
    pub white_point_chromaticity_y: Option<f32>,
    pub luminance_max: Option<f32>,
    pub luminance_min: Option<f32>,
}

impl MasteringMetadata {
    fn chromaticities(&self) -> [(ElementId, Option<f32>); 8] {
        [
            (ElementId::PRIMARY_R_CHROMATICITY_X, self.primary_r_chromaticity_x),
            (ElementId::PRIMARY_R_CHROMATICITY_Y, self.primary_r_chromaticity_y),
            (ElementId::PRIMARY_G_CHROMATICITY_X, self.primary_g_chromaticity_x),
            (ElementId::PRIMARY_G_CHROMATICITY_Y, self.primary_g_chromaticity_y),
            (ElementId::PRIMARY_B_CHROMATICITY_X, self.primary_b_chromaticity_x),
            (ElementId::PRIMARY_B_CHROMATICITY_Y, self.primary_b_chromaticity_y),
            (ElementId::WHITE_POINT_CHROMATICITY_X, self.white_point_chromaticity_x),
            (ElementId::WHITE_POINT_CHROMATICITY_Y, self.white_point_chromaticity_y),
        ]
    }

    fn validate(&self) -> Result<()> {
        for (id, value) in self.chromaticities() {
            if let Some(v) = value {
                if !(0.0..=MAX_CHROMATICITY).contains(&v) {
                    return Err(Error::mux(format!("{id} {v} outside [0, 1]")));
                }
            }
        }
        if let Some(max) = self.luminance_max {
            if !(0.0..=MAX_LUMINANCE).contains(&max) {
                return Err(Error::mux(format!("LuminanceMax {max} out of range")));
            }
        }
        if let Some(min) = self.luminance_min {
            if !(0.0..=MAX_LUMINANCE_MIN).contains(&min) {
                return Err(Error::mux(format!("LuminanceMin {min} out of range")));
            }
        }
        Ok(())
    }

    fn write(&self, buf: &mut BytesMut) {
        let master = start_master(buf, ElementId::MASTERING_METADATA);
        let luminance = [
            (ElementId::LUMINANCE_MAX, self.luminance_max),
            (ElementId::LUMINANCE_MIN, self.luminance_min),
        ];
        for (id, value) in self.chromaticities().into_iter().chain(luminance) {
            if let Some(v) = value {
                put_float32(buf, id, v);
            }
        }
        end_master(buf, master);
    }
}

/// Colour description as written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Colour {
    pub matrix_coefficients: Option<u64>,
    pub bits_per_channel: Option<u64>,
    pub chroma_subsampling_horz: Option<u64>,
    pub chroma_subsampling_vert: Option<u64>,
    pub cb_subsampling_horz: Option<u64>,
    pub cb_subsampling_vert: Option<u64>,
    pub chroma_siting_horz: Option<u64>,
    pub chroma_siting_vert: Option<u64>,
    pub range: Option<u64>,
    pub transfer_characteristics: Option<u64>,
    pub primaries: Option<u64>,
    pub max_cll: Option<u64>,
    pub max_fall: Option<u64>,
    pub mastering_metadata: Option<MasteringMetadata>,
}

impl Colour {
    fn write(&self, buf: &mut BytesMut) {
        let master = start_master(buf, ElementId::COLOUR);
        let fields = [
            (ElementId::MATRIX_COEFFICIENTS, self.matrix_coefficients),
            (ElementId::BITS_PER_CHANNEL, self.bits_per_channel),
            (ElementId::CHROMA_SUBSAMPLING_HORZ, self.chroma_subsampling_horz),
            (ElementId::CHROMA_SUBSAMPLING_VERT, self.chroma_subsampling_vert),
            (ElementId::CB_SUBSAMPLING_HORZ, self.cb_subsampling_horz),
            (ElementId::CB_SUBSAMPLING_VERT, self.cb_subsampling_vert),
            (ElementId::CHROMA_SITING_HORZ, self.chroma_siting_horz),
            (ElementId::CHROMA_SITING_VERT, self.chroma_siting_vert),
            (ElementId::RANGE, self.range),
            (ElementId::TRANSFER_CHARACTERISTICS, self.transfer_characteristics),
            (ElementId::PRIMARIES, self.primaries),
            (ElementId::MAX_CLL, self.max_cll),
            (ElementId::MAX_FALL, self.max_fall),
        ];
        for (id, value) in fields {
            if let Some(v) = value {
                put_uint(buf, id, v);
            }
        }
        if let Some(mm) = &self.mastering_metadata {
            mm.write(buf);
        }
        end_master(buf, master);
    }
}

/// Type-specific part of an output track.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackKind {
    Video {
        width: u64,
        height: u64,
        frame_rate: Option<f64>,
        colour: Option<Colour>,
    },
    Audio {
        sample_rate: f64,
        channels: u64,
        bit_depth: Option<u64>,
    },
}

/// One output track.
#[derive(Debug, Clone, PartialEq)]
pub struct MuxTrack {
    number: u64,
    uid: u64,
    kind: TrackKind,
    name: Option<String>,
    codec_id: String,
    codec_private: Option<Vec<u8>>,
    codec_delay: u64,
    seek_pre_roll: u64,
}

impl MuxTrack {
    pub(crate) fn new(number: u64, kind: TrackKind) -> Self {
        Self {
            number,
            uid: track_uid(number),
            kind,
            name: None,
            codec_id: String::new(),
            codec_private: None,
            codec_delay: 0,
            seek_pre_roll: 0,
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn kind(&self) -> &TrackKind {
        &self.kind
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, TrackKind::Video { .. })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn codec_id(&self) -> &str {
        &self.codec_id
    }

    pub fn codec_private(&self) -> Option<&[u8]> {
        self.codec_private.as_deref()
    }

    pub fn codec_delay(&self) -> u64 {
        self.codec_delay
    }

    pub fn seek_pre_roll(&self) -> u64 {
        self.seek_pre_roll
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn set_codec_id(&mut self, codec_id: &str) {
        self.codec_id = codec_id.to_string();
    }

    /// Attach codec initialization data. Empty data is rejected.
    pub fn set_codec_private(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::mux(format!(
                "track {}: empty codec private data",
                self.number
            )));
        }
        self.codec_private = Some(data.to_vec());
        Ok(())
    }

    /// Nanoseconds.
    pub fn set_codec_delay(&mut self, ns: u64) {
        self.codec_delay = ns;
    }

    /// Nanoseconds.
    pub fn set_seek_pre_roll(&mut self, ns: u64) {
        self.seek_pre_roll = ns;
    }

    /// Set the frame rate of a video track. Must be positive.
    pub fn set_frame_rate(&mut self, fps: f64) -> Result<()> {
        let number = self.number;
        match &mut self.kind {
            TrackKind::Video { frame_rate, .. } if fps > 0.0 && fps.is_finite() => {
                *frame_rate = Some(fps);
                Ok(())
            }
            TrackKind::Video { .. } => Err(Error::mux(format!(
                "track {number}: invalid frame rate {fps}"
            ))),
            TrackKind::Audio { .. } => Err(Error::mux(format!(
                "track {number}: frame rate on an audio track"
            ))),
        }
    }

    /// Attach a colour description to a video track.
    pub fn set_colour(&mut self, value: Colour) -> Result<()> {
        if let Some(mm) = &value.mastering_metadata {
            mm.validate()?;
        }
        let number = self.number;
        match &mut self.kind {
            TrackKind::Video { colour, .. } => {
                *colour = Some(value);
                Ok(())
            }
            TrackKind::Audio { .. } => Err(Error::mux(format!(
                "track {number}: colour on an audio track"
            ))),
        }
    }

    /// Set the bit depth of an audio track.
    pub fn set_bit_depth(&mut self, bits: u64) -> Result<()> {
        let number = self.number;
        match &mut self.kind {
            TrackKind::Audio { bit_depth, .. } => {
                *bit_depth = Some(bits);
                Ok(())
            }
            TrackKind::Video { .. } => Err(Error::mux(format!(
                "track {number}: bit depth on a video track"
            ))),
        }
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        let entry = start_master(buf, ElementId::TRACK_ENTRY);
        put_uint(buf, ElementId::TRACK_NUMBER, self.number);
        put_uint(buf, ElementId::TRACK_UID, self.uid);
        put_uint(
            buf,
            ElementId::TRACK_TYPE,
            if self.is_video() { 1 } else { 2 },
        );
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

        match &self.kind {
            TrackKind::Video {
                width,
                height,
                frame_rate,
                colour,
            } => {
                let video = start_master(buf, ElementId::VIDEO);
                put_uint(buf, ElementId::PIXEL_WIDTH, *width);
                put_uint(buf, ElementId::PIXEL_HEIGHT, *height);
                if let Some(fps) = frame_rate {
                    put_float(buf, ElementId::FRAME_RATE, *fps);
                }
                if let Some(colour) = colour {
                    colour.write(buf);
                }
                end_master(buf, video);
            }
            TrackKind::Audio {
                sample_rate,
                channels,
                bit_depth,
            } => {
                let audio = start_master(buf, ElementId::AUDIO);
                put_float(buf, ElementId::SAMPLING_FREQUENCY, *sample_rate);
                put_uint(buf, ElementId::CHANNELS, *channels);
                if let Some(bits) = bit_depth {
                    put_uint(buf, ElementId::BIT_DEPTH, *bits);
                }
                end_master(buf, audio);
            }
        }
        end_master(buf, entry);
    }
}

/// Deterministic non-zero TrackUID (splitmix64 of the track number).
fn track_uid(number: u64) -> u64 {
    let mut z = number.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (z ^ (z >> 31)).max(1)
}
