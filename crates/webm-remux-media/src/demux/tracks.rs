//! Track entries.

use crate::ebml::read::{parse_children, read_float, read_string, read_uint, ElementSlice};
use crate::ebml::ElementId;
use crate::{Error, Result};

/// Matroska TrackType values.
const TRACK_TYPE_VIDEO: u64 = 1;
const TRACK_TYPE_AUDIO: u64 = 2;

/// Track kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum TrackType {
    Video,
    Audio,
    /// Subtitles, buttons, metadata and anything else, with the raw value.
    Other(u64),
}

impl TrackType {
    fn from_raw(value: u64) -> Self {
        match value {
            TRACK_TYPE_VIDEO => Self::Video,
            TRACK_TYPE_AUDIO => Self::Audio,
            other => Self::Other(other),
        }
    }
}

/// HDR mastering display metadata.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct MasteringMetadata {
    pub primary_r_chromaticity_x: Option<f64>,
    pub primary_r_chromaticity_y: Option<f64>,
    pub primary_g_chromaticity_x: Option<f64>,
    pub primary_g_chromaticity_y: Option<f64>,
    pub primary_b_chromaticity_x: Option<f64>,
    pub primary_b_chromaticity_y: Option<f64>,
    pub white_point_chromaticity_x: Option<f64>,
    pub white_point_chromaticity_y: Option<f64>,
    pub luminance_max: Option<f64>,
    pub luminance_min: Option<f64>,
}

impl MasteringMetadata {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut mm = Self::default();
        for child in parse_children(data)? {
            let value = Some(read_float(child.data)?);
            match child.id {
                ElementId::PRIMARY_R_CHROMATICITY_X => mm.primary_r_chromaticity_x = value,
                ElementId::PRIMARY_R_CHROMATICITY_Y => mm.primary_r_chromaticity_y = value,
                ElementId::PRIMARY_G_CHROMATICITY_X => mm.primary_g_chromaticity_x = value,
                ElementId::PRIMARY_G_CHROMATICITY_Y => mm.primary_g_chromaticity_y = value,
                ElementId::PRIMARY_B_CHROMATICITY_X => mm.primary_b_chromaticity_x = value,
                ElementId::PRIMARY_B_CHROMATICITY_Y => mm.primary_b_chromaticity_y = value,
                ElementId::WHITE_POINT_CHROMATICITY_X => mm.white_point_chromaticity_x = value,
                ElementId::WHITE_POINT_CHROMATICITY_Y => mm.white_point_chromaticity_y = value,
                ElementId::LUMINANCE_MAX => mm.luminance_max = value,
                ElementId::LUMINANCE_MIN => mm.luminance_min = value,
                _ => {}
            }
        }
        Ok(mm)
    }
}

/// Colour element of a video track.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
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
    fn parse(data: &[u8]) -> Result<Self> {
        let mut colour = Self::default();
        for child in parse_children(data)? {
            if child.id == ElementId::MASTERING_METADATA {
                colour.mastering_metadata = Some(MasteringMetadata::parse(child.data)?);
                continue;
            }
            let slot = match child.id {
                ElementId::MATRIX_COEFFICIENTS => &mut colour.matrix_coefficients,
                ElementId::BITS_PER_CHANNEL => &mut colour.bits_per_channel,
                ElementId::CHROMA_SUBSAMPLING_HORZ => &mut colour.chroma_subsampling_horz,
                ElementId::CHROMA_SUBSAMPLING_VERT => &mut colour.chroma_subsampling_vert,
                ElementId::CB_SUBSAMPLING_HORZ => &mut colour.cb_subsampling_horz,
                ElementId::CB_SUBSAMPLING_VERT => &mut colour.cb_subsampling_vert,
                ElementId::CHROMA_SITING_HORZ => &mut colour.chroma_siting_horz,
                ElementId::CHROMA_SITING_VERT => &mut colour.chroma_siting_vert,
                ElementId::RANGE => &mut colour.range,
                ElementId::TRANSFER_CHARACTERISTICS => &mut colour.transfer_characteristics,
                ElementId::PRIMARIES => &mut colour.primaries,
                ElementId::MAX_CLL => &mut colour.max_cll,
                ElementId::MAX_FALL => &mut colour.max_fall,
                _ => continue,
            };
            *slot = Some(read_uint(child.data)?);
        }
        Ok(colour)
    }
}

/// Video settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct VideoSettings {
    pub width: u64,
    pub height: u64,
    /// Frames per second, 0.0 when not declared.
    pub frame_rate: f64,
    pub colour: Option<Colour>,
}

impl VideoSettings {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut video = VideoSettings {
            width: 0,
            height: 0,
            frame_rate: 0.0,
            colour: None,
        };
        for child in parse_children(data)? {
            match child.id {
                ElementId::PIXEL_WIDTH => video.width = read_uint(child.data)?,
                ElementId::PIXEL_HEIGHT => video.height = read_uint(child.data)?,
                ElementId::FRAME_RATE => video.frame_rate = read_float(child.data)?,
                ElementId::COLOUR => video.colour = Some(Colour::parse(child.data)?),
                _ => {}
            }
        }
        if video.width == 0 || video.height == 0 {
            return Err(Error::format(format!(
                "video track has invalid dimensions {}x{}",
                video.width, video.height
            )));
        }
        Ok(video)
    }
}

/// Audio settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AudioSettings {
    pub sampling_rate: f64,
    pub channels: u64,
    /// Bits per sample, 0 when not declared.
    pub bit_depth: u64,
}

impl AudioSettings {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut audio = Self::default();
        for child in parse_children(data)? {
            match child.id {
                ElementId::SAMPLING_FREQUENCY => audio.sampling_rate = read_float(child.data)?,
                ElementId::CHANNELS => audio.channels = read_uint(child.data)?,
                ElementId::BIT_DEPTH => audio.bit_depth = read_uint(child.data)?,
                _ => {}
            }
        }
        if audio.sampling_rate <= 0.0 || audio.channels == 0 {
            return Err(Error::format(format!(
                "audio track has invalid settings: {} Hz, {} channels",
                audio.sampling_rate, audio.channels
            )));
        }
        Ok(audio)
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sampling_rate: 8000.0,
            channels: 1,
            bit_depth: 0,
        }
    }
}

/// Type-specific track settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum TrackMedia {
    Video(VideoSettings),
    Audio(AudioSettings),
    Other(u64),
}

/// One TrackEntry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Track {
    /// Number blocks refer to.
    pub number: u64,
    pub uid: u64,
    pub name: Option<String>,
    pub codec_id: String,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub codec_private: Option<Vec<u8>>,
    /// Nanoseconds.
    pub codec_delay: u64,
    /// Nanoseconds.
    pub seek_pre_roll: u64,
    pub media: TrackMedia,
}

impl Track {
    /// Track kind.
    pub fn track_type(&self) -> TrackType {
        match self.media {
            TrackMedia::Video(_) => TrackType::Video,
            TrackMedia::Audio(_) => TrackType::Audio,
            TrackMedia::Other(raw) => TrackType::Other(raw),
        }
    }

    /// Video settings, for video tracks.
    pub fn video(&self) -> Option<&VideoSettings> {
        match &self.media {
            TrackMedia::Video(video) => Some(video),
            _ => None,
        }
    }

    /// Audio settings, for audio tracks.
    pub fn audio(&self) -> Option<&AudioSettings> {
        match &self.media {
            TrackMedia::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    /// Parse the payload of a TrackEntry.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut number = None;
        let mut uid = 0;
        let mut track_type = None;
        let mut name = None;
        let mut codec_id = String::new();
        let mut codec_private = None;
        let mut codec_delay = 0;
        let mut seek_pre_roll = 0;
        let mut video: Option<ElementSlice<'_>> = None;
        let mut audio: Option<ElementSlice<'_>> = None;

        for child in parse_children(data)? {
            match child.id {
                ElementId::TRACK_NUMBER => number = Some(read_uint(child.data)?),
                ElementId::TRACK_UID => uid = read_uint(child.data)?,
                ElementId::TRACK_TYPE => track_type = Some(read_uint(child.data)?),
                ElementId::NAME => name = Some(read_string(child.data)?),
                ElementId::CODEC_ID => codec_id = read_string(child.data)?,
                ElementId::CODEC_PRIVATE if !child.data.is_empty() => {
                    codec_private = Some(child.data.to_vec())
                }
                ElementId::CODEC_DELAY => codec_delay = read_uint(child.data)?,
                ElementId::SEEK_PRE_ROLL => seek_pre_roll = read_uint(child.data)?,
                ElementId::VIDEO => video = Some(child),
                ElementId::AUDIO => audio = Some(child),
                ElementId::CONTENT_ENCODINGS => check_encodings(child.data)?,
                _ => {}
            }
        }

        let number = number
            .filter(|&n| n > 0)
            .ok_or_else(|| Error::format("track entry without a valid TrackNumber"))?;
        let track_type = track_type
            .map(TrackType::from_raw)
            .ok_or_else(|| Error::format(format!("track {number} has no TrackType")))?;

        let media = match track_type {
            TrackType::Video => {
                let settings = video.ok_or_else(|| {
                    Error::format(format!("video track {number} has no Video element"))
                })?;
                TrackMedia::Video(VideoSettings::parse(settings.data)?)
            }
            TrackType::Audio => match audio {
                Some(settings) => TrackMedia::Audio(AudioSettings::parse(settings.data)?),
                None => TrackMedia::Audio(AudioSettings::default()),
            },
            TrackType::Other(raw) => TrackMedia::Other(raw),
        };

        Ok(Track {
            number,
            uid,
            name,
            codec_id,
            codec_private,
            codec_delay,
            seek_pre_roll,
            media,
        })
    }
}

/// Reject content encodings that encrypt the payload.
fn check_encodings(data: &[u8]) -> Result<()> {
    for encoding in parse_children(data)? {
        if encoding.id != ElementId::CONTENT_ENCODING {
            continue;
        }
        if parse_children(encoding.data)?
            .iter()
            .any(|c| c.id == ElementId::CONTENT_ENCRYPTION)
        {
            return Err(Error::format("encrypted tracks are not supported"));
        }
    }
    Ok(())
}

/// The Tracks element: entries in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tracks {
    entries: Vec<Track>,
}

impl Tracks {
    /// Parse the payload of a Tracks element.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut entries: Vec<Track> = Vec::new();
        for child in parse_children(data)? {
            if child.id != ElementId::TRACK_ENTRY {
                continue;
            }
            let track = Track::parse(child.data)?;
            if entries.iter().any(|t| t.number == track.number) {
                return Err(Error::format(format!(
                    "duplicate track number {}",
                    track.number
                )));
            }
            entries.push(track);
        }
        Ok(Self { entries })
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no tracks were declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Track at a 1-based position.
    pub fn by_index(&self, index: usize) -> Option<&Track> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Track with the given TrackNumber.
    pub fn by_number(&self, number: u64) -> Option<&Track> {
        self.entries.iter().find(|t| t.number == number)
    }

    /// Tracks in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Tracks {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::write::{
        end_master, put_binary, put_float, put_string, put_uint, start_master,
    };
    use bytes::BytesMut;

    fn video_entry(buf: &mut BytesMut, number: u64, width: u64, height: u64) {
        let entry = start_master(buf, ElementId::TRACK_ENTRY);
        put_uint(buf, ElementId::TRACK_NUMBER, number);
        put_uint(buf, ElementId::TRACK_TYPE, TRACK_TYPE_VIDEO);
        put_string(buf, ElementId::CODEC_ID, "V_VP8");
        let video = start_master(buf, ElementId::VIDEO);
        put_uint(buf, ElementId::PIXEL_WIDTH, width);
        put_uint(buf, ElementId::PIXEL_HEIGHT, height);
        end_master(buf, video);
        end_master(buf, entry);
    }

    #[test]
    fn test_parse_video_and_audio() {
        let mut buf = BytesMut::new();
        video_entry(&mut buf, 1, 640, 360);

        let entry = start_master(&mut buf, ElementId::TRACK_ENTRY);
        put_uint(&mut buf, ElementId::TRACK_NUMBER, 2);
        put_uint(&mut buf, ElementId::TRACK_TYPE, TRACK_TYPE_AUDIO);
        put_string(&mut buf, ElementId::CODEC_ID, "A_OPUS");
        put_binary(&mut buf, ElementId::CODEC_PRIVATE, b"OpusHead");
        put_uint(&mut buf, ElementId::CODEC_DELAY, 6_500_000);
        put_uint(&mut buf, ElementId::SEEK_PRE_ROLL, 80_000_000);
        let audio = start_master(&mut buf, ElementId::AUDIO);
        put_float(&mut buf, ElementId::SAMPLING_FREQUENCY, 48000.0);
        put_uint(&mut buf, ElementId::CHANNELS, 2);
        end_master(&mut buf, audio);
        end_master(&mut buf, entry);

        let tracks = Tracks::parse(&buf).unwrap();
        assert_eq!(tracks.len(), 2);

        let video = tracks.by_index(1).unwrap();
        assert_eq!(video.track_type(), TrackType::Video);
        let settings = video.video().unwrap();
        assert_eq!((settings.width, settings.height), (640, 360));
        assert_eq!(settings.frame_rate, 0.0);

        let audio = tracks.by_number(2).unwrap();
        assert_eq!(audio.track_type(), TrackType::Audio);
        assert_eq!(audio.codec_private.as_deref(), Some(&b"OpusHead"[..]));
        assert_eq!(audio.codec_delay, 6_500_000);
        assert_eq!(audio.seek_pre_roll, 80_000_000);
        assert_eq!(audio.audio().unwrap().channels, 2);

        assert!(tracks.by_index(0).is_none());
        assert!(tracks.by_index(3).is_none());
        assert!(tracks.by_number(9).is_none());
    }

    #[test]
    fn test_other_track_type_kept_raw() {
        let mut buf = BytesMut::new();
        let entry = start_master(&mut buf, ElementId::TRACK_ENTRY);
        put_uint(&mut buf, ElementId::TRACK_NUMBER, 3);
        put_uint(&mut buf, ElementId::TRACK_TYPE, 0x11);
        put_string(&mut buf, ElementId::CODEC_ID, "S_TEXT/WEBVTT");
        end_master(&mut buf, entry);

        let tracks = Tracks::parse(&buf).unwrap();
        assert_eq!(tracks.by_number(3).unwrap().track_type(), TrackType::Other(0x11));
    }

    #[test]
    fn test_colour_parsed() {
        let mut buf = BytesMut::new();
        let entry = start_master(&mut buf, ElementId::TRACK_ENTRY);
        put_uint(&mut buf, ElementId::TRACK_NUMBER, 1);
        put_uint(&mut buf, ElementId::TRACK_TYPE, TRACK_TYPE_VIDEO);
        let video = start_master(&mut buf, ElementId::VIDEO);
        put_uint(&mut buf, ElementId::PIXEL_WIDTH, 1920);
        put_uint(&mut buf, ElementId::PIXEL_HEIGHT, 1080);
        let colour = start_master(&mut buf, ElementId::COLOUR);
        put_uint(&mut buf, ElementId::PRIMARIES, 9);
        put_uint(&mut buf, ElementId::TRANSFER_CHARACTERISTICS, 16);
        let mm = start_master(&mut buf, ElementId::MASTERING_METADATA);
        put_float(&mut buf, ElementId::LUMINANCE_MAX, 1000.0);
        end_master(&mut buf, mm);
        end_master(&mut buf, colour);
        end_master(&mut buf, video);
        end_master(&mut buf, entry);

        let tracks = Tracks::parse(&buf).unwrap();
        let colour = tracks.by_index(1).unwrap().video().unwrap().colour.clone().unwrap();
        assert_eq!(colour.primaries, Some(9));
        assert_eq!(colour.transfer_characteristics, Some(16));
        assert!(colour.matrix_coefficients.is_none());
        assert_eq!(colour.mastering_metadata.unwrap().luminance_max, Some(1000.0));
    }

    #[test]
    fn test_duplicate_track_number_rejected() {
        let mut buf = BytesMut::new();
        video_entry(&mut buf, 1, 640, 360);
        video_entry(&mut buf, 1, 320, 240);
        assert!(Tracks::parse(&buf).is_err());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut buf = BytesMut::new();
        video_entry(&mut buf, 1, 0, 360);
        assert!(Tracks::parse(&buf).is_err());
    }

    #[test]
    fn test_encrypted_track_rejected() {
        let mut buf = BytesMut::new();
        let entry = start_master(&mut buf, ElementId::TRACK_ENTRY);
        put_uint(&mut buf, ElementId::TRACK_NUMBER, 1);
        put_uint(&mut buf, ElementId::TRACK_TYPE, TRACK_TYPE_AUDIO);
        let encodings = start_master(&mut buf, ElementId::CONTENT_ENCODINGS);
        let encoding = start_master(&mut buf, ElementId::CONTENT_ENCODING);
        let encryption = start_master(&mut buf, ElementId::CONTENT_ENCRYPTION);
        end_master(&mut buf, encryption);
        end_master(&mut buf, encoding);
        end_master(&mut buf, encodings);
        end_master(&mut buf, entry);

        let err = Tracks::parse(&buf).unwrap_err();
        assert!(err.to_string().contains("encrypted"));
    }
}
