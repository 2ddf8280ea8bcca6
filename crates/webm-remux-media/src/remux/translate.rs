//! Input metadata to output metadata.

use crate::demux::{self, Tag, Track, TrackMedia, Tracks};
use crate::io::MkvWriter;
use crate::mux::{self, MuxSegment};
use crate::{Error, Result};
use tracing::{debug, warn};

/// An input track routed to an output track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTrack {
    pub input: u64,
    pub output: u64,
}

/// The single active video and audio track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackMap {
    pub video: Option<ActiveTrack>,
    pub audio: Option<ActiveTrack>,
}

impl TrackMap {
    /// Output track for blocks of `input`, if it is active.
    pub fn route(&self, input: u64) -> Option<u64> {
        [self.video, self.audio]
            .into_iter()
            .flatten()
            .find(|t| t.input == input)
            .map(|t| t.output)
    }

    /// Active output track numbers, video first.
    pub fn outputs(&self) -> impl Iterator<Item = u64> {
        [self.video, self.audio].into_iter().flatten().map(|t| t.output)
    }
}

/// Copy every tag and its pairs, in order.
pub fn translate_tags<W: MkvWriter>(tags: &[Tag], output: &mut MuxSegment<W>) -> Result<()> {
    for tag in tags {
        let out = output.add_tag()?;
        for simple in &tag.simple_tags {
            out.add_simple_tag(&simple.name, &simple.value);
        }
    }
    debug!(tags = tags.len(), "Copied tags");
    Ok(())
}

/// Create output tracks for the first video and first audio track.
///
/// Later tracks of an already active type are dropped, and so are tracks
/// that are neither video nor audio.
pub fn translate_tracks<W: MkvWriter>(
    tracks: &Tracks,
    output: &mut MuxSegment<W>,
) -> Result<TrackMap> {
    let mut map = TrackMap::default();

    for track in tracks {
        match &track.media {
            TrackMedia::Video(settings) => {
                if let Some(active) = map.video {
                    warn!(
                        track = track.number,
                        active = active.input,
                        "Dropping additional video track"
                    );
                    continue;
                }
                let number = add_video(track, settings, output)?;
                map.video = Some(ActiveTrack {
                    input: track.number,
                    output: number,
                });
            }
            TrackMedia::Audio(settings) => {
                if let Some(active) = map.audio {
                    warn!(
                        track = track.number,
                        active = active.input,
                        "Dropping additional audio track"
                    );
                    continue;
                }
                let number = add_audio(track, settings, output)?;
                map.audio = Some(ActiveTrack {
                    input: track.number,
                    output: number,
                });
            }
            TrackMedia::Other(kind) => {
                debug!(track = track.number, kind, "Ignoring non audio/video track");
            }
        }
    }

    debug!(video = ?map.video, audio = ?map.audio, "Mapped tracks");
    Ok(map)
}

fn add_video<W: MkvWriter>(
    track: &Track,
    settings: &demux::VideoSettings,
    output: &mut MuxSegment<W>,
) -> Result<u64> {
    let number = output.add_video_track(settings.width, settings.height, 0)?;
    if number == 0 {
        return Err(Error::mux("video track allocation failed"));
    }

    let out = output.track_mut(number)?;
    if let Some(colour) = &settings.colour {
        out.set_colour(convert_colour(colour)?)?;
    }
    if let Some(name) = &track.name {
        out.set_name(name);
    }
    out.set_codec_id(&track.codec_id);
    if let Some(private) = &track.codec_private {
        out.set_codec_private(private)?;
    }
    if settings.frame_rate > 0.0 {
        out.set_frame_rate(settings.frame_rate)?;
    }
    Ok(number)
}

fn add_audio<W: MkvWriter>(
    track: &Track,
    settings: &demux::AudioSettings,
    output: &mut MuxSegment<W>,
) -> Result<u64> {
    let number = output.add_audio_track(settings.sampling_rate, settings.channels, 0)?;
    if number == 0 {
        return Err(Error::mux("audio track allocation failed"));
    }

    let out = output.track_mut(number)?;
    if let Some(name) = &track.name {
        out.set_name(name);
    }
    out.set_codec_id(&track.codec_id);
    if let Some(private) = &track.codec_private {
        out.set_codec_private(private)?;
    }
    if settings.bit_depth > 0 {
        out.set_bit_depth(settings.bit_depth)?;
    }
    if track.codec_delay != 0 {
        out.set_codec_delay(track.codec_delay);
    }
    if track.seek_pre_roll != 0 {
        out.set_seek_pre_roll(track.seek_pre_roll);
    }
    Ok(number)
}

/// Narrow a parsed colour description to the output representation.
fn convert_colour(colour: &demux::Colour) -> Result<mux::Colour> {
    let mastering_metadata = colour
        .mastering_metadata
        .as_ref()
        .map(|mm| -> Result<mux::MasteringMetadata> {
            Ok(mux::MasteringMetadata {
                primary_r_chromaticity_x: narrow(mm.primary_r_chromaticity_x)?,
                primary_r_chromaticity_y: narrow(mm.primary_r_chromaticity_y)?,
                primary_g_chromaticity_x: narrow(mm.primary_g_chromaticity_x)?,
                primary_g_chromaticity_y: narrow(mm.primary_g_chromaticity_y)?,
                primary_b_chromaticity_x: narrow(mm.primary_b_chromaticity_x)?,
                primary_b_chromaticity_y: narrow(mm.primary_b_chromaticity_y)?,
                white_point_chromaticity_x: narrow(mm.white_point_chromaticity_x)?,
                white_point_chromaticity_y: narrow(mm.white_point_chromaticity_y)?,
                luminance_max: narrow(mm.luminance_max)?,
                luminance_min: narrow(mm.luminance_min)?,
            })
        })
        .transpose()?;

    Ok(mux::Colour {
        matrix_coefficients: colour.matrix_coefficients,
        bits_per_channel: colour.bits_per_channel,
        chroma_subsampling_horz: colour.chroma_subsampling_horz,
        chroma_subsampling_vert: colour.chroma_subsampling_vert,
        cb_subsampling_horz: colour.cb_subsampling_horz,
        cb_subsampling_vert: colour.cb_subsampling_vert,
        chroma_siting_horz: colour.chroma_siting_horz,
        chroma_siting_vert: colour.chroma_siting_vert,
        range: colour.range,
        transfer_characteristics: colour.transfer_characteristics,
        primaries: colour.primaries,
        max_cll: colour.max_cll,
        max_fall: colour.max_fall,
        mastering_metadata,
    })
}

fn narrow(value: Option<f64>) -> Result<Option<f32>> {
    match value {
        Some(v) if !v.is_finite() => Err(Error::mux(format!("non-finite colour value {v}"))),
        Some(v) => Ok(Some(v as f32)),
        None => Ok(None),
    }
}
