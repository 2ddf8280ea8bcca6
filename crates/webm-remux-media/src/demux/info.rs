//! Segment information.

use crate::ebml::read::{parse_children, read_float, read_string, read_uint};
use crate::ebml::ElementId;
use crate::{Error, Result};

/// Default timecode scale: timestamps in milliseconds.
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Parsed Info element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SegmentInfo {
    /// Nanoseconds per timecode tick.
    pub timecode_scale: u64,
    /// Duration in timecode ticks.
    pub duration: Option<f64>,
    /// Segment title.
    pub title: Option<String>,
    /// Muxing library.
    pub muxing_app: Option<String>,
    /// Writing application.
    pub writing_app: Option<String>,
}

impl SegmentInfo {
    /// Parse the payload of an Info element.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut info = SegmentInfo {
            timecode_scale: DEFAULT_TIMECODE_SCALE,
            duration: None,
            title: None,
            muxing_app: None,
            writing_app: None,
        };

        for child in parse_children(data)? {
            match child.id {
                ElementId::TIMECODE_SCALE => info.timecode_scale = read_uint(child.data)?,
                ElementId::DURATION => info.duration = Some(read_float(child.data)?),
                ElementId::TITLE => info.title = Some(read_string(child.data)?),
                ElementId::MUXING_APP => info.muxing_app = Some(read_string(child.data)?),
                ElementId::WRITING_APP => info.writing_app = Some(read_string(child.data)?),
                _ => {}
            }
        }

        if info.timecode_scale == 0 {
            return Err(Error::format("TimecodeScale is zero"));
        }

        Ok(info)
    }

    /// Duration in nanoseconds, when present.
    pub fn duration_ns(&self) -> Option<f64> {
        self.duration.map(|d| d * self.timecode_scale as f64)
    }
}
