//! Output segment information.

use crate::ebml::write::{end_master, put_float, put_string, put_uint, start_master};
use crate::ebml::ElementId;
use bytes::BytesMut;

/// Default muxing application string.
pub const MUXING_APP: &str = concat!("webm-remux-media-", env!("CARGO_PKG_VERSION"));

/// Info fields the caller controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    timecode_scale: u64,
    writing_app: String,
    muxing_app: String,
}

impl Default for OutputInfo {
    fn default() -> Self {
        Self {
            timecode_scale: crate::demux::DEFAULT_TIMECODE_SCALE,
            writing_app: MUXING_APP.to_string(),
            muxing_app: MUXING_APP.to_string(),
        }
    }
}

impl OutputInfo {
    pub fn timecode_scale(&self) -> u64 {
        self.timecode_scale
    }

    /// Nanoseconds per tick. Zero is rejected when the header is written.
    pub fn set_timecode_scale(&mut self, scale: u64) {
        self.timecode_scale = scale;
    }

    pub fn set_writing_app(&mut self, app: &str) {
        self.writing_app = app.to_string();
    }

    /// Write the Info element. With `duration_placeholder`, an 8-byte
    /// Duration of 0.0 is included and the buffer offset of its payload is
    /// returned for patching.
    pub(crate) fn write(&self, buf: &mut BytesMut, duration_placeholder: bool) -> Option<usize> {
        let master = start_master(buf, ElementId::INFO);
        put_uint(buf, ElementId::TIMECODE_SCALE, self.timecode_scale);
        let duration_pos = duration_placeholder.then(|| {
            put_float(buf, ElementId::DURATION, 0.0);
            buf.len() - 8
        });
        put_string(buf, ElementId::MUXING_APP, &self.muxing_app);
        put_string(buf, ElementId::WRITING_APP, &self.writing_app);
        end_master(buf, master);
        duration_pos
    }
}
