//! Keyframe index.

use crate::ebml::write::{end_master, put_uint, start_master};
use crate::ebml::ElementId;
use bytes::BytesMut;

/// One indexed keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuePoint {
    /// Timestamp in timecode ticks.
    pub time: u64,
    pub track: u64,
    /// Cluster offset relative to the segment payload.
    pub cluster_position: u64,
    /// 1-based block index within the cluster.
    pub block_number: u64,
}

/// Cue points collected while muxing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cues {
    output_block_number: bool,
    points: Vec<CuePoint>,
}

impl Cues {
    /// Also record CueBlockNumber for each point.
    pub fn set_output_block_number(&mut self, enabled: bool) {
        self.output_block_number = enabled;
    }

    pub fn points(&self) -> &[CuePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Insert keeping points ordered by time.
    pub(crate) fn push(&mut self, point: CuePoint) {
        let at = self.points.partition_point(|p| p.time <= point.time);
        self.points.insert(at, point);
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        let master = start_master(buf, ElementId::CUES);
        for point in &self.points {
            let cue = start_master(buf, ElementId::CUE_POINT);
            put_uint(buf, ElementId::CUE_TIME, point.time);
            let positions = start_master(buf, ElementId::CUE_TRACK_POSITIONS);
            put_uint(buf, ElementId::CUE_TRACK, point.track);
            put_uint(buf, ElementId::CUE_CLUSTER_POSITION, point.cluster_position);
            // Block 1 is implied.
            if self.output_block_number && point.block_number > 1 {
                put_uint(buf, ElementId::CUE_BLOCK_NUMBER, point.block_number);
            }
            end_master(buf, positions);
            end_master(buf, cue);
        }
        end_master(buf, master);
    }
}
