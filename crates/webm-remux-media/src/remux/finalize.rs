//! Output options, cue registration and finalization.

use super::translate::TrackMap;
use crate::io::MkvWriter;
use crate::mux::{MuxMode, MuxSegment};
use crate::{Error, Result};

/// Apply the fixed output options: whole-file mode with an indexed,
/// accurately timed layout.
pub fn configure_output<W: MkvWriter>(
    output: &mut MuxSegment<W>,
    max_cluster_duration_ns: u64,
) -> Result<()> {
    output.set_accurate_cluster_duration(true);
    output.use_fixed_size_cluster_timecode(false);
    output.set_mode(MuxMode::File)?;
    output.set_chunking(false)?;
    output.set_output_cues(true);
    output.cues_mut().set_output_block_number(true);
    output.set_max_cluster_duration(max_cluster_duration_ns);
    Ok(())
}

/// Index keyframes of every active track.
pub fn register_cues_tracks<W: MkvWriter>(
    output: &mut MuxSegment<W>,
    tracks: &TrackMap,
) -> Result<()> {
    for number in tracks.outputs() {
        output.add_cues_track(number)?;
    }
    Ok(())
}

/// Finalize the output. Failures of the rewrite are reported as mux errors.
pub fn finalize<W: MkvWriter>(output: &mut MuxSegment<W>) -> Result<()> {
    output.finalize().map_err(|e| match e {
        Error::Io(io) => Error::mux(format!("finalize failed: {io}")),
        other => other,
    })
}
