//! File-backed remux jobs.
//!
//! A job optionally measures the output first by running the remux against
//! a [`CountingSink`], rejects outputs over the configured size limit, then
//! writes into a temporary file next to the destination and persists it
//! over the destination in one rename. A failed job leaves no partial
//! output behind.

use crate::config::OutputConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use webm_remux_media::transport::{CountingSink, StreamSink, StreamSource};
use webm_remux_media::{remux_transport, RemuxOptions, RemuxSummary};

/// Failures the pipeline reports on its own, as opposed to remux errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Input file does not exist: {0:?}")]
    InputMissing(PathBuf),

    #[error("Output would be {size} bytes, over the {limit} byte limit")]
    OutputTooLarge { size: u64, limit: u64 },
}

/// Outcome of a remux job.
#[derive(Debug, Clone, Serialize)]
pub struct RemuxReport {
    pub input: PathBuf,
    /// Where the output was persisted; `None` for a dry run.
    pub output: Option<PathBuf>,
    /// Size predicted by the measure pass, if one ran.
    pub measured_bytes: Option<u64>,
    /// Size of the persisted file.
    pub written_bytes: Option<u64>,
    pub summary: RemuxSummary,
}

/// Remux `input` into `output`.
///
/// With `dry_run` only the measure pass runs and nothing is written.
pub fn remux_file(
    input: &Path,
    output: &Path,
    config: &OutputConfig,
    dry_run: bool,
) -> Result<RemuxReport> {
    if !input.exists() {
        return Err(PipelineError::InputMissing(input.to_path_buf()).into());
    }

    let options = RemuxOptions {
        writing_app: config.writing_app.clone(),
        max_cluster_duration_ns: config.max_cluster_duration_ns(),
    };

    let mut measured = None;
    if config.measure_first || dry_run {
        let (summary, size) = measure(input, &options)?;
        tracing::info!(size, "Measured output size");
        check_size(size, config.max_output_bytes)?;

        if dry_run {
            return Ok(RemuxReport {
                input: input.to_path_buf(),
                output: None,
                measured_bytes: Some(size),
                written_bytes: None,
                summary,
            });
        }
        measured = Some(size);
    }

    let (summary, written) = write_output(input, output, &options, config.max_output_bytes)?;
    if let Some(size) = measured {
        if size != written {
            tracing::warn!(measured = size, written, "Output size differs from measure pass");
        }
    }
    tracing::info!("Wrote {:?} ({} bytes)", output, written);

    Ok(RemuxReport {
        input: input.to_path_buf(),
        output: Some(output.to_path_buf()),
        measured_bytes: measured,
        written_bytes: Some(written),
        summary,
    })
}

fn open_input(input: &Path) -> Result<StreamSource<BufReader<File>>> {
    let file =
        File::open(input).with_context(|| format!("Failed to open input file: {:?}", input))?;
    Ok(StreamSource::new(BufReader::new(file)))
}

/// Run the remux without output to learn the output size.
fn measure(input: &Path, options: &RemuxOptions) -> Result<(RemuxSummary, u64)> {
    let (summary, sink) = remux_transport(open_input(input)?, CountingSink::new(), options)
        .with_context(|| format!("Failed to remux {:?}", input))?;
    Ok((summary, sink.len()))
}

fn write_output(
    input: &Path,
    output: &Path,
    options: &RemuxOptions,
    limit: u64,
) -> Result<(RemuxSummary, u64)> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {:?}", dir))?;

    let summary = {
        let sink = StreamSink::new(BufWriter::new(temp.as_file_mut()));
        let (summary, sink) = remux_transport(open_input(input)?, sink, options)
            .with_context(|| format!("Failed to remux {:?}", input))?;
        sink.into_inner().context("Failed to flush output")?;
        summary
    };

    let written = temp.as_file().metadata()?.len();
    check_size(written, limit)?;
    temp.as_file().sync_all().context("Failed to sync output")?;

    temp.persist(output)
        .with_context(|| format!("Failed to move output into place: {:?}", output))?;
    Ok((summary, written))
}

fn check_size(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(PipelineError::OutputTooLarge { size, limit }.into());
    }
    Ok(())
}
