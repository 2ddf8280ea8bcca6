mod cli;

use webm_remux::{config, pipeline, probe};
use webm_remux_media::demux::TrackMedia;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "webm_remux=trace,webm_remux_media=trace".to_string()
        } else {
            "webm_remux=info,webm_remux_media=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Remux {
            input,
            output,
            dry_run,
        } => remux_file(&input, &output, cli.config.as_deref(), dry_run),
        Commands::Probe { file, json } => probe_file(&file, json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("webm-remux {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn remux_file(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    tracing::info!("Remuxing {:?} -> {:?}", input, output);
    let report = pipeline::remux_file(input, output, &config.output, dry_run)?;
    let summary = &report.summary;

    println!("Input: {}", report.input.display());
    println!("DocType: {}", summary.doc_type);
    println!(
        "Tracks: video {}, audio {}",
        track_label(summary.video_track),
        track_label(summary.audio_track)
    );
    println!(
        "Frames: {} in {} input clusters ({} blocks skipped)",
        summary.relay.frames, summary.relay.clusters, summary.relay.skipped_blocks
    );
    println!("Output clusters: {}", summary.output_clusters);
    println!("Cue points: {}", summary.cue_points);
    println!("Duration: {}", format_duration(summary.duration_ns as f64 / 1e9));

    match (&report.output, report.measured_bytes) {
        (None, Some(size)) => println!("\n[DRY RUN] Output would be {} bytes", size),
        (Some(path), _) => {
            println!(
                "\nOutput: {} ({} bytes)",
                path.display(),
                report.written_bytes.unwrap_or_default()
            );
        }
        (None, None) => {}
    }

    Ok(())
}

fn track_label(track: Option<u64>) -> String {
    match track {
        Some(number) => format!("#{}", number),
        None => "none".to_string(),
    }
}

fn format_duration(secs: f64) -> String {
    let millis = (secs * 1000.0).round() as u64;
    let total = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total / 60) % 60,
        total % 60,
        millis % 1000
    )
}

fn probe_file(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let report = probe::probe_file(file)?;

    if json {
        let json_str = serde_json::to_string_pretty(&report)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("File: {}", report.file_path.display());
    println!("DocType: {} (version {})", report.header.doc_type, report.header.doc_type_version);
    println!("Size: {} bytes", report.file_size);
    match report.segment_size {
        Some(size) => println!("Segment: {} bytes", size),
        None => println!("Segment: unknown size (live)"),
    }

    match &report.info {
        Some(info) => {
            println!("Timecode scale: {} ns", info.timecode_scale);
            if let Some(secs) = report.duration_secs() {
                println!("Duration: {}", format_duration(secs));
            }
            if let Some(ref app) = info.writing_app {
                println!("Writing app: {}", app);
            }
            if let Some(ref app) = info.muxing_app {
                println!("Muxing app: {}", app);
            }
        }
        None => println!("Info: missing"),
    }

    println!("\nTracks: {}", report.tracks.len());
    for track in &report.tracks {
        print!("  [{}] {}", track.number, track.codec_id);
        match &track.media {
            TrackMedia::Video(video) => {
                print!(" video {}x{}", video.width, video.height);
                if video.frame_rate > 0.0 {
                    print!(" {:.3} fps", video.frame_rate);
                }
            }
            TrackMedia::Audio(audio) => {
                print!(" audio {} Hz {}ch", audio.sampling_rate, audio.channels);
            }
            TrackMedia::Other(kind) => print!(" type {}", kind),
        }
        if let Some(ref name) = track.name {
            print!(" ({})", name);
        }
        println!();
    }

    println!("\nTags: {}", report.tags.len());
    for tag in &report.tags {
        for simple in &tag.simple_tags {
            println!("  {} = {}", simple.name, simple.value);
        }
    }

    println!("\nClusters: {}", report.cluster_count);

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_output_config(&config.output);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            print_output_config(&config.output);
        }
    }

    Ok(())
}

fn print_output_config(output: &config::OutputConfig) {
    println!("  Writing app: {}", output.writing_app);
    println!("  Max output bytes: {}", output.max_output_bytes);
    println!("  Measure first: {}", output.measure_first);
    println!("  Max cluster duration: {} ms", output.max_cluster_duration_ms);
}
