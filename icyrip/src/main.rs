mod cli;
mod source;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use icyrip_core::{run_with_progress, Config, IcyHeaders, ProgressEvent, SessionEnd};
use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;

use crate::cli::{build_cli, DEFAULT_EXTENSION};

fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let default_filter = if matches.get_flag("verbose") {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let location = matches
        .get_one::<String>("source")
        .expect("required argument");
    let output_dir = matches
        .get_one::<PathBuf>("output")
        .expect("defaulted argument");
    let buffer_size = *matches
        .get_one::<NonZeroUsize>("buffer-size")
        .expect("defaulted argument");
    let timeout = matches
        .get_one::<Option<Duration>>("timeout")
        .copied()
        .flatten();
    let extension = matches
        .get_one::<String>("extension")
        .cloned()
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned());

    let mut builder = Config::builder(output_dir)
        .read_buffer_size(buffer_size)
        .default_extension(extension);
    if let Some(limit) = matches.get_one::<u64>("max-size") {
        builder = builder.max_output_bytes(*limit);
    }
    let config = builder.build().with_context(|| {
        format!(
            "failed to create configuration for '{}'",
            output_dir.display()
        )
    })?;

    debug!("{config:?}");
    let source = source::open(location, timeout)?;

    let progress = ProgressBar::new_spinner();
    progress.set_draw_target(ProgressDrawTarget::stderr());
    let spinner_style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    progress.set_style(spinner_style);
    progress.enable_steady_tick(Duration::from_millis(100));

    let progress_handle = progress.clone();
    let mut current_file = String::new();
    let result = run_with_progress(config, source, move |event| match event {
        ProgressEvent::Connected { headers } => {
            progress_handle.println(describe_station(headers));
        }
        ProgressEvent::TrackStarted { file_name, .. } => {
            current_file = file_name.to_owned();
            progress_handle.set_message(current_file.clone());
        }
        ProgressEvent::Advance { bytes_written } => {
            let written = HumanBytes(bytes_written);
            progress_handle.set_message(format!("{written} - {current_file}"));
        }
        ProgressEvent::MetadataRejected { text } => {
            progress_handle.println(format!("Skipped malformed metadata: {text}"));
        }
        ProgressEvent::Finish { .. } => {
            progress_handle.set_message(String::from("Completed"));
        }
    })
    .with_context(|| format!("failed to record '{location}'"));

    progress.finish_and_clear();

    let summary = result?;
    println!(
        "Recorded {} file(s), {} of audio{}",
        summary.tracks_started,
        HumanBytes(summary.bytes_written),
        match summary.end {
            SessionEnd::EndOfStream => "",
            SessionEnd::CapacityReached => " (size limit reached)",
        }
    );

    Ok(())
}

/// One-line description of the station, e.g. `Connected to Radio X (Jazz, 128 kbit/s)`.
fn describe_station(headers: &IcyHeaders) -> String {
    let station = headers.station_name.as_deref().unwrap_or("unnamed station");
    let mut details = Vec::new();
    if let Some(genre) = &headers.genre {
        details.push(genre.clone());
    }
    if let Some(bitrate) = headers.bitrate {
        details.push(format!("{bitrate} kbit/s"));
    }

    if details.is_empty() {
        format!("Connected to {station}")
    } else {
        format!("Connected to {station} ({})", details.join(", "))
    }
}
