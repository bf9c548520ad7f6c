use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};

pub mod size;

use self::size::parse_size;

pub const DEFAULT_EXTENSION: &str = icyrip_core::DEFAULT_EXTENSION;

/// Parse a network read timeout such as `30s`, `1500ms` or `2m`.
///
/// A bare number is taken as seconds. The value `0` disables the timeout.
pub fn parse_timeout(value: &str) -> Result<Option<Duration>, String> {
    let input = value.trim();
    let invalid = || format!("invalid timeout '{value}'");

    let digits_end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if digits_end == 0 {
        return Err(invalid());
    }

    let number = input[..digits_end].parse::<u64>().map_err(|_| invalid())?;
    let duration = match &input[digits_end..] {
        "" | "s" => Duration::from_secs(number),
        "ms" => Duration::from_millis(number),
        "m" => Duration::from_secs(
            number
                .checked_mul(60)
                .ok_or_else(|| "timeout is too large".to_owned())?,
        ),
        _ => return Err(invalid()),
    };

    Ok((!duration.is_zero()).then_some(duration))
}

/// Parse the read buffer size, reusing the `--max-size` grammar.
pub fn parse_buffer_size(value: &str) -> Result<NonZeroUsize, String> {
    let bytes = parse_size(value).map_err(|err| err.to_string())?;
    usize::try_from(bytes)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| format!("buffer size '{value}' is out of range"))
}

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Record an ICY/Shoutcast stream into one file per track")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("Directory where the recorded tracks will be written")
                .default_value(".")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("max-size")
                .short('m')
                .long("max-size")
                .value_name("SIZE")
                .help("Stop after writing this much audio (e.g. 700MB, 1.5GiB)")
                .value_parser(ValueParser::new(parse_size)),
        )
        .arg(
            Arg::new("buffer-size")
                .long("buffer-size")
                .value_name("SIZE")
                .help("Number of bytes requested from the source per read")
                .default_value("8KiB")
                .value_parser(ValueParser::new(parse_buffer_size)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("DURATION")
                .help("Network read timeout for URL sources (e.g. 30s, 0 to disable)")
                .default_value("30s")
                .value_parser(ValueParser::new(parse_timeout)),
        )
        .arg(
            Arg::new("extension")
                .long("extension")
                .value_name("EXT")
                .help("File extension used when the stream's content type is unknown")
                .default_value(DEFAULT_EXTENSION),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log state transitions and track changes")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .help("Stream URL (http://...), path to a captured stream, or '-' for stdin")
                .required(true),
        )
}
