//! Output file naming.

use crate::metadata::TrackIdentity;

const FALLBACK_NAME: &str = "untitled";

/// Replace characters that are unsafe in file names and trim the result.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();

    let trimmed = replaced.trim_matches(|ch: char| ch.is_whitespace() || ch == '.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Name of the file that receives audio for the `index`th track.
pub fn track_file_name(index: u64, track: &TrackIdentity, extension: &str) -> String {
    let stem = if track.artist.is_empty() {
        track.title.clone()
    } else {
        format!("{} - {}", track.artist, track.title)
    };
    numbered_file_name(index, &stem, extension)
}

/// Name of the file that receives audio before any metadata has arrived.
pub fn initial_file_name(station_name: Option<&str>, extension: &str) -> String {
    numbered_file_name(0, station_name.unwrap_or("stream"), extension)
}

fn numbered_file_name(index: u64, stem: &str, extension: &str) -> String {
    format!(
        "{index:04} {}.{}",
        sanitize_file_name(stem),
        sanitize_file_name(extension)
    )
}

/// Map a `content-type` value to a file extension.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some("mp3"),
        "audio/aac" | "audio/aacp" | "audio/x-aac" => Some("aac"),
        "application/ogg" | "audio/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/opus" => Some("opus"),
        _ => None,
    }
}
