//! Parsing of the response header block that precedes the stream body.

use log::debug;

use crate::IcyError;

/// Fields extracted from an ICY response header block.
///
/// Only `metaint` is required; the remaining fields are informational and
/// used for naming the first output file and for progress display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IcyHeaders {
    /// First line of the block when it is not a `name: value` pair,
    /// e.g. `ICY 200 OK`.
    pub status_line: Option<String>,
    /// Number of audio bytes between metadata blocks.
    pub metaint: usize,
    pub station_name: Option<String>,
    pub genre: Option<String>,
    pub bitrate: Option<u32>,
    pub content_type: Option<String>,
}

impl IcyHeaders {
    /// Parse a header block. Field names are matched case-insensitively and
    /// the first occurrence of a field wins.
    pub fn parse(block: &str) -> Result<Self, IcyError> {
        let mut headers = IcyHeaders::default();
        let mut metaint = None;

        for (index, line) in block.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some((name, value)) = line.split_once(':') else {
                if index == 0 {
                    headers.status_line = Some(line.to_owned());
                } else {
                    debug!("ignoring header line without a value: {line:?}");
                }
                continue;
            };
            let name = name.trim();
            let value = value.trim();

            if name.eq_ignore_ascii_case("icy-metaint") {
                if metaint.is_none() {
                    let parsed = value
                        .parse::<usize>()
                        .map_err(|_| IcyError::InvalidMetaint(value.to_owned()))?;
                    metaint = Some(parsed);
                }
            } else if name.eq_ignore_ascii_case("icy-name") {
                set_once(&mut headers.station_name, value);
            } else if name.eq_ignore_ascii_case("icy-genre") {
                set_once(&mut headers.genre, value);
            } else if name.eq_ignore_ascii_case("content-type") {
                set_once(&mut headers.content_type, value);
            } else if name.eq_ignore_ascii_case("icy-br") {
                if headers.bitrate.is_none() {
                    // Some servers send "128, 128"; keep the first figure.
                    headers.bitrate = value
                        .split(',')
                        .next()
                        .and_then(|figure| figure.trim().parse().ok());
                }
            }
        }

        headers.metaint = metaint.ok_or(IcyError::MissingMetaint)?;
        Ok(headers)
    }
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOUTCAST: &str = "ICY 200 OK\r\n\
        icy-notice1: <BR>This stream requires Winamp<BR>\r\n\
        icy-name: Radio Example\r\n\
        icy-genre: Jazz\r\n\
        content-type: audio/mpeg\r\n\
        icy-br: 128\r\n\
        icy-metaint: 16000";

    #[test]
    fn parses_shoutcast_response() {
        let headers = IcyHeaders::parse(SHOUTCAST).unwrap();
        assert_eq!(headers.status_line.as_deref(), Some("ICY 200 OK"));
        assert_eq!(headers.metaint, 16_000);
        assert_eq!(headers.station_name.as_deref(), Some("Radio Example"));
        assert_eq!(headers.genre.as_deref(), Some("Jazz"));
        assert_eq!(headers.content_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(headers.bitrate, Some(128));
    }

    #[test]
    fn metaint_name_is_case_insensitive() {
        for name in ["Icy-Metaint", "ICY-METAINT", "icy-MetaInt"] {
            let block = format!("HTTP/1.0 200 OK\r\n{name}: 8192");
            assert_eq!(IcyHeaders::parse(&block).unwrap().metaint, 8_192, "{name}");
        }
    }

    #[test]
    fn missing_metaint_is_an_error() {
        let err = IcyHeaders::parse("ICY 200 OK\r\nicy-name: x").unwrap_err();
        assert!(matches!(err, IcyError::MissingMetaint));
    }

    #[test]
    fn non_numeric_metaint_is_an_error() {
        let err = IcyHeaders::parse("icy-metaint: lots").unwrap_err();
        match err {
            IcyError::InvalidMetaint(value) => assert_eq!(value, "lots"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_metaint_is_accepted() {
        assert_eq!(IcyHeaders::parse("icy-metaint: 0").unwrap().metaint, 0);
    }

    #[test]
    fn first_occurrence_wins_and_odd_bitrates_are_tolerated() {
        let headers =
            IcyHeaders::parse("icy-metaint: 10\r\nicy-metaint: 20\r\nicy-br: 64, 64").unwrap();
        assert_eq!(headers.metaint, 10);
        assert_eq!(headers.bitrate, Some(64));
    }
}
