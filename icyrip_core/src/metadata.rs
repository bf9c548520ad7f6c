//! Interpretation of decoded metadata blocks.

use crate::IcyError;

const TITLE_KEY: &str = "StreamTitle='";
const URL_KEY: &str = "StreamUrl='";
const FIELD_END: &str = "';";
const ARTIST_SEPARATOR: &str = " - ";

/// The fields announced by one metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    /// Raw `StreamTitle` text, usually `Artist - Title`.
    pub stream_title: String,
    pub stream_url: Option<String>,
}

impl StreamMetadata {
    /// Parse `StreamTitle='<text>';StreamUrl='<url>';`.
    ///
    /// The block must open with a terminated `StreamTitle` field. A quote
    /// inside the title is fine as long as it is not directly followed by
    /// `;`. `StreamUrl` is optional because many servers omit it.
    pub fn parse(text: &str) -> Result<Self, IcyError> {
        let malformed = || IcyError::MalformedMetadata(text.to_owned());

        let body = text.trim_start().strip_prefix(TITLE_KEY).ok_or_else(malformed)?;
        let (stream_title, rest) = body.split_once(FIELD_END).ok_or_else(malformed)?;

        let stream_url = match rest.find(URL_KEY) {
            Some(start) => {
                let value = &rest[start + URL_KEY.len()..];
                let (url, _) = value.split_once(FIELD_END).ok_or_else(malformed)?;
                Some(url.to_owned())
            }
            None => None,
        };

        Ok(Self {
            stream_title: stream_title.to_owned(),
            stream_url,
        })
    }

    pub fn track(&self) -> TrackIdentity {
        TrackIdentity::from_stream_title(&self.stream_title)
    }
}

/// The artist and title last announced by the station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TrackIdentity {
    pub artist: String,
    pub title: String,
}

impl TrackIdentity {
    pub fn new<A: Into<String>, T: Into<String>>(artist: A, title: T) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }

    /// Split on the first `" - "`. Without a separator the whole text is the
    /// title and the artist is empty.
    pub fn from_stream_title(text: &str) -> Self {
        match text.split_once(ARTIST_SEPARATOR) {
            Some((artist, title)) => Self::new(artist.trim(), title.trim()),
            None => Self::new("", text.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_url() {
        let meta = StreamMetadata::parse("StreamTitle='Artist - Title';StreamUrl='x';").unwrap();
        assert_eq!(meta.stream_title, "Artist - Title");
        assert_eq!(meta.stream_url.as_deref(), Some("x"));
        assert_eq!(meta.track(), TrackIdentity::new("Artist", "Title"));
    }

    #[test]
    fn url_is_optional() {
        let meta = StreamMetadata::parse("StreamTitle='Only Title';").unwrap();
        assert_eq!(meta.stream_url, None);
        assert_eq!(meta.track(), TrackIdentity::new("", "Only Title"));
    }

    #[test]
    fn apostrophes_inside_the_title_survive() {
        let meta =
            StreamMetadata::parse("StreamTitle='Guns N' Roses - Don't Cry';StreamUrl='';").unwrap();
        assert_eq!(meta.track(), TrackIdentity::new("Guns N' Roses", "Don't Cry"));
        assert_eq!(meta.stream_url.as_deref(), Some(""));
    }

    #[test]
    fn splits_on_first_separator_only() {
        let identity = TrackIdentity::from_stream_title("A - B - C");
        assert_eq!(identity, TrackIdentity::new("A", "B - C"));
    }

    #[test]
    fn rejects_blocks_without_stream_title() {
        for text in ["", "garbage", "StreamUrl='x';", "StreamTitle='unterminated"] {
            let err = StreamMetadata::parse(text).unwrap_err();
            assert!(matches!(err, IcyError::MalformedMetadata(_)), "{text:?}");
        }
    }

    #[test]
    fn rejects_unterminated_url() {
        let err = StreamMetadata::parse("StreamTitle='a';StreamUrl='http").unwrap_err();
        assert!(matches!(err, IcyError::MalformedMetadata(_)));
    }
}
