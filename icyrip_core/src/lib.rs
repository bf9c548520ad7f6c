//! Record ICY/Shoutcast streams into one file per announced track.
//!
//! The stream body interleaves fixed-size audio segments with length-prefixed
//! metadata blocks. [`demux::Demuxer`] separates the two regardless of how the
//! transport fragments the bytes, and [`session::Session`] turns the result
//! into writes on a [`writer::TrackWriter`], opening a new file whenever the
//! announced title changes.

use std::fs;
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

pub mod demux;
pub mod headers;
pub mod metadata;
pub mod naming;
pub mod session;
pub mod writer;

pub use demux::{Demuxer, ParserState, StateKind, StreamHandler, MAX_HEADER_BLOCK};
pub use headers::IcyHeaders;
pub use metadata::{StreamMetadata, TrackIdentity};
pub use session::{
    ProgressEvent, ProgressReporter, Session, SessionEnd, SessionSummary, SilentProgress,
};
pub use writer::{FileTrackWriter, TrackWriter};

/// Default number of bytes requested from the source per read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Extension used when the stream does not announce a known content type.
pub const DEFAULT_EXTENSION: &str = "mp3";

/// Errors that can occur while recording a stream.
#[derive(Debug, Error)]
pub enum IcyError {
    /// Wrapper around IO errors encountered while reading or writing.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The header block does not announce a metadata interval.
    #[error("response headers do not contain an Icy-Metaint field")]
    MissingMetaint,

    /// The announced metadata interval is not a non-negative integer.
    #[error("invalid Icy-Metaint value '{0}'")]
    InvalidMetaint(String),

    /// The source ended before the header block was complete.
    #[error("stream ended before the response headers were complete")]
    IncompleteHeaders,

    /// No header delimiter was found within the accepted header size.
    #[error("response headers exceed {limit} bytes without a terminating blank line")]
    HeaderBlockTooLarge { limit: usize },

    /// A metadata block does not have the `StreamTitle='…';` shape.
    #[error("malformed metadata block '{0}'")]
    MalformedMetadata(String),

    /// The writer reached its global ceiling.
    #[error("output limit of {ceiling} bytes reached")]
    CapacityExceeded { ceiling: u64 },

    /// The demuxer received data before a start state was configured.
    #[error("demuxer has no start state")]
    NoStartState,

    /// The demuxer was asked to use a state that was never registered.
    #[error("demuxer has no registered {0} state")]
    UnregisteredState(StateKind),

    /// The metadata interval was set a second time.
    #[error("metadata interval is already set to {existing} bytes")]
    MetadataIntervalAlreadySet { existing: usize },

    /// Audio arrived before any output file was opened.
    #[error("no output file is open")]
    NoDestination,

    /// Error returned when the output directory does not exist.
    #[error("output directory does not exist: {0}")]
    MissingOutputDirectory(PathBuf),
}

/// Configuration for a recording session.
#[derive(Clone, Debug)]
pub struct Config {
    /// Canonicalized directory into which track files are written.
    pub output_dir: PathBuf,
    /// Ceiling on the total number of audio bytes written.
    pub max_output_bytes: Option<u64>,
    /// Number of bytes requested from the source per read.
    pub read_buffer_size: NonZeroUsize,
    /// Extension used when the content type is absent or unknown.
    pub default_extension: String,
}

impl Config {
    /// Construct a [`Config`] with default settings.
    pub fn new<P: AsRef<Path>>(output: P) -> Result<Self, IcyError> {
        Self::builder(output).build()
    }

    /// Start building a [`Config`] for the given output directory.
    pub fn builder<P: AsRef<Path>>(output: P) -> ConfigBuilder {
        ConfigBuilder {
            output_dir: output.as_ref().to_path_buf(),
            max_output_bytes: None,
            read_buffer_size: NonZeroUsize::new(DEFAULT_READ_BUFFER_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
            default_extension: DEFAULT_EXTENSION.to_owned(),
        }
    }
}

/// Builder for [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    output_dir: PathBuf,
    max_output_bytes: Option<u64>,
    read_buffer_size: NonZeroUsize,
    default_extension: String,
}

impl ConfigBuilder {
    /// Stop recording once this many audio bytes have been written.
    pub fn max_output_bytes(mut self, limit: u64) -> Self {
        self.max_output_bytes = Some(limit);
        self
    }

    pub fn read_buffer_size(mut self, size: NonZeroUsize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn default_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.default_extension = extension.into();
        self
    }

    /// Validate the settings and canonicalize the output directory.
    pub fn build(self) -> Result<Config, IcyError> {
        if !self.output_dir.is_dir() {
            return Err(IcyError::MissingOutputDirectory(self.output_dir));
        }
        let output_dir = fs::canonicalize(&self.output_dir)?;

        Ok(Config {
            output_dir,
            max_output_bytes: self.max_output_bytes,
            read_buffer_size: self.read_buffer_size,
            default_extension: self.default_extension,
        })
    }
}

/// Record `source` into `config.output_dir`.
pub fn run<R: Read>(config: Config, source: R) -> Result<SessionSummary, IcyError> {
    run_with_reporter(config, source, SilentProgress)
}

/// Record `source`, passing every [`ProgressEvent`] to `callback`.
pub fn run_with_progress<R, F>(
    config: Config,
    source: R,
    callback: F,
) -> Result<SessionSummary, IcyError>
where
    R: Read,
    F: FnMut(ProgressEvent<'_>),
{
    run_with_reporter(config, source, CallbackReporter(callback))
}

/// Record `source`, reporting progress to `reporter`.
pub fn run_with_reporter<R: Read, P: ProgressReporter>(
    config: Config,
    source: R,
    reporter: P,
) -> Result<SessionSummary, IcyError> {
    if !config.output_dir.is_dir() {
        return Err(IcyError::MissingOutputDirectory(config.output_dir));
    }

    info!(
        "recording into '{}'{}",
        config.output_dir.display(),
        match config.max_output_bytes {
            Some(limit) => format!(" (limit {limit} bytes)"),
            None => String::new(),
        }
    );

    let writer = FileTrackWriter::new(&config.output_dir, config.max_output_bytes);
    Session::new(writer, reporter, config.default_extension)
        .run(source, config.read_buffer_size.get())
}

struct CallbackReporter<F>(F);

impl<F: FnMut(ProgressEvent<'_>)> ProgressReporter for CallbackReporter<F> {
    fn report(&mut self, event: ProgressEvent<'_>) {
        (self.0)(event);
    }
}
