//! Recording session: reads the source, drives the demuxer and turns its
//! callbacks into writes and file rotations.

use std::io::{ErrorKind, Read};

use log::{debug, info, warn};

use crate::demux::{Demuxer, StreamHandler};
use crate::headers::IcyHeaders;
use crate::metadata::{StreamMetadata, TrackIdentity};
use crate::naming::{extension_for_content_type, initial_file_name, track_file_name};
use crate::writer::TrackWriter;
use crate::IcyError;

/// Events emitted while a session runs.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// The header block was parsed.
    Connected { headers: &'a IcyHeaders },
    /// A new output file was opened. `track` is `None` for the file that
    /// receives audio before the first metadata block.
    TrackStarted {
        index: u64,
        file_name: &'a str,
        track: Option<&'a TrackIdentity>,
    },
    /// Audio was written; `bytes_written` is the running total.
    Advance { bytes_written: u64 },
    /// A metadata block could not be parsed and was skipped.
    MetadataRejected { text: &'a str },
    /// The session is over.
    Finish { summary: &'a SessionSummary },
}

/// Observer for session progress. Every method defaults to doing nothing.
pub trait ProgressReporter {
    fn report(&mut self, _event: ProgressEvent<'_>) {}
}

/// Reporter that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {}

impl<P: ProgressReporter + ?Sized> ProgressReporter for &mut P {
    fn report(&mut self, event: ProgressEvent<'_>) {
        (**self).report(event);
    }
}

/// Why a session stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The source reported end of stream.
    EndOfStream,
    /// The writer reached its ceiling.
    CapacityReached,
}

/// Totals reported once a session is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub bytes_written: u64,
    /// Output files opened, including the one preceding the first title.
    pub tracks_started: u64,
    pub metadata_blocks: u64,
    pub rejected_metadata_blocks: u64,
    pub end: SessionEnd,
}

/// Connects the demuxer callbacks to a [`TrackWriter`].
pub struct Session<W, P> {
    writer: W,
    reporter: P,
    default_extension: String,
    extension: Option<&'static str>,
    last_track: Option<TrackIdentity>,
    track_counter: u64,
    files_opened: u64,
    metadata_blocks: u64,
    rejected_metadata_blocks: u64,
}

impl<W: TrackWriter, P: ProgressReporter> Session<W, P> {
    pub fn new<S: Into<String>>(writer: W, reporter: P, default_extension: S) -> Self {
        Self {
            writer,
            reporter,
            default_extension: default_extension.into(),
            extension: None,
            last_track: None,
            track_counter: 0,
            files_opened: 0,
            metadata_blocks: 0,
            rejected_metadata_blocks: 0,
        }
    }

    /// The writer this session feeds.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Read `source` to exhaustion, or until the writer is full.
    ///
    /// Each read is demultiplexed completely before the next one is issued.
    pub fn run<R: Read>(
        mut self,
        mut source: R,
        read_buffer_size: usize,
    ) -> Result<SessionSummary, IcyError> {
        let mut demuxer = Demuxer::icy();
        let mut buffer = vec![0u8; read_buffer_size.max(1)];
        if let Some(ceiling) = self.writer.ceiling() {
            debug!("recording at most {ceiling} bytes of audio");
        }

        let end = loop {
            let read = match source.read(&mut buffer) {
                Ok(0) => break SessionEnd::EndOfStream,
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };

            match demuxer.process(buffer[..read].to_vec(), &mut self) {
                Ok(()) => {}
                Err(IcyError::CapacityExceeded { ceiling }) => {
                    info!("output limit of {ceiling} bytes reached");
                    break SessionEnd::CapacityReached;
                }
                Err(err) => return Err(err),
            }
        };

        if end == SessionEnd::EndOfStream && self.files_opened == 0 {
            // The source ended before the header block was complete.
            return Err(IcyError::IncompleteHeaders);
        }

        self.writer.close()?;
        let summary = SessionSummary {
            bytes_written: self.writer.bytes_written(),
            tracks_started: self.files_opened,
            metadata_blocks: self.metadata_blocks,
            rejected_metadata_blocks: self.rejected_metadata_blocks,
            end,
        };
        info!(
            "session finished ({:?}): {} bytes in {} file(s)",
            summary.end, summary.bytes_written, summary.tracks_started
        );
        self.reporter.report(ProgressEvent::Finish { summary: &summary });
        Ok(summary)
    }

    fn extension(&self) -> &str {
        match self.extension {
            Some(extension) => extension,
            None => &self.default_extension,
        }
    }

    fn open(
        &mut self,
        index: u64,
        file_name: &str,
        track: Option<&TrackIdentity>,
    ) -> Result<(), IcyError> {
        self.writer.set_destination(file_name)?;
        self.files_opened += 1;
        self.reporter.report(ProgressEvent::TrackStarted {
            index,
            file_name,
            track,
        });
        Ok(())
    }
}

impl<W: TrackWriter, P: ProgressReporter> StreamHandler for Session<W, P> {
    fn on_headers(&mut self, headers: &str) -> Result<usize, IcyError> {
        let headers = IcyHeaders::parse(headers)?;
        if let Some(status) = &headers.status_line {
            debug!("server answered {status:?}");
        }
        info!(
            "connected to '{}' ({}), metadata every {} bytes",
            headers.station_name.as_deref().unwrap_or("unnamed station"),
            headers.content_type.as_deref().unwrap_or("unknown content type"),
            headers.metaint
        );

        self.extension = headers
            .content_type
            .as_deref()
            .and_then(extension_for_content_type);
        self.reporter.report(ProgressEvent::Connected { headers: &headers });

        let file_name = initial_file_name(headers.station_name.as_deref(), self.extension());
        self.open(0, &file_name, None)?;
        Ok(headers.metaint)
    }

    fn on_audio(&mut self, audio: &[u8]) -> Result<(), IcyError> {
        self.writer.write(audio)?;
        self.reporter.report(ProgressEvent::Advance {
            bytes_written: self.writer.bytes_written(),
        });
        Ok(())
    }

    fn on_metadata(&mut self, metadata: &str) -> Result<(), IcyError> {
        self.metadata_blocks += 1;

        let parsed = match StreamMetadata::parse(metadata) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("skipping metadata block: {err}");
                self.rejected_metadata_blocks += 1;
                self.reporter
                    .report(ProgressEvent::MetadataRejected { text: metadata });
                return Ok(());
            }
        };

        let track = parsed.track();
        if self.last_track.as_ref() == Some(&track) {
            debug!("title unchanged: {:?}", parsed.stream_title);
            return Ok(());
        }

        self.track_counter += 1;
        let file_name = track_file_name(self.track_counter, &track, self.extension());
        info!("now playing: {}", parsed.stream_title);
        if let Some(url) = parsed.stream_url.as_deref().filter(|url| !url.is_empty()) {
            debug!("track URL: {url}");
        }
        self.open(self.track_counter, &file_name, Some(&track))?;
        self.last_track = Some(track);
        Ok(())
    }
}
