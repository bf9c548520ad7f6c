//! Three-state demultiplexer separating audio bytes from in-band ICY
//! metadata blocks.
//!
//! Chunks handed to [`Demuxer::process`] may be cut anywhere: across the
//! header delimiter, inside an audio segment, on the metadata length byte or
//! halfway through a metadata block. Each parser state consumes what belongs
//! to it and hands any unconsumed suffix back to the controller, which
//! switches state and keeps dispatching until the chunk is exhausted.

use std::fmt;

use log::{debug, trace};

use crate::IcyError;

/// Marks the end of the response header block.
pub const HEADER_DELIMITER: &[u8] = b"\r\n\r\n";

/// Metadata block lengths are announced in units of this many bytes.
pub const METADATA_BLOCK_UNIT: usize = 16;

/// Largest header block accepted before the delimiter must have appeared.
pub const MAX_HEADER_BLOCK: usize = 64 * 1024;

/// Receives the payloads separated by a [`Demuxer`], in stream order.
pub trait StreamHandler {
    /// Called once with the complete header block (delimiter excluded).
    ///
    /// Returns the metadata interval announced by the headers, which bounds
    /// every audio segment that follows. Zero disables metadata splitting.
    fn on_headers(&mut self, headers: &str) -> Result<usize, IcyError>;

    /// Called with each run of audio bytes. Never called with an empty slice.
    fn on_audio(&mut self, audio: &[u8]) -> Result<(), IcyError>;

    /// Called with the text of every non-empty metadata block, trailing
    /// padding removed.
    fn on_metadata(&mut self, metadata: &str) -> Result<(), IcyError>;
}

/// Identifies one of the three parser states.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StateKind {
    Header,
    Audio,
    Metadata,
}

impl StateKind {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        match self {
            StateKind::Header => 0,
            StateKind::Audio => 1,
            StateKind::Metadata => 2,
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateKind::Header => "header",
            StateKind::Audio => "audio",
            StateKind::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// A parser state together with its private buffers.
#[derive(Debug)]
pub enum ParserState {
    Header(HeaderParser),
    Audio(AudioParser),
    Metadata(MetadataParser),
}

impl ParserState {
    pub fn kind(&self) -> StateKind {
        match self {
            ParserState::Header(_) => StateKind::Header,
            ParserState::Audio(_) => StateKind::Audio,
            ParserState::Metadata(_) => StateKind::Metadata,
        }
    }
}

/// Outcome of feeding one chunk to a parser state.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// The chunk was fully absorbed; wait for the next read.
    Await,
    /// Switch to `next` and feed it `remainder` before reading again.
    Redispatch { next: StateKind, remainder: Vec<u8> },
    /// Headers are complete. The audio state must be bounded by
    /// `metadata_interval` before it receives `remainder`.
    HeadersComplete {
        metadata_interval: usize,
        remainder: Vec<u8>,
    },
}

/// Accumulates the response header block until the blank line.
#[derive(Debug, Default)]
pub struct HeaderParser {
    buffer: Vec<u8>,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn process<H: StreamHandler + ?Sized>(
        &mut self,
        chunk: Vec<u8>,
        handler: &mut H,
    ) -> Result<Step, IcyError> {
        // Bytes already searched cannot start a delimiter, except for the
        // last few which may be completed by this chunk.
        let search_from = self
            .buffer
            .len()
            .saturating_sub(HEADER_DELIMITER.len() - 1);
        self.buffer.extend_from_slice(&chunk);

        let Some(position) = find_subsequence(&self.buffer[search_from..], HEADER_DELIMITER)
            .map(|offset| search_from + offset)
        else {
            if self.buffer.len() > MAX_HEADER_BLOCK + HEADER_DELIMITER.len() - 1 {
                return Err(IcyError::HeaderBlockTooLarge {
                    limit: MAX_HEADER_BLOCK,
                });
            }
            trace!("header block incomplete after {} bytes", self.buffer.len());
            return Ok(Step::Await);
        };
        if position > MAX_HEADER_BLOCK {
            return Err(IcyError::HeaderBlockTooLarge {
                limit: MAX_HEADER_BLOCK,
            });
        }

        let remainder = self.buffer.split_off(position + HEADER_DELIMITER.len());
        self.buffer.truncate(position);
        let block = std::mem::take(&mut self.buffer);
        let text = decode_text(&block);
        debug!("header block complete ({} bytes)", block.len());

        let metadata_interval = handler.on_headers(&text)?;
        Ok(Step::HeadersComplete {
            metadata_interval,
            remainder,
        })
    }
}

/// Forwards audio bytes until the metadata interval is reached.
#[derive(Debug, Default)]
pub struct AudioParser {
    bytes_processed: usize,
    metadata_boundary: Option<usize>,
}

impl AudioParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser whose segments are already bounded by `boundary`.
    pub fn with_metadata_boundary(boundary: usize) -> Self {
        Self {
            bytes_processed: 0,
            metadata_boundary: Some(boundary),
        }
    }

    /// The number of audio bytes between metadata blocks, once known.
    pub fn metadata_boundary(&self) -> Option<usize> {
        self.metadata_boundary
    }

    /// Set the metadata interval. It can only be set once per session.
    pub fn set_metadata_boundary(&mut self, boundary: usize) -> Result<(), IcyError> {
        if let Some(existing) = self.metadata_boundary {
            return Err(IcyError::MetadataIntervalAlreadySet { existing });
        }
        self.metadata_boundary = Some(boundary);
        Ok(())
    }

    fn process<H: StreamHandler + ?Sized>(
        &mut self,
        mut chunk: Vec<u8>,
        handler: &mut H,
    ) -> Result<Step, IcyError> {
        // An unset or zero interval means the stream carries no metadata.
        let boundary = match self.metadata_boundary {
            Some(boundary) if boundary > 0 => boundary,
            _ => {
                forward_audio(&chunk, handler)?;
                return Ok(Step::Await);
            }
        };

        self.bytes_processed += chunk.len();
        if self.bytes_processed < boundary {
            forward_audio(&chunk, handler)?;
            return Ok(Step::Await);
        }

        // bytes_processed was below the boundary before this chunk, so the
        // overshoot is strictly smaller than the chunk and the split lands
        // inside it.
        let overshoot = self.bytes_processed - boundary;
        let split = chunk.len() - overshoot;
        let remainder = chunk.split_off(split);
        forward_audio(&chunk, handler)?;
        self.bytes_processed = 0;

        trace!(
            "audio segment complete, {} bytes carried into metadata",
            remainder.len()
        );
        Ok(Step::Redispatch {
            next: StateKind::Metadata,
            remainder,
        })
    }
}

fn forward_audio<H: StreamHandler + ?Sized>(
    audio: &[u8],
    handler: &mut H,
) -> Result<(), IcyError> {
    if audio.is_empty() {
        return Ok(());
    }
    handler.on_audio(audio)
}

/// Reassembles one length-prefixed metadata block per cycle.
#[derive(Debug, Default)]
pub struct MetadataParser {
    buffer: Vec<u8>,
    expected_length: Option<usize>,
}

impl MetadataParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn process<H: StreamHandler + ?Sized>(
        &mut self,
        mut chunk: Vec<u8>,
        handler: &mut H,
    ) -> Result<Step, IcyError> {
        let Some(expected_length) = self.expected_length else {
            // The cycle starts with the length byte; an empty read leaves the
            // cycle unstarted until real bytes arrive.
            let Some(&length_byte) = chunk.first() else {
                return Ok(Step::Await);
            };
            self.expected_length = Some(usize::from(length_byte) * METADATA_BLOCK_UNIT);
            let remainder = chunk.split_off(1);
            return Ok(Step::Redispatch {
                next: StateKind::Metadata,
                remainder,
            });
        };

        self.buffer.append(&mut chunk);
        if self.buffer.len() < expected_length {
            return Ok(Step::Await);
        }

        let remainder = self.buffer.split_off(expected_length);
        let block = std::mem::take(&mut self.buffer);
        self.expected_length = None;

        if expected_length > 0 {
            let text = decode_block(&block);
            debug!("metadata block complete: {text:?}");
            handler.on_metadata(&text)?;
        } else {
            trace!("empty metadata block");
        }

        Ok(Step::Redispatch {
            next: StateKind::Audio,
            remainder,
        })
    }
}

/// Decode a metadata block, dropping everything from the first NUL byte.
fn decode_block(block: &[u8]) -> String {
    let end = block
        .iter()
        .position(|&byte| byte == 0)
        .unwrap_or(block.len());
    decode_text(&block[..end])
}

/// Decode station-supplied text as UTF-8, falling back to Latin-1, which
/// many Shoutcast servers still send.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.iter().map(|&byte| char::from(byte)).collect(),
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// The demux controller.
///
/// Holds one registered instance per [`StateKind`]; switching state reuses
/// that instance so its buffers and counters survive across cycles.
#[derive(Debug, Default)]
pub struct Demuxer {
    states: [Option<ParserState>; StateKind::COUNT],
    start: Option<StateKind>,
    current: Option<StateKind>,
}

impl Demuxer {
    /// Create a controller with no registered states.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller wired for an ICY stream: all three states
    /// registered and the header state as the start state.
    pub fn icy() -> Self {
        let mut demuxer = Self::new();
        demuxer.register(ParserState::Header(HeaderParser::new()));
        demuxer.register(ParserState::Audio(AudioParser::new()));
        demuxer.register(ParserState::Metadata(MetadataParser::new()));
        demuxer.set_start(StateKind::Header);
        demuxer
    }

    /// Register `state`, replacing any instance of the same kind.
    pub fn register(&mut self, state: ParserState) {
        let kind = state.kind();
        self.states[kind.index()] = Some(state);
    }

    /// Choose the state that receives the first chunk.
    pub fn set_start(&mut self, kind: StateKind) {
        self.start = Some(kind);
    }

    /// The active state, if one has been chosen yet.
    pub fn current(&self) -> Option<StateKind> {
        self.current
    }

    /// Make the registered instance of `kind` the active state.
    pub fn switch(&mut self, kind: StateKind) -> Result<(), IcyError> {
        if self.states[kind.index()].is_none() {
            return Err(IcyError::UnregisteredState(kind));
        }
        if self.current != Some(kind) {
            trace!("switching to {kind} state");
        }
        self.current = Some(kind);
        Ok(())
    }

    /// The registered audio parser, if any.
    pub fn audio(&self) -> Option<&AudioParser> {
        match &self.states[StateKind::Audio.index()] {
            Some(ParserState::Audio(parser)) => Some(parser),
            _ => None,
        }
    }

    /// Feed one chunk read from the source.
    ///
    /// Every byte of `chunk` is consumed before this returns: leftovers
    /// produced by a state change are dispatched to the new state
    /// immediately, as many times as the chunk requires.
    pub fn process<H: StreamHandler + ?Sized>(
        &mut self,
        chunk: Vec<u8>,
        handler: &mut H,
    ) -> Result<(), IcyError> {
        let mut kind = match self.current {
            Some(kind) => kind,
            None => {
                let start = self.start.ok_or(IcyError::NoStartState)?;
                self.switch(start)?;
                start
            }
        };
        let mut chunk = chunk;

        loop {
            let step = match self.state_mut(kind)? {
                ParserState::Header(parser) => parser.process(chunk, handler)?,
                ParserState::Audio(parser) => parser.process(chunk, handler)?,
                ParserState::Metadata(parser) => parser.process(chunk, handler)?,
            };

            match step {
                Step::Await => return Ok(()),
                Step::Redispatch { next, remainder } => {
                    self.switch(next)?;
                    kind = next;
                    chunk = remainder;
                }
                Step::HeadersComplete {
                    metadata_interval,
                    remainder,
                } => {
                    match self.state_mut(StateKind::Audio)? {
                        ParserState::Audio(parser) => {
                            parser.set_metadata_boundary(metadata_interval)?
                        }
                        _ => return Err(IcyError::UnregisteredState(StateKind::Audio)),
                    }
                    debug!("metadata interval is {metadata_interval} bytes");
                    self.switch(StateKind::Audio)?;
                    kind = StateKind::Audio;
                    chunk = remainder;
                }
            }
        }
    }

    fn state_mut(&mut self, kind: StateKind) -> Result<&mut ParserState, IcyError> {
        self.states[kind.index()]
            .as_mut()
            .ok_or(IcyError::UnregisteredState(kind))
    }
}
