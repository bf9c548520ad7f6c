//! Output side of a recording session.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::IcyError;

/// A sink for audio bytes that can be redirected to a new file per track.
pub trait TrackWriter {
    /// Append audio bytes to the current destination.
    ///
    /// Fails with [`IcyError::CapacityExceeded`] once the cumulative total
    /// would pass the ceiling; the bytes that still fit are written first.
    fn write(&mut self, bytes: &[u8]) -> Result<(), IcyError>;

    /// Close the current destination and start writing to `name`,
    /// truncating it if it already exists.
    fn set_destination(&mut self, name: &str) -> Result<(), IcyError>;

    /// Flush and close the current destination.
    fn close(&mut self) -> Result<(), IcyError>;

    /// Bytes written across all destinations so far.
    fn bytes_written(&self) -> u64;

    /// The global write ceiling, if any.
    fn ceiling(&self) -> Option<u64>;
}

struct Destination {
    path: PathBuf,
    file: BufWriter<File>,
}

/// Writes each track to its own file inside one directory.
pub struct FileTrackWriter {
    output_dir: PathBuf,
    current: Option<Destination>,
    bytes_written: u64,
    ceiling: Option<u64>,
}

impl FileTrackWriter {
    pub fn new<P: Into<PathBuf>>(output_dir: P, ceiling: Option<u64>) -> Self {
        Self {
            output_dir: output_dir.into(),
            current: None,
            bytes_written: 0,
            ceiling,
        }
    }

    /// Path of the file currently receiving audio.
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|destination| destination.path.as_path())
    }

    fn remaining(&self) -> Option<u64> {
        self.ceiling
            .map(|ceiling| ceiling.saturating_sub(self.bytes_written))
    }
}

impl TrackWriter for FileTrackWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), IcyError> {
        if bytes.is_empty() {
            return Ok(());
        }

        let allowed = match self.remaining() {
            Some(remaining) => usize::try_from(remaining)
                .map_or(bytes.len(), |remaining| remaining.min(bytes.len())),
            None => bytes.len(),
        };

        let destination = self.current.as_mut().ok_or(IcyError::NoDestination)?;
        destination.file.write_all(&bytes[..allowed])?;
        self.bytes_written += allowed as u64;

        if allowed < bytes.len() {
            let ceiling = self.ceiling.unwrap_or(self.bytes_written);
            return Err(IcyError::CapacityExceeded { ceiling });
        }
        Ok(())
    }

    fn set_destination(&mut self, name: &str) -> Result<(), IcyError> {
        self.close()?;

        let path = self.output_dir.join(name);
        let file = File::create(&path)?;
        debug!("writing to '{}'", path.display());
        self.current = Some(Destination {
            path,
            file: BufWriter::new(file),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), IcyError> {
        if let Some(mut destination) = self.current.take() {
            destination.file.flush()?;
            debug!("closed '{}'", destination.path.display());
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn ceiling(&self) -> Option<u64> {
        self.ceiling
    }
}
