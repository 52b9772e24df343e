use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::acquisition::common::error::{Result, ScanError};
use crate::acquisition::protocol::source::LineSource;

/// Replays the raw lines of a saved capture file.
pub struct CaptureReplay<R: BufRead> {
    lines: std::io::Lines<R>,
}

impl CaptureReplay<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ScanError::Transport(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl<R: BufRead> CaptureReplay<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead> LineSource for CaptureReplay<R> {
    fn next_line(&mut self) -> Result<Option<String>> {
        match self.lines.next() {
            Some(Ok(line)) => Ok(Some(line.trim_end_matches('\r').to_string())),
            Some(Err(e)) => Err(ScanError::Transport(format!("replay read failed: {e}"))),
            None => Ok(None),
        }
    }

    fn send_command(&mut self, command: &str) -> Result<()> {
        debug!("Replay ignores command '{}'", command);
        Ok(())
    }
}
