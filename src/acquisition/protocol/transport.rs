//! Live transport over any byte stream pair, typically a serial device already
//! configured by the host.

use std::io::{BufRead, Write};

use tracing::{debug, trace};

use crate::acquisition::common::error::{Result, ScanError};
use crate::acquisition::protocol::source::LineSource;

pub struct StreamTransport<R: BufRead, W: Write> {
    reader: R,
    writer: W,
    buffer: Vec<u8>,
}

impl<R: BufRead, W: Write> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            buffer: Vec::new(),
        }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead, W: Write> LineSource for StreamTransport<R, W> {
    fn next_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(|e| ScanError::Transport(format!("read failed: {e}")))?;
        if read == 0 {
            return Ok(None);
        }

        // Invalid UTF-8 is replaced, not rejected.
        let line = String::from_utf8_lossy(&self.buffer).trim_end_matches(['\r', '\n']).to_string();
        trace!("IN: {}", line);
        Ok(Some(line))
    }

    fn send_command(&mut self, command: &str) -> Result<()> {
        debug!("OUT: {}", command);
        self.writer
            .write_all(command.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| ScanError::Transport(format!("write failed: {e}")))
    }
}
