use std::io::{self, Read, Write};
use std::time::Duration;

use super::Transport;

/// In-memory transport for tests.
///
/// Serves `input` in pieces of at most `step` bytes and records everything written.
pub(crate) struct MockTransport {
    input: Vec<u8>,
    pos: usize,
    step: usize,
    stall: bool,
    pub output: Vec<u8>,
    pub last_timeout: Option<Duration>,
}

impl MockTransport {
    pub fn new(input: &[u8]) -> Self {
        MockTransport {
            input: input.to_vec(),
            pos: 0,
            step: usize::MAX,
            stall: false,
            output: Vec::new(),
            last_timeout: None,
        }
    }

    /// Serve at most `step` bytes per read or write.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Once input is exhausted, behave like a socket whose read timeout fired.
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = &self.input[self.pos..];
        if left.is_empty() {
            if self.stall {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "stalled"));
            }
            return Ok(0);
        }
        let n = left.len().min(buf.len()).min(self.step);
        buf[..n].copy_from_slice(&left[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.step);
        self.output.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn set_io_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.last_timeout = timeout;
        Ok(())
    }
}
