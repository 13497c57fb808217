//! End-to-end deadlines for blocking socket I/O.
//!
//! A [`Deadline`] is fixed when a call starts and never reset. Every blocking step gets the
//! time that is left until the deadline as its socket timeout, so a call can't take longer
//! than the configured timeout no matter how many reads it needs.

use std::io;
use std::time::{Duration, Instant};

use crate::error::Stage;
use crate::transport::Transport;
use crate::Error;

/// An absolute point in time after which I/O is abandoned.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    // None when the timeout is too large to be represented as an Instant.
    at: Option<Instant>,
    timeout: Duration,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Deadline {
            at: Instant::now().checked_add(timeout),
            timeout,
        }
    }

    /// The duration this deadline was created with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Tell if the deadline has passed.
    pub fn is_expired(&self) -> bool {
        match self.at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Time left, or a `Timeout` error for `stage` if there is none.
    ///
    /// Never returns a zero duration, since that means "no timeout" to socket APIs.
    pub fn remaining(&self, stage: Stage) -> Result<Duration, Error> {
        let Some(at) = self.at else {
            return Ok(self.timeout);
        };

        let left = at.saturating_duration_since(Instant::now());

        if left.is_zero() {
            debug!("Deadline of {:?} passed during {}", self.timeout, stage);
            return Err(Error::Timeout(stage));
        }

        Ok(left)
    }
}

/// Runs reads and writes on a transport with the deadline applied to each of them.
pub struct TimeoutGuard<'a, T: Transport> {
    inner: &'a mut T,
    deadline: Deadline,
    stage: Stage,
}

impl<'a, T: Transport> TimeoutGuard<'a, T> {
    /// Guard `inner` with `deadline`, reporting timeouts as happening in `stage`.
    pub fn new(inner: &'a mut T, deadline: Deadline, stage: Stage) -> Self {
        TimeoutGuard {
            inner,
            deadline,
            stage,
        }
    }

    /// Change the stage reported on errors.
    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// The current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn arm(&mut self) -> Result<(), Error> {
        let left = self.deadline.remaining(self.stage)?;
        self.inner
            .set_io_timeout(Some(left))
            .map_err(|e| Error::from_io(e, self.stage))
    }

    fn map_err(&self, e: io::Error) -> Error {
        if self.deadline.is_expired() {
            return Error::Timeout(self.stage);
        }
        Error::from_io(e, self.stage)
    }

    /// Read once into `buf`. `Ok(0)` means the peer closed the stream.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        loop {
            self.arm()?;
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.map_err(e)),
            }
        }
    }

    /// Write all of `data` and flush.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<(), Error> {
        while !data.is_empty() {
            self.arm()?;
            match self.inner.write(data) {
                Ok(0) => {
                    return Err(Error::Io(
                        self.stage,
                        "connection closed while writing".to_string(),
                    ))
                }
                Ok(n) => data = &data[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.map_err(e)),
            }
        }

        loop {
            self.arm()?;
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.map_err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::thread;

    #[test]
    fn remaining_counts_down() {
        let d = Deadline::after(Duration::from_secs(10));
        let left = d.remaining(Stage::Connect).unwrap();
        assert!(left <= Duration::from_secs(10));
        assert!(left > Duration::from_secs(9));
        assert!(!d.is_expired());
    }

    #[test]
    fn expired_is_timeout() {
        let d = Deadline::after(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(5));
        assert!(d.is_expired());
        assert_eq!(d.remaining(Stage::RecvBody), Err(Error::Timeout(Stage::RecvBody)));
    }

    #[test]
    fn huge_timeout_never_expires() {
        let d = Deadline::after(Duration::MAX);
        assert!(!d.is_expired());
        assert_eq!(d.remaining(Stage::Connect).unwrap(), Duration::MAX);
    }

    #[test]
    fn guard_sets_timeout_before_read() {
        let mut t = MockTransport::new(b"abc");
        let d = Deadline::after(Duration::from_secs(5));
        let mut g = TimeoutGuard::new(&mut t, d, Stage::RecvResponse);

        let mut buf = [0; 8];
        let n = g.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abc");

        let last = t.last_timeout.unwrap();
        assert!(last <= Duration::from_secs(5));
    }

    #[test]
    fn guard_maps_stall_to_timeout() {
        let mut t = MockTransport::new(b"").stalled();
        let d = Deadline::after(Duration::from_secs(5));
        let mut g = TimeoutGuard::new(&mut t, d, Stage::RecvBody);

        let mut buf = [0; 8];
        let err = g.read(&mut buf).unwrap_err();
        assert_eq!(err, Error::Timeout(Stage::RecvBody));
    }

    #[test]
    fn guard_refuses_after_deadline() {
        let mut t = MockTransport::new(b"abc");
        let d = Deadline::after(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(5));
        let mut g = TimeoutGuard::new(&mut t, d, Stage::SendRequest);

        let err = g.write_all(b"GET / HTTP/1.1\r\n").unwrap_err();
        assert_eq!(err, Error::Timeout(Stage::SendRequest));
        assert!(t.output.is_empty());
    }

    #[test]
    fn guard_writes_everything() {
        let mut t = MockTransport::new(b"").with_step(3);
        let d = Deadline::after(Duration::from_secs(5));
        let mut g = TimeoutGuard::new(&mut t, d, Stage::SendRequest);

        g.write_all(b"hello world").unwrap();
        assert_eq!(t.output, b"hello world");
    }
}
