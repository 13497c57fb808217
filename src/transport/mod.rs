//! Opening connections.
//!
//! A [`Connection`] is one TCP socket, optionally TLS wrapped, bound to one host and port. It is
//! owned by a single call and closed when dropped. Connections are never pooled or reused.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use rustls::{ClientConnection, StreamOwned};

use crate::error::Stage;
use crate::target::Target;
use crate::timeout::Deadline;
use crate::Error;

mod tls;

pub use self::tls::TlsConnector;

#[cfg(test)]
pub(crate) mod mock;

/// A duplex byte stream whose blocking operations can be given a timeout.
pub trait Transport: Read + Write {
    /// Timeout for the next reads and writes. `None` blocks forever.
    fn set_io_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

/// An open connection to one (host, port, scheme).
pub enum Connection {
    /// Plain TCP.
    Plain(TcpStream),
    /// TLS over TCP, handshake completed.
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Connection {
    /// Resolve, connect and (for https) handshake.
    ///
    /// Name resolution itself can't be interrupted, but the deadline is checked right after it.
    pub fn open(target: &Target, deadline: &Deadline, tls: &TlsConnector) -> Result<Self, Error> {
        let addrs = resolve(target)?;
        deadline.remaining(Stage::Resolve)?;

        let tcp = connect(target, &addrs, deadline)?;

        if let Err(e) = tcp.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        if !target.scheme().is_secure() {
            debug!("Connected plain to {}:{}", target.host(), target.port());
            return Ok(Connection::Plain(tcp));
        }

        let stream = tls.handshake(target.connect_host(), tcp, deadline)?;
        debug!("Connected tls to {}:{}", target.host(), target.port());

        Ok(Connection::Tls(Box::new(stream)))
    }

    fn tcp(&self) -> &TcpStream {
        match self {
            Connection::Plain(s) => s,
            Connection::Tls(s) => s.get_ref(),
        }
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }
}

fn resolve(target: &Target) -> Result<Vec<SocketAddr>, Error> {
    let host = target.connect_host();
    let port = target.port();

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::ConnectFailed(format!("{}:{}: {}", host, port, e)))?
        .collect();

    if addrs.is_empty() {
        return Err(Error::ConnectFailed(format!(
            "{}:{}: no addresses found",
            host, port
        )));
    }

    trace!("Resolved {}:{} to {:?}", host, port, addrs);

    Ok(addrs)
}

fn connect(target: &Target, addrs: &[SocketAddr], deadline: &Deadline) -> Result<TcpStream, Error> {
    let mut last_err = None;

    for addr in addrs {
        let left = deadline.remaining(Stage::Connect)?;

        debug!("Connecting to {} (timeout {:?})", addr, left);

        match TcpStream::connect_timeout(addr, left) {
            Ok(s) => return Ok(s),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) => Err(connect_error(target, e, deadline)),
        None => Err(Error::Timeout(Stage::Connect)),
    }
}

/// Map the last failed connect attempt. Anything after the deadline is a timeout.
fn connect_error(target: &Target, e: io::Error, deadline: &Deadline) -> Error {
    if deadline.is_expired()
        || matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
    {
        return Error::Timeout(Stage::Connect);
    }

    Error::ConnectFailed(format!("{}:{}: {}", target.host(), target.port(), e))
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(s) => s.read(buf),
            Connection::Tls(s) => match s.read(buf) {
                // Plenty of servers close without sending close_notify. Treat it as a regular
                // end of stream and let body framing decide whether data is missing.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
                r => r,
            },
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(s) => s.write(buf),
            Connection::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(s) => s.flush(),
            Connection::Tls(s) => s.flush(),
        }
    }
}

impl Transport for Connection {
    fn set_io_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let tcp = self.tcp();
        tcp.set_read_timeout(timeout)?;
        tcp.set_write_timeout(timeout)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!("Close {:?}", self);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Connection::Plain(_) => "Plain",
            Connection::Tls(_) => "Tls",
        };
        match self.peer_addr() {
            Ok(addr) => write!(f, "Connection<{}>({})", kind, addr),
            Err(_) => write!(f, "Connection<{}>", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn open_plain() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let target = Target::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));
        let tls = TlsConnector::new(true);

        let conn = Connection::open(&target, &deadline, &tls).unwrap();
        assert!(matches!(conn, Connection::Plain(_)));
        assert_eq!(conn.peer_addr().unwrap().port(), port);
    }

    #[test]
    fn open_refused() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let target = Target::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));
        let tls = TlsConnector::new(true);

        let err = Connection::open(&target, &deadline, &tls).unwrap_err();
        assert!(matches!(err, Error::ConnectFailed(_)), "{:?}", err);
    }

    #[test]
    fn connect_with_no_time_left() {
        let target = Target::parse("http://10.255.255.1:81/").unwrap();
        let addrs: Vec<SocketAddr> = vec!["10.255.255.1:81".parse().unwrap()];
        let deadline = Deadline::after(Duration::ZERO);

        let err = connect(&target, &addrs, &deadline).unwrap_err();
        assert_eq!(err, Error::Timeout(Stage::Connect));
    }

    #[test]
    fn connect_timed_out_is_timeout() {
        let target = Target::parse("http://10.255.255.1:81/").unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));

        let e = io::Error::new(io::ErrorKind::TimedOut, "connection timed out");
        assert_eq!(
            connect_error(&target, e, &deadline),
            Error::Timeout(Stage::Connect)
        );

        let e = io::Error::new(io::ErrorKind::WouldBlock, "would block");
        assert_eq!(
            connect_error(&target, e, &deadline),
            Error::Timeout(Stage::Connect)
        );
    }

    #[test]
    fn connect_error_after_deadline_is_timeout() {
        let target = Target::parse("http://10.255.255.1:81/").unwrap();
        let deadline = Deadline::after(Duration::ZERO);

        // Whatever the OS reports, the deadline has passed.
        let e = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(
            connect_error(&target, e, &deadline),
            Error::Timeout(Stage::Connect)
        );
    }

    #[test]
    fn connect_refused_is_connect_failed() {
        let target = Target::parse("http://10.255.255.1:81/").unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));

        let e = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = connect_error(&target, e, &deadline);
        assert!(matches!(err, Error::ConnectFailed(_)), "{:?}", err);
    }

    #[test]
    fn open_unknown_host() {
        let target = Target::parse("http://does-not-exist.invalid/").unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));
        let tls = TlsConnector::new(true);

        let err = Connection::open(&target, &deadline, &tls).unwrap_err();
        assert!(matches!(err, Error::ConnectFailed(_)), "{:?}", err);
    }
}
