use std::fmt;
use std::io;
use std::net::TcpStream;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore};
use rustls::{SignatureScheme, StreamOwned};

use crate::error::Stage;
use crate::timeout::Deadline;
use crate::Error;

/// Wraps TCP streams in TLS.
///
/// Holds one rustls client config, built once and shared between calls.
#[derive(Clone)]
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    verify: bool,
}

impl TlsConnector {
    /// Connector with the webpki root store, or accepting any certificate when `verify` is false.
    pub fn new(verify: bool) -> Self {
        let config = if verify {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        } else {
            warn!("TLS certificate verification is disabled");

            let provider = Arc::new(rustls::crypto::ring::default_provider());

            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
                .with_no_client_auth()
        };

        TlsConnector {
            config: Arc::new(config),
            verify,
        }
    }

    /// Tell if certificates are verified.
    pub fn is_verifying(&self) -> bool {
        self.verify
    }

    /// Perform the handshake for `host` over `tcp`, bounded by `deadline`.
    pub(crate) fn handshake(
        &self,
        host: &str,
        mut tcp: TcpStream,
        deadline: &Deadline,
    ) -> Result<StreamOwned<ClientConnection, TcpStream>, Error> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| Error::TlsHandshakeFailed(format!("{}: {}", host, e)))?;

        let mut conn = ClientConnection::new(self.config.clone(), server_name)
            .map_err(|e| Error::TlsHandshakeFailed(format!("{}: {}", host, e)))?;

        while conn.is_handshaking() {
            let left = deadline.remaining(Stage::Handshake)?;

            tcp.set_read_timeout(Some(left))
                .and_then(|_| tcp.set_write_timeout(Some(left)))
                .map_err(|e| Error::from_io(e, Stage::Handshake))?;

            if let Err(e) = conn.complete_io(&mut tcp) {
                return Err(handshake_error(host, e, deadline));
            }
        }

        debug!(
            "TLS handshake with {} done: {:?} {:?}",
            host,
            conn.protocol_version(),
            conn.negotiated_cipher_suite().map(|s| s.suite())
        );

        Ok(StreamOwned::new(conn, tcp))
    }
}

fn handshake_error(host: &str, e: io::Error, deadline: &Deadline) -> Error {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout(Stage::Handshake),
        _ if deadline.is_expired() => Error::Timeout(Stage::Handshake),
        io::ErrorKind::UnexpectedEof => {
            Error::TlsHandshakeFailed(format!("{}: connection closed during handshake", host))
        }
        // rustls reports certificate and protocol failures as InvalidData.
        _ => Error::TlsHandshakeFailed(format!("{}: {}", host, e)),
    }
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector")
            .field("verify", &self.verify)
            .finish()
    }
}

/// Verifier used when certificate validation is turned off.
///
/// Handshake signatures are still checked, so the peer must hold the key of the certificate
/// it presents.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn garbage_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            if let Ok((mut s, _)) = listener.accept() {
                let mut buf = [0; 1024];
                let _ = s.read(&mut buf);
                let _ = s.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n");
            }
        });
        port
    }

    #[test]
    fn handshake_with_non_tls_server_fails() {
        let port = garbage_server();
        let tcp = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));

        let err = TlsConnector::new(true)
            .handshake("localhost", tcp, &deadline)
            .unwrap_err();
        assert!(matches!(err, Error::TlsHandshakeFailed(_)), "{:?}", err);
    }

    #[test]
    fn handshake_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let holder = thread::spawn(move || {
            let s = listener.accept();
            thread::sleep(Duration::from_millis(500));
            drop(s);
        });

        let tcp = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let deadline = Deadline::after(Duration::from_millis(100));

        let err = TlsConnector::new(false)
            .handshake("localhost", tcp, &deadline)
            .unwrap_err();
        assert_eq!(err, Error::Timeout(Stage::Handshake));

        holder.join().unwrap();
    }

    #[test]
    fn verify_flag() {
        assert!(TlsConnector::new(true).is_verifying());
        assert!(!TlsConnector::new(false).is_verifying());
    }
}
