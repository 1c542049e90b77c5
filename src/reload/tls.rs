//! TLS termination for the reload port.
//!
//! Sites served over https must load `livereload.js` and open the WebSocket
//! over TLS as well, so the reactor terminates TLS itself when a PEM
//! certificate/key pair is configured. This is independent of whatever TLS
//! the site's own server uses.

use std::fs::File;
use std::io::BufReader;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use thiserror::Error;

use crate::reload::dispatch::Transport;

/// TLS setup and handshake errors.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read `{0}`")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("no certificates found in `{0}`")]
    NoCertificate(PathBuf),

    #[error("no private key found in `{0}`")]
    NoPrivateKey(PathBuf),

    #[error("invalid certificate or key")]
    Config(#[from] rustls::Error),
}

/// Accepts TLS connections for the reactor.
#[derive(Clone, Debug)]
pub struct TlsAcceptor {
    config: Arc<ServerConfig>,
}

impl TlsAcceptor {
    /// Build an acceptor from PEM certificate and key files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        let certs = load_certs(cert_path)?;
        let key = load_private_key(key_path)?;

        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Wrap an accepted socket. The handshake itself runs lazily on the
    /// first read or write of the returned transport.
    pub fn accept(&self, stream: TcpStream) -> Result<Transport, TlsError> {
        let conn = ServerConnection::new(Arc::clone(&self.config))?;
        Ok(Transport::Tls(Box::new(StreamOwned::new(conn, stream))))
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path).map_err(|e| TlsError::Read(path.to_path_buf(), e))?;
    let mut reader = BufReader::new(file);
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|e| TlsError::Read(path.to_path_buf(), e))?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificate(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path).map_err(|e| TlsError::Read(path.to_path_buf(), e))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TlsError::Read(path.to_path_buf(), e))?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_cert_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TlsAcceptor::from_pem_files(
            &dir.path().join("missing.pem"),
            &dir.path().join("missing.key"),
        )
        .unwrap_err();
        assert!(matches!(err, TlsError::Read(_, _)));
    }

    #[test]
    fn test_empty_cert_file() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        File::create(&cert).unwrap().write_all(b"").unwrap();
        File::create(&key).unwrap().write_all(b"").unwrap();

        let err = TlsAcceptor::from_pem_files(&cert, &key).unwrap_err();
        assert!(matches!(err, TlsError::NoCertificate(_)));
    }
}
