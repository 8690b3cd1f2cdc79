use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::{StreamTransport, TransportError};

pub const DEFAULT_PORT: u16 = 64738;

/// Bounds a connection attempt. Both fields are optional; when both are set
/// the earlier instant wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dialer {
    pub timeout: Option<Duration>,
    pub deadline: Option<Instant>,
}

impl Dialer {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            deadline: None,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            timeout: None,
            deadline: Some(deadline),
        }
    }

    /// Zero timeout means no timeout.
    pub fn effective_deadline(&self, start: Instant) -> Option<Instant> {
        let from_timeout = self
            .timeout
            .filter(|timeout| !timeout.is_zero())
            .map(|timeout| start + timeout);
        match (self.deadline, from_timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Client config trusting the bundled web PKI roots.
pub fn default_client_config() -> Result<Arc<ClientConfig>, TransportError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|err| TransportError::Tls(err.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Splits `host[:port]`, accepting bracketed and bare IPv6 literals.
pub(crate) fn split_host_port(addr: &str) -> Result<(String, u16), TransportError> {
    let invalid = || TransportError::InvalidAddress(addr.to_string());
    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        match tail {
            "" => (host, None),
            _ => (host, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match addr.matches(':').count() {
            0 => (addr, None),
            1 => {
                let (host, port) = addr.split_once(':').ok_or_else(invalid)?;
                (host, Some(port))
            }
            _ => (addr, None),
        }
    };
    if host.is_empty() {
        return Err(invalid());
    }
    let port = match port {
        Some(port) => port.parse().map_err(|_| invalid())?,
        None => DEFAULT_PORT,
    };
    Ok((host.to_string(), port))
}

pub async fn dial_tls(
    addr: &str,
    tls: Arc<ClientConfig>,
) -> Result<StreamTransport<TlsStream<TcpStream>>, TransportError> {
    let (host, port) = split_host_port(addr)?;
    let server_name = ServerName::try_from(host.clone())
        .map_err(|_| TransportError::InvalidAddress(addr.to_string()))?;

    let tcp = TcpStream::connect((host.as_str(), port)).await?;
    tcp.set_nodelay(true)?;
    debug!(target: "murmur::transport", %host, port, "tcp connected; starting tls");

    let stream = TlsConnector::from(tls)
        .connect(server_name, tcp)
        .await
        .map_err(|err| TransportError::Tls(err.to_string()))?;
    Ok(StreamTransport::new(stream))
}
