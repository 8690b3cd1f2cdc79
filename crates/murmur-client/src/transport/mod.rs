use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use murmur_proto::{DecodeError, Frame, FrameError, MessageKind};
use thiserror::Error;

pub mod stream;
pub mod tls;

pub use stream::StreamTransport;
pub use tls::{DEFAULT_PORT, Dialer, default_client_config, dial_tls};

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    #[error("transport io: {0}")]
    Io(Arc<io::Error>),
    #[error("tls: {0}")]
    Tls(String),
    #[error("unknown message kind {0}")]
    UnknownKind(u16),
    #[error("payload too large: {len} bytes exceeds {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("malformed {kind} payload: {source}")]
    Payload {
        kind: MessageKind,
        #[source]
        source: DecodeError,
    },
}

impl TransportError {
    pub fn payload(kind: MessageKind, source: DecodeError) -> Self {
        TransportError::Payload { kind, source }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(Arc::new(err))
    }
}

impl From<FrameError> for TransportError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::UnknownKind(raw) => TransportError::UnknownKind(raw),
            FrameError::PayloadTooLarge { len, max } => TransportError::PayloadTooLarge { len, max },
            FrameError::Io(err) => TransportError::from(err),
        }
    }
}

/// A framed, already-secured duplex message channel.
///
/// One task reads while others write; `close` may race with both and with
/// itself, so it must be idempotent and must unblock a pending read.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn read_frame(&self) -> Result<Frame, TransportError>;

    async fn write_frame(&self, frame: Frame) -> Result<(), TransportError>;

    /// Closing an already closed transport returns `Ok(())`.
    async fn close(&self) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;
}
