use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Why the server refused the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectKind {
    None,
    WrongVersion,
    InvalidUsername,
    WrongUserPassword,
    WrongServerPassword,
    UsernameInUse,
    ServerFull,
    NoCertificate,
    AuthenticatorFail,
    Unknown(u32),
}

impl From<u32> for RejectKind {
    fn from(raw: u32) -> Self {
        match raw {
            0 => RejectKind::None,
            1 => RejectKind::WrongVersion,
            2 => RejectKind::InvalidUsername,
            3 => RejectKind::WrongUserPassword,
            4 => RejectKind::WrongServerPassword,
            5 => RejectKind::UsernameInUse,
            6 => RejectKind::ServerFull,
            7 => RejectKind::NoCertificate,
            8 => RejectKind::AuthenticatorFail,
            other => RejectKind::Unknown(other),
        }
    }
}

impl RejectKind {
    pub fn as_u32(self) -> u32 {
        match self {
            RejectKind::None => 0,
            RejectKind::WrongVersion => 1,
            RejectKind::InvalidUsername => 2,
            RejectKind::WrongUserPassword => 3,
            RejectKind::WrongServerPassword => 4,
            RejectKind::UsernameInUse => 5,
            RejectKind::ServerFull => 6,
            RejectKind::NoCertificate => 7,
            RejectKind::AuthenticatorFail => 8,
            RejectKind::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for RejectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectKind::None => f.write_str("rejected"),
            RejectKind::WrongVersion => f.write_str("wrong version"),
            RejectKind::InvalidUsername => f.write_str("invalid username"),
            RejectKind::WrongUserPassword => f.write_str("wrong user password"),
            RejectKind::WrongServerPassword => f.write_str("wrong server password"),
            RejectKind::UsernameInUse => f.write_str("username in use"),
            RejectKind::ServerFull => f.write_str("server full"),
            RejectKind::NoCertificate => f.write_str("no certificate"),
            RejectKind::AuthenticatorFail => f.write_str("authenticator failure"),
            RejectKind::Unknown(raw) => write!(f, "reject type {raw}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {reason}")]
pub struct Rejection {
    pub kind: RejectKind,
    pub reason: String,
}

impl From<murmur_proto::Reject> for Rejection {
    fn from(reject: murmur_proto::Reject) -> Self {
        Self {
            kind: RejectKind::from(reject.reject_type.unwrap_or(0)),
            reason: reject.reason.unwrap_or_default(),
        }
    }
}

/// A failed connection attempt. No client exists when this is returned.
#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    #[error("failed to open transport: {0}")]
    Transport(TransportError),
    #[error("failed to send handshake: {0}")]
    Handshake(TransportError),
    #[error("handshake timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
    #[error("server rejected connection: {0}")]
    Rejected(Rejection),
    #[error("connection lost before sync: {0}")]
    Disconnected(TransportError),
}

impl ConnectError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectError::Timeout { .. })
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ConnectError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("client is not connected")]
    NotConnected,
    #[error("client already disconnected")]
    AlreadyDisconnected,
    #[error(transparent)]
    Transport(#[from] TransportError),
}
