//! Client-side connection engine for the murmur voice-chat protocol.
//!
//! [`Client::connect`] opens a TLS transport, sends the Version and
//! Authenticate handshake, and resolves once the server finishes its initial
//! sync. Two background tasks then keep the session alive: the dispatch loop
//! applies server updates to [`SessionState`], and the ping loop measures
//! round-trip latency.

pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod handshake;
pub mod ping;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod transport;
pub mod volatile;

pub use audio::{AudioCodec, CodecRegistry, OPUS_CODEC_ID};
pub use client::Client;
pub use config::{Config, VersionOverride};
pub use error::{ClientError, ConnectError, RejectKind, Rejection};
pub use events::{DisconnectEvent, DisconnectKind, Event, EventHub};
pub use handler::MessageHandler;
pub use handshake::{CLIENT_VERSION, Handshake, HandshakeDefaults};
pub use ping::PingStats;
pub use session::{Channel, Permission, ServerInfo, SessionState, User};
pub use state::{ConnectionState, InvalidTransition};
pub use transport::{Dialer, StreamTransport, Transport, TransportError};
pub use volatile::LockStrategy;

pub use murmur_proto as proto;
