//! Wire format for the murmur voice-chat client.
//!
//! Every message travels as a frame: a big-endian `u16` message kind, a
//! big-endian `u32` payload length, then the payload. Payloads are proto2
//! records encoded with `prost`.

pub mod frame;
pub mod kind;
pub mod messages;
pub mod version;

pub use frame::{Frame, FrameCodec, FrameError, HEADER_LEN, MAX_PAYLOAD_LEN};
pub use kind::MessageKind;
pub use messages::{
    Authenticate, ChannelRemove, ChannelState, CodecVersion, PermissionQuery, Ping, ProtoMessage,
    Reject, ServerSync, UserRemove, UserState, Version,
};
pub use version::{SemverError, pack_semver, pack_version, unpack_version};
pub use prost::{DecodeError, Message};
