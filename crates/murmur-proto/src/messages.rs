//! Control-channel records the client core encodes or decodes.
//!
//! Fields follow proto2 `optional` semantics: `None` means the sender left
//! the field out, which matters for partial updates like [`ChannelState`].
//! Repeated scalars are written unpacked and read in either form.

use prost::Message;

use crate::frame::Frame;
use crate::kind::MessageKind;

/// A protobuf record bound to the message kind that carries it.
pub trait ProtoMessage: Message + Default {
    const KIND: MessageKind;

    fn to_frame(&self) -> Frame {
        Frame::new(Self::KIND, self.encode_to_vec())
    }
}

macro_rules! bind_kind {
    ($($message:ident),* $(,)?) => {
        $(
            impl ProtoMessage for $message {
                const KIND: MessageKind = MessageKind::$message;
            }
        )*
    };
}

#[derive(Clone, PartialEq, Message)]
pub struct Version {
    #[prost(uint32, optional, tag = "1")]
    pub version: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub release: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub os: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub os_version: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Authenticate {
    #[prost(string, optional, tag = "1")]
    pub username: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub password: Option<String>,
    #[prost(string, repeated, tag = "3")]
    pub tokens: Vec<String>,
    #[prost(int32, repeated, packed = "false", tag = "4")]
    pub celt_versions: Vec<i32>,
    #[prost(bool, optional, tag = "5")]
    pub opus: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Ping {
    #[prost(uint64, optional, tag = "1")]
    pub timestamp: Option<u64>,
    #[prost(uint32, optional, tag = "2")]
    pub good: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub late: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub lost: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub resync: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub udp_packets: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub tcp_packets: Option<u32>,
    #[prost(float, optional, tag = "8")]
    pub udp_ping_avg: Option<f32>,
    #[prost(float, optional, tag = "9")]
    pub udp_ping_var: Option<f32>,
    #[prost(float, optional, tag = "10")]
    pub tcp_ping_avg: Option<f32>,
    #[prost(float, optional, tag = "11")]
    pub tcp_ping_var: Option<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Reject {
    /// Raw reject type; unknown values are preserved.
    #[prost(uint32, optional, tag = "1")]
    pub reject_type: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub reason: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ServerSync {
    #[prost(uint32, optional, tag = "1")]
    pub session: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub max_bandwidth: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub welcome_text: Option<String>,
    #[prost(uint64, optional, tag = "4")]
    pub permissions: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelRemove {
    #[prost(uint32, required, tag = "1")]
    pub channel_id: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelState {
    #[prost(uint32, optional, tag = "1")]
    pub channel_id: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub parent: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub name: Option<String>,
    /// Non-empty means the full replacement link set.
    #[prost(uint32, repeated, packed = "false", tag = "4")]
    pub links: Vec<u32>,
    #[prost(string, optional, tag = "5")]
    pub description: Option<String>,
    #[prost(uint32, repeated, packed = "false", tag = "6")]
    pub links_add: Vec<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "7")]
    pub links_remove: Vec<u32>,
    #[prost(bool, optional, tag = "8")]
    pub temporary: Option<bool>,
    #[prost(int32, optional, tag = "9")]
    pub position: Option<i32>,
    #[prost(uint32, optional, tag = "11")]
    pub max_users: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct UserRemove {
    #[prost(uint32, required, tag = "1")]
    pub session: u32,
    #[prost(uint32, optional, tag = "2")]
    pub actor: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub reason: Option<String>,
    #[prost(bool, optional, tag = "4")]
    pub ban: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct UserState {
    #[prost(uint32, optional, tag = "1")]
    pub session: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub actor: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub name: Option<String>,
    #[prost(uint32, optional, tag = "4")]
    pub user_id: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub channel_id: Option<u32>,
    #[prost(bool, optional, tag = "6")]
    pub mute: Option<bool>,
    #[prost(bool, optional, tag = "7")]
    pub deaf: Option<bool>,
    #[prost(bool, optional, tag = "8")]
    pub suppress: Option<bool>,
    #[prost(bool, optional, tag = "9")]
    pub self_mute: Option<bool>,
    #[prost(bool, optional, tag = "10")]
    pub self_deaf: Option<bool>,
    #[prost(string, optional, tag = "14")]
    pub comment: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PermissionQuery {
    #[prost(uint32, optional, tag = "1")]
    pub channel_id: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub permissions: Option<u32>,
    #[prost(bool, optional, tag = "3")]
    pub flush: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CodecVersion {
    #[prost(int32, optional, tag = "1")]
    pub alpha: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub beta: Option<i32>,
    #[prost(bool, optional, tag = "3")]
    pub prefer_alpha: Option<bool>,
    #[prost(bool, optional, tag = "4")]
    pub opus: Option<bool>,
}

bind_kind!(
    Version,
    Authenticate,
    Ping,
    Reject,
    ServerSync,
    ChannelRemove,
    ChannelState,
    UserRemove,
    UserState,
    PermissionQuery,
    CodecVersion,
);

#[cfg(test)]
mod tests {
    use super::*;

    /// UserState as a newer server might send it, with fields this crate
    /// does not model.
    #[derive(Clone, PartialEq, Message)]
    struct WideUserState {
        #[prost(uint32, optional, tag = "1")]
        session: Option<u32>,
        #[prost(string, optional, tag = "3")]
        name: Option<String>,
        #[prost(bytes = "vec", optional, tag = "15")]
        texture: Option<Vec<u8>>,
        #[prost(float, optional, tag = "30")]
        volume: Option<f32>,
    }

    #[test_timeout::timeout]
    fn version_fields_use_their_wire_numbers() {
        let message = Version {
            version: Some(0x0001_0300),
            release: Some("murmur".into()),
            ..Default::default()
        };
        let encoded = message.encode_to_vec();
        // field 1 varint, then field 2 length-delimited
        assert_eq!(encoded[0], 0x08);
        assert_eq!(&encoded[1..4], &[0x80, 0x86, 0x04]);
        assert_eq!(encoded[4], 0x12);
        assert_eq!(Version::decode(&encoded[..]).unwrap(), message);
    }

    #[test_timeout::timeout]
    fn unknown_fields_are_skipped() {
        let wide = WideUserState {
            session: Some(42),
            name: Some("alice".into()),
            texture: Some(b"texture".to_vec()),
            volume: Some(1.5),
        };
        let user = UserState::decode(&wide.encode_to_vec()[..]).unwrap();
        assert_eq!(user.session, Some(42));
        assert_eq!(user.name.as_deref(), Some("alice"));
        assert_eq!(user.comment, None);
    }

    #[test_timeout::timeout]
    fn absent_fields_stay_absent() {
        let partial = ChannelState {
            channel_id: Some(3),
            description: Some("quiet room".into()),
            ..Default::default()
        };
        let decoded = ChannelState::decode(&partial.encode_to_vec()[..]).unwrap();
        assert_eq!(decoded.name, None);
        assert_eq!(decoded.parent, None);
        assert_eq!(decoded.description.as_deref(), Some("quiet room"));
    }

    #[test_timeout::timeout]
    fn links_are_written_unpacked_and_read_either_way() {
        let state = ChannelState {
            links: vec![1, 2],
            ..Default::default()
        };
        assert_eq!(state.encode_to_vec(), vec![0x20, 1, 0x20, 2]);

        let packed = [0x22, 2, 1, 2];
        assert_eq!(ChannelState::decode(&packed[..]).unwrap().links, vec![1, 2]);
    }

    #[test_timeout::timeout]
    fn ping_carries_float_statistics() {
        let ping = Ping {
            timestamp: Some(123_456),
            tcp_packets: Some(7),
            tcp_ping_avg: Some(12.5),
            tcp_ping_var: Some(0.25),
            ..Default::default()
        };
        let frame = ping.to_frame();
        assert_eq!(frame.kind, MessageKind::Ping);
        assert_eq!(Ping::decode(&frame.payload[..]).unwrap(), ping);
    }

    #[test_timeout::timeout]
    fn authenticate_repeats_tokens_in_order() {
        let auth = Authenticate {
            username: Some("bot".into()),
            password: Some(String::new()),
            tokens: vec!["red".into(), "blue".into()],
            celt_versions: vec![],
            opus: Some(true),
        };
        let decoded = Authenticate::decode(&auth.encode_to_vec()[..]).unwrap();
        assert_eq!(decoded.tokens, vec!["red".to_string(), "blue".to_string()]);
        assert_eq!(decoded.password.as_deref(), Some(""));
        assert_eq!(decoded.opus, Some(true));
    }

    #[test_timeout::timeout]
    fn mismatched_wire_type_is_an_error() {
        // field 1 as a start-group marker
        assert!(UserState::decode(&[0x0B][..]).is_err());
    }

    #[test_timeout::timeout]
    fn frames_are_tagged_with_their_kind() {
        let remove = UserRemove {
            session: 9,
            reason: Some("afk".into()),
            ..Default::default()
        };
        let frame = remove.to_frame();
        assert_eq!(frame.kind, MessageKind::UserRemove);
        assert_eq!(UserRemove::decode(&frame.payload[..]).unwrap(), remove);
    }
}
