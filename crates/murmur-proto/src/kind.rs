use std::fmt;

/// Message kinds understood on the control channel, numbered as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum MessageKind {
    Version = 0,
    UdpTunnel = 1,
    Authenticate = 2,
    Ping = 3,
    Reject = 4,
    ServerSync = 5,
    ChannelRemove = 6,
    ChannelState = 7,
    UserRemove = 8,
    UserState = 9,
    BanList = 10,
    TextMessage = 11,
    PermissionDenied = 12,
    Acl = 13,
    QueryUsers = 14,
    CryptSetup = 15,
    ContextActionModify = 16,
    ContextAction = 17,
    UserList = 18,
    VoiceTarget = 19,
    PermissionQuery = 20,
    CodecVersion = 21,
    UserStats = 22,
    RequestBlob = 23,
    ServerConfig = 24,
    SuggestConfig = 25,
}

impl MessageKind {
    pub fn from_u16(raw: u16) -> Option<Self> {
        use MessageKind::*;
        let kind = match raw {
            0 => Version,
            1 => UdpTunnel,
            2 => Authenticate,
            3 => Ping,
            4 => Reject,
            5 => ServerSync,
            6 => ChannelRemove,
            7 => ChannelState,
            8 => UserRemove,
            9 => UserState,
            10 => BanList,
            11 => TextMessage,
            12 => PermissionDenied,
            13 => Acl,
            14 => QueryUsers,
            15 => CryptSetup,
            16 => ContextActionModify,
            17 => ContextAction,
            18 => UserList,
            19 => VoiceTarget,
            20 => PermissionQuery,
            21 => CodecVersion,
            22 => UserStats,
            23 => RequestBlob,
            24 => ServerConfig,
            25 => SuggestConfig,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        use MessageKind::*;
        match self {
            Version => "Version",
            UdpTunnel => "UDPTunnel",
            Authenticate => "Authenticate",
            Ping => "Ping",
            Reject => "Reject",
            ServerSync => "ServerSync",
            ChannelRemove => "ChannelRemove",
            ChannelState => "ChannelState",
            UserRemove => "UserRemove",
            UserState => "UserState",
            BanList => "BanList",
            TextMessage => "TextMessage",
            PermissionDenied => "PermissionDenied",
            Acl => "ACL",
            QueryUsers => "QueryUsers",
            CryptSetup => "CryptSetup",
            ContextActionModify => "ContextActionModify",
            ContextAction => "ContextAction",
            UserList => "UserList",
            VoiceTarget => "VoiceTarget",
            PermissionQuery => "PermissionQuery",
            CodecVersion => "CodecVersion",
            UserStats => "UserStats",
            RequestBlob => "RequestBlob",
            ServerConfig => "ServerConfig",
            SuggestConfig => "SuggestConfig",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
