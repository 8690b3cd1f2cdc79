//! Server-side entities as the client currently knows them.
//!
//! Only the dispatch loop mutates a [`SessionState`], always inside one bulk
//! write of the connection's volatile lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use murmur_proto::{
    ChannelState, CodecVersion, PermissionQuery, ServerSync, UserRemove, UserState, Version,
    unpack_version,
};

pub const ROOT_CHANNEL_ID: u32 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub session: u32,
    pub name: String,
    /// Registered user id; `None` for unregistered users.
    pub user_id: Option<u32>,
    pub channel_id: u32,
    pub mute: bool,
    pub deaf: bool,
    pub suppress: bool,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    pub id: u32,
    pub parent: Option<u32>,
    pub name: String,
    pub description: Option<String>,
    pub links: BTreeSet<u32>,
    pub temporary: bool,
    pub position: i32,
    pub max_users: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Permission(pub u32);

impl Permission {
    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, flags: u32) -> bool {
        self.0 & flags == flags
    }
}

/// What the server said about itself in Version and CodecVersion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerInfo {
    pub version: Option<Version>,
    pub codec: Option<CodecVersion>,
}

impl ServerInfo {
    pub fn protocol_version(&self) -> Option<(u16, u8, u8)> {
        self.version
            .as_ref()
            .and_then(|version| version.version)
            .map(unpack_version)
    }

    pub fn release(&self) -> Option<&str> {
        self.version.as_ref()?.release.as_deref()
    }

    pub fn opus(&self) -> bool {
        self.codec
            .as_ref()
            .and_then(|codec| codec.opus)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    users: BTreeMap<u32, User>,
    channels: BTreeMap<u32, Channel>,
    channel_index: HashMap<(Option<u32>, String), u32>,
    permissions: HashMap<u32, Permission>,
    self_session: Option<u32>,
    welcome_text: Option<String>,
    max_bandwidth: Option<u32>,
    root_permissions: Option<u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> &BTreeMap<u32, User> {
        &self.users
    }

    pub fn user(&self, session: u32) -> Option<&User> {
        self.users.get(&session)
    }

    pub fn self_session(&self) -> Option<u32> {
        self.self_session
    }

    pub fn self_user(&self) -> Option<&User> {
        self.self_session.and_then(|session| self.users.get(&session))
    }

    pub fn channels(&self) -> &BTreeMap<u32, Channel> {
        &self.channels
    }

    pub fn channel(&self, id: u32) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn root_channel(&self) -> Option<&Channel> {
        self.channels.get(&ROOT_CHANNEL_ID)
    }

    pub fn channel_by_name(&self, parent: Option<u32>, name: &str) -> Option<&Channel> {
        self.channel_index
            .get(&(parent, name.to_string()))
            .and_then(|id| self.channels.get(id))
    }

    /// Walks `path` from the root channel, one name per level.
    pub fn find_channel<S: AsRef<str>>(&self, path: &[S]) -> Option<&Channel> {
        let mut current = self.root_channel()?;
        for name in path {
            current = self.channel_by_name(Some(current.id), name.as_ref())?;
        }
        Some(current)
    }

    pub fn users_in(&self, channel_id: u32) -> impl Iterator<Item = &User> {
        self.users
            .values()
            .filter(move |user| user.channel_id == channel_id)
    }

    pub fn permission(&self, channel_id: u32) -> Option<Permission> {
        self.permissions.get(&channel_id).copied()
    }

    pub fn welcome_text(&self) -> Option<&str> {
        self.welcome_text.as_deref()
    }

    pub fn max_bandwidth(&self) -> Option<u32> {
        self.max_bandwidth
    }

    pub fn root_permissions(&self) -> Option<u64> {
        self.root_permissions
    }

    /// True when the name index holds exactly one correct entry per channel.
    pub fn is_consistent(&self) -> bool {
        self.channel_index.len() == self.channels.len()
            && self.channels.values().all(|channel| {
                self.channel_index.get(&(channel.parent, channel.name.clone())) == Some(&channel.id)
            })
    }

    fn unindex(&mut self, channel: &Channel) {
        let key = (channel.parent, channel.name.clone());
        if self.channel_index.get(&key) == Some(&channel.id) {
            self.channel_index.remove(&key);
        }
    }

    /// Returns `false` when the message names no channel.
    pub fn apply_channel_state(&mut self, msg: &ChannelState) -> bool {
        let Some(id) = msg.channel_id else {
            return false;
        };
        let mut channel = match self.channels.remove(&id) {
            Some(existing) => {
                self.unindex(&existing);
                existing
            }
            None => Channel {
                id,
                ..Channel::default()
            },
        };

        if let Some(parent) = msg.parent {
            channel.parent = Some(parent);
        }
        if let Some(name) = &msg.name {
            channel.name = name.clone();
        }
        if let Some(description) = &msg.description {
            channel.description = Some(description.clone());
        }
        if !msg.links.is_empty() {
            channel.links = msg.links.iter().copied().collect();
        }
        channel.links.extend(msg.links_add.iter().copied());
        for link in &msg.links_remove {
            channel.links.remove(link);
        }
        if let Some(temporary) = msg.temporary {
            channel.temporary = temporary;
        }
        if let Some(position) = msg.position {
            channel.position = position;
        }
        if let Some(max_users) = msg.max_users {
            channel.max_users = Some(max_users);
        }

        self.channel_index
            .insert((channel.parent, channel.name.clone()), id);
        self.channels.insert(id, channel);
        true
    }

    pub fn apply_channel_remove(&mut self, channel_id: u32) -> Option<Channel> {
        let removed = self.channels.remove(&channel_id)?;
        self.unindex(&removed);
        self.permissions.remove(&channel_id);
        for channel in self.channels.values_mut() {
            channel.links.remove(&channel_id);
        }
        Some(removed)
    }

    /// Returns `false` when the message names no session.
    pub fn apply_user_state(&mut self, msg: &UserState) -> bool {
        let Some(session) = msg.session else {
            return false;
        };
        let user = self.users.entry(session).or_insert_with(|| User {
            session,
            channel_id: ROOT_CHANNEL_ID,
            ..User::default()
        });

        if let Some(name) = &msg.name {
            user.name = name.clone();
        }
        if let Some(user_id) = msg.user_id {
            user.user_id = Some(user_id);
        }
        if let Some(channel_id) = msg.channel_id {
            user.channel_id = channel_id;
        }
        let flags = [
            (msg.mute, &mut user.mute),
            (msg.deaf, &mut user.deaf),
            (msg.suppress, &mut user.suppress),
            (msg.self_mute, &mut user.self_mute),
            (msg.self_deaf, &mut user.self_deaf),
        ];
        for (update, flag) in flags {
            if let Some(value) = update {
                *flag = value;
            }
        }
        if let Some(comment) = &msg.comment {
            user.comment = Some(comment.clone());
        }
        true
    }

    pub fn apply_user_remove(&mut self, msg: &UserRemove) -> Option<User> {
        self.users.remove(&msg.session)
    }

    pub fn apply_permission_query(&mut self, msg: &PermissionQuery) {
        if msg.flush == Some(true) {
            self.permissions.clear();
        }
        if let (Some(channel_id), Some(bits)) = (msg.channel_id, msg.permissions) {
            self.permissions.insert(channel_id, Permission(bits));
        }
    }

    pub fn apply_server_sync(&mut self, msg: &ServerSync) {
        if let Some(session) = msg.session {
            self.self_session = Some(session);
        }
        if let Some(text) = &msg.welcome_text {
            self.welcome_text = Some(text.clone());
        }
        if let Some(bandwidth) = msg.max_bandwidth {
            self.max_bandwidth = Some(bandwidth);
        }
        if let Some(permissions) = msg.permissions {
            self.root_permissions = Some(permissions);
        }
    }
}
