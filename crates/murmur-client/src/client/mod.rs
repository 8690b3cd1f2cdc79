use std::fmt;
use std::sync::Arc;

use murmur_proto::{Authenticate, Frame, ProtoMessage};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::error::{ClientError, ConnectError};
use crate::events::DisconnectKind;
use crate::ping::{PingStats, PingTracker};
use crate::session::{ServerInfo, SessionState, User};
use crate::state::{ConnectionState, StateCell};
use crate::transport::Transport;
use crate::volatile::{Volatile, VolatileLock};

mod connect;
mod dispatch;
mod ping_loop;

pub(crate) type SyncOutcome = Result<(), ConnectError>;

/// Why the session is ending, recorded before the transport actually drops.
#[derive(Debug, Clone)]
pub(crate) struct Termination {
    pub kind: DisconnectKind,
    pub reason: Option<String>,
}

pub(crate) struct Inner {
    pub addr: String,
    pub config: Config,
    pub transport: Arc<dyn Transport>,
    pub state: StateCell,
    pub session: Volatile<SessionState>,
    pub server: Mutex<ServerInfo>,
    pub ping: PingTracker,
    /// Cancelled once the dispatch loop has torn the connection down.
    pub end: CancellationToken,
    pub outcome: Mutex<Option<oneshot::Sender<SyncOutcome>>>,
    pub termination: Mutex<Option<Termination>>,
}

impl Inner {
    /// The transport is already open, so the connection starts out Connected.
    fn new(
        addr: &str,
        config: Config,
        transport: Arc<dyn Transport>,
        outcome: oneshot::Sender<SyncOutcome>,
    ) -> Self {
        let session = Volatile::new(config.lock_strategy, SessionState::new());
        Self {
            addr: addr.to_string(),
            config,
            transport,
            state: StateCell::new(ConnectionState::Connected),
            session,
            server: Mutex::new(ServerInfo::default()),
            ping: PingTracker::new(),
            end: CancellationToken::new(),
            outcome: Mutex::new(Some(outcome)),
            termination: Mutex::new(None),
        }
    }

    /// First recorded cause wins.
    pub(crate) fn record_termination(&self, kind: DisconnectKind, reason: Option<String>) -> bool {
        let mut termination = self.termination.lock();
        if termination.is_some() {
            return false;
        }
        *termination = Some(Termination { kind, reason });
        true
    }

    pub(crate) fn session_id(&self) -> Option<u32> {
        self.session.read(|session| session.self_session())
    }

    /// Gives up on a connection attempt that will not be handed to a caller.
    pub(crate) async fn abandon(&self) {
        self.state.disconnect();
        if let Err(err) = self.transport.close().await {
            debug!(target: "murmur::connect", error = %err, "close after failed attempt");
        }
    }
}

/// A synced connection. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<Inner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("addr", &self.inner.addr)
            .field("state", &self.state())
            .finish()
    }
}

impl Client {
    pub fn state(&self) -> ConnectionState {
        self.inner.state.load().observable()
    }

    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Runs `f` against a consistent view of the session. Never observes a
    /// half-applied server update.
    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        self.inner.session.read(f)
    }

    pub fn self_user(&self) -> Option<User> {
        self.read(|session| session.self_user().cloned())
    }

    pub fn ping_stats(&self) -> PingStats {
        self.inner.ping.stats()
    }

    pub fn server_info(&self) -> ServerInfo {
        self.inner.server.lock().clone()
    }

    pub async fn send<M: ProtoMessage + Sync>(&self, message: &M) -> Result<(), ClientError> {
        self.send_frame(message.to_frame()).await
    }

    pub async fn send_frame(&self, frame: Frame) -> Result<(), ClientError> {
        if self.inner.state.load() == ConnectionState::Disconnected {
            return Err(ClientError::NotConnected);
        }
        self.inner.transport.write_frame(frame).await?;
        Ok(())
    }

    /// Replaces the access tokens the server holds for this session.
    pub async fn send_tokens<I, T>(&self, tokens: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let update = Authenticate {
            tokens: tokens.into_iter().map(Into::into).collect(),
            ..Authenticate::default()
        };
        self.send(&update).await
    }

    /// Closes the connection and waits for teardown. Subscribers receive one
    /// `Disconnected` event of kind `User`.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        if self.inner.state.load() == ConnectionState::Disconnected
            || !self.inner.record_termination(DisconnectKind::User, None)
        {
            return Err(ClientError::AlreadyDisconnected);
        }
        if let Err(err) = self.inner.transport.close().await {
            debug!(target: "murmur::connect", error = %err, "close on disconnect");
        }
        self.closed().await;
        Ok(())
    }

    /// Resolves once the connection has been torn down, for any reason.
    pub async fn closed(&self) {
        self.inner.end.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.end.is_cancelled()
    }
}
