use std::sync::Arc;

use murmur_proto::ProtoMessage;
use rustls::ClientConfig;
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use super::{Client, Inner, SyncOutcome, dispatch, ping_loop};
use crate::config::Config;
use crate::error::ConnectError;
use crate::events::Event;
use crate::handshake;
use crate::state::ConnectionState;
use crate::transport::{Dialer, Transport, TransportError, default_client_config, dial_tls};

impl Client {
    /// Connects over TLS with the bundled web PKI roots and no deadline.
    pub async fn connect(addr: &str, config: Config) -> Result<Client, ConnectError> {
        Self::connect_with(addr, config, None, Dialer::default()).await
    }

    /// Connects over TLS. `addr` without a port uses 64738. The dialer's
    /// deadline bounds opening the transport as well as the handshake.
    pub async fn connect_with(
        addr: &str,
        config: Config,
        tls: Option<Arc<ClientConfig>>,
        dialer: Dialer,
    ) -> Result<Client, ConnectError> {
        let start = Instant::now();
        let deadline = dialer.effective_deadline(start);

        let tls = match tls {
            Some(tls) => tls,
            None => match default_client_config() {
                Ok(tls) => tls,
                Err(err) => return Err(failed(&config, addr, ConnectError::Transport(err))),
            },
        };

        let open = dial_tls(addr, tls);
        let opened = match deadline {
            Some(deadline) => match timeout_at(deadline, open).await {
                Ok(opened) => opened,
                Err(_) => {
                    let error = ConnectError::Timeout {
                        elapsed: start.elapsed(),
                    };
                    return Err(failed(&config, addr, error));
                }
            },
            None => open.await,
        };
        let transport = match opened {
            Ok(transport) => transport,
            Err(err) => return Err(failed(&config, addr, ConnectError::Transport(err))),
        };

        race(Arc::new(transport), addr, config, start, deadline).await
    }

    /// Runs the handshake over a transport the caller already opened.
    pub async fn establish(
        transport: Arc<dyn Transport>,
        addr: &str,
        config: Config,
        dialer: Dialer,
    ) -> Result<Client, ConnectError> {
        let start = Instant::now();
        let deadline = dialer.effective_deadline(start);
        race(transport, addr, config, start, deadline).await
    }
}

fn failed(config: &Config, addr: &str, error: ConnectError) -> ConnectError {
    warn!(target: "murmur::connect", %addr, %error, "connection attempt failed");
    config.events.emit(Event::ConnectFailed {
        addr: addr.to_string(),
        error: error.clone(),
    });
    error
}

/// Starts both loops, sends the handshake, then waits for the first of:
/// initial sync, a rejection or lost transport, or the deadline.
async fn race(
    transport: Arc<dyn Transport>,
    addr: &str,
    config: Config,
    start: Instant,
    deadline: Option<Instant>,
) -> Result<Client, ConnectError> {
    let (outcome_tx, mut outcome_rx) = oneshot::channel();
    let inner = Arc::new(Inner::new(addr, config, transport, outcome_tx));
    tokio::spawn(dispatch::run(Arc::clone(&inner)));

    // Err is a failure of our own; Ok carries what the dispatch loop settled.
    let attempt = async {
        let handshake = handshake::build(&inner.config);
        for frame in [
            handshake.version.to_frame(),
            handshake.authenticate.to_frame(),
        ] {
            inner
                .transport
                .write_frame(frame)
                .await
                .map_err(ConnectError::Handshake)?;
        }
        debug!(target: "murmur::connect", addr = %inner.addr, "handshake sent");
        tokio::spawn(ping_loop::run(Arc::clone(&inner)));
        Ok::<_, ConnectError>(settled(&mut outcome_rx).await)
    };

    let attempt = match deadline {
        Some(deadline) => timeout_at(deadline, attempt).await.unwrap_or_else(|_| {
            Err(ConnectError::Timeout {
                elapsed: start.elapsed(),
            })
        }),
        None => attempt.await,
    };
    let outcome = match attempt {
        Ok(outcome) => outcome,
        Err(error) => give_up(&inner, &mut outcome_rx, error).await,
    };

    match outcome {
        Ok(()) => {
            debug!(target: "murmur::connect", %addr, state = %inner.state.load(), "attempt settled");
            Ok(Client { inner })
        }
        Err(error) => {
            inner.abandon().await;
            Err(failed(&inner.config, addr, error))
        }
    }
}

async fn settled(outcome_rx: &mut oneshot::Receiver<SyncOutcome>) -> SyncOutcome {
    outcome_rx
        .await
        .unwrap_or(Err(ConnectError::Disconnected(TransportError::Closed)))
}

/// Claims Connected -> Disconnected so a later sync cannot promote the
/// connection. If the dispatch loop already moved it on, its outcome stands.
async fn give_up(
    inner: &Inner,
    outcome_rx: &mut oneshot::Receiver<SyncOutcome>,
    error: ConnectError,
) -> SyncOutcome {
    match inner
        .state
        .transition(ConnectionState::Connected, ConnectionState::Disconnected)
    {
        Ok(()) => Err(error),
        Err(lost) => {
            debug!(target: "murmur::connect", %error, state = %lost.actual, "dispatch loop settled first");
            settled(outcome_rx).await
        }
    }
}
