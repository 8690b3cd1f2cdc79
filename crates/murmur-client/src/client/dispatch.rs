use std::sync::Arc;

use murmur_proto::{
    ChannelRemove, ChannelState, CodecVersion, Frame, Message, MessageKind, PermissionQuery, Ping,
    Reject, ServerSync, UserRemove, UserState, Version,
};
use tracing::{debug, info, trace, warn};

use super::{Client, Inner};
use crate::error::{ConnectError, Rejection};
use crate::events::{DisconnectEvent, DisconnectKind, Event};
use crate::state::ConnectionState;
use crate::transport::TransportError;
use crate::volatile::VolatileLock;

enum Exit {
    Read(TransportError),
    Rejected(Rejection),
}

fn decode<M: Message + Default>(frame: &Frame) -> Result<M, TransportError> {
    M::decode(&frame.payload[..]).map_err(|err| TransportError::payload(frame.kind, err))
}

/// Reads and applies frames until the transport fails or the server rejects
/// us, then tears the connection down. Sole writer of the session state.
pub(crate) async fn run(inner: Arc<Inner>) {
    let exit = loop {
        let frame = match inner.transport.read_frame().await {
            Ok(frame) => frame,
            Err(err) => break Exit::Read(err),
        };
        trace!(target: "murmur::dispatch", kind = %frame.kind, len = frame.payload.len(), "frame");
        match apply(&inner, frame) {
            Ok(None) => {}
            Ok(Some(exit)) => break exit,
            Err(err) => break Exit::Read(err),
        }
    };
    teardown(&inner, exit).await;
}

fn apply(inner: &Arc<Inner>, frame: Frame) -> Result<Option<Exit>, TransportError> {
    match frame.kind {
        MessageKind::Version => {
            let version: Version = decode(&frame)?;
            debug!(
                target: "murmur::dispatch",
                release = version.release.as_deref().unwrap_or(""),
                "server version"
            );
            inner.server.lock().version = Some(version);
        }
        MessageKind::CodecVersion => {
            inner.server.lock().codec = Some(decode::<CodecVersion>(&frame)?);
        }
        MessageKind::Ping => {
            inner.ping.record_reply(&decode::<Ping>(&frame)?);
        }
        MessageKind::ServerSync => {
            let sync: ServerSync = decode(&frame)?;
            inner.session.write(|session| session.apply_server_sync(&sync));
            synced(inner);
        }
        MessageKind::ChannelState => {
            let msg: ChannelState = decode(&frame)?;
            inner.session.write(|session| session.apply_channel_state(&msg));
        }
        MessageKind::ChannelRemove => {
            let msg: ChannelRemove = decode(&frame)?;
            inner
                .session
                .write(|session| session.apply_channel_remove(msg.channel_id));
        }
        MessageKind::UserState => {
            let msg: UserState = decode(&frame)?;
            inner.session.write(|session| session.apply_user_state(&msg));
        }
        MessageKind::UserRemove => {
            let msg: UserRemove = decode(&frame)?;
            let own = inner.session.write(|session| {
                let own = session.self_session() == Some(msg.session);
                session.apply_user_remove(&msg);
                own
            });
            if own {
                let kind = if msg.ban == Some(true) {
                    DisconnectKind::Banned
                } else {
                    DisconnectKind::Kicked
                };
                info!(target: "murmur::dispatch", ?kind, reason = ?msg.reason, "removed from server");
                inner.record_termination(kind, msg.reason);
            }
        }
        MessageKind::PermissionQuery => {
            let msg: PermissionQuery = decode(&frame)?;
            inner.session.write(|session| session.apply_permission_query(&msg));
        }
        MessageKind::Reject => {
            let rejection = Rejection::from(decode::<Reject>(&frame)?);
            if inner.state.load() == ConnectionState::Synced {
                warn!(target: "murmur::dispatch", %rejection, "reject after sync");
                inner.record_termination(DisconnectKind::Error, Some(rejection.reason.clone()));
            }
            return Ok(Some(Exit::Rejected(rejection)));
        }
        _ => match &inner.config.handler {
            Some(handler) => {
                let client = Client {
                    inner: Arc::clone(inner),
                };
                handler.handle(&client, &frame);
            }
            None => trace!(target: "murmur::dispatch", kind = %frame.kind, "unhandled frame"),
        },
    }
    Ok(None)
}

/// The first sync promotes the connection and announces it. Both lifecycle
/// events come from this task, so Connected always precedes Disconnected.
fn synced(inner: &Inner) {
    match inner
        .state
        .transition(ConnectionState::Connected, ConnectionState::Synced)
    {
        Ok(()) => {
            let session = inner.session_id();
            info!(target: "murmur::dispatch", addr = %inner.addr, ?session, "connected");
            inner.config.events.emit(Event::Connected {
                addr: inner.addr.clone(),
                session,
            });
            if let Some(outcome) = inner.outcome.lock().take() {
                // receiver is gone if the attempt was dropped
                let _ = outcome.send(Ok(()));
            }
        }
        Err(err) => trace!(target: "murmur::dispatch", %err, "ignoring server sync"),
    }
}

async fn teardown(inner: &Inner, exit: Exit) {
    let previous = inner.state.disconnect();
    if let Err(err) = inner.transport.close().await {
        debug!(target: "murmur::dispatch", error = %err, "close during teardown");
    }

    match previous {
        Some(ConnectionState::Synced) => {
            let termination = inner.termination.lock().take();
            let event = match (termination, exit) {
                (Some(termination), Exit::Read(TransportError::Closed)) | (Some(termination), Exit::Rejected(_)) => {
                    DisconnectEvent {
                        kind: termination.kind,
                        reason: termination.reason,
                        cause: None,
                    }
                }
                (Some(termination), Exit::Read(err)) => DisconnectEvent {
                    kind: termination.kind,
                    reason: termination.reason,
                    cause: Some(err),
                },
                (None, Exit::Read(err)) => DisconnectEvent {
                    kind: DisconnectKind::Error,
                    reason: None,
                    cause: Some(err),
                },
                (None, Exit::Rejected(rejection)) => DisconnectEvent {
                    kind: DisconnectKind::Error,
                    reason: Some(rejection.reason),
                    cause: None,
                },
            };
            info!(target: "murmur::dispatch", kind = ?event.kind, addr = %inner.addr, "disconnected");
            inner.config.events.emit(Event::Disconnected(event));
        }
        _ => {
            if let Some(outcome) = inner.outcome.lock().take() {
                let error = match exit {
                    Exit::Read(err) => ConnectError::Disconnected(err),
                    Exit::Rejected(rejection) => ConnectError::Rejected(rejection),
                };
                let _ = outcome.send(Err(error));
            }
        }
    }
    inner.end.cancel();
}
