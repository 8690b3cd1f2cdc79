use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    /// Handshake sent, initial sync not finished. Never visible through
    /// [`Client::state`](crate::Client::state).
    Connected = 1,
    Synced = 2,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Synced,
            _ => ConnectionState::Disconnected,
        }
    }

    /// What callers outside the engine are allowed to see.
    pub fn observable(self) -> Self {
        match self {
            ConnectionState::Connected => ConnectionState::Disconnected,
            other => other,
        }
    }

    fn allows(self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            (Disconnected, Connected)
                | (Connected, Synced)
                | (Connected, Disconnected)
                | (Synced, Disconnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Synced => "synced",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid state transition {from} -> {to} (current state {actual})")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub actual: ConnectionState,
}

/// Connection state behind compare-and-swap transitions.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

impl StateCell {
    pub fn new(initial: ConnectionState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from -> to` iff the cell currently holds `from` and the edge is
    /// one of D->C, C->S, C->D, S->D.
    pub fn transition(
        &self,
        from: ConnectionState,
        to: ConnectionState,
    ) -> Result<(), InvalidTransition> {
        if !from.allows(to) {
            return Err(InvalidTransition {
                from,
                to,
                actual: self.load(),
            });
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| InvalidTransition {
                from,
                to,
                actual: ConnectionState::from_u8(actual),
            })
    }

    /// Moves any live state to Disconnected. Returns the state it left, or
    /// `None` when already disconnected.
    pub fn disconnect(&self) -> Option<ConnectionState> {
        let previous = ConnectionState::from_u8(
            self.0
                .swap(ConnectionState::Disconnected as u8, Ordering::AcqRel),
        );
        match previous {
            ConnectionState::Disconnected => None,
            live => Some(live),
        }
    }
}
