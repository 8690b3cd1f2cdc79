//! Reader/bulk-writer exclusion for the session collections.
//!
//! The dispatch loop is the only writer. A write closure runs as one bulk
//! update: no reader ever observes it half applied.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

pub trait VolatileLock<T>: Send + Sync {
    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R;

    fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LockStrategy {
    /// Readers wait while a bulk update is in progress.
    #[default]
    ReadWrite,
    /// Readers never wait; each bulk update publishes a fresh copy.
    Snapshot,
}

/// `parking_lot` read-write lock. The lock is task-fair, so a reader that
/// arrives while a writer holds or waits for the lock queues behind it.
#[derive(Debug, Default)]
pub struct RwVolatile<T> {
    inner: RwLock<T>,
}

impl<T> RwVolatile<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }
}

impl<T: Send + Sync> VolatileLock<T> for RwVolatile<T> {
    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.read())
    }

    fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.inner.write())
    }
}

/// Copy-on-write snapshots. A write clones the current value, mutates the
/// clone, then swaps it in; readers hold an `Arc` to whichever snapshot was
/// current when they started.
#[derive(Debug, Default)]
pub struct SnapshotVolatile<T> {
    current: RwLock<Arc<T>>,
    writer: Mutex<()>,
}

impl<T: Clone> SnapshotVolatile<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }
}

impl<T: Clone + Send + Sync> VolatileLock<T> for SnapshotVolatile<T> {
    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.snapshot())
    }

    fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _writer = self.writer.lock();
        let mut next = T::clone(&self.snapshot());
        let out = f(&mut next);
        *self.current.write() = Arc::new(next);
        out
    }
}

#[derive(Debug)]
pub enum Volatile<T> {
    ReadWrite(RwVolatile<T>),
    Snapshot(SnapshotVolatile<T>),
}

impl<T: Clone> Volatile<T> {
    pub fn new(strategy: LockStrategy, value: T) -> Self {
        match strategy {
            LockStrategy::ReadWrite => Volatile::ReadWrite(RwVolatile::new(value)),
            LockStrategy::Snapshot => Volatile::Snapshot(SnapshotVolatile::new(value)),
        }
    }

    pub fn strategy(&self) -> LockStrategy {
        match self {
            Volatile::ReadWrite(_) => LockStrategy::ReadWrite,
            Volatile::Snapshot(_) => LockStrategy::Snapshot,
        }
    }
}

impl<T: Clone + Send + Sync> VolatileLock<T> for Volatile<T> {
    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self {
            Volatile::ReadWrite(lock) => lock.read(f),
            Volatile::Snapshot(lock) => lock.read(f),
        }
    }

    fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        match self {
            Volatile::ReadWrite(lock) => lock.write(f),
            Volatile::Snapshot(lock) => lock.write(f),
        }
    }
}
