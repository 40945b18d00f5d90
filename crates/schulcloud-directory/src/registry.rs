//! Per-client registry of cached directory connections.
//!
//! One slot exists per configuration identifier, guarded by its own async
//! mutex: concurrent callers for the same directory serialize on the slot,
//! so at most one bind is ever in flight per identifier and at most one
//! handle is cached. The registry is owned by the client instance that
//! created it; there is no process-wide state.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::client::DirectorySession;
use schulcloud_core::{Error, Result};

/// Cached state for one configuration identifier.
#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) session: Option<Box<dyn DirectorySession>>,
}

/// Registry mapping configuration identifiers to connection slots.
pub struct ConnectionRegistry {
    slots: Mutex<HashMap<String, Arc<Mutex<Slot>>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Locks the slot for the given identifier, creating it if absent.
    ///
    /// The returned handle holds the slot lock until dropped.
    pub(crate) async fn acquire(&self, id: &str) -> ConnectionHandle {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(
                slots
                    .entry(id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(Slot::default()))),
            )
        };
        ConnectionHandle {
            id: id.to_string(),
            guard: slot.lock_owned().await,
        }
    }

    /// Removes the slot for the given identifier, returning it if present.
    pub(crate) async fn remove(&self, id: &str) -> Option<Arc<Mutex<Slot>>> {
        self.slots.lock().await.remove(id)
    }

    /// Returns true if a slot is registered for the identifier.
    pub(crate) async fn is_registered(&self, id: &str) -> bool {
        self.slots.lock().await.contains_key(id)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// An exclusively-held connection slot for one directory server.
///
/// Holding the handle gives the caller sole use of the cached session; the
/// slot unlocks when the handle is dropped.
pub struct ConnectionHandle {
    id: String,
    guard: OwnedMutexGuard<Slot>,
}

impl ConnectionHandle {
    /// Identifier of the configuration this handle belongs to.
    #[must_use]
    pub fn config_id(&self) -> &str {
        &self.id
    }

    /// Returns true if a session is cached and still reports connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.guard
            .session
            .as_ref()
            .is_some_and(|session| session.is_connected())
    }

    /// Replaces the cached session.
    pub(crate) fn install(&mut self, session: Box<dyn DirectorySession>) {
        self.guard.session = Some(session);
    }

    /// Borrows the cached session for use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Directory`] if no session has been established.
    pub(crate) fn session(&mut self) -> Result<&mut dyn DirectorySession> {
        match self.guard.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(Error::Directory {
                server: self.id.clone(),
                message: "connection handle has no established session".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockDirectorySession;
    use std::time::Duration;

    fn connected_session() -> Box<dyn DirectorySession> {
        let mut session = MockDirectorySession::new();
        session.expect_is_connected().return_const(true);
        Box::new(session)
    }

    #[tokio::test]
    async fn acquire_reuses_slot_per_identifier() {
        let registry = ConnectionRegistry::new();

        let mut handle = registry.acquire("s1").await;
        assert!(!handle.is_connected());
        handle.install(connected_session());
        assert!(handle.is_connected());
        drop(handle);

        let handle = registry.acquire("s1").await;
        assert!(handle.is_connected());
        assert_eq!(handle.config_id(), "s1");

        assert!(registry.is_registered("s1").await);
        assert!(!registry.is_registered("s2").await);
    }

    #[tokio::test]
    async fn slots_are_independent_across_identifiers() {
        let registry = ConnectionRegistry::new();

        let mut first = registry.acquire("s1").await;
        first.install(connected_session());

        // A different identifier must not block on s1's held lock.
        let second = tokio::time::timeout(Duration::from_millis(50), registry.acquire("s2"))
            .await
            .expect("independent slot should lock immediately");
        assert!(!second.is_connected());
    }

    #[tokio::test]
    async fn acquire_serializes_same_identifier() {
        let registry = Arc::new(ConnectionRegistry::new());

        let held = registry.acquire("s1").await;
        let contended = tokio::time::timeout(Duration::from_millis(50), registry.acquire("s1"));
        assert!(contended.await.is_err(), "slot lock should still be held");
        drop(held);

        let handle = tokio::time::timeout(Duration::from_millis(50), registry.acquire("s1"))
            .await
            .expect("released slot should lock immediately");
        assert_eq!(handle.config_id(), "s1");
    }

    #[tokio::test]
    async fn remove_returns_slot_once() {
        let registry = ConnectionRegistry::new();
        registry.acquire("s1").await.install(connected_session());

        assert!(registry.remove("s1").await.is_some());
        assert!(registry.remove("s1").await.is_none());
        assert!(!registry.is_registered("s1").await);
    }
}
