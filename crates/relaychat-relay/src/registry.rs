//! The connection registry: the live set of connected participants.
//!
//! The registry stores only [`Weak`] references. The connection's own
//! handler task holds the one strong reference, so dropping that task
//! tears the connection down no matter what the registry contains.
//!
//! Entries are removed exclusively by dropping the [`RegistryGuard`]
//! returned from [`Registry::register`]. The guard lives in the
//! connection's handler, so removal happens exactly once, when that
//! handler exits (cleanly, on error, or by panic unwinding).
//!
//! # Concurrency note
//!
//! A `std::sync::Mutex` guards the map. No lock is ever held across an
//! `.await`: broadcasts take a [`snapshot`](Registry::snapshot) and send
//! after releasing the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use relaychat_transport::{Connection, ConnectionId};

use crate::RelayError;

struct Entry<C> {
    conn: Weak<C>,
    name: Option<String>,
}

/// A registry member as seen by one broadcast.
pub struct Participant<C> {
    pub id: ConnectionId,
    pub conn: Arc<C>,
    pub name: Option<String>,
}

/// Live set of connected participants, keyed by connection ID.
///
/// Cloning is cheap and yields a handle to the same set.
pub struct Registry<C> {
    entries: Arc<Mutex<HashMap<ConnectionId, Entry<C>>>>,
}

impl<C> Clone for Registry<C> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<C: Connection> Registry<C> {
    /// Adds `conn` to the registry.
    ///
    /// Keep the returned guard alive for as long as the connection is
    /// being served; dropping it removes the entry.
    ///
    /// # Errors
    /// - [`RelayError::Full`] if `limit` participants are already present
    /// - [`RelayError::AlreadyRegistered`] if the ID is already present
    pub fn register(
        &self,
        conn: &Arc<C>,
        limit: Option<usize>,
    ) -> Result<RegistryGuard<C>, RelayError> {
        let id = conn.id();
        let mut entries = self.lock();
        if let Some(max) = limit {
            if entries.len() >= max {
                return Err(RelayError::Full(entries.len()));
            }
        }
        if entries.contains_key(&id) {
            return Err(RelayError::AlreadyRegistered(id));
        }
        entries.insert(
            id,
            Entry {
                conn: Arc::downgrade(conn),
                name: None,
            },
        );
        tracing::debug!(%id, participants = entries.len(), "registered");
        Ok(RegistryGuard {
            registry: self.clone(),
            id,
        })
    }
}

impl<C> Registry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Poisoning only means another task panicked mid-update; the map
    /// itself is still consistent, so keep going.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Entry<C>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Copies out the current members.
    ///
    /// Entries whose connection has already been dropped are skipped;
    /// their guards will remove them shortly.
    pub fn snapshot(&self) -> Vec<Participant<C>> {
        let mut participants: Vec<_> = self
            .lock()
            .iter()
            .filter_map(|(id, entry)| {
                entry.conn.upgrade().map(|conn| Participant {
                    id: *id,
                    conn,
                    name: entry.name.clone(),
                })
            })
            .collect();
        participants.sort_by_key(|p| p.id);
        participants
    }

    /// Records a display name for `id`. Returns `false` if `id` is not
    /// registered.
    pub fn rename(&self, id: ConnectionId, name: impl Into<String>) -> bool {
        match self.lock().get_mut(&id) {
            Some(entry) => {
                entry.name = Some(name.into());
                true
            }
            None => false,
        }
    }

    /// The display name recorded for `id`, if any.
    pub fn display_name(&self, id: ConnectionId) -> Option<String> {
        self.lock().get(&id).and_then(|entry| entry.name.clone())
    }

    /// Returns `true` if an entry was actually removed.
    fn remove(&self, id: ConnectionId) -> bool {
        let mut entries = self.lock();
        let removed = entries.remove(&id).is_some();
        if removed {
            tracing::debug!(%id, participants = entries.len(), "unregistered");
        }
        removed
    }
}

/// Removes its registry entry when dropped.
pub struct RegistryGuard<C> {
    registry: Registry<C>,
    id: ConnectionId,
}

impl<C> RegistryGuard<C> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<C> Drop for RegistryGuard<C> {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;

    #[test]
    fn test_register_and_guard_drop() {
        let registry = Registry::new();
        let conn = MockConnection::arc(1);

        let guard = registry.register(&conn, None).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(conn.id()));

        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removal_is_idempotent() {
        let registry = Registry::new();
        let conn = MockConnection::arc(1);
        let guard = registry.register(&conn, None).unwrap();

        assert!(registry.remove(conn.id()));
        assert!(!registry.remove(conn.id()));
        drop(guard);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_limit_rejects_without_mutating() {
        let registry = Registry::new();
        let a = MockConnection::arc(1);
        let b = MockConnection::arc(2);
        let _guard = registry.register(&a, Some(1)).unwrap();

        let err = registry.register(&b, Some(1)).err().unwrap();
        assert!(matches!(err, RelayError::Full(1)));
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(b.id()));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = Registry::new();
        let conn = MockConnection::arc(1);
        let _guard = registry.register(&conn, None).unwrap();
        assert!(matches!(
            registry.register(&conn, None),
            Err(RelayError::AlreadyRegistered(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_does_not_keep_connections_alive() {
        let registry = Registry::new();
        let conn = MockConnection::arc(1);
        let _guard = registry.register(&conn, None).unwrap();

        let weak = Arc::downgrade(&conn);
        drop(conn);
        assert!(weak.upgrade().is_none());
        // The entry lingers until the guard drops, but snapshots skip it.
        assert_eq!(registry.len(), 1);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_rename_and_display_name() {
        let registry = Registry::new();
        let conn = MockConnection::arc(3);
        let _guard = registry.register(&conn, None).unwrap();

        assert_eq!(registry.display_name(conn.id()), None);
        assert!(registry.rename(conn.id(), "zoe"));
        assert_eq!(registry.display_name(conn.id()).as_deref(), Some("zoe"));
        assert!(!registry.rename(ConnectionId::new(999), "ghost"));
    }

    #[test]
    fn test_concurrent_guard_drops_remove_exactly_one_each() {
        let registry = Registry::new();
        let conns: Vec<_> = (1..=32).map(MockConnection::arc).collect();
        let guards: Vec<_> = conns
            .iter()
            .map(|c| registry.register(c, None).unwrap())
            .collect();
        assert_eq!(registry.len(), 32);

        let handles: Vec<_> = guards
            .into_iter()
            .map(|guard| std::thread::spawn(move || drop(guard)))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
