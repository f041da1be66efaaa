//! Registry of active connections.
//!
//! Two tiers:
//!
//! - The registry holds the servers and clients opened by the host, each in
//!   registration order, behind one lock.
//! - Each server holds its accepted children behind its own lock.
//!
//! The registry lock guards membership only. It is never taken while a
//! connection's lock is held, and lookups snapshot the server list before
//! touching any child list.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;

use crate::identifiers::ConnectionId;

use super::connection::{Connection, Role};

// ============================================================================
// Registry
// ============================================================================

/// Active servers and clients of one device.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    servers: Vec<Arc<Connection>>,
    clients: Vec<Arc<Connection>>,
}

impl RegistryInner {
    fn set_for(&mut self, role: Role) -> Option<&mut Vec<Arc<Connection>>> {
        match role {
            Role::Server => Some(&mut self.servers),
            Role::Client => Some(&mut self.clients),
            Role::AcceptedChild => None,
        }
    }
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a server or client.
    ///
    /// Returns `false` for accepted children, which belong to their
    /// server's child list instead.
    pub fn register(&self, connection: Arc<Connection>) -> bool {
        let mut inner = self.inner.write();
        match inner.set_for(connection.role()) {
            Some(set) => {
                set.push(connection);
                true
            }
            None => false,
        }
    }

    /// Removes a server or client by id.
    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        for set in [&mut inner.servers, &mut inner.clients] {
            if let Some(index) = set.iter().position(|c| c.id() == id) {
                return Some(set.remove(index));
            }
        }
        None
    }

    /// Finds a connection by id, including accepted children.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let servers = {
            let inner = self.inner.read();
            let direct = inner
                .servers
                .iter()
                .chain(inner.clients.iter())
                .find(|c| c.id() == id)
                .cloned();
            if direct.is_some() {
                return direct;
            }
            inner.servers.clone()
        };

        servers
            .iter()
            .flat_map(|server| server.children())
            .find(|child| child.id() == id)
    }

    /// Returns `true` if `id` names a registered connection or child.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.get(id).is_some()
    }

    /// Returns server ids in registration order.
    #[must_use]
    pub fn servers(&self) -> Vec<ConnectionId> {
        self.inner.read().servers.iter().map(|c| c.id()).collect()
    }

    /// Returns client ids in registration order.
    #[must_use]
    pub fn clients(&self) -> Vec<ConnectionId> {
        self.inner.read().clients.iter().map(|c| c.id()).collect()
    }

    /// Returns the number of registered servers and clients.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.servers.len() + inner.clients.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::Endpoint;

    fn server() -> Arc<Connection> {
        Connection::server(Endpoint::new("127.0.0.1", 0), Endpoint::new("127.0.0.1", 5000))
    }

    #[test]
    fn test_register_keeps_order() {
        let registry = Registry::new();
        let a = server();
        let b = server();
        assert!(registry.register(Arc::clone(&a)));
        assert!(registry.register(Arc::clone(&b)));

        assert_eq!(registry.servers(), [a.id(), b.id()]);
        assert!(registry.clients().is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_children_are_not_registered_directly() {
        let registry = Registry::new();
        let parent = server();
        let child = Connection::accepted(&parent);

        assert!(!registry.register(child));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_finds_children_through_servers() {
        let registry = Registry::new();
        let parent = server();
        registry.register(Arc::clone(&parent));

        let child = Connection::accepted(&parent);
        parent.add_child(Arc::clone(&child));

        let found = registry.get(child.id()).expect("child lookup");
        assert!(Arc::ptr_eq(&found, &child));
        assert!(registry.contains(parent.id()));
        assert!(!registry.contains(ConnectionId::next()));
    }

    #[test]
    fn test_unregister() {
        let registry = Registry::new();
        let a = server();
        registry.register(Arc::clone(&a));

        assert!(registry.unregister(a.id()).is_some());
        assert!(registry.unregister(a.id()).is_none());
        assert!(registry.servers().is_empty());
    }
}
