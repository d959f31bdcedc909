//! Connection cache with lazy, de-duplicated dialing.
//!
//! Connections live in a map guarded by the owning backend's lock. Lookups
//! take the read lock only; dialing happens with no lock held, and the result
//! is published under the write lock after re-checking for a concurrent
//! winner. A losing dial is closed right away, so at most one connection per
//! service survives.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::RwLock;

use crate::connector::Connector;
use crate::error::RegistryError;

/// Backend state that holds the connection map.
pub trait ConnSlots<C> {
    fn slots(&self) -> &HashMap<String, C>;
    fn slots_mut(&mut self) -> &mut HashMap<String, C>;
}

/// Connection map for backends with no other state under their lock.
pub struct ConnectionMap<C> {
    conns: HashMap<String, C>,
}

impl<C> Default for ConnectionMap<C> {
    fn default() -> Self {
        Self {
            conns: HashMap::new(),
        }
    }
}

impl<C> ConnSlots<C> for ConnectionMap<C> {
    fn slots(&self) -> &HashMap<String, C> {
        &self.conns
    }

    fn slots_mut(&mut self) -> &mut HashMap<String, C> {
        &mut self.conns
    }
}

/// Return the cached connection for `service`, dialing it on a miss.
///
/// `service` must already be normalized. `resolve` yields the address to dial
/// and is only called on a miss. `still_current(state, address)` is checked
/// under the write lock before publishing: if the service was removed or
/// re-registered at another address while dialing, the fresh connection is
/// closed and resolution starts over.
pub async fn get_or_dial<S, K, F, R, V>(
    state: &RwLock<S>,
    connector: &K,
    service: &str,
    resolve: F,
    still_current: V,
) -> Result<K::Connection, RegistryError>
where
    S: ConnSlots<K::Connection>,
    K: Connector,
    F: Fn() -> R + Send + Sync,
    R: Future<Output = Result<String, RegistryError>> + Send,
    V: Fn(&S, &str) -> bool + Send + Sync,
{
    loop {
        let cached = state.read().slots().get(service).cloned();
        if let Some(conn) = cached {
            tracing::trace!(service, "connection cache hit");
            return Ok(conn);
        }

        tracing::debug!(service, "connection cache miss, dialing");
        let address = resolve().await?;
        let fresh = connector.connect(service, &address).await?;

        let outcome = {
            let mut guard = state.write();
            if let Some(existing) = guard.slots().get(service).cloned() {
                Publish::LostRace(existing, fresh)
            } else if still_current(&guard, &address) {
                guard.slots_mut().insert(service.to_owned(), fresh.clone());
                Publish::Stored(fresh)
            } else {
                Publish::Stale(fresh)
            }
        };

        match outcome {
            Publish::Stored(conn) => return Ok(conn),
            Publish::LostRace(winner, discarded) => {
                tracing::debug!(service, "lost dial race, discarding duplicate connection");
                close_logged(connector, service, discarded);
                return Ok(winner);
            }
            Publish::Stale(discarded) => {
                tracing::debug!(
                    service,
                    address = %address,
                    "location changed while dialing, discarding connection"
                );
                close_logged(connector, service, discarded);
            }
        }
    }
}

enum Publish<C> {
    Stored(C),
    LostRace(C, C),
    Stale(C),
}

/// Close a connection that left the cache, logging any failure.
pub fn close_logged<K: Connector>(connector: &K, service: &str, conn: K::Connection) {
    if let Err(e) = connector.close(conn) {
        tracing::error!(service, error = %e, "error closing unneeded gRPC connection");
    }
}
