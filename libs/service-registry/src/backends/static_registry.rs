//! Static registry - locations registered explicitly in-process.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::api::ServiceRegistry;
use crate::conn_cache::{ConnSlots, close_logged, get_or_dial};
use crate::connector::{Connector, GrpcConnector};
use crate::error::{EndpointKind, RegistryError};
use crate::location::{ServiceLocation, normalize_name};

/// Locations and connections; one lock covers both so that removing a
/// location and evicting its connection happen together.
struct StaticState<C> {
    locations: HashMap<String, ServiceLocation>,
    conns: HashMap<String, C>,
}

impl<C> ConnSlots<C> for StaticState<C> {
    fn slots(&self) -> &HashMap<String, C> {
        &self.conns
    }

    fn slots_mut(&mut self) -> &mut HashMap<String, C> {
        &mut self.conns
    }
}

/// Registry populated from explicit registrations (bootstrap files, tests).
pub struct StaticRegistry<K: Connector = GrpcConnector> {
    state: RwLock<StaticState<K::Connection>>,
    connector: K,
}

impl<K: Connector> std::fmt::Debug for StaticRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("StaticRegistry")
            .field("services", &state.locations.len())
            .field("connections", &state.conns.len())
            .finish_non_exhaustive()
    }
}

impl Default for StaticRegistry<GrpcConnector> {
    fn default() -> Self {
        Self::new(GrpcConnector::default())
    }
}

impl<K: Connector> StaticRegistry<K> {
    #[must_use]
    pub fn new(connector: K) -> Self {
        Self {
            state: RwLock::new(StaticState {
                locations: HashMap::new(),
                conns: HashMap::new(),
            }),
            connector,
        }
    }

    /// Registry pre-populated with `locations`.
    #[must_use]
    pub fn with_locations(connector: K, locations: Vec<ServiceLocation>) -> Self {
        let registry = Self::new(connector);
        registry.add(locations);
        registry
    }

    /// Copy of the registered location for `service`.
    #[must_use]
    pub fn location(&self, service: &str) -> Option<ServiceLocation> {
        self.state
            .read()
            .locations
            .get(&normalize_name(service))
            .cloned()
    }

    /// Number of cached connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.read().conns.len()
    }

    /// Run `f` against the location for `service` under the read lock.
    fn with_location<T>(
        &self,
        service: &str,
        f: impl FnOnce(&ServiceLocation) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let service = normalize_name(service);
        let state = self.state.read();
        let location = state
            .locations
            .get(&service)
            .ok_or_else(|| RegistryError::not_registered(&service))?;
        f(location)
    }

    fn close_evicted(&self, evicted: Vec<(String, K::Connection)>) {
        for (service, conn) in evicted {
            tracing::debug!(service = %service, "evicting cached connection");
            close_logged(&self.connector, &service, conn);
        }
    }

    fn names_where(&self, pred: impl Fn(&ServiceLocation) -> bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .read()
            .locations
            .values()
            .filter(|loc| pred(loc))
            .map(|loc| loc.name.clone())
            .collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl<K: Connector> ServiceRegistry for StaticRegistry<K> {
    type Connection = K::Connection;

    async fn list_all(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.names_where(|_| true))
    }

    async fn find(&self, label: &str) -> Result<Vec<String>, RegistryError> {
        Ok(self.names_where(|loc| loc.has_label(label)))
    }

    async fn resolve_address(&self, service: &str) -> Result<String, RegistryError> {
        self.with_location(service, |loc| Ok(loc.rpc_address()))
    }

    async fn resolve_port(&self, service: &str) -> Result<u16, RegistryError> {
        self.with_location(service, |loc| {
            if loc.port == 0 {
                return Err(RegistryError::port_unavailable(&loc.name, EndpointKind::Rpc));
            }
            Ok(loc.port)
        })
    }

    async fn resolve_http_address(&self, service: &str) -> Result<String, RegistryError> {
        self.with_location(service, |loc| {
            loc.http_address()
                .ok_or_else(|| RegistryError::port_unavailable(&loc.name, EndpointKind::Http))
        })
    }

    async fn resolve_http_port(&self, service: &str) -> Result<u16, RegistryError> {
        self.with_location(service, |loc| {
            if loc.http_port == 0 {
                return Err(RegistryError::port_unavailable(&loc.name, EndpointKind::Http));
            }
            Ok(loc.http_port)
        })
    }

    async fn get_annotation(
        &self,
        service: &str,
        annotation: &str,
    ) -> Result<String, RegistryError> {
        self.with_location(service, |loc| {
            loc.annotations
                .get(annotation)
                .cloned()
                .ok_or_else(|| RegistryError::annotation_not_found(&loc.name, annotation))
        })
    }

    fn add(&self, locations: Vec<ServiceLocation>) {
        let evicted: Vec<(String, K::Connection)> = {
            let mut state = self.state.write();
            locations
                .into_iter()
                .filter_map(|location| {
                    let location = location.normalized();
                    let name = location.name.clone();
                    tracing::debug!(service = %location, "registering service");
                    state.locations.insert(name.clone(), location);
                    state.conns.remove(&name).map(|conn| (name, conn))
                })
                .collect()
        };
        self.close_evicted(evicted);
    }

    fn remove(&self, service: &str) {
        let service = normalize_name(service);
        let evicted = {
            let mut state = self.state.write();
            state.locations.remove(&service);
            state.conns.remove(&service)
        };
        if let Some(conn) = evicted {
            self.close_evicted(vec![(service, conn)]);
        }
    }

    fn remove_with_label(&self, label: &str) {
        let evicted: Vec<(String, K::Connection)> = {
            let mut state = self.state.write();
            let doomed: Vec<String> = state
                .locations
                .values()
                .filter(|loc| loc.has_label(label))
                .map(|loc| loc.name.clone())
                .collect();
            doomed
                .into_iter()
                .filter_map(|name| {
                    state.locations.remove(&name);
                    state.conns.remove(&name).map(|conn| (name, conn))
                })
                .collect()
        };
        self.close_evicted(evicted);
    }

    async fn get_connection(&self, service: &str) -> Result<Self::Connection, RegistryError> {
        let service = normalize_name(service);
        let name = service.as_str();
        get_or_dial(
            &self.state,
            &self.connector,
            name,
            move || self.resolve_address(name),
            move |state: &StaticState<K::Connection>, address: &str| {
                state
                    .locations
                    .get(name)
                    .is_some_and(|loc| loc.rpc_address() == address)
            },
        )
        .await
    }
}
