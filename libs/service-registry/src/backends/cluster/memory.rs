//! In-process orchestrator for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::client::{ClusterClient, ClusterService, LabelSelector};

/// [`ClusterClient`] over an in-memory list of services per namespace.
///
/// Listing preserves insertion order.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    namespaces: RwLock<HashMap<String, Vec<ClusterService>>>,
}

impl InMemoryCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the service object with the same name.
    pub fn insert(&self, namespace: &str, service: ClusterService) {
        let mut namespaces = self.namespaces.write();
        let services = namespaces.entry(namespace.to_owned()).or_default();
        if let Some(existing) = services.iter_mut().find(|s| s.name == service.name) {
            *existing = service;
        } else {
            services.push(service);
        }
    }

    /// Delete a service object; returns whether it existed.
    pub fn delete(&self, namespace: &str, name: &str) -> bool {
        let mut namespaces = self.namespaces.write();
        let Some(services) = namespaces.get_mut(namespace) else {
            return false;
        };
        let before = services.len();
        services.retain(|s| s.name != name);
        services.len() != before
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn list_services(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> anyhow::Result<Vec<ClusterService>> {
        let namespaces = self.namespaces.read();
        Ok(namespaces
            .get(namespace)
            .map(|services| {
                services
                    .iter()
                    .filter(|s| selector.matches(&s.labels))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
