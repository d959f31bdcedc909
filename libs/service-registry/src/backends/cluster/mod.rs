//! Cluster registry - read-only view over the cluster orchestrator.
//!
//! Nothing about locations is stored: each query lists the platform's
//! service objects in the configured namespace. Only connections are cached.

mod client;
mod memory;
mod naming;

pub use client::{ClusterClient, ClusterService, LabelSelector, ServicePort};
pub use memory::InMemoryCluster;
pub use naming::{CLUSTER_SERVICE_PREFIX, from_cluster_name, to_cluster_name};

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::api::ServiceRegistry;
use crate::conn_cache::{ConnectionMap, get_or_dial};
use crate::connector::{Connector, GrpcConnector};
use crate::error::{EndpointKind, RegistryError};
use crate::location::{ServiceLocation, normalize_name};

/// Label every platform service object carries.
pub const PART_OF_LABEL: &str = "app.kubernetes.io/part-of";
/// Value of [`PART_OF_LABEL`] marking platform membership.
pub const PART_OF_ORC8R_APP: &str = "orc8r-app";
/// Name of the port serving gRPC.
pub const GRPC_PORT_NAME: &str = "grpc";
/// Name of the port serving HTTP.
pub const HTTP_PORT_NAME: &str = "http";
/// Environment variable holding the deployment namespace.
pub const NAMESPACE_ENV_VAR: &str = "SERVICE_REGISTRY_NAMESPACE";

/// Registry answering every query from the cluster orchestrator.
pub struct ClusterRegistry<K: Connector = GrpcConnector> {
    client: Arc<dyn ClusterClient>,
    namespace: String,
    connector: K,
    conns: RwLock<ConnectionMap<K::Connection>>,
}

impl<K: Connector> std::fmt::Debug for ClusterRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterRegistry")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl<K: Connector> ClusterRegistry<K> {
    /// Registry over `namespace`.
    ///
    /// # Errors
    /// Returns [`RegistryError::Configuration`] if `namespace` is empty.
    pub fn new(
        client: Arc<dyn ClusterClient>,
        namespace: impl Into<String>,
        connector: K,
    ) -> Result<Self, RegistryError> {
        let namespace = namespace.into();
        if namespace.trim().is_empty() {
            return Err(RegistryError::Configuration(format!(
                "environment variable {NAMESPACE_ENV_VAR} must be set to the deployment's release namespace"
            )));
        }
        Ok(Self {
            client,
            namespace,
            connector,
            conns: RwLock::new(ConnectionMap::default()),
        })
    }

    /// Registry over the namespace named by [`NAMESPACE_ENV_VAR`].
    ///
    /// # Errors
    /// Returns [`RegistryError::Configuration`] if the variable is unset or empty.
    pub fn from_env(client: Arc<dyn ClusterClient>, connector: K) -> Result<Self, RegistryError> {
        let namespace = std::env::var(NAMESPACE_ENV_VAR).unwrap_or_default();
        Self::new(client, namespace, connector)
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn membership() -> LabelSelector {
        LabelSelector::new().with(PART_OF_LABEL, PART_OF_ORC8R_APP)
    }

    async fn list(&self, selector: &LabelSelector) -> Result<Vec<ClusterService>, RegistryError> {
        tracing::debug!(namespace = %self.namespace, selector = %selector, "listing cluster services");
        self.client
            .list_services(&self.namespace, selector)
            .await
            .map_err(|source| RegistryError::Orchestrator { source })
    }

    async fn service_names(&self, selector: &LabelSelector) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .list(selector)
            .await?
            .iter()
            .map(|s| from_cluster_name(&s.name))
            .collect())
    }

    /// Service object backing the platform service `service`.
    async fn lookup(&self, service: &str) -> Result<ClusterService, RegistryError> {
        let service = normalize_name(service);
        let object_name = to_cluster_name(&service);
        self.list(&Self::membership())
            .await?
            .into_iter()
            .find(|s| s.name == object_name)
            .ok_or_else(|| RegistryError::not_registered(&service))
    }

    async fn named_port(
        &self,
        service: &str,
        endpoint: EndpointKind,
    ) -> Result<(ClusterService, u16), RegistryError> {
        let object = self.lookup(service).await?;
        let port_name = match endpoint {
            EndpointKind::Rpc => GRPC_PORT_NAME,
            EndpointKind::Http => HTTP_PORT_NAME,
        };
        let port = object
            .port_named(port_name)
            .ok_or_else(|| RegistryError::port_unavailable(&normalize_name(service), endpoint))?;
        Ok((object, port))
    }

    async fn address_for(
        &self,
        service: &str,
        endpoint: EndpointKind,
    ) -> Result<String, RegistryError> {
        let (object, port) = self.named_port(service, endpoint).await?;
        Ok(format!("{}:{port}", object.name))
    }
}

#[async_trait]
impl<K: Connector> ServiceRegistry for ClusterRegistry<K> {
    type Connection = K::Connection;

    async fn list_all(&self) -> Result<Vec<String>, RegistryError> {
        self.service_names(&Self::membership()).await
    }

    async fn find(&self, label: &str) -> Result<Vec<String>, RegistryError> {
        self.service_names(&Self::membership().with(label, "true"))
            .await
    }

    async fn resolve_address(&self, service: &str) -> Result<String, RegistryError> {
        self.address_for(service, EndpointKind::Rpc).await
    }

    async fn resolve_port(&self, service: &str) -> Result<u16, RegistryError> {
        Ok(self.named_port(service, EndpointKind::Rpc).await?.1)
    }

    async fn resolve_http_address(&self, service: &str) -> Result<String, RegistryError> {
        self.address_for(service, EndpointKind::Http).await
    }

    async fn resolve_http_port(&self, service: &str) -> Result<u16, RegistryError> {
        Ok(self.named_port(service, EndpointKind::Http).await?.1)
    }

    async fn get_annotation(
        &self,
        service: &str,
        annotation: &str,
    ) -> Result<String, RegistryError> {
        let object = self.lookup(service).await?;
        object
            .annotations
            .get(annotation)
            .cloned()
            .ok_or_else(|| RegistryError::annotation_not_found(&normalize_name(service), annotation))
    }

    fn add(&self, locations: Vec<ServiceLocation>) {
        tracing::debug!(
            count = locations.len(),
            "ignoring add on cluster registry; locations come from the orchestrator"
        );
    }

    fn remove(&self, service: &str) {
        tracing::debug!(service, "ignoring remove on cluster registry");
    }

    fn remove_with_label(&self, label: &str) {
        tracing::debug!(label, "ignoring remove_with_label on cluster registry");
    }

    async fn get_connection(&self, service: &str) -> Result<Self::Connection, RegistryError> {
        let service = normalize_name(service);
        let name = service.as_str();
        // No local location state to re-check against.
        get_or_dial(
            &self.conns,
            &self.connector,
            name,
            move || self.resolve_address(name),
            |_: &ConnectionMap<K::Connection>, _: &str| true,
        )
        .await
    }
}
