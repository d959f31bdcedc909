//! Registry contract shared by every backend.

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::location::ServiceLocation;

/// Separator between fields of list-valued annotations.
pub const ANNOTATION_FIELD_SEPARATOR: char = ',';

/// Resolves platform service names to addresses, metadata and connections.
///
/// Names are case-insensitive: every method lowercases the name it is given.
/// Mutating methods only take effect on backends that own their locations;
/// backends reflecting external state treat them as no-ops.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Transport handle returned by [`ServiceRegistry::get_connection`].
    type Connection: Clone + Send + Sync + 'static;

    /// Names of all known services.
    async fn list_all(&self) -> Result<Vec<String>, RegistryError>;

    /// Names of all services tagged with `label`.
    async fn find(&self, label: &str) -> Result<Vec<String>, RegistryError>;

    /// Address of the service's gRPC server.
    async fn resolve_address(&self, service: &str) -> Result<String, RegistryError>;

    /// Port of the service's gRPC server.
    async fn resolve_port(&self, service: &str) -> Result<u16, RegistryError>;

    /// Address of the service's HTTP server.
    async fn resolve_http_address(&self, service: &str) -> Result<String, RegistryError>;

    /// Port of the service's HTTP server.
    async fn resolve_http_port(&self, service: &str) -> Result<u16, RegistryError>;

    /// Raw value of the service's `annotation`.
    async fn get_annotation(&self, service: &str, annotation: &str)
    -> Result<String, RegistryError>;

    /// Fields of a list-valued annotation.
    ///
    /// See [`split_annotation_list`] for the decoding rules.
    async fn get_annotation_list(
        &self,
        service: &str,
        annotation: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let value = self.get_annotation(service, annotation).await?;
        Ok(split_annotation_list(&value))
    }

    /// Add or replace services. Replacing evicts the cached connection.
    fn add(&self, locations: Vec<ServiceLocation>);

    /// Remove a service and evict its cached connection.
    fn remove(&self, service: &str);

    /// Remove every service tagged with `label`.
    fn remove_with_label(&self, label: &str);

    /// Shared, lazily dialed connection to the service.
    ///
    /// The first caller dials; later callers reuse the cached handle.
    async fn get_connection(&self, service: &str) -> Result<Self::Connection, RegistryError>;
}

/// Decode a list-valued annotation.
///
/// Splits on [`ANNOTATION_FIELD_SEPARATOR`], strips all whitespace (including
/// newlines) from each field and drops fields left empty. Order is kept.
#[must_use]
pub fn split_annotation_list(value: &str) -> Vec<String> {
    value
        .split(ANNOTATION_FIELD_SEPARATOR)
        .map(|field| field.split_whitespace().collect::<String>())
        .filter(|field| !field.is_empty())
        .collect()
}
