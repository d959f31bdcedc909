//! Error types for the service registry.

use std::fmt;

use thiserror::Error;

/// Which endpoint of a service a port lookup asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Rpc,
    Http,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc => f.write_str("gRPC"),
            Self::Http => f.write_str("HTTP"),
        }
    }
}

/// Errors returned by registry backends.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No location is known for the service.
    #[error("service {service} not registered")]
    NotRegistered { service: String },

    /// The service is known but does not expose the requested endpoint.
    #[error("service {service} has no {endpoint} port available")]
    PortUnavailable {
        service: String,
        endpoint: EndpointKind,
    },

    /// The service is known but lacks the requested annotation.
    #[error("service {service} doesn't have annotation values for {annotation}")]
    AnnotationNotFound { service: String, annotation: String },

    /// Establishing the transport connection failed.
    #[error("service {service} connection error: {source}")]
    DialFailed {
        service: String,
        #[source]
        source: registry_transport_grpc::DialError,
    },

    /// The orchestrator could not answer a discovery query.
    #[error("orchestrator query failed: {source}")]
    Orchestrator {
        #[source]
        source: anyhow::Error,
    },

    /// A static source document could not be read or parsed.
    #[error("invalid service registry source {origin}: {message}")]
    InvalidSource { origin: String, message: String },

    /// Required bootstrap input is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RegistryError {
    pub(crate) fn not_registered(service: &str) -> Self {
        Self::NotRegistered {
            service: service.to_owned(),
        }
    }

    pub(crate) fn port_unavailable(service: &str, endpoint: EndpointKind) -> Self {
        Self::PortUnavailable {
            service: service.to_owned(),
            endpoint,
        }
    }

    pub(crate) fn annotation_not_found(service: &str, annotation: &str) -> Self {
        Self::AnnotationNotFound {
            service: service.to_owned(),
            annotation: annotation.to_owned(),
        }
    }

    /// Whether the error means the name itself is unknown.
    #[must_use]
    pub fn is_not_registered(&self) -> bool {
        matches!(self, Self::NotRegistered { .. })
    }
}
