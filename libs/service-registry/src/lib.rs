#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Service discovery for platform services.
//!
//! A [`ServiceRegistry`] maps a logical service name to its gRPC and HTTP
//! endpoints, labels and annotations, and hands out one shared, lazily dialed
//! connection per service. Two backends implement it:
//!
//! - [`StaticRegistry`]: locations registered in-process, typically loaded
//!   from per-module `service_registry.yml` files.
//! - [`ClusterRegistry`]: read-only view computed from the cluster
//!   orchestrator on every query.
//!
//! [`bootstrap::build_registry`] picks one from [`RegistryConfig`].

pub mod api;
pub mod backends;
pub mod bootstrap;
pub mod config;
mod conn_cache;
pub mod connector;
pub mod error;
pub mod location;
pub mod source;

pub use api::{ANNOTATION_FIELD_SEPARATOR, ServiceRegistry, split_annotation_list};
pub use backends::cluster::{
    ClusterClient, ClusterService, InMemoryCluster, LabelSelector, ServicePort,
};
pub use backends::{ClusterRegistry, StaticRegistry};
pub use bootstrap::{SharedRegistry, build_registry, fresh_connection, init_tracing};
pub use config::{RegistryConfig, RegistryMode};
pub use connector::{Connector, GrpcConnector};
pub use error::{EndpointKind, RegistryError};
pub use location::{ServiceLocation, normalize_name};
pub use source::{load_locations_from_dir, parse_locations};

pub use registry_transport_grpc::{DialError, DialPolicy, DialProfile, GrpcConnection};
