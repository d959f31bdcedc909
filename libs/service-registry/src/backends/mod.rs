//! Registry backends.

pub mod cluster;
pub mod static_registry;

pub use cluster::ClusterRegistry;
pub use static_registry::StaticRegistry;
