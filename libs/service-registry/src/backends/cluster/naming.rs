//! Platform <-> cluster service naming.
//!
//! Cluster services are deployed as `orc8r-<service-name>` with hyphens,
//! platform services use underscores.

/// Prefix of every platform service object in the cluster.
pub const CLUSTER_SERVICE_PREFIX: &str = "orc8r-";

/// `foo_bar` -> `orc8r-foo-bar`.
#[must_use]
pub fn to_cluster_name(service: &str) -> String {
    format!("{CLUSTER_SERVICE_PREFIX}{}", service.replace('_', "-"))
}

/// `orc8r-foo-bar` -> `foo_bar`.
#[must_use]
pub fn from_cluster_name(object_name: &str) -> String {
    object_name
        .strip_prefix(CLUSTER_SERVICE_PREFIX)
        .unwrap_or(object_name)
        .replace('-', "_")
}
