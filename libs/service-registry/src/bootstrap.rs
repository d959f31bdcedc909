//! Process-level wiring: logging, backend selection, uncached connections.

use std::sync::Arc;

use registry_transport_grpc::{DialPolicy, GrpcConnection, dial};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::ServiceRegistry;
use crate::backends::cluster::{ClusterClient, ClusterRegistry};
use crate::backends::static_registry::StaticRegistry;
use crate::config::{RegistryConfig, RegistryMode};
use crate::connector::GrpcConnector;
use crate::error::RegistryError;
use crate::location::normalize_name;
use crate::source::load_locations_from_dir;

/// Registry handing out gRPC connections, whatever the backend.
pub type SharedRegistry = Arc<dyn ServiceRegistry<Connection = GrpcConnection>>;

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if installed.is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}

/// Build the backend selected by `config`.
///
/// The static backend is pre-populated from `config.config_dir` when set.
/// The cluster backend needs `cluster` and a namespace.
///
/// # Errors
/// Returns [`RegistryError::InvalidSource`] if a static source file is bad,
/// or [`RegistryError::Configuration`] if cluster mode lacks its inputs.
pub fn build_registry(
    config: &RegistryConfig,
    cluster: Option<Arc<dyn ClusterClient>>,
) -> Result<SharedRegistry, RegistryError> {
    let connector = GrpcConnector::new(DialPolicy::for_profile(config.profile));
    let mode = config.mode();

    let registry: SharedRegistry = match mode {
        RegistryMode::Static => {
            let registry = StaticRegistry::new(connector);
            if let Some(dir) = &config.config_dir {
                registry.add(load_locations_from_dir(dir)?);
            }
            Arc::new(registry)
        }
        RegistryMode::Cluster => {
            let client = cluster.ok_or_else(|| {
                RegistryError::Configuration(
                    "cluster mode requires an orchestrator client".to_owned(),
                )
            })?;
            let namespace = config.namespace.clone().unwrap_or_default();
            Arc::new(ClusterRegistry::new(client, namespace, connector)?)
        }
    };

    tracing::info!(mode = %mode, profile = config.profile.as_str(), "service registry ready");
    Ok(registry)
}

/// Dial `service` with `policy`, bypassing the registry's connection cache.
///
/// Used to act as a different kind of caller (e.g. a gateway) without
/// sharing the cached connection.
///
/// # Errors
/// Returns the registry's resolution error, or [`RegistryError::DialFailed`].
pub async fn fresh_connection<R>(
    registry: &R,
    service: &str,
    policy: &DialPolicy,
) -> Result<GrpcConnection, RegistryError>
where
    R: ServiceRegistry + ?Sized,
{
    let service = normalize_name(service);
    let address = registry.resolve_address(&service).await?;
    dial(&address, policy)
        .await
        .map_err(|source| RegistryError::DialFailed { service, source })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::backends::cluster::{ClusterService, InMemoryCluster};

    #[test]
    fn static_is_the_default() {
        let registry = build_registry(&RegistryConfig::default(), None);
        assert!(registry.is_ok());
    }

    #[test]
    fn cluster_mode_needs_client_and_namespace() {
        let config = RegistryConfig {
            mode: Some("k8s".to_owned()),
            namespace: Some("orc8r".to_owned()),
            ..Default::default()
        };
        assert!(matches!(
            build_registry(&config, None),
            Err(RegistryError::Configuration(_))
        ));

        let no_namespace = RegistryConfig {
            namespace: None,
            ..config.clone()
        };
        let client: Arc<dyn ClusterClient> = Arc::new(InMemoryCluster::new());
        assert!(matches!(
            build_registry(&no_namespace, Some(client.clone())),
            Err(RegistryError::Configuration(_))
        ));

        assert!(build_registry(&config, Some(client)).is_ok());
    }

    #[tokio::test]
    async fn cluster_registry_is_wired_to_client() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.insert(
            "orc8r",
            ClusterService::new("orc8r-state")
                .with_label("app.kubernetes.io/part-of", "orc8r-app")
                .with_port("grpc", 9180),
        );
        let config = RegistryConfig {
            mode: Some("k8s".to_owned()),
            namespace: Some("orc8r".to_owned()),
            ..Default::default()
        };
        let client: Arc<dyn ClusterClient> = cluster;
        let registry = build_registry(&config, Some(client)).unwrap();
        assert_eq!(
            registry.resolve_address("state").await.unwrap(),
            "orc8r-state:9180"
        );
    }

    #[tokio::test]
    async fn fresh_connection_reports_unknown_service() {
        let registry = build_registry(&RegistryConfig::default(), None).unwrap();
        let result = fresh_connection(registry.as_ref(), "Missing", &DialPolicy::gateway()).await;
        assert!(matches!(result, Err(RegistryError::NotRegistered { service }) if service == "missing"));
    }
}
