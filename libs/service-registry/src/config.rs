//! Registry configuration from the environment.

use std::fmt;
use std::path::PathBuf;

use figment::Figment;
use figment::providers::{Env, Serialized};
use registry_transport_grpc::DialProfile;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RegistryError;

/// Prefix of every configuration environment variable.
pub const ENV_PREFIX: &str = "SERVICE_REGISTRY_";

/// Which backend answers discovery queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistryMode {
    /// Locations registered in-process.
    #[default]
    Static,
    /// Locations read from the cluster orchestrator.
    Cluster,
}

impl RegistryMode {
    /// Lenient parse: unknown or missing values fall back to
    /// [`RegistryMode::Static`] with a warning.
    #[must_use]
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("yaml" | "static") => Self::Static,
            Some("k8s" | "cluster") => Self::Cluster,
            Some(other) => {
                tracing::warn!(
                    mode = other,
                    "unrecognized service registry mode, defaulting to static"
                );
                Self::Static
            }
            None => {
                tracing::warn!("service registry mode not set, defaulting to static");
                Self::Static
            }
        }
    }
}

impl fmt::Display for RegistryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("static"),
            Self::Cluster => f.write_str("cluster"),
        }
    }
}

/// Raw settings under the `SERVICE_REGISTRY_` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// `yaml`/`static` or `k8s`/`cluster`.
    #[serde(deserialize_with = "scalar_as_string")]
    pub mode: Option<String>,
    /// Orchestrator namespace, required in cluster mode.
    #[serde(deserialize_with = "scalar_as_string")]
    pub namespace: Option<String>,
    /// Directory of per-module `service_registry.yml` files.
    pub config_dir: Option<PathBuf>,
    pub profile: DialProfile,
}

/// Any scalar the environment provider may produce.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

/// Env values like `1` or `true` arrive typed; keep them as text.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Bool(b) => b.to_string(),
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Text(s) => s,
    }))
}

impl RegistryConfig {
    /// Read the configuration from `SERVICE_REGISTRY_*` variables.
    ///
    /// # Errors
    /// Returns [`RegistryError::Configuration`] if a variable holds a value of
    /// the wrong shape (e.g. an unknown profile).
    pub fn from_env() -> Result<Self, RegistryError> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    /// Extract from an arbitrary figment (tests, layered sources).
    ///
    /// # Errors
    /// Returns [`RegistryError::Configuration`] if extraction fails.
    pub fn from_figment(figment: Figment) -> Result<Self, RegistryError> {
        figment
            .extract()
            .map_err(|e| RegistryError::Configuration(e.to_string()))
    }

    /// Selected backend, falling back to static on bad input.
    #[must_use]
    pub fn mode(&self) -> RegistryMode {
        RegistryMode::from_setting(self.mode.as_deref())
    }
}
