//! YAML source for the static registry.
//!
//! Each platform module ships `<config_dir>/<module>/service_registry.yml`:
//!
//! ```yaml
//! services:
//!   directoryd:
//!     host: "localhost"
//!     port: 9100
//!     echo_port: 10100
//!     proxy_aliases:
//!       directoryd.internal:
//!         port: 9101
//!     labels:
//!       orc8r.io/state_indexer: "true"
//!     annotations:
//!       orc8r.io/state_indexer_types: "directory_record"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::RegistryError;
use crate::location::ServiceLocation;

/// File name looked up inside every module directory.
pub const SERVICE_REGISTRY_FILE: &str = "service_registry.yml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDocument {
    #[serde(default)]
    services: BTreeMap<String, ServiceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceEntry {
    host: String,
    #[serde(default)]
    port: u16,
    #[serde(default, alias = "http_port")]
    echo_port: u16,
    #[serde(default)]
    proxy_aliases: BTreeMap<String, AliasEntry>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AliasEntry {
    port: u16,
}

impl ServiceEntry {
    fn into_location(self, name: String) -> ServiceLocation {
        ServiceLocation {
            name,
            host: self.host,
            port: self.port,
            http_port: self.echo_port,
            proxy_aliases: self
                .proxy_aliases
                .into_iter()
                .map(|(host, alias)| (host, alias.port))
                .collect(),
            labels: self.labels,
            annotations: self.annotations,
        }
        .normalized()
    }
}

/// Parse one registry document. `origin` names the input in errors.
///
/// # Errors
/// Returns [`RegistryError::InvalidSource`] if the document is not valid.
pub fn parse_locations(yaml: &str, origin: &str) -> Result<Vec<ServiceLocation>, RegistryError> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc: RegistryDocument =
        serde_saphyr::from_str(yaml).map_err(|e| RegistryError::InvalidSource {
            origin: origin.to_owned(),
            message: e.to_string(),
        })?;
    Ok(doc
        .services
        .into_iter()
        .map(|(name, entry)| entry.into_location(name))
        .collect())
}

/// Load every `<dir>/<module>/service_registry.yml`.
///
/// Modules are visited in name order; modules without the file are skipped.
///
/// # Errors
/// Returns [`RegistryError::InvalidSource`] if `dir` cannot be listed or a
/// file cannot be read or parsed.
pub fn load_locations_from_dir(dir: &Path) -> Result<Vec<ServiceLocation>, RegistryError> {
    let io_error = |path: &Path, e: std::io::Error| RegistryError::InvalidSource {
        origin: path.display().to_string(),
        message: e.to_string(),
    };

    let mut modules: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| io_error(dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    modules.sort();

    let mut locations = Vec::new();
    for module in modules {
        let file = module.join(SERVICE_REGISTRY_FILE);
        if !file.is_file() {
            tracing::debug!(module = %module.display(), "no service registry file, skipping");
            continue;
        }
        let content = std::fs::read_to_string(&file).map_err(|e| io_error(&file, e))?;
        let parsed = parse_locations(&content, &file.display().to_string())?;
        tracing::debug!(file = %file.display(), services = parsed.len(), "loaded service registry file");
        locations.extend(parsed);
    }
    Ok(locations)
}
