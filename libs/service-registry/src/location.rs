//! Service location - where a platform service can be reached

use std::collections::BTreeMap;
use std::fmt;

/// Registry entry identifying a service by name and the host/ports it runs on.
///
/// A port value of `0` means the endpoint is not available.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceLocation {
    /// Name of the service. Case-insensitive; backends store it lowercased.
    pub name: String,
    /// Host name or IP of the service.
    pub host: String,
    /// gRPC endpoint port.
    pub port: u16,
    /// HTTP endpoint port.
    pub http_port: u16,
    /// Alternate `host -> port` pairs the service is also known as.
    pub proxy_aliases: BTreeMap<String, u16>,
    /// Tags used to group services. Only key presence matters for lookups.
    pub labels: BTreeMap<String, String>,
    /// Arbitrary per-service metadata.
    pub annotations: BTreeMap<String, String>,
}

impl ServiceLocation {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    #[must_use]
    pub fn with_proxy_alias(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy_aliases.insert(host.into(), port);
        self
    }

    /// Tag the service with `label`.
    #[must_use]
    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.with_label_value(label, "true")
    }

    #[must_use]
    pub fn with_label_value(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(label.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// gRPC address: `host` when no port is configured, `host:port` otherwise.
    #[must_use]
    pub fn rpc_address(&self) -> String {
        if self.port == 0 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// HTTP address, if an HTTP port is configured.
    #[must_use]
    pub fn http_address(&self) -> Option<String> {
        (self.http_port != 0).then(|| format!("{}:{}", self.host, self.http_port))
    }

    /// Copy of this location with the name lowercased.
    #[must_use]
    pub(crate) fn normalized(mut self) -> Self {
        self.name = normalize_name(&self.name);
        self
    }
}

/// Rendered as `<name> @ host:port (also known as: host:port, ...)`.
impl fmt::Display for ServiceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}:{}", self.name, self.host, self.port)?;
        if !self.proxy_aliases.is_empty() {
            let aliases: Vec<String> = self
                .proxy_aliases
                .iter()
                .map(|(host, port)| format!("{host}:{port}"))
                .collect();
            write!(f, " (also known as: {})", aliases.join(", "))?;
        }
        Ok(())
    }
}

/// Case-fold a service name the way every backend keys it.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}
