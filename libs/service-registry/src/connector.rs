//! Connector - how a backend turns a resolved address into a transport handle

use async_trait::async_trait;
use registry_transport_grpc::{DialPolicy, GrpcConnection, dial};

use crate::error::RegistryError;

/// Establishes and releases transport connections for a backend's cache.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Clone + Send + Sync + 'static;

    /// Dial `address` on behalf of `service`.
    ///
    /// May block for as long as the connector's dial deadline allows.
    ///
    /// # Errors
    /// Returns [`RegistryError::DialFailed`] if no connection could be made.
    async fn connect(&self, service: &str, address: &str)
    -> Result<Self::Connection, RegistryError>;

    /// Close a connection that is no longer cached.
    ///
    /// # Errors
    /// Returns an error if the transport reports a failure while closing;
    /// callers only log it.
    fn close(&self, conn: Self::Connection) -> anyhow::Result<()>;
}

/// Connector dialing gRPC channels under a [`DialPolicy`].
#[derive(Debug, Clone, Default)]
pub struct GrpcConnector {
    policy: DialPolicy,
}

impl GrpcConnector {
    #[must_use]
    pub fn new(policy: DialPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &DialPolicy {
        &self.policy
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    type Connection = GrpcConnection;

    async fn connect(
        &self,
        service: &str,
        address: &str,
    ) -> Result<Self::Connection, RegistryError> {
        dial(address, &self.policy)
            .await
            .map_err(|source| RegistryError::DialFailed {
                service: service.to_owned(),
                source,
            })
    }

    fn close(&self, conn: Self::Connection) -> anyhow::Result<()> {
        // Dropping the last clone shuts the channel down.
        drop(conn);
        Ok(())
    }
}
