//! Per-call timeout interceptor.

use std::time::Duration;

use tonic::service::Interceptor;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Channel;
use tonic::{Request, Status};

/// Metadata key carrying the caller's deadline on the wire.
const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Transport handle handed out by the registry.
///
/// Cloning is cheap and every clone shares the same underlying HTTP/2
/// connection. Generated clients accept it directly, e.g.
/// `MyServiceClient::new(conn)`.
pub type GrpcConnection = InterceptedService<Channel, CallTimeout>;

/// Applies a default deadline to calls that do not carry one.
///
/// Calls which already set `grpc-timeout` (for example through
/// [`Request::set_timeout`]) are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeout {
    timeout: Duration,
}

impl CallTimeout {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Interceptor for CallTimeout {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if !request.metadata().contains_key(GRPC_TIMEOUT_HEADER) {
            request.set_timeout(self.timeout);
        }
        Ok(request)
    }
}
