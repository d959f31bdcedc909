#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! gRPC transport for the service registry.
//!
//! Provides the [`DialPolicy`] applied whenever the registry establishes a
//! connection to a service, the two named [`DialProfile`]s, and the per-call
//! [`CallTimeout`] interceptor baked into every returned [`GrpcConnection`].

pub mod dial;
pub mod interceptor;

pub use dial::{DialError, DialPolicy, DialProfile, dial};
pub use interceptor::{CallTimeout, GrpcConnection};

/// Upper bound on the delay between two dial attempts.
pub const GRPC_MAX_DELAY_SEC: u64 = 10;

/// Default per-call timeout for calls made from gateway processes.
pub const GRPC_MAX_LOCAL_TIMEOUT_SEC: u64 = 30;

/// Overall dial deadline, and the default per-call timeout for cloud callers.
pub const GRPC_MAX_TIMEOUT_SEC: u64 = 60;
