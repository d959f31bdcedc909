//! Dial policy and blocking connection establishment.
//!
//! A [`DialPolicy`] controls:
//! - the per-attempt connect timeout and HTTP/2 keepalive of the channel
//! - a bounded exponential backoff between failed attempts
//! - the overall dial deadline after which [`dial`] gives up
//! - the per-call default timeout installed by the [`CallTimeout`] interceptor
//!
//! Dialing is blocking: [`dial`] keeps retrying until the channel is connected
//! or the deadline elapses. Connections are plaintext; TLS is expected to be
//! layered on by the caller when required.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Endpoint;
use tracing::Instrument;

use crate::interceptor::{CallTimeout, GrpcConnection};
use crate::{GRPC_MAX_DELAY_SEC, GRPC_MAX_LOCAL_TIMEOUT_SEC, GRPC_MAX_TIMEOUT_SEC};

fn duration_to_u64_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Where the calling process runs, which decides the per-call timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialProfile {
    /// Calls originating inside the control-plane cluster.
    #[default]
    Cloud,
    /// Calls originating from edge/gateway processes.
    Gateway,
}

impl DialProfile {
    /// Default deadline applied to calls that do not set their own.
    #[must_use]
    pub fn call_timeout(self) -> Duration {
        match self {
            Self::Cloud => Duration::from_secs(GRPC_MAX_TIMEOUT_SEC),
            Self::Gateway => Duration::from_secs(GRPC_MAX_LOCAL_TIMEOUT_SEC),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Gateway => "gateway",
        }
    }
}

/// Errors produced while establishing a connection.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("invalid dial target '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("dialing '{address}' did not complete within {deadline:?}{}", last_error_suffix(.last_error.as_deref()))]
    DeadlineExceeded {
        address: String,
        deadline: Duration,
        last_error: Option<String>,
    },
}

fn last_error_suffix(last_error: Option<&str>) -> String {
    last_error.map(|e| format!(" (last error: {e})")).unwrap_or_default()
}

/// Connection establishment settings.
///
/// Built from a [`DialProfile`]; the profile only changes `call_timeout`,
/// everything else is shared.
#[derive(Debug, Clone)]
pub struct DialPolicy {
    /// Profile this policy was derived from.
    pub profile: DialProfile,

    /// Timeout for a single connect attempt.
    pub connect_timeout: Duration,

    /// Deadline for the whole dial, across all attempts.
    pub dial_deadline: Duration,

    /// Delay after the first failed attempt. Doubles after each failure.
    pub base_backoff: Duration,

    /// Ceiling for the delay between attempts.
    pub max_backoff: Duration,

    /// Default timeout applied to calls made through the connection.
    pub call_timeout: Duration,

    /// HTTP/2 keepalive ping interval.
    pub keepalive_interval: Duration,

    /// How long to wait for a keepalive ping acknowledgement.
    pub keepalive_timeout: Duration,
}

impl Default for DialPolicy {
    fn default() -> Self {
        Self::for_profile(DialProfile::Cloud)
    }
}

impl DialPolicy {
    /// Policy for calls originating inside the cluster.
    #[must_use]
    pub fn cloud() -> Self {
        Self::for_profile(DialProfile::Cloud)
    }

    /// Policy for calls originating from gateways.
    #[must_use]
    pub fn gateway() -> Self {
        Self::for_profile(DialProfile::Gateway)
    }

    #[must_use]
    pub fn for_profile(profile: DialProfile) -> Self {
        Self {
            profile,
            connect_timeout: Duration::from_secs(10),
            dial_deadline: Duration::from_secs(GRPC_MAX_TIMEOUT_SEC),
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(GRPC_MAX_DELAY_SEC),
            call_timeout: profile.call_timeout(),
            keepalive_interval: Duration::from_secs(31),
            keepalive_timeout: Duration::from_secs(10),
        }
    }

    /// Set the per-attempt connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the overall dial deadline.
    #[must_use]
    pub fn with_dial_deadline(mut self, deadline: Duration) -> Self {
        self.dial_deadline = deadline;
        self
    }

    /// Set the backoff bounds between attempts.
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    /// Override the default per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Interceptor installed on every connection dialed with this policy.
    #[must_use]
    pub fn interceptor(&self) -> CallTimeout {
        CallTimeout::new(self.call_timeout)
    }

    /// Backoff before attempt `attempt + 1`, given `attempt` failures so far.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

/// Build a tonic `Endpoint` for `address` (`host` or `host:port`).
fn build_endpoint(address: &str, policy: &DialPolicy) -> Result<Endpoint, DialError> {
    let uri = format!("http://{address}");
    let endpoint = Endpoint::from_shared(uri)
        .map_err(|source| DialError::InvalidAddress {
            address: address.to_owned(),
            source,
        })?
        .connect_timeout(policy.connect_timeout)
        .tcp_keepalive(Some(policy.keepalive_interval))
        .http2_keep_alive_interval(policy.keepalive_interval)
        .keep_alive_timeout(policy.keepalive_timeout)
        .keep_alive_while_idle(true);

    Ok(endpoint)
}

/// Dial `address` under `policy`, blocking until connected or the dial
/// deadline elapses.
///
/// Failed attempts are retried with exponential backoff capped at
/// `policy.max_backoff`. The returned connection carries the policy's
/// [`CallTimeout`] interceptor.
///
/// # Errors
/// Returns [`DialError::InvalidAddress`] if `address` cannot form a URI, and
/// [`DialError::DeadlineExceeded`] if no attempt succeeded in time.
pub async fn dial(address: &str, policy: &DialPolicy) -> Result<GrpcConnection, DialError> {
    let span = tracing::debug_span!(
        "grpc_dial",
        profile = policy.profile.as_str(),
        address = %address
    );

    async move {
        let endpoint = build_endpoint(address, policy)?;
        let mut last_error: Option<String> = None;
        let mut attempt: u32 = 0;

        let attempts = async {
            loop {
                attempt += 1;
                match endpoint.connect().await {
                    Ok(channel) => return channel,
                    Err(e) => {
                        let backoff = policy.backoff_for(attempt);
                        tracing::warn!(
                            attempt,
                            error = %e,
                            backoff_ms = duration_to_u64_ms(backoff),
                            "gRPC dial attempt failed, retrying..."
                        );
                        last_error = Some(e.to_string());
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        };

        let outcome = tokio::time::timeout(policy.dial_deadline, attempts).await;
        match outcome {
            Ok(channel) => {
                tracing::info!(
                    attempts = attempt,
                    call_timeout_ms = duration_to_u64_ms(policy.call_timeout),
                    "gRPC connection established"
                );
                Ok(InterceptedService::new(channel, policy.interceptor()))
            }
            Err(_) => {
                tracing::error!(
                    attempts = attempt,
                    deadline_ms = duration_to_u64_ms(policy.dial_deadline),
                    "gRPC dial gave up"
                );
                Err(DialError::DeadlineExceeded {
                    address: address.to_owned(),
                    deadline: policy.dial_deadline,
                    last_error,
                })
            }
        }
    }
    .instrument(span)
    .await
}
