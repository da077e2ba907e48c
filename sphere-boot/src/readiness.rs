//! Readiness wait for external service dependencies.
//!
//! Polls each dependency's TCP port until a connection succeeds. The default
//! policy never gives up and sleeps a fixed second between attempts; a
//! bounded policy turns a dependency that never comes up into a fatal
//! [`BootError::DependencyUnreachable`].

use crate::error::BootError;
use sphere_common::{ReadinessState, ServiceDependency, WaitSettings};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

/// Delay schedule between failed attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^(attempt-1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { base, max } => {
                let attempt = attempt.max(1);
                let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(multiplier).min(*max)
            }
        }
    }
}

/// Retry policy for the readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    pub backoff: Backoff,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Stop retrying once this much time has passed since the first attempt.
    pub max_elapsed: Option<Duration>,
    /// Timeout for a single connection attempt.
    pub connect_timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::Fixed(Duration::from_secs(1)),
            max_attempts: None,
            max_elapsed: None,
            connect_timeout: Duration::from_secs(1),
        }
    }
}

impl WaitPolicy {
    pub fn from_settings(settings: &WaitSettings) -> Self {
        let backoff = if settings.exponential {
            Backoff::Exponential {
                base: settings.interval(),
                max: settings.max_interval(),
            }
        } else {
            Backoff::Fixed(settings.interval())
        };
        Self {
            backoff,
            max_attempts: settings.max_attempts.map(|n| n.max(1)),
            max_elapsed: None,
            connect_timeout: settings.connect_timeout(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = Some(max_elapsed);
        self
    }

    fn exhausted(&self, attempt: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
            || self.max_elapsed.is_some_and(|max| elapsed >= max)
    }
}

/// One connection attempt against a dependency.
pub trait ServiceProbe {
    fn probe(
        &self,
        dep: &ServiceDependency,
        timeout: Duration,
    ) -> impl Future<Output = io::Result<()>> + Send;
}

impl<P: ServiceProbe> ServiceProbe for &P {
    fn probe(
        &self,
        dep: &ServiceDependency,
        timeout: Duration,
    ) -> impl Future<Output = io::Result<()>> + Send {
        (**self).probe(dep, timeout)
    }
}

/// Plain TCP connect; the connection is dropped immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl ServiceProbe for TcpProbe {
    fn probe(
        &self,
        dep: &ServiceDependency,
        limit: Duration,
    ) -> impl Future<Output = io::Result<()>> + Send {
        let address = dep.address();
        async move {
            match timeout(limit, TcpStream::connect(&address)).await {
                Ok(Ok(_stream)) => Ok(()),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {address} timed out after {limit:?}"),
                )),
            }
        }
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome {
    pub service: String,
    pub state: ReadinessState,
    /// Connection attempts made, including the successful one.
    pub attempts: u32,
    pub waited: Duration,
}

/// Block until `dep` accepts a TCP connection.
pub async fn wait_for_service<P: ServiceProbe>(
    dep: &ServiceDependency,
    policy: &WaitPolicy,
    probe: &P,
) -> Result<WaitOutcome, BootError> {
    let started = Instant::now();
    let mut state = ReadinessState::Unknown;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match probe.probe(dep, policy.connect_timeout).await {
            Ok(()) => {
                state = state.advance(ReadinessState::Ready);
                let waited = started.elapsed();
                info!(
                    service = %dep.name,
                    address = %dep.address(),
                    attempts = attempt,
                    waited_ms = waited.as_millis() as u64,
                    "{} is up",
                    dep.name
                );
                return Ok(WaitOutcome {
                    service: dep.name.clone(),
                    state,
                    attempts: attempt,
                    waited,
                });
            }
            Err(err) => {
                state = state.advance(ReadinessState::Waiting);
                if policy.exhausted(attempt, started.elapsed()) {
                    warn!(
                        service = %dep.name,
                        address = %dep.address(),
                        attempts = attempt,
                        error = %err,
                        "Giving up on {}",
                        dep.name
                    );
                    return Err(BootError::DependencyUnreachable {
                        service: dep.name.clone(),
                        address: dep.address(),
                        attempts: attempt,
                    });
                }
                let delay = policy.backoff.delay(attempt);
                info!(
                    service = %dep.name,
                    attempt,
                    error = %err,
                    "{} is unavailable - sleeping",
                    dep.name
                );
                debug!(service = %dep.name, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
                sleep(delay).await;
            }
        }
    }
}

/// Wait for every dependency in declaration order.
pub async fn wait_for_services<P: ServiceProbe>(
    deps: &[ServiceDependency],
    policy: &WaitPolicy,
    probe: &P,
) -> Result<Vec<WaitOutcome>, BootError> {
    let mut outcomes = Vec::with_capacity(deps.len());
    for dep in deps {
        outcomes.push(wait_for_service(dep, policy, probe).await?);
    }
    Ok(outcomes)
}
