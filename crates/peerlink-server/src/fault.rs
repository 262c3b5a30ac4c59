//! Fault injection for the listener endpoints.
//!
//! Each endpoint simulates an unreliable peer: a processing delay drawn from a
//! configurable distribution, then an optional forced failure. The delay is
//! raced against server shutdown; an interrupted delay answers HTTP 500.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;

/// Processing delay applied before a listener answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayDistribution {
    None,
    Fixed { ms: u64 },
    /// Uniform in `[0, max_ms)`.
    Uniform { max_ms: u64 },
}

impl DelayDistribution {
    fn sample(&self, rng: &mut impl Rng) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed { ms } => Duration::from_millis(ms),
            Self::Uniform { max_ms: 0 } => Duration::ZERO,
            Self::Uniform { max_ms } => Duration::from_millis(rng.gen_range(0..max_ms)),
        }
    }
}

/// What the listener should do after the simulated processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    Proceed,
    /// A forced failure was drawn.
    Fail,
    /// Shutdown began while the delay was running.
    Interrupted,
}

/// Delay distribution plus forced-failure rate for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FaultInjector {
    #[serde(default = "no_delay")]
    pub delay: DelayDistribution,
    /// Probability in `[0.0, 1.0]` of answering HTTP 500 after the delay.
    #[serde(default)]
    pub failure_rate: f64,
}

fn no_delay() -> DelayDistribution {
    DelayDistribution::None
}

impl FaultInjector {
    /// Injects nothing.
    pub fn disabled() -> Self {
        Self {
            delay: DelayDistribution::None,
            failure_rate: 0.0,
        }
    }

    /// `/ping` default: uniform delay in `[0, 550)` ms, no forced failures.
    pub fn ping_default() -> Self {
        Self {
            delay: DelayDistribution::Uniform { max_ms: 550 },
            failure_rate: 0.0,
        }
    }

    /// `/dpac` default: uniform delay in `[0, 2250)` ms, no forced failures.
    pub fn dpac_default() -> Self {
        Self {
            delay: DelayDistribution::Uniform { max_ms: 2250 },
            failure_rate: 0.0,
        }
    }

    /// Draws the delay and whether the request fails.
    pub fn sample(&self) -> (Duration, bool) {
        let mut rng = rand::thread_rng();
        let delay = self.delay.sample(&mut rng);
        let fail = self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate.min(1.0));
        (delay, fail)
    }

    /// Runs the simulated processing for one request.
    pub async fn apply(&self, shutdown: &mut watch::Receiver<bool>) -> FaultOutcome {
        // `thread_rng` is not `Send`; draw before the first await.
        let (delay, fail) = self.sample();

        if !delay.is_zero() {
            let stopping = async {
                // A dropped sender means shutdown can no longer be signalled.
                if shutdown.wait_for(|stopping| *stopping).await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopping => return FaultOutcome::Interrupted,
            }
        }

        if fail {
            FaultOutcome::Fail
        } else {
            FaultOutcome::Proceed
        }
    }
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::disabled()
    }
}
