//! Signal source trait: the engine's boundary with acquisition code
//!
//! A source wraps one black-box capability probe and yields zero or more
//! observations. Sources never touch the ledger; the engine applies what
//! they return. A source may suspend while awaiting an asynchronous
//! capability query, and may fail independently without affecting the run.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::ProbeError;
use crate::observation::Observation;

/// One observation source
///
/// Implementations must be pure with respect to the ledger: probing reads
/// platform state and produces observation values, nothing else.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Source name for the step trace and logs
    fn name(&self) -> &str;

    /// Run the capability probe and convert the raw result into observations
    ///
    /// An empty vec means the signal did not fire; absence is not evidence.
    ///
    /// # Errors
    /// Returns `ProbeError` when the underlying probe fails; the engine
    /// isolates the failure to this source.
    async fn probe(&self) -> Result<Vec<Observation>, ProbeError>;
}

impl std::fmt::Debug for dyn SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSource")
            .field("name", &self.name())
            .finish()
    }
}

type SourceFn =
    Box<dyn Fn() -> BoxFuture<'static, Result<Vec<Observation>, ProbeError>> + Send + Sync>;

/// Signal source backed by an arbitrary async closure
///
/// The integration seam for callers whose acquisition logic does not fit
/// the rule-table adapters, and the workhorse of engine tests.
pub struct FnSource {
    name: String,
    probe_fn: SourceFn,
}

impl FnSource {
    /// Wrap an async closure as a signal source
    pub fn new<F, Fut>(name: impl Into<String>, probe_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Vec<Observation>, ProbeError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            probe_fn: Box::new(move || probe_fn().boxed()),
        }
    }
}

#[async_trait]
impl SignalSource for FnSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<Vec<Observation>, ProbeError> {
        (self.probe_fn)().await
    }
}

// ============================================================================
// Mock Source for Testing
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::time::Duration;

    /// Mock source with fixed observations, optional failure, optional delay
    pub struct MockSource {
        pub name: &'static str,
        pub observations: Vec<Observation>,
        pub should_fail: bool,
        pub delay: Option<Duration>,
    }

    impl MockSource {
        pub fn firing(name: &'static str, observations: Vec<Observation>) -> Self {
            Self {
                name,
                observations,
                should_fail: false,
                delay: None,
            }
        }

        pub fn silent(name: &'static str) -> Self {
            Self::firing(name, Vec::new())
        }

        pub fn failing(name: &'static str) -> Self {
            Self {
                name,
                observations: Vec::new(),
                should_fail: true,
                delay: None,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl SignalSource for MockSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn probe(&self) -> Result<Vec<Observation>, ProbeError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.should_fail {
                Err(ProbeError::Internal("mock failure".to_string()))
            } else {
                Ok(self.observations.clone())
            }
        }
    }
}
