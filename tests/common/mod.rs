//! Shared helpers for breaker integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use circuit_guard::BreakerOptions;
use futures_util::future::{BoxFuture, FutureExt};

/// What the scripted dependency does on one call.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Succeed,
    Fail,
    /// Succeed, but only after the given delay.
    SlowSucceed(Duration),
    /// Fail, but only after the given delay.
    SlowFail(Duration),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("dependency failed on call {0}")]
pub struct DependencyError(pub usize);

/// A dependency that plays back a script, then succeeds forever.
#[derive(Clone, Default)]
pub struct ScriptedDependency {
    steps: Arc<Mutex<VecDeque<Step>>>,
    calls: Arc<AtomicUsize>,
    settled: Arc<AtomicUsize>,
}

impl ScriptedDependency {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let dependency = Self::default();
        dependency.steps.lock().unwrap().extend(steps);
        dependency
    }

    /// Times the dependency was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Times an invocation ran to completion.
    pub fn settled(&self) -> usize {
        self.settled.load(Ordering::SeqCst)
    }

    pub fn call(&self) -> BoxFuture<'static, Result<usize, DependencyError>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Succeed);
        let settled = self.settled.clone();
        async move {
            let outcome = match step {
                Step::Succeed => Ok(n),
                Step::Fail => Err(DependencyError(n)),
                Step::SlowSucceed(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(n)
                }
                Step::SlowFail(delay) => {
                    tokio::time::sleep(delay).await;
                    Err(DependencyError(n))
                }
            };
            settled.fetch_add(1, Ordering::SeqCst);
            outcome
        }
        .boxed()
    }
}

/// `timeout=50ms, errorThreshold=50%, resetTimeout=200ms`.
pub fn options(volume_threshold: u64) -> BreakerOptions {
    BreakerOptions::new(Duration::from_millis(50), 50.0, Duration::from_millis(200))
        .with_volume_threshold(volume_threshold)
        .with_name("scripted")
}
