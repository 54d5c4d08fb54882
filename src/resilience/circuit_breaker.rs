//! Circuit breaker for protecting calls to a slow or failing dependency.
//!
//! # States
//! - Closed: normal operation, calls pass through and are measured
//! - Open: dependency assumed down, calls fail fast or use the fallback
//! - Half-Open: testing if the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: requests >= volume_threshold and error rate >= threshold
//! Open → Half-Open: first fire() after reset_timeout
//! Half-Open → Closed: trial call succeeds (window zeroed)
//! Half-Open → Open: any failure (new deadline)
//! ```
//!
//! # Design Decisions
//! - Owned per dependency, no global registry
//! - One lock over state, counters and deadline, never held across an await
//! - Single trial in Half-Open (prevents hammering a recovering dependency)
//! - Counters survive a trip and are zeroed only when the circuit closes
//! - No internal retries: one fire() is at most one wrapped call

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwapOption;
use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::timeouts::{execute_with_timeout, CallError};
use crate::resilience::types::{BreakerError, BreakerOptions, BreakerStats, CircuitState};

/// Longest honoured reset timeout; larger values would overflow the deadline.
const MAX_RESET_TIMEOUT: Duration = Duration::from_secs(86400 * 365 * 30);

type FallbackFn<A, T, E> = dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync;
type ClassifierFn<E> = dyn Fn(&E) -> bool + Send + Sync;

/// Substitute used in place of the protected call.
///
/// Boxed so it can sit behind an `ArcSwapOption`.
struct Fallback<A, T, E> {
    call: Box<FallbackFn<A, T, E>>,
}

/// Measurement window and state, guarded by a single mutex.
#[derive(Debug)]
struct Window {
    state: CircuitState,
    failures: u64,
    successes: u64,
    requests: u64,
    rejected: u64,
    next_attempt: Option<Instant>,
    /// Wall-clock twin of `next_attempt`, in epoch milliseconds.
    next_attempt_epoch_ms: Option<u64>,
    /// Id of the in-flight Half-Open trial.
    trial: Option<u64>,
    trial_seq: u64,
}

impl Window {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            requests: 0,
            rejected: 0,
            next_attempt: None,
            next_attempt_epoch_ms: None,
            trial: None,
            trial_seq: 0,
        }
    }

    fn error_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.failures as f64 / self.requests as f64 * 100.0
        }
    }

    fn begin_trial(&mut self) -> u64 {
        self.trial_seq += 1;
        self.trial = Some(self.trial_seq);
        self.trial_seq
    }

    /// Clears the trial slot if `admission` owns it.
    fn settle_trial(&mut self, admission: Admission) -> bool {
        match admission {
            Admission::Trial(id) if self.trial == Some(id) => {
                self.trial = None;
                true
            }
            _ => false,
        }
    }
}

/// How a call was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial(u64),
}

/// A state change, reported after the lock is released.
#[derive(Debug, Clone, Copy)]
struct Transition {
    from: CircuitState,
    to: CircuitState,
    failures: u64,
    requests: u64,
    error_rate: f64,
}

fn lock(window: &Mutex<Window>) -> MutexGuard<'_, Window> {
    window.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the Half-Open trial slot if the trial's `fire` future is dropped
/// before it settles.
struct TrialGuard<'a> {
    window: &'a Mutex<Window>,
    admission: Option<Admission>,
}

impl<'a> TrialGuard<'a> {
    fn new(window: &'a Mutex<Window>, admission: Admission) -> Self {
        let admission = matches!(admission, Admission::Trial(_)).then_some(admission);
        Self { window, admission }
    }

    fn disarm(&mut self) {
        self.admission = None;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            lock(self.window).settle_trial(admission);
        }
    }
}

/// A circuit breaker around the async function `F`.
///
/// `F` takes the call arguments `A` and resolves to `Result<T, E>`. Share one
/// instance per protected dependency, typically behind an `Arc`.
pub struct CircuitBreaker<F, A, T, E> {
    action: F,
    options: BreakerOptions,
    window: Mutex<Window>,
    fallback: ArcSwapOption<Fallback<A, T, E>>,
    classifier: Option<Box<ClassifierFn<E>>>,
}

impl<F, A, T, E> CircuitBreaker<F, A, T, E> {
    /// Wrap `action`.
    ///
    /// The error threshold is clamped into 0–100 (NaN becomes 100) and the
    /// reset timeout is capped at 30 years.
    pub fn new(action: F, mut options: BreakerOptions) -> Self {
        let threshold = options.error_threshold_percentage;
        options.error_threshold_percentage = if threshold.is_nan() {
            100.0
        } else {
            threshold.clamp(0.0, 100.0)
        };
        options.reset_timeout = options.reset_timeout.min(MAX_RESET_TIMEOUT);
        Self {
            action,
            options,
            window: Mutex::new(Window::new()),
            fallback: ArcSwapOption::empty(),
            classifier: None,
        }
    }

    /// Decide which errors count as dependency failures.
    ///
    /// Errors for which `classify` returns `false` are recorded as successes
    /// and returned to the caller as-is, without the fallback. Timeouts
    /// always count as failures.
    pub fn with_error_classifier<C>(mut self, classify: C) -> Self
    where
        C: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.classifier = Some(Box::new(classify));
        self
    }

    pub fn with_fallback<G, Fut>(self, fallback: G) -> Self
    where
        G: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.set_fallback(fallback);
        self
    }

    /// Replace the async fallback. Calls already in flight keep the old one.
    pub fn set_fallback<G, Fut>(&self, fallback: G)
    where
        G: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let call: Box<FallbackFn<A, T, E>> = Box::new(move |args| fallback(args).boxed());
        self.fallback.store(Some(Arc::new(Fallback { call })));
    }

    /// Replace the fallback with a synchronous function.
    pub fn set_fallback_fn<G>(&self, fallback: G)
    where
        G: Fn(A) -> Result<T, E> + Send + Sync + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.set_fallback(move |args| future::ready(fallback(args)));
    }

    pub fn clear_fallback(&self) {
        self.fallback.store(None);
    }

    pub fn name(&self) -> &str {
        self.options.name()
    }

    pub fn options(&self) -> &BreakerOptions {
        &self.options
    }

    pub fn state(&self) -> CircuitState {
        lock(&self.window).state
    }

    pub fn stats(&self) -> BreakerStats {
        let window = lock(&self.window);
        let (deadline, deadline_epoch_ms) = match window.state {
            CircuitState::Open => (window.next_attempt, window.next_attempt_epoch_ms),
            _ => (None, None),
        };
        let retry_after = deadline.map(|at| at.saturating_duration_since(Instant::now()));

        BreakerStats {
            name: self.name().to_string(),
            state: window.state,
            failure_count: window.failures,
            success_count: window.successes,
            request_count: window.requests,
            rejected_count: window.rejected,
            error_rate: format!("{:.2}%", window.error_rate()),
            next_attempt: deadline_epoch_ms,
            retry_after_ms: retry_after.map(|remaining| remaining.as_millis() as u64),
        }
    }

    /// Operator override: close the circuit and zero the window from any state.
    pub fn manual_reset(&self) {
        let transition = {
            let mut window = lock(&self.window);
            window.rejected = 0;
            Self::reset(&mut window)
        };
        tracing::info!(breaker = %self.name(), from = %transition.from, "Circuit manually reset");
        if transition.from != CircuitState::Closed {
            self.report(Some(transition));
        }
    }

    /// Admission check. Moves Open → Half-Open once the deadline has passed.
    fn admit(&self) -> (Option<Admission>, Option<Transition>) {
        let now = Instant::now();
        let mut guard = lock(&self.window);
        let window = &mut *guard;
        match window.state {
            CircuitState::Closed => (Some(Admission::Normal), None),
            CircuitState::Open => {
                let elapsed = window.next_attempt.map_or(true, |at| now >= at);
                if !elapsed {
                    window.rejected += 1;
                    return (None, None);
                }
                window.state = CircuitState::HalfOpen;
                window.next_attempt = None;
                window.next_attempt_epoch_ms = None;
                let transition = Transition {
                    from: CircuitState::Open,
                    to: CircuitState::HalfOpen,
                    failures: window.failures,
                    requests: window.requests,
                    error_rate: window.error_rate(),
                };
                (Some(Admission::Trial(window.begin_trial())), Some(transition))
            }
            CircuitState::HalfOpen => {
                if window.trial.is_some() {
                    window.rejected += 1;
                    (None, None)
                } else {
                    (Some(Admission::Trial(window.begin_trial())), None)
                }
            }
        }
    }

    fn on_success(&self, admission: Admission) -> Option<Transition> {
        let mut guard = lock(&self.window);
        let window = &mut *guard;
        window.successes += 1;
        window.requests += 1;
        if window.settle_trial(admission) && window.state == CircuitState::HalfOpen {
            return Some(Self::reset(window));
        }
        None
    }

    fn on_failure(&self, admission: Admission) -> Option<Transition> {
        let mut guard = lock(&self.window);
        let window = &mut *guard;
        window.failures += 1;
        window.requests += 1;
        window.settle_trial(admission);
        let state = window.state;
        match state {
            CircuitState::HalfOpen => Some(self.trip(window)),
            CircuitState::Closed if self.threshold_reached(window) => Some(self.trip(window)),
            _ => None,
        }
    }

    fn threshold_reached(&self, window: &Window) -> bool {
        window.requests >= self.options.volume_threshold
            && window.error_rate() >= self.options.error_threshold_percentage
    }

    fn trip(&self, window: &mut Window) -> Transition {
        let from = window.state;
        window.state = CircuitState::Open;
        let reset_timeout = self.options.reset_timeout;
        window.next_attempt = Some(Instant::now() + reset_timeout);
        window.next_attempt_epoch_ms = Some(
            (SystemTime::now() + reset_timeout)
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        );
        window.trial = None;
        Transition {
            from,
            to: CircuitState::Open,
            failures: window.failures,
            requests: window.requests,
            error_rate: window.error_rate(),
        }
    }

    fn reset(window: &mut Window) -> Transition {
        let transition = Transition {
            from: window.state,
            to: CircuitState::Closed,
            failures: window.failures,
            requests: window.requests,
            error_rate: window.error_rate(),
        };
        window.state = CircuitState::Closed;
        window.failures = 0;
        window.successes = 0;
        window.requests = 0;
        window.next_attempt = None;
        window.next_attempt_epoch_ms = None;
        window.trial = None;
        transition
    }

    fn report(&self, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };
        let name = self.name();
        metrics::record_transition(name, transition.to);

        match (transition.from, transition.to) {
            (CircuitState::HalfOpen, CircuitState::Open) => tracing::warn!(
                breaker = %name,
                failures = transition.failures,
                requests = transition.requests,
                retry_after_ms = self.options.reset_timeout.as_millis() as u64,
                "Circuit reopened after failed trial"
            ),
            (_, CircuitState::Open) => tracing::warn!(
                breaker = %name,
                failures = transition.failures,
                requests = transition.requests,
                error_rate = transition.error_rate,
                threshold = self.options.error_threshold_percentage,
                retry_after_ms = self.options.reset_timeout.as_millis() as u64,
                "Circuit opened"
            ),
            (_, CircuitState::HalfOpen) => tracing::info!(
                breaker = %name,
                previous_failures = transition.failures,
                "Circuit half-open, admitting trial call"
            ),
            (from, CircuitState::Closed) => tracing::info!(
                breaker = %name,
                from = %from,
                "Circuit closed"
            ),
        }
    }
}

impl<F, Fut, A, T, E> CircuitBreaker<F, A, T, E>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    A: Clone,
{
    /// Call the wrapped function through the breaker.
    ///
    /// While open, returns the fallback's result or
    /// [`BreakerError::CircuitOpen`] without calling the wrapped function.
    /// Otherwise the call runs under the configured timeout; failures are
    /// recorded and then replaced by the fallback's result when one is set.
    pub async fn fire(&self, args: A) -> Result<T, BreakerError<E>> {
        let fallback = self.fallback.load_full();
        let (admission, transition) = self.admit();
        self.report(transition);

        let Some(admission) = admission else {
            metrics::record_rejection(self.name());
            tracing::debug!(breaker = %self.name(), "Call rejected, circuit open");
            return match fallback {
                Some(fallback) => self.run_fallback(&fallback, args).await,
                None => Err(BreakerError::CircuitOpen {
                    name: self.name().to_string(),
                }),
            };
        };

        let mut guard = TrialGuard::new(&self.window, admission);
        let retained = fallback.as_ref().map(|_| args.clone());
        let outcome = execute_with_timeout(self.options.timeout, (self.action)(args)).await;
        guard.disarm();

        let error = match outcome {
            Ok(value) => {
                metrics::record_call(self.name(), "success");
                let transition = self.on_success(admission);
                self.report(transition);
                return Ok(value);
            }
            Err(CallError::TimedOut) => {
                metrics::record_call(self.name(), "timeout");
                BreakerError::Timeout {
                    name: self.name().to_string(),
                    timeout_ms: self.options.timeout.as_millis() as u64,
                }
            }
            Err(CallError::Failed(err)) => {
                let counted = self.classifier.as_ref().map_or(true, |classify| classify(&err));
                if !counted {
                    metrics::record_call(self.name(), "ignored");
                    let transition = self.on_success(admission);
                    self.report(transition);
                    return Err(BreakerError::Inner(err));
                }
                metrics::record_call(self.name(), "failure");
                BreakerError::Inner(err)
            }
        };

        let transition = self.on_failure(admission);
        self.report(transition);

        match (fallback, retained) {
            (Some(fallback), Some(args)) => self.run_fallback(&fallback, args).await,
            _ => Err(error),
        }
    }

    async fn run_fallback(&self, fallback: &Fallback<A, T, E>, args: A) -> Result<T, BreakerError<E>> {
        metrics::record_fallback(self.name());
        tracing::debug!(breaker = %self.name(), "Serving fallback");
        (fallback.call)(args).await.map_err(BreakerError::Fallback)
    }
}
