//! Rate limiters for input-driven work.
//!
//! Both wrappers schedule on the ambient tokio runtime, so `call` must run
//! inside one. Timers use `tokio::time`, which keeps them deterministic under
//! a paused test clock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

type Action<A> = Box<dyn Fn(A) + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `action` only once calls have stopped for `delay`.
pub fn debounce<A, F>(action: F, delay: Duration) -> Debounced<A>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    Debounced {
        inner: Arc::new(DebounceInner {
            action: Box::new(action),
            delay,
            pending: Mutex::new(None),
        }),
    }
}

struct DebounceInner<A> {
    action: Action<A>,
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

pub struct Debounced<A> {
    inner: Arc<DebounceInner<A>>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> Debounced<A> {
    /// Replaces any pending execution with one for `args`.
    pub fn call(&self, args: A) {
        let mut pending = lock(&self.inner.pending);
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let inner = Arc::clone(&self.inner);
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            (inner.action)(args);
        }));
    }

    /// Drops the pending execution, if any.
    pub fn cancel(&self) {
        if let Some(handle) = lock(&self.inner.pending).take() {
            handle.abort();
        }
    }
}

/// Runs `action` at most once per `interval`: leading call immediately,
/// the latest call inside the window at the window boundary.
pub fn throttle<A, F>(action: F, interval: Duration) -> Throttled<A>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    Throttled {
        inner: Arc::new(ThrottleInner {
            action: Box::new(action),
            interval,
            state: Mutex::new(ThrottleState {
                last_run: None,
                pending_args: None,
                timer: None,
            }),
        }),
    }
}

struct ThrottleState<A> {
    last_run: Option<Instant>,
    pending_args: Option<A>,
    timer: Option<JoinHandle<()>>,
}

struct ThrottleInner<A> {
    action: Action<A>,
    interval: Duration,
    state: Mutex<ThrottleState<A>>,
}

pub struct Throttled<A> {
    inner: Arc<ThrottleInner<A>>,
}

impl<A> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> Throttled<A> {
    pub fn call(&self, args: A) {
        let now = Instant::now();
        let interval = self.inner.interval;
        let mut state = lock(&self.inner.state);

        let window_open = state
            .last_run
            .is_none_or(|t| now.duration_since(t) >= interval);
        if window_open && state.timer.is_none() {
            state.last_run = Some(now);
            drop(state);
            (self.inner.action)(args);
            return;
        }

        state.pending_args = Some(args);
        if state.timer.is_some() {
            return;
        }

        let fire_at = state.last_run.map_or(now, |t| t + interval);
        let inner = Arc::clone(&self.inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            let args = {
                let mut state = lock(&inner.state);
                state.timer = None;
                state.last_run = Some(Instant::now());
                state.pending_args.take()
            };
            if let Some(args) = args {
                (inner.action)(args);
            }
        }));
    }
}
