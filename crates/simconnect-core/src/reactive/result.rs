//! Single-resolution request result.
//!
//! # How a request result works (for beginners)
//!
//! Every request sent to the host gets an ID.  The reply arrives later, on
//! whatever thread runs the dispatch loop, tagged with that ID.  The caller
//! that sent the request needs a place to wait for it: a [`MessageResult`].
//!
//! A result starts out *pending*.  The first [`on_next`](MessageObserver::on_next)
//! or [`on_error`](MessageObserver::on_error) moves it to its terminal state
//! and wakes every thread blocked in [`get`](MessageResult::get).  From then on
//! the state never changes again:
//!
//! ```text
//!            on_next(v)
//!   Pending ────────────▶ Completed(v)
//!      │
//!      │     on_error(e)
//!      └────────────────▶ Failed(e)
//! ```
//!
//! A second resolution attempt is a protocol anomaly (the host answered twice,
//! or a timer fired after the reply) and is logged and counted, not panicked on.
//!
//! # Thread safety
//!
//! The terminal state lives in a [`OnceLock`], so reading a resolved result
//! never takes a lock.  A `parking_lot` mutex and condition variable are only
//! used to park threads that call `get()` before the reply arrives.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::error;

use crate::channel::HostError;
use crate::definition::DefinitionError;
use crate::protocol::{IdError, ObjectDataPeriod};
use crate::reactive::observer::MessageObserver;

/// Terminal failure of a request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    /// The host call failed, the host raised an exception, or the link dropped.
    #[error(transparent)]
    Host(#[from] HostError),

    /// No reply arrived in time.
    #[error("request {request_id} timed out after {elapsed:?}")]
    Timeout { request_id: u32, elapsed: Duration },

    /// The data definition for the request could not be built or used.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// The host replied with a different kind of message than expected.
    #[error("request {request_id} expected a {expected} reply, got {actual}")]
    UnexpectedReply {
        request_id: u32,
        expected: &'static str,
        actual: &'static str,
    },

    /// A data stream was asked for with a period that sends nothing.
    #[error("period {0:?} never produces data")]
    InvalidPeriod(ObjectDataPeriod),

    /// No request ID could be allocated.
    #[error(transparent)]
    Ids(#[from] IdError),
}

/// A second resolution attempt on an already resolved result.
///
/// Never returned to callers; it only appears in logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("double result for request {}", request_label(.request_id))]
pub struct DoubleResultError {
    pub request_id: Option<u32>,
}

fn request_label(request_id: &Option<u32>) -> String {
    match request_id {
        Some(id) => id.to_string(),
        None => "<unassigned>".to_string(),
    }
}

type Subscriber<T> = Box<dyn FnOnce(&Result<T, RequestError>) + Send>;

/// A value-or-error that is set once and read many times.
pub struct MessageResult<T> {
    request_id: Option<u32>,
    state: OnceLock<Result<T, RequestError>>,
    gate: Mutex<()>,
    ready: Condvar,
    double_results: AtomicUsize,
    subscribers: Mutex<Vec<Subscriber<T>>>,
}

impl<T> Default for MessageResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MessageResult<T> {
    /// Creates a pending result with no request ID attached.
    pub fn new() -> Self {
        Self {
            request_id: None,
            state: OnceLock::new(),
            gate: Mutex::new(()),
            ready: Condvar::new(),
            double_results: AtomicUsize::new(0),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Creates a pending result for `request_id`.
    pub fn with_request_id(request_id: u32) -> Self {
        Self {
            request_id: Some(request_id),
            ..Self::new()
        }
    }

    /// Creates a result that has already failed with `error`.
    ///
    /// Used when a request cannot even be sent; the caller still gets a result
    /// to wait on, and `get()` returns immediately.
    pub fn error_result(request_id: u32, error: RequestError) -> Self {
        let result = Self::with_request_id(request_id);
        // A fresh OnceLock always accepts its first value.
        let _ = result.state.set(Err(error));
        result
    }

    /// The request this result belongs to, if any.
    pub fn request_id(&self) -> Option<u32> {
        self.request_id
    }

    /// `true` once the result has left the pending state.
    pub fn is_completed(&self) -> bool {
        self.state.get().is_some()
    }

    /// Non-blocking view of the terminal state.
    pub fn outcome(&self) -> Option<&Result<T, RequestError>> {
        self.state.get()
    }

    /// Number of resolution attempts that arrived after the first one.
    pub fn double_results(&self) -> usize {
        self.double_results.load(Ordering::Relaxed)
    }

    /// Runs `callback` exactly once with the terminal outcome.
    ///
    /// If the result is already resolved the callback runs immediately on the
    /// calling thread; otherwise it runs on the thread that resolves it.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: FnOnce(&Result<T, RequestError>) + Send + 'static,
    {
        let mut subscribers = self.subscribers.lock();
        match self.state.get() {
            Some(outcome) => {
                drop(subscribers);
                callback(outcome);
            }
            None => subscribers.push(Box::new(callback)),
        }
    }

    fn resolve(&self, outcome: Result<T, RequestError>) {
        {
            let _gate = self.gate.lock();
            if self.state.set(outcome).is_err() {
                drop(_gate);
                self.double_results.fetch_add(1, Ordering::Relaxed);
                let err = DoubleResultError {
                    request_id: self.request_id,
                };
                error!("{err}");
                return;
            }
            self.ready.notify_all();
        }

        let pending = std::mem::take(&mut *self.subscribers.lock());
        if let Some(outcome) = self.state.get() {
            for callback in pending {
                callback(outcome);
            }
        }
    }
}

impl<T: Clone> MessageResult<T> {
    /// Blocks until the result is resolved and returns a copy of the outcome.
    ///
    /// The error is returned exactly as it was delivered.
    pub fn get(&self) -> Result<T, RequestError> {
        if let Some(outcome) = self.state.get() {
            return outcome.clone();
        }
        let mut gate = self.gate.lock();
        loop {
            if let Some(outcome) = self.state.get() {
                return outcome.clone();
            }
            self.ready.wait(&mut gate);
        }
    }

    /// Like [`get`](Self::get), but gives up after `timeout`.
    ///
    /// Returns `None` if the result is still pending; the result itself is
    /// left untouched.
    pub fn wait_for(&self, timeout: Duration) -> Option<Result<T, RequestError>> {
        if let Some(outcome) = self.state.get() {
            return Some(outcome.clone());
        }
        let deadline = Instant::now() + timeout;
        let mut gate = self.gate.lock();
        loop {
            if let Some(outcome) = self.state.get() {
                return Some(outcome.clone());
            }
            if self.ready.wait_until(&mut gate, deadline).timed_out() {
                return self.state.get().cloned();
            }
        }
    }
}

impl<T: Send + Sync> MessageObserver<T> for MessageResult<T> {
    fn on_next(&self, value: T) {
        self.resolve(Ok(value));
    }

    // The terminal state comes from on_next/on_error.
    fn on_completed(&self) {}

    fn on_error(&self, error: RequestError) {
        self.resolve(Err(error));
    }
}

impl<T: fmt::Debug> fmt::Debug for MessageResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageResult")
            .field("request_id", &self.request_id)
            .field("state", &self.state.get())
            .field("double_results", &self.double_results())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn disconnected() -> RequestError {
        RequestError::Host(HostError::Disconnected)
    }

    #[test]
    fn test_first_on_next_wins() {
        // Arrange
        let result = MessageResult::with_request_id(7);

        // Act
        result.on_next(1);
        result.on_next(2);
        result.on_error(disconnected());

        // Assert
        assert_eq!(result.get(), Ok(1));
        assert_eq!(result.double_results(), 2);
    }

    #[test]
    fn test_first_on_error_wins() {
        let result = MessageResult::<u32>::new();

        result.on_error(disconnected());
        result.on_next(5);

        assert_eq!(result.get(), Err(disconnected()));
        assert_eq!(result.double_results(), 1);
    }

    #[test]
    fn test_on_completed_does_not_resolve() {
        let result = MessageResult::<u32>::new();

        result.on_completed();

        assert!(!result.is_completed());
        assert!(result.outcome().is_none());
    }

    #[test]
    fn test_error_result_is_failed_immediately() {
        let result = MessageResult::<String>::error_result(3, disconnected());

        assert!(result.is_completed());
        assert_eq!(result.request_id(), Some(3));
        assert_eq!(result.get(), Err(disconnected()));
    }

    #[test]
    fn test_concurrent_getters_observe_same_value() {
        // Arrange
        let result = Arc::new(MessageResult::<u64>::new());
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let result = Arc::clone(&result);
                thread::spawn(move || result.get())
            })
            .collect();

        // Act
        result.on_next(42);

        // Assert
        for waiter in waiters {
            assert_eq!(waiter.join().expect("waiter panicked"), Ok(42));
        }
    }

    #[test]
    fn test_subscribe_runs_once_before_and_after_resolution() {
        let result = MessageResult::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let early = Arc::clone(&seen);
        result.subscribe(move |o| early.lock().push(o.clone()));
        result.on_next(9);
        result.on_next(10);
        let late = Arc::clone(&seen);
        result.subscribe(move |o| late.lock().push(o.clone()));

        assert_eq!(*seen.lock(), vec![Ok(9), Ok(9)]);
    }

    #[test]
    fn test_wait_for_times_out_on_pending_result() {
        let result = MessageResult::<u32>::new();

        assert_eq!(result.wait_for(Duration::from_millis(10)), None);
        assert!(!result.is_completed());
    }

    #[test]
    fn test_double_result_error_names_request() {
        let err = DoubleResultError {
            request_id: Some(12),
        };
        assert_eq!(err.to_string(), "double result for request 12");
        let err = DoubleResultError { request_id: None };
        assert_eq!(err.to_string(), "double result for request <unassigned>");
    }
}
