//! Correlation of outstanding requests with host replies.
//!
//! # Request lifecycle
//!
//! ```text
//! issue() ──▶ pending[id] ──dispatch(id, reply)──▶ MessageResult: Completed / Failed
//!                 │
//!                 ├──dispatch_error(id, err)──────▶ MessageResult: Failed
//!                 ├──expire_after(id, t) fires────▶ MessageResult: Failed(Timeout)
//!                 └──forget(id)                    (entry dropped, result stays pending)
//! ```
//!
//! Every path removes the entry first, so at most one of them ever reaches a
//! given result.  A reply for an ID with no entry (already answered, timed
//! out, or never issued) is logged and dropped.
//!
//! Streaming requests ([`RequestManager::issue_stream`]) keep their entry
//! across replies until the last one arrives, an error ends the stream, or
//! the caller stops it with [`RequestManager::complete`].

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::channel::HostError;
use crate::protocol::{HostReply, IdAllocator};
use crate::reactive::{MessageObserver, MessageResult, MessageStream, RequestError};

/// Type-erased handle to a pending result or stream.
pub trait PendingReply: Send + Sync {
    /// Converts and delivers a reply; returns `true` when no further reply
    /// is expected.
    fn deliver(&self, request_id: u32, reply: HostReply) -> bool;

    /// Fails the observer.
    fn fail(&self, error: RequestError);

    /// Ends the observer without an error.
    fn complete(&self);

    fn is_completed(&self) -> bool;

    /// `true` if the entry expects more than one reply.
    fn is_stream(&self) -> bool {
        false
    }
}

type Convert<T> = Box<dyn Fn(u32, HostReply) -> Result<T, RequestError> + Send + Sync>;
type IsLast = Box<dyn Fn(&HostReply) -> bool + Send + Sync>;

struct Pending<T> {
    result: Arc<MessageResult<T>>,
    convert: Convert<T>,
}

impl<T: Send + Sync + 'static> PendingReply for Pending<T> {
    fn deliver(&self, request_id: u32, reply: HostReply) -> bool {
        match (self.convert)(request_id, reply) {
            Ok(value) => self.result.on_next(value),
            Err(err) => self.result.on_error(err),
        }
        true
    }

    fn fail(&self, error: RequestError) {
        self.result.on_error(error);
    }

    fn complete(&self) {
        self.result.on_completed();
    }

    fn is_completed(&self) -> bool {
        self.result.is_completed()
    }
}

struct StreamPending<T> {
    stream: Arc<MessageStream<T>>,
    convert: Convert<T>,
    is_last: IsLast,
}

impl<T: Clone + Send + Sync + 'static> PendingReply for StreamPending<T> {
    fn deliver(&self, request_id: u32, reply: HostReply) -> bool {
        let last = (self.is_last)(&reply);
        match (self.convert)(request_id, reply) {
            Ok(value) => {
                self.stream.on_next(value);
                if last {
                    self.stream.on_completed();
                }
                last
            }
            Err(err) => {
                self.stream.on_error(err);
                true
            }
        }
    }

    fn fail(&self, error: RequestError) {
        self.stream.on_error(error);
    }

    fn complete(&self) {
        self.stream.on_completed();
    }

    fn is_completed(&self) -> bool {
        self.stream.is_closed()
    }

    fn is_stream(&self) -> bool {
        true
    }
}

/// Allocates request IDs and routes replies to their results.
pub struct RequestManager {
    ids: IdAllocator,
    pending: Mutex<HashMap<u32, Arc<dyn PendingReply>>>,
}

impl Default for RequestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestManager {
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::requests(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Sends a request and returns the result that its reply will resolve.
    ///
    /// `send` receives the allocated request ID and performs the host call;
    /// `convert` turns the matching reply into the caller's value.  If no ID
    /// is left or `send` fails, the returned result has already failed and
    /// nothing stays registered.
    pub fn issue<T, S, C>(&self, api: &'static str, send: S, convert: C) -> Arc<MessageResult<T>>
    where
        T: Send + Sync + 'static,
        S: FnOnce(u32) -> Result<(), HostError>,
        C: Fn(u32, HostReply) -> Result<T, RequestError> + Send + Sync + 'static,
    {
        let request_id = match self.ids.next() {
            Ok(id) => id,
            Err(err) => {
                error!("{api}: {err}");
                return Arc::new(MessageResult::error_result(0, err.into()));
            }
        };

        let result = Arc::new(MessageResult::with_request_id(request_id));
        let pending: Arc<dyn PendingReply> = Arc::new(Pending {
            result: Arc::clone(&result),
            convert: Box::new(convert),
        });
        // Registered before sending so a fast reply finds its entry.
        self.pending.lock().insert(request_id, pending);

        debug!("{api}: request {request_id}");
        if let Err(err) = send(request_id) {
            self.pending.lock().remove(&request_id);
            error!("{api} failed for request {request_id}: {err}");
            return Arc::new(MessageResult::error_result(request_id, err.into()));
        }
        result
    }

    /// Sends a request whose replies feed a stream.
    ///
    /// The entry stays registered after each reply; `is_last` marks the
    /// reply that completes the stream.  Unlike [`issue`](Self::issue), a
    /// failure is returned directly: a stream nobody has subscribed to yet
    /// could not report it.
    pub fn issue_stream<T, S, C, L>(
        &self,
        api: &'static str,
        send: S,
        convert: C,
        is_last: L,
    ) -> Result<Arc<MessageStream<T>>, RequestError>
    where
        T: Clone + Send + Sync + 'static,
        S: FnOnce(u32) -> Result<(), HostError>,
        C: Fn(u32, HostReply) -> Result<T, RequestError> + Send + Sync + 'static,
        L: Fn(&HostReply) -> bool + Send + Sync + 'static,
    {
        let request_id = self.ids.next().map_err(|err| {
            error!("{api}: {err}");
            RequestError::from(err)
        })?;

        let stream = Arc::new(MessageStream::for_request(request_id));
        let pending: Arc<dyn PendingReply> = Arc::new(StreamPending {
            stream: Arc::clone(&stream),
            convert: Box::new(convert),
            is_last: Box::new(is_last),
        });
        self.pending.lock().insert(request_id, pending);

        debug!("{api}: streaming request {request_id}");
        if let Err(err) = send(request_id) {
            self.pending.lock().remove(&request_id);
            error!("{api} failed for request {request_id}: {err}");
            return Err(err.into());
        }
        Ok(stream)
    }

    /// Routes a reply to its pending result; returns `false` for unknown IDs.
    pub fn dispatch(&self, request_id: u32, reply: HostReply) -> bool {
        let pending = {
            let mut table = self.pending.lock();
            match table.get(&request_id) {
                Some(entry) if entry.is_stream() => Some(Arc::clone(entry)),
                Some(_) => table.remove(&request_id),
                None => None,
            }
        };
        match pending {
            Some(pending) => {
                if pending.deliver(request_id, reply) && pending.is_stream() {
                    self.take(request_id);
                }
                true
            }
            None => {
                error!(
                    "received {} reply for unknown request {request_id}",
                    reply.kind()
                );
                false
            }
        }
    }

    /// Fails a pending result; returns `false` for unknown IDs.
    pub fn dispatch_error(&self, request_id: u32, error: RequestError) -> bool {
        match self.take(request_id) {
            Some(pending) => {
                pending.fail(error);
                true
            }
            None => {
                error!("received error for unknown request {request_id}: {error}");
                false
            }
        }
    }

    /// Fails `request_id` with [`RequestError::Timeout`] unless it is
    /// answered within `timeout`.
    ///
    /// Needs a running tokio runtime; without one no timer is armed and
    /// `None` is returned.
    pub fn expire_after(self: &Arc<Self>, request_id: u32, timeout: Duration) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, request {request_id} has no timeout");
            return None;
        };
        let manager: Weak<Self> = Arc::downgrade(self);
        Some(runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(manager) = manager.upgrade() else {
                return;
            };
            if let Some(pending) = manager.take(request_id) {
                warn!("request {request_id} timed out after {timeout:?}");
                pending.fail(RequestError::Timeout {
                    request_id,
                    elapsed: timeout,
                });
            }
        }))
    }

    /// Ends a pending request without an error; a stream sees
    /// [`StreamEvent::Completed`](crate::reactive::StreamEvent::Completed).
    pub fn complete(&self, request_id: u32) -> bool {
        match self.take(request_id) {
            Some(pending) => {
                pending.complete();
                true
            }
            None => false,
        }
    }

    /// Drops the entry for `request_id` without touching its result.
    pub fn forget(&self, request_id: u32) -> bool {
        self.take(request_id).is_some()
    }

    /// Fails every pending result with `error`; returns how many there were.
    pub fn fail_all(&self, error: RequestError) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();
        for (_, pending) in drained {
            pending.fail(error.clone());
        }
        if count > 0 {
            debug!("failed {count} pending requests: {error}");
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_pending(&self, request_id: u32) -> bool {
        self.pending.lock().contains_key(&request_id)
    }

    fn take(&self, request_id: u32) -> Option<Arc<dyn PendingReply>> {
        self.pending.lock().remove(&request_id)
    }
}

impl std::fmt::Debug for RequestManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestManager")
            .field("last_id", &self.ids.last())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ObjectData, SystemState};
    use crate::reactive::StreamEvent;

    fn state_of(request_id: u32, reply: HostReply) -> Result<SystemState, RequestError> {
        match reply {
            HostReply::SystemState(state) => Ok(state),
            other => Err(RequestError::UnexpectedReply {
                request_id,
                expected: "SystemState",
                actual: other.kind(),
            }),
        }
    }

    #[test]
    fn test_reply_resolves_and_clears_entry() {
        // Arrange
        let manager = RequestManager::new();
        let result = manager.issue("RequestSystemState", |_| Ok(()), state_of);
        let id = result.request_id().expect("id");

        // Act
        let delivered = manager.dispatch(
            id,
            HostReply::SystemState(SystemState {
                int_value: 1,
                ..SystemState::default()
            }),
        );

        // Assert
        assert!(delivered);
        assert!(result.get().expect("state").as_bool());
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn test_failed_send_returns_failed_result_without_entry() {
        let manager = RequestManager::new();

        let result = manager.issue("RequestSystemState", |_| Err(HostError::Disconnected), state_of);

        assert_eq!(result.get(), Err(RequestError::Host(HostError::Disconnected)));
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn test_unknown_id_is_reported() {
        let manager = RequestManager::new();

        assert!(!manager.dispatch(42, HostReply::AssignedObjectId(1)));
        assert!(!manager.dispatch_error(42, RequestError::Host(HostError::Disconnected)));
    }

    #[test]
    fn test_wrong_reply_kind_fails_result() {
        let manager = RequestManager::new();
        let result = manager.issue("RequestSystemState", |_| Ok(()), state_of);
        let id = result.request_id().expect("id");

        manager.dispatch(id, HostReply::AssignedObjectId(3));

        assert_eq!(
            result.get(),
            Err(RequestError::UnexpectedReply {
                request_id: id,
                expected: "SystemState",
                actual: "AssignedObjectId",
            })
        );
    }

    #[test]
    fn test_fail_all_fails_every_pending_result() {
        let manager = RequestManager::new();
        let a = manager.issue("A", |_| Ok(()), state_of);
        let b = manager.issue("B", |_| Ok(()), state_of);

        let failed = manager.fail_all(RequestError::Host(HostError::Disconnected));

        assert_eq!(failed, 2);
        assert!(a.get().is_err());
        assert!(b.get().is_err());
    }

    #[test]
    fn test_forget_leaves_result_pending() {
        let manager = RequestManager::new();
        let result = manager.issue("A", |_| Ok(()), state_of);
        let id = result.request_id().expect("id");

        assert!(manager.forget(id));
        assert!(!result.is_completed());
        assert!(!manager.dispatch(id, HostReply::SystemState(SystemState::default())));
    }

    #[tokio::test]
    async fn test_timeout_fails_unanswered_request() {
        // Arrange
        let manager = Arc::new(RequestManager::new());
        let result = manager.issue("A", |_| Ok(()), state_of);
        let id = result.request_id().expect("id");

        // Act
        let timer = manager
            .expire_after(id, Duration::from_millis(10))
            .expect("runtime present");
        timer.await.expect("timer task");

        // Assert
        assert_eq!(
            result.outcome(),
            Some(&Err(RequestError::Timeout {
                request_id: id,
                elapsed: Duration::from_millis(10),
            }))
        );
    }

    #[tokio::test]
    async fn test_timeout_after_reply_is_ignored() {
        let manager = Arc::new(RequestManager::new());
        let result = manager.issue("A", |_| Ok(()), state_of);
        let id = result.request_id().expect("id");
        let timer = manager
            .expire_after(id, Duration::from_millis(10))
            .expect("runtime present");

        manager.dispatch(id, HostReply::SystemState(SystemState::default()));
        timer.await.expect("timer task");

        assert!(result.outcome().expect("resolved").is_ok());
        assert_eq!(result.double_results(), 0);
    }

    fn data_of(_: u32, reply: HostReply) -> Result<u32, RequestError> {
        match reply {
            HostReply::ObjectData(data) => Ok(data.entry_number),
            other => Err(RequestError::UnexpectedReply {
                request_id: 0,
                expected: "ObjectData",
                actual: other.kind(),
            }),
        }
    }

    fn entry(entry_number: u32, out_of: u32) -> HostReply {
        HostReply::ObjectData(ObjectData {
            entry_number,
            out_of,
            ..ObjectData::default()
        })
    }

    fn last_entry(reply: &HostReply) -> bool {
        matches!(reply, HostReply::ObjectData(d) if d.entry_number >= d.out_of)
    }

    #[test]
    fn test_stream_keeps_entry_until_last_reply() {
        // Arrange
        let manager = RequestManager::new();
        let stream = manager
            .issue_stream("RequestDataOnSimObjectType", |_| Ok(()), data_of, last_entry)
            .expect("issue");
        let id = stream.request_id().expect("id");
        let mut rx = stream.subscribe();

        // Act
        manager.dispatch(id, entry(1, 2));
        let still_pending = manager.is_pending(id);
        manager.dispatch(id, entry(2, 2));

        // Assert
        assert!(still_pending);
        assert!(!manager.is_pending(id));
        assert_eq!(rx.try_recv().expect("first"), StreamEvent::Next(1));
        assert_eq!(rx.try_recv().expect("second"), StreamEvent::Next(2));
        assert_eq!(rx.try_recv().expect("end"), StreamEvent::Completed);
    }

    #[test]
    fn test_completing_a_stream_ends_it() {
        let manager = RequestManager::new();
        let stream = manager
            .issue_stream("RequestDataOnSimObject", |_| Ok(()), data_of, |_| false)
            .expect("issue");
        let id = stream.request_id().expect("id");
        let mut rx = stream.subscribe();
        manager.dispatch(id, entry(0, 0));

        assert!(manager.complete(id));

        assert_eq!(rx.try_recv().expect("value"), StreamEvent::Next(0));
        assert_eq!(rx.try_recv().expect("end"), StreamEvent::Completed);
        assert!(!manager.dispatch(id, entry(0, 0)));
    }

    #[test]
    fn test_failed_stream_send_is_returned() {
        let manager = RequestManager::new();

        let err = manager
            .issue_stream("RequestDataOnSimObject", |_| Err(HostError::Disconnected), data_of, |_| false)
            .expect_err("send");

        assert_eq!(err, RequestError::Host(HostError::Disconnected));
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn test_stream_conversion_error_ends_stream() {
        let manager = RequestManager::new();
        let stream = manager
            .issue_stream("RequestDataOnSimObject", |_| Ok(()), data_of, |_| false)
            .expect("issue");
        let id = stream.request_id().expect("id");
        let mut rx = stream.subscribe();

        manager.dispatch(id, HostReply::AssignedObjectId(4));

        assert!(matches!(
            rx.try_recv().expect("error"),
            StreamEvent::Error(RequestError::UnexpectedReply { .. })
        ));
        assert!(!manager.is_pending(id));
    }

    #[test]
    fn test_expire_without_runtime_arms_nothing() {
        let manager = Arc::new(RequestManager::new());

        assert!(manager.expire_after(1, Duration::from_millis(1)).is_none());
    }
}
