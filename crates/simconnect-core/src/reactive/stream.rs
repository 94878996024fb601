//! Multi-subscriber notification stream.
//!
//! Unlike [`MessageResult`](crate::reactive::MessageResult), a stream carries
//! any number of values.  It is backed by a `tokio::sync::broadcast` channel:
//! every subscriber sees every value sent after it subscribed, and a slow
//! subscriber that falls more than `capacity` values behind is told how many
//! it missed instead of blocking the sender.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::debug;

use crate::reactive::observer::MessageObserver;
use crate::reactive::result::RequestError;

/// Default number of buffered events per subscriber.
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// One item delivered to stream subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
    Next(T),
    Completed,
    Error(RequestError),
}

/// Broadcasts notifications to every live subscriber.
#[derive(Debug)]
pub struct MessageStream<T> {
    request_id: Option<u32>,
    sender: broadcast::Sender<StreamEvent<T>>,
    closed: AtomicBool,
}

impl<T: Clone> Default for MessageStream<T> {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CAPACITY)
    }
}

impl<T: Clone> MessageStream<T> {
    /// Creates a stream that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            request_id: None,
            sender,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a stream fed by the replies to `request_id`.
    pub fn for_request(request_id: u32) -> Self {
        Self {
            request_id: Some(request_id),
            ..Self::default()
        }
    }

    /// The request feeding this stream, if any.
    pub fn request_id(&self) -> Option<u32> {
        self.request_id
    }

    /// Returns a receiver for every event sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent<T>> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// `true` once a terminal event has been broadcast.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn publish(&self, event: StreamEvent<T>) {
        // No receivers is not an error for a broadcast.
        let _ = self.sender.send(event);
    }

    fn terminate(&self, event: StreamEvent<T>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("ignoring terminal event on a closed stream");
            return;
        }
        self.publish(event);
    }
}

impl<T: Clone + Send + Sync> MessageObserver<T> for MessageStream<T> {
    fn on_next(&self, value: T) {
        if self.is_closed() {
            debug!("ignoring value on a closed stream");
            return;
        }
        self.publish(StreamEvent::Next(value));
    }

    fn on_completed(&self) {
        self.terminate(StreamEvent::Completed);
    }

    fn on_error(&self, error: RequestError) {
        self.terminate(StreamEvent::Error(error));
    }
}
