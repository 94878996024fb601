//! Observer primitives that carry host replies back to callers.
//!
//! - [`MessageResult`] resolves exactly once and can be awaited by blocking
//!   [`get`](MessageResult::get) calls from any number of threads.
//! - [`MessageStream`] fans a sequence of notifications out to every live
//!   subscriber.
//!
//! Both implement [`MessageObserver`], which is what the dispatch side calls.

pub mod observer;
pub mod result;
pub mod stream;

pub use observer::MessageObserver;
pub use result::{DoubleResultError, MessageResult, RequestError};
pub use stream::{MessageStream, StreamEvent};
