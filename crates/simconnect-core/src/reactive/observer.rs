use crate::reactive::result::RequestError;

/// Receiver side of a reply: the dispatcher pushes values and terminal
/// signals into it.
///
/// Implementations must tolerate calls arriving from any thread and in any
/// quantity; what counts as a terminal signal is up to the implementation.
pub trait MessageObserver<T>: Send + Sync {
    /// Delivers one value.
    fn on_next(&self, value: T);

    /// Signals that no more values will follow.
    fn on_completed(&self);

    /// Signals a failure.
    fn on_error(&self, error: RequestError);
}
