// channel error types.

use thiserror::Error;


// ==== construction error ====


/// Error for trying to create a channel with a capacity of zero
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("channel capacity must be greater than zero")]
pub struct InvalidCapacityError;


// ==== base error types ====


/// Error for trying to put into a channel which has been closed
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("channel closed")]
pub struct ClosedError;

/// Error for trying to use a channel which has been cancelled
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("channel cancelled")]
pub struct CancelledError;

/// Error for attempting to use a channel without blocking, and the operation not being able to
/// complete immediately
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("operation would block")]
pub struct WouldBlockError;

/// Error for a blocking operation on a channel not completing by its deadline
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("operation timed out")]
pub struct TimedOutError;


// ==== compound error types ====


/// Error for trying to put into a channel
///
/// Ownership of the item that could not be put is handed back to the caller.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("failed to put item: {cause}")]
pub struct PutError<T, E> {
    /// The item that could not be put
    pub item: T,
    /// The reason the item could not be put
    pub cause: E,
}

impl<T, E> PutError<T, E> {
    /// Discard the item, keeping only the cause
    pub fn into_cause(self) -> E {
        self.cause
    }
}

/// Terminal error state for trying to put into a channel
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PutErrorCause {
    /// The channel was closed
    #[error(transparent)]
    Closed(#[from] ClosedError),
    /// The channel was cancelled
    #[error(transparent)]
    Cancelled(#[from] CancelledError),
}

/// Error for trying to put into a channel without blocking
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TryPutErrorCause {
    /// The channel has entered some terminal state
    #[error(transparent)]
    Terminal(#[from] PutErrorCause),
    /// The channel was full
    #[error(transparent)]
    WouldBlock(#[from] WouldBlockError),
}

/// Error for trying to put into a channel with a deadline
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PutTimeoutErrorCause {
    /// The channel has entered some terminal state
    #[error(transparent)]
    Terminal(#[from] PutErrorCause),
    /// The channel stayed full until the deadline
    #[error(transparent)]
    TimedOut(#[from] TimedOutError),
}

/// Error for trying to get from a channel without blocking
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TryGetError {
    /// The channel was cancelled
    #[error(transparent)]
    Cancelled(#[from] CancelledError),
    /// The channel was empty
    #[error(transparent)]
    WouldBlock(#[from] WouldBlockError),
}

/// Error for trying to get from a channel with a deadline
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum GetTimeoutError {
    /// The channel was cancelled
    #[error(transparent)]
    Cancelled(#[from] CancelledError),
    /// The channel stayed empty until the deadline
    #[error(transparent)]
    TimedOut(#[from] TimedOutError),
}

// a put error with a terminal cause can be widened to either of the limited-blocking causes.
impl From<ClosedError> for TryPutErrorCause {
    fn from(e: ClosedError) -> Self {
        Self::Terminal(e.into())
    }
}

impl From<CancelledError> for TryPutErrorCause {
    fn from(e: CancelledError) -> Self {
        Self::Terminal(e.into())
    }
}

impl From<ClosedError> for PutTimeoutErrorCause {
    fn from(e: ClosedError) -> Self {
        Self::Terminal(e.into())
    }
}

impl From<CancelledError> for PutTimeoutErrorCause {
    fn from(e: CancelledError) -> Self {
        Self::Terminal(e.into())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_error_keeps_item_and_displays_cause() {
        let e = PutError { item: 7, cause: PutErrorCause::from(ClosedError) };
        assert_eq!(e.to_string(), "failed to put item: channel closed");
        assert_eq!(e.item, 7);
        assert_eq!(TryPutErrorCause::from(e.into_cause()), TryPutErrorCause::from(ClosedError));
    }

    #[test]
    fn base_errors_widen() {
        assert_eq!(
            PutTimeoutErrorCause::from(CancelledError),
            PutTimeoutErrorCause::Terminal(PutErrorCause::Cancelled(CancelledError)),
        );
        assert_eq!(GetTimeoutError::from(TimedOutError).to_string(), "operation timed out");
        assert_eq!(TryGetError::from(WouldBlockError).to_string(), "operation would block");
    }
}
