//! Crate-wide error type.

use thiserror::Error;

use crate::playable::PlayableId;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Run `f`, converting a panic into an error message.
///
/// Assertion panics inside user callbacks are how test bodies fail; the
/// player and block capture them and report through the framework's
/// completion surface instead of unwinding through the host.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
                (*s).to_owned()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "callback panicked".to_owned()
            };
            Err(message)
        }
    }
}

/// Errors surfaced by the scheduling engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A back-reference pointed before the head of the queue at enqueue time.
    #[error("back-reference {offset} reaches before the head of the queue")]
    InvalidBackRef { offset: usize },

    /// An injected-event playable reached dispatch without a resolved target.
    #[error("{id} has no resolved target to dispatch against")]
    MissingTarget { id: PlayableId },

    /// A playable exceeded its readiness deadline.
    #[error("{0}")]
    Timeout(String),

    /// A user callback reported or raised a failure.
    #[error("{0}")]
    Callback(String),
}
