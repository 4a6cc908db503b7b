//! Error kinds shared by every component in this crate.
//!
//! The core does not retry: a fallible operation either succeeds, returns an
//! explicit empty/null value, or fails with one of the kinds below. Kinds
//! that are programmer mistakes rather than steady-state conditions (a
//! duplicate registration, a lookup for a service nobody registered, a type
//! mismatch at handle acquisition, calling the clock before it starts) are
//! meant to be escalated to a panic at the call site via [`CoreError::panic`]
//! rather than threaded through ordinary control flow.

use thiserror::Error;

/// The result type used across this crate's fallible APIs.
pub type CoreResult<T> = Result<T, CoreError>;

/// The closed set of error kinds this core can itself detect.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A second `register` call for a service interface that already has an
    /// implementation. Fatal at startup.
    #[error("service `{0}` is already registered")]
    RegistrationConflict(&'static str),

    /// A `lookup` for a service interface with no registered implementation.
    /// Fatal at the call site.
    #[error("no implementation registered for service `{0}`")]
    LookupMiss(&'static str),

    /// A reader/writer/subscription was acquired against a topic whose
    /// declared element type does not match the caller's type.
    #[error("topic `{topic}` is declared as `{declared}`, not `{requested}`")]
    TypeMismatch {
        /// Name of the offending topic.
        topic: String,
        /// Type name the topic was first created with.
        declared: &'static str,
        /// Type name the caller asked for.
        requested: &'static str,
    },

    /// `RelativeClock::now()` was called before `RelativeClock::start()`.
    #[error("relative clock read before it was started")]
    ClockMisuse,

    /// A bounded, lossless subscription queue was full and the publisher
    /// declined to drop the event.
    #[error("subscription queue for topic `{0}` is full")]
    QueueFull(String),
}

impl CoreError {
    /// Escalate a startup-fatal error kind to a process abort, matching this
    /// core's "abort the process with a log line identifying the service or
    /// topic" policy for registration conflicts, lookup misses, and clock
    /// misuse.
    #[track_caller]
    pub fn panic(self) -> ! {
        #[cfg(feature = "debug")]
        tracing::error!(error = %self, "fatal core error");
        panic!("{self}");
    }
}
