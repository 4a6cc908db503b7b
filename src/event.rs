//! The abstract base for anything publishable on the bus.

use std::any::Any;

/// Marker trait for event payloads.
///
/// Carries no fields itself; any concrete value type that is `'static`,
/// `Send`, and `Sync` already satisfies it. Event identity on the bus is
/// carried entirely by the topic name and the topic's declared element
/// type, never by the event value.
pub trait Event: Any + Send + Sync {}

impl<T: Any + Send + Sync> Event for T {}

/// The type-erased pointer every topic ring slot and subscription queue
/// actually stores. Shared ownership (an `Arc`) is this crate's chosen
/// realization of §5's "reference-counted" resource-ownership contract: a
/// reader holding a clone of this pointer keeps the event alive independent
/// of the ring, and a writer's `put` hands one clone to the ring and one to
/// each subscription present at that moment.
pub(crate) type ErasedEvent = std::sync::Arc<dyn Any + Send + Sync>;
