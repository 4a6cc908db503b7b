//! Dataflow-and-scheduling core for a modular extended-reality runtime.
//!
//! This crate provides the pieces every sensor, tracking, rendering, or
//! timewarp component is built on: a process-wide service registry, a typed
//! publish/subscribe event bus, a managed-thread abstraction, and a pose
//! prediction service built on top of both. It is not a general actor
//! framework, not a persistent queue, and not a networked transport: topics
//! are typed and addressed by name within a single process, the latest-value
//! ring is bounded and non-durable, and remote bridges are expected to be
//! built as ordinary plugins on top of the bus rather than as part of it.
#![warn(missing_docs, unreachable_pub)]
#![allow(clippy::type_complexity)]

pub mod clock;
pub mod error;
pub mod event;
pub mod guid;
pub mod plugin;
pub mod pose;
pub mod record;
pub mod registry;
pub mod switchboard;
pub mod thread;
pub mod topic;

pub use clock::RelativeClock;
pub use error::{CoreError, CoreResult};
pub use event::Event;
pub use guid::GenGuid;
pub use plugin::Plugin;
pub use registry::{PhoneBook, Service};
pub use pose::PosePredictionService;
pub use switchboard::Switchboard;
pub use thread::managed::ManagedThread;
pub use thread::threadloop::{SkipOption, Threadloop};
pub use topic::{BufferedReader, Reader, Writer};
