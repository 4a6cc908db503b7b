//! Structured diagnostic records emitted by subscriptions, threadloops, and
//! plugins at defined lifecycle points.
//!
//! The source backs this with a bespoke `record_logger` service that owns a
//! schema per record kind and a sink that a host application wires up. This
//! crate instead rides on `tracing`'s structured-event machinery: emitting a
//! record with nobody subscribed to the resulting `tracing::Subscriber` is
//! just as cheap, and a host application gets to choose its own sink (file,
//! stdout, an aggregation service) without this crate knowing about it;
//! file- and network-backed sinks stay out of scope here, same as in the
//! source.

use crate::registry::Service;

/// A handle to the structured-record sink. Registered once in the service
/// registry at runtime start; plugins and subscriptions look it up to emit
/// their lifecycle records.
#[derive(Default)]
pub struct RecordLogger {
    _private: (),
}

impl RecordLogger {
    /// Construct a logger handle. There is no state to initialize: every
    /// call is a direct `tracing` emission.
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Emit the "subscription callback timing" record (§4.4): one event per
    /// delivered callback, logged at `debug` level since it fires at event
    /// rate.
    pub fn log_callback(
        &self,
        plugin_id: u64,
        topic_name: &str,
        sequence_no: usize,
        callback_duration: std::time::Duration,
    ) {
        #[cfg(feature = "debug")]
        tracing::debug!(
            plugin_id,
            topic_name,
            sequence_no,
            callback_duration_nanos = callback_duration.as_nanos() as u64,
            "switchboard_callback"
        );
        #[cfg(not(feature = "debug"))]
        let _ = (plugin_id, topic_name, sequence_no, callback_duration);
    }

    /// Emit the "subscription stopped" summary record (§4.4): enqueued,
    /// dequeued, and idle-cycle counts for one subscription's lifetime.
    pub fn log_topic_stop(&self, topic_name: &str, dequeued: usize, drained: usize, idle_cycles: usize) {
        #[cfg(feature = "debug")]
        tracing::info!(topic_name, dequeued, drained, idle_cycles, "switchboard_topic_stop");
        #[cfg(not(feature = "debug"))]
        let _ = (topic_name, dequeued, drained, idle_cycles);
    }

    /// Emit the "plugin start" record (§4.9): one event per plugin, at the
    /// moment its constructor finishes registering services.
    pub fn log_plugin_start(&self, plugin_id: u64, name: &str) {
        #[cfg(feature = "debug")]
        tracing::info!(plugin_id, name, "plugin_start");
        #[cfg(not(feature = "debug"))]
        let _ = (plugin_id, name);
    }

    /// Emit the "threadloop iteration" record (§4.7): iteration and skip
    /// counts for one pass of a threadloop plugin.
    pub fn log_threadloop_iteration(&self, plugin_id: u64, iteration_no: usize, skips: usize) {
        #[cfg(feature = "debug")]
        tracing::debug!(plugin_id, iteration_no, skips, "threadloop_iteration");
        #[cfg(not(feature = "debug"))]
        let _ = (plugin_id, iteration_no, skips);
    }
}

impl Service for RecordLogger {}
