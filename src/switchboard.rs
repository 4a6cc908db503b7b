//! Owner and factory of topics: the bus itself.

use std::any::TypeId;
use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use crate::error::CoreResult;
use crate::event::Event;
use crate::record::RecordLogger;
use crate::registry::Service;
use crate::topic::{
    BufferedReader, QueuePolicy, Reader, Subscription, Topic, Writer, DEFAULT_QUEUE_BOUND, DEFAULT_RING_CAPACITY,
};

/// Owns a map from topic name to [`Topic`], guarded by a reader-writer lock
/// acquired shared for steady-state lookups and exclusive only for
/// first-time topic creation (§4.5, §5).
pub struct Switchboard {
    topics: RwLock<FxHashMap<String, Arc<Topic>>>,
    record_logger: Option<Arc<RecordLogger>>,
    ring_capacity: usize,
    queue_bound: usize,
    queue_policy: QueuePolicy,
}

impl Default for Switchboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Switchboard {
    /// Construct a switchboard with no record logger and the default ring
    /// capacity (256), queue bound (1024), and lossless queue policy.
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(FxHashMap::default()),
            record_logger: None,
            ring_capacity: DEFAULT_RING_CAPACITY,
            queue_bound: DEFAULT_QUEUE_BOUND,
            queue_policy: QueuePolicy::Lossless,
        }
    }

    /// Attach a record logger; every subscription created afterward will
    /// emit through it.
    pub fn with_record_logger(mut self, logger: Arc<RecordLogger>) -> Self {
        self.record_logger = Some(logger);
        self
    }

    /// Override the ring capacity `B` used by topics created afterward.
    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    /// Override the subscription queue bound used by topics created
    /// afterward.
    pub fn with_queue_bound(mut self, bound: usize) -> Self {
        self.queue_bound = bound;
        self
    }

    /// Override the lossy/lossless policy used by topics created afterward.
    pub fn with_queue_policy(mut self, policy: QueuePolicy) -> Self {
        self.queue_policy = policy;
        self
    }

    fn try_register_topic<T: Event + 'static>(&self, topic_name: &str) -> CoreResult<Arc<Topic>> {
        {
            let topics = self.topics.read().expect("switchboard lock poisoned");
            if let Some(topic) = topics.get(topic_name) {
                topic.check_type::<T>()?;
                return Ok(Arc::clone(topic));
            }
        }

        let mut topics = self.topics.write().expect("switchboard lock poisoned");
        if let Some(topic) = topics.get(topic_name) {
            topic.check_type::<T>()?;
            return Ok(Arc::clone(topic));
        }
        let topic = Arc::new(Topic::new(
            topic_name.to_string(),
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            self.record_logger.clone(),
            self.ring_capacity,
            self.queue_bound,
            self.queue_policy,
        ));
        topics.insert(topic_name.to_string(), Arc::clone(&topic));
        Ok(topic)
    }

    #[track_caller]
    fn register_topic<T: Event + 'static>(&self, topic_name: &str) -> Arc<Topic> {
        self.try_register_topic::<T>(topic_name).unwrap_or_else(|e| e.panic())
    }

    /// Get a handle to read the latest value on `topic_name`, creating the
    /// topic with element type `T` if it doesn't exist yet. Panics on a
    /// type mismatch against an existing topic of a different type.
    #[track_caller]
    pub fn get_reader<T: Event + 'static>(&self, topic_name: &str) -> Reader<T> {
        Reader::new(self.register_topic::<T>(topic_name))
    }

    /// Get a handle to publish to `topic_name`, creating the topic with
    /// element type `T` if it doesn't exist yet.
    #[track_caller]
    pub fn get_writer<T: Event + 'static>(&self, topic_name: &str) -> Writer<T> {
        Writer::new(self.register_topic::<T>(topic_name))
    }

    /// Get a buffered-reader handle, which observes every event on
    /// `topic_name` through its own queue instead of the topic's
    /// latest-value slot.
    #[track_caller]
    pub fn get_buffered_reader<T: Event + 'static>(&self, topic_name: &str) -> BufferedReader<T> {
        BufferedReader::new(self.register_topic::<T>(topic_name))
    }

    /// Schedule `callback` to run on every event published to `topic_name`,
    /// on a dedicated worker thread, serialized in publication order.
    /// `subscriber_id` is carried into diagnostic records.
    #[track_caller]
    pub fn schedule<T, F>(&self, subscriber_id: u64, topic_name: &str, callback: F) -> Arc<Subscription>
    where
        T: Event + 'static,
        F: Fn(Arc<T>, usize) + Send + Sync + 'static,
    {
        let topic = self.register_topic::<T>(topic_name);
        topic.schedule(
            subscriber_id,
            Box::new(move |event, seq| {
                let event = event.downcast::<T>().expect("topic type invariant violated");
                callback(event, seq);
            }),
        )
    }

    /// Stop every topic's subscriptions. Topics remain alive so outstanding
    /// reader/writer handles never dangle. Returns only once every
    /// subscription's worker thread has exited, so no subscription callback
    /// can begin after this call returns.
    pub fn stop(&self) {
        let topics = self.topics.read().expect("switchboard lock poisoned");
        for topic in topics.values() {
            topic.stop();
        }
    }
}

impl Service for Switchboard {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Counter {
        n: i32,
    }

    #[test]
    fn publish_before_subscribe_delivers_only_subsequent_events() {
        let sb = Switchboard::new();
        let writer = sb.get_writer::<Counter>("x");
        writer.put(writer.allocate(Counter { n: 1 }));

        let seen = Arc::new(AtomicI32::new(0));
        let seen_cb = Arc::clone(&seen);
        let _sub = sb.schedule::<Counter, _>(0, "x", move |event, _seq| {
            seen_cb.store(event.n, Ordering::SeqCst);
        });

        writer.put(writer.allocate(Counter { n: 2 }));
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        let reader = sb.get_reader::<Counter>("x");
        assert_eq!(reader.get_latest_ro().n, 2);
        sb.stop();
    }

    #[test]
    fn reader_without_publication_returns_none() {
        let sb = Switchboard::new();
        let reader = sb.get_reader::<Counter>("empty");
        assert!(reader.get_latest_ro_nullable().is_none());
    }

    #[test]
    fn many_readers_one_writer_never_observe_decreasing_values() {
        let sb = Arc::new(Switchboard::new());
        let writer = sb.get_writer::<Counter>("stream");

        let readers: Vec<_> = (0..4).map(|_| sb.get_reader::<Counter>("stream")).collect();
        let writer_handle = std::thread::spawn(move || {
            for n in 1..=2000 {
                writer.put(writer.allocate(Counter { n }));
            }
        });

        let reader_handles: Vec<_> = readers
            .into_iter()
            .map(|reader| {
                std::thread::spawn(move || {
                    let mut last = 0;
                    for _ in 0..2000 {
                        if let Some(event) = reader.get_latest_ro_nullable() {
                            assert!(event.n >= last, "saw {} after {}", event.n, last);
                            last = event.n;
                        }
                    }
                })
            })
            .collect();

        writer_handle.join().unwrap();
        for h in reader_handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn stop_prevents_further_callbacks() {
        let sb = Switchboard::new();
        let writer = sb.get_writer::<Counter>("s4");
        let seen = Arc::new(AtomicI32::new(0));
        let seen_cb = Arc::clone(&seen);
        let _sub = sb.schedule::<Counter, _>(0, "s4", move |event, _seq| {
            std::thread::sleep(Duration::from_millis(1));
            seen_cb.store(event.n, Ordering::SeqCst);
        });

        for n in 0..10 {
            writer.put(writer.allocate(Counter { n }));
        }
        sb.stop();
        let after_stop = seen.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(seen.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn buffered_reader_observes_every_event_in_order() {
        let sb = Switchboard::new();
        let writer = sb.get_writer::<Counter>("buffered");
        let buffered = sb.get_buffered_reader::<Counter>("buffered");

        for n in 0..50 {
            writer.put(writer.allocate(Counter { n }));
        }

        for expected in 0..50 {
            assert_eq!(buffered.dequeue().n, expected);
        }
    }

    #[test]
    #[should_panic]
    fn type_mismatch_against_existing_topic_panics() {
        let sb = Switchboard::new();
        let _reader = sb.get_reader::<Counter>("typed");
        let _bad_writer = sb.get_writer::<i32>("typed");
    }
}
