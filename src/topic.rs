//! Named, typed fan-out points and the handles acquired against them.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::event::{ErasedEvent, Event};
use crate::record::RecordLogger;
use crate::thread::managed::ManagedThread;

/// Default ring capacity `B`, matching the source's `_m_latest_buffer_size`.
pub const DEFAULT_RING_CAPACITY: usize = 256;

/// Default bound on a subscription's delivery queue (§4.4: "a bounded
/// blocking queue with a generous default bound").
pub const DEFAULT_QUEUE_BOUND: usize = 1024;

/// Whether a topic drops events when a subscriber's queue is full, or blocks
/// the publisher until space is available. Chosen per topic at creation and
/// uniform across all of that topic's subscribers (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Enqueue never blocks the publisher; a full queue drops the event.
    Lossy,
    /// Enqueue blocks the publisher until the subscriber catches up.
    Lossless,
}

/// The latest-value ring plus the list of subscriptions fanned out to on
/// every `put`.
///
/// Two independent locks guard this: the ring buffer's slots (a
/// `RwLock<Vec<_>>`, read on every `get`, written on every `put`) and the
/// subscription list (a separate `RwLock`, read-locked during fan-out,
/// write-locked only when a subscription or buffered reader is added or
/// removed). Neither lock is ever held while the other is acquired, so the
/// two-tier discipline in the top-level design notes holds trivially within
/// one topic.
pub struct Topic {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    ring: RwLock<Vec<Option<ErasedEvent>>>,
    latest_index: AtomicUsize,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    buffered_senders: RwLock<Vec<flume::Sender<ErasedEvent>>>,
    record_logger: Option<Arc<RecordLogger>>,
    queue_bound: usize,
    queue_policy: QueuePolicy,
}

impl Topic {
    pub(crate) fn new(
        name: String,
        type_id: TypeId,
        type_name: &'static str,
        record_logger: Option<Arc<RecordLogger>>,
        ring_capacity: usize,
        queue_bound: usize,
        queue_policy: QueuePolicy,
    ) -> Self {
        Self {
            name,
            type_id,
            type_name,
            ring: RwLock::new(vec![None; ring_capacity.max(1)]),
            latest_index: AtomicUsize::new(0),
            subscriptions: RwLock::new(Vec::new()),
            buffered_senders: RwLock::new(Vec::new()),
            record_logger,
            queue_bound,
            queue_policy,
        }
    }

    /// The topic's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn check_type<T: 'static>(&self) -> CoreResult<()> {
        if self.type_id == TypeId::of::<T>() {
            Ok(())
        } else {
            Err(CoreError::TypeMismatch {
                topic: self.name.clone(),
                declared: self.type_name,
                requested: std::any::type_name::<T>(),
            })
        }
    }

    fn ring_len(&self) -> usize {
        self.ring.read().expect("ring lock poisoned").len()
    }

    /// Get a read-only copy of the most recent event, if any has been
    /// published yet. Never blocks.
    pub(crate) fn get_latest(&self) -> Option<ErasedEvent> {
        let index = self.latest_index.load(Ordering::Acquire) % self.ring_len();
        self.ring.read().expect("ring lock poisoned")[index].clone()
    }

    /// Publish `event`, advancing the ring and fanning out to every
    /// subscription and buffered reader present at this moment.
    pub(crate) fn put(&self, event: ErasedEvent) {
        let len = self.ring_len();
        {
            let mut ring = self.ring.write().expect("ring lock poisoned");
            let index = (self.latest_index.load(Ordering::Acquire) + 1) % len;
            ring[index] = Some(Arc::clone(&event));
        }
        self.latest_index.fetch_add(1, Ordering::AcqRel);

        let subscriptions = self.subscriptions.read().expect("subscriptions lock poisoned");
        for subscription in subscriptions.iter() {
            subscription.enqueue(Arc::clone(&event), self.queue_policy);
        }
        drop(subscriptions);

        let buffered = self.buffered_senders.read().expect("buffered lock poisoned");
        for sender in buffered.iter() {
            let _ = sender.send(Arc::clone(&event));
        }
    }

    /// Append a new subscription running `callback` on its own worker
    /// thread, returning its handle.
    pub(crate) fn schedule(
        self: &Arc<Self>,
        subscriber_id: u64,
        callback: Box<dyn Fn(ErasedEvent, usize) + Send + Sync>,
    ) -> Arc<Subscription> {
        let subscription = Subscription::start(
            self.name.clone(),
            subscriber_id,
            callback,
            self.record_logger.clone(),
            self.queue_bound,
        );
        self.subscriptions
            .write()
            .expect("subscriptions lock poisoned")
            .push(Arc::clone(&subscription));
        subscription
    }

    /// Register a buffered reader's delivery channel. Unbounded: a buffered
    /// reader must observe every event in order, so the publisher never
    /// drops on its account, however far behind it falls.
    pub(crate) fn add_buffered(&self) -> flume::Receiver<ErasedEvent> {
        let (tx, rx) = flume::unbounded();
        self.buffered_senders.write().expect("buffered lock poisoned").push(tx);
        rx
    }

    /// Stop every subscription's worker thread. Buffered readers have no
    /// worker to stop; they simply stop receiving new events.
    pub(crate) fn stop(&self) {
        let drained: Vec<_> = std::mem::take(&mut *self.subscriptions.write().expect("subscriptions lock poisoned"));
        for subscription in drained {
            subscription.stop();
        }
    }
}

/// Per-subscriber bounded queue plus a dedicated worker thread executing a
/// user callback (§3, §4.4).
pub struct Subscription {
    topic_name: String,
    subscriber_id: u64,
    sender: flume::Sender<ErasedEvent>,
    enqueued: Arc<AtomicUsize>,
    dequeued: Arc<AtomicUsize>,
    idle_cycles: Arc<AtomicUsize>,
    thread: ManagedThread,
    record_logger: Option<Arc<RecordLogger>>,
}

const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(100);

impl Subscription {
    fn start(
        topic_name: String,
        subscriber_id: u64,
        callback: Box<dyn Fn(ErasedEvent, usize) + Send + Sync>,
        record_logger: Option<Arc<RecordLogger>>,
        queue_bound: usize,
    ) -> Arc<Self> {
        let (sender, receiver) = flume::bounded(queue_bound);
        let enqueued = Arc::new(AtomicUsize::new(0));
        let dequeued = Arc::new(AtomicUsize::new(0));
        let idle_cycles = Arc::new(AtomicUsize::new(0));
        let thread = ManagedThread::new();

        let subscription = Arc::new(Self {
            topic_name: topic_name.clone(),
            subscriber_id,
            sender,
            enqueued: Arc::clone(&enqueued),
            dequeued: Arc::clone(&dequeued),
            idle_cycles: Arc::clone(&idle_cycles),
            thread,
            record_logger: record_logger.clone(),
        });

        let dequeued_body = Arc::clone(&dequeued);
        let idle_body = Arc::clone(&idle_cycles);
        let body_topic_name = topic_name.clone();
        let body_logger = record_logger.clone();
        subscription.thread.start(
            move |_ctl| match receiver.recv_timeout(DEQUEUE_TIMEOUT) {
                Ok(event) => {
                    let seq = dequeued_body.fetch_add(1, Ordering::Relaxed) + 1;
                    let started = std::time::Instant::now();
                    callback(event, seq);
                    if let Some(logger) = &body_logger {
                        logger.log_callback(subscriber_id, &body_topic_name, seq, started.elapsed());
                    }
                }
                Err(flume::RecvTimeoutError::Timeout) => {
                    idle_body.fetch_add(1, Ordering::Relaxed);
                }
                Err(flume::RecvTimeoutError::Disconnected) => {
                    // Sender dropped: nothing left to do but idle until stopped.
                    std::thread::sleep(Duration::from_millis(10));
                }
            },
            || {},
            || {},
        );

        subscription
    }

    fn enqueue(&self, event: ErasedEvent, policy: QueuePolicy) {
        let result = match policy {
            QueuePolicy::Lossy => self.sender.try_send(event).map_err(|_| ()),
            QueuePolicy::Lossless => self.sender.send(event).map_err(|_| ()),
        };
        if result.is_ok() {
            self.enqueued.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events accepted into this subscription's queue so far.
    pub fn enqueued(&self) -> usize {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Number of events this subscription's callback has processed so far.
    pub fn dequeued(&self) -> usize {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Number of timed-out dequeue attempts so far.
    pub fn idle_cycles(&self) -> usize {
        self.idle_cycles.load(Ordering::Relaxed)
    }

    fn stop(&self) {
        self.thread.stop();
        let enqueued = self.enqueued.load(Ordering::Relaxed);
        let dequeued = self.dequeued.load(Ordering::Relaxed);
        let drained = enqueued.saturating_sub(dequeued);
        let idle_cycles = self.idle_cycles.load(Ordering::Relaxed);
        if let Some(logger) = &self.record_logger {
            logger.log_topic_stop(&self.topic_name, dequeued, drained, idle_cycles);
        }
    }
}

/// Non-owning, type-checked reference to a topic for asynchronous reads.
/// Never blocks on a publisher.
pub struct Reader<T> {
    topic: Arc<Topic>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Event + 'static> Reader<T> {
    pub(crate) fn new(topic: Arc<Topic>) -> Self {
        Self {
            topic,
            _marker: PhantomData,
        }
    }

    /// The most recent event on this reader's topic, or `None` if nothing
    /// has been published yet. Never panics, never blocks.
    pub fn get_latest_ro_nullable(&self) -> Option<Arc<T>> {
        self.topic
            .get_latest()
            .map(|event| event.downcast::<T>().expect("topic type invariant violated"))
    }

    /// Like [`Reader::get_latest_ro_nullable`], but panics if nothing has
    /// been published yet.
    #[track_caller]
    pub fn get_latest_ro(&self) -> Arc<T> {
        self.get_latest_ro_nullable()
            .expect("no event on topic yet")
    }

    /// The topic's name.
    pub fn topic_name(&self) -> &str {
        self.topic.name()
    }
}

/// Non-owning, type-checked reference to a topic for publication.
pub struct Writer<T> {
    topic: Arc<Topic>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Event + 'static> Writer<T> {
    pub(crate) fn new(topic: Arc<Topic>) -> Self {
        Self {
            topic,
            _marker: PhantomData,
        }
    }

    /// Construct a new owned event value. A hint for future pool reuse; for
    /// now, simply allocates.
    pub fn allocate(&self, value: T) -> Arc<T> {
        Arc::new(value)
    }

    /// Publish `event`, relinquishing ownership to the bus.
    pub fn put(&self, event: Arc<T>) {
        self.topic.put(event as ErasedEvent);
    }

    /// The topic's name.
    pub fn topic_name(&self) -> &str {
        self.topic.name()
    }
}

/// A reader that also holds its own single-consumer queue appended to on
/// every publish, for consumers that must observe every event but run their
/// own loop rather than a switchboard-managed callback.
pub struct BufferedReader<T> {
    topic: Arc<Topic>,
    receiver: flume::Receiver<ErasedEvent>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Event + 'static> BufferedReader<T> {
    pub(crate) fn new(topic: Arc<Topic>) -> Self {
        let receiver = topic.add_buffered();
        Self {
            topic,
            receiver,
            _marker: PhantomData,
        }
    }

    /// Block until the next event is available.
    pub fn dequeue(&self) -> Arc<T> {
        self.receiver
            .recv()
            .expect("topic outlives its buffered readers")
            .downcast::<T>()
            .expect("topic type invariant violated")
    }

    /// Return the next event if one is already queued, without blocking.
    pub fn try_dequeue(&self) -> Option<Arc<T>> {
        self.receiver
            .try_recv()
            .ok()
            .map(|event| event.downcast::<T>().expect("topic type invariant violated"))
    }

    /// The topic's name.
    pub fn topic_name(&self) -> &str {
        self.topic.name()
    }
}
