//! Hot topics with replay-1 fan-out and latest-value backpressure.

use crate::error::{StreamError, StreamResult};
use crate::source::{Emitter, MappedSource, Source, SourceEvent, SourceHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Clone)]
enum Slot<T> {
    Empty,
    Value { seq: u64, value: T },
    Failed { error: StreamError },
}

struct ProducerState {
    subscribers: usize,
    handle: Option<SourceHandle>,
}

struct TopicInner<T> {
    name: String,
    source: Arc<dyn Source<T>>,
    tx: watch::Sender<Slot<T>>,
    seq: AtomicU64,
    state: Mutex<ProducerState>,
}

/// A hot, multi-subscriber topic.
///
/// Cloning shares the same underlying producer and latest-value slot.
pub struct Topic<T> {
    inner: Arc<TopicInner<T>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Topic<T> {
    /// Create a topic over its single underlying producer.
    pub fn new(name: impl Into<String>, source: impl Source<T>) -> Self {
        let (tx, _) = watch::channel(Slot::Empty);
        Self {
            inner: Arc::new(TopicInner {
                name: name.into(),
                source: Arc::new(source),
                tx,
                seq: AtomicU64::new(0),
                state: Mutex::new(ProducerState {
                    subscribers: 0,
                    handle: None,
                }),
            }),
        }
    }

    /// Create a topic whose producer emits a different wire type,
    /// converted once per value before fan-out.
    pub fn with_conversion<W: Send + 'static>(
        name: impl Into<String>,
        source: impl Source<W>,
        convert: impl Fn(W) -> T + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, MappedSource::new(source, convert))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Attach a subscriber, starting the producer on the first one.
    pub fn subscribe(&self) -> Subscriber<T> {
        let mut state = self.inner.state.lock();
        state.subscribers += 1;
        if state.handle.is_none() {
            // Restarting after a failure begins from a clean slot.
            let failed = matches!(&*self.inner.tx.borrow(), Slot::Failed { .. });
            if failed {
                self.inner.tx.send_replace(Slot::Empty);
            }
            debug!(topic = %self.inner.name, "starting producer");
            state.handle = Some(self.inner.source.start(self.emitter()));
        }
        drop(state);

        Subscriber {
            topic: self.inner.clone(),
            rx: self.inner.tx.subscribe(),
            last_seq: 0,
            terminated: false,
        }
    }

    /// Non-blocking snapshot of the most recent value, if any.
    pub fn peek(&self) -> Option<T> {
        match &*self.inner.tx.borrow() {
            Slot::Value { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    /// Latest-value reader: waits for the first message (bounded by
    /// `timeout`), then serves a cached last value on every `get`.
    ///
    /// A zero timeout on an empty topic fails immediately.
    pub async fn latest(&self, timeout: Duration) -> StreamResult<LatestReader<T>> {
        let mut sub = self.subscribe();
        match tokio::time::timeout(timeout, sub.recv()).await {
            Ok(Ok(first)) => Ok(LatestReader { sub, cached: first }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StreamError::Timeout {
                topic: self.inner.name.clone(),
                waited_ms: timeout.as_millis(),
            }),
        }
    }

    /// Number of live subscribers, for diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers
    }

    fn emitter(&self) -> Emitter<T> {
        let weak: Weak<TopicInner<T>> = Arc::downgrade(&self.inner);
        Emitter::new(move |event| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match event {
                SourceEvent::Value(value) => {
                    let seq = inner.seq.fetch_add(1, Ordering::Relaxed) + 1;
                    inner.tx.send_replace(Slot::Value { seq, value });
                }
                SourceEvent::Error(message) => {
                    warn!(topic = %inner.name, %message, "producer failed; tearing topic down");
                    inner.tx.send_replace(Slot::Failed {
                        error: StreamError::Producer {
                            topic: inner.name.clone(),
                            message,
                        },
                    });
                    let stopped = { inner.state.lock().handle.take() };
                    drop(stopped);
                }
            }
        })
    }
}

/// One subscriber's view of a topic.
///
/// Values arrive in production order; when the subscriber lags, older
/// values are dropped in favor of the latest.
pub struct Subscriber<T> {
    topic: Arc<TopicInner<T>>,
    rx: watch::Receiver<Slot<T>>,
    last_seq: u64,
    terminated: bool,
}

impl<T: Clone + Send + Sync + 'static> Subscriber<T> {
    /// Await the next value not yet seen by this subscriber.
    pub async fn recv(&mut self) -> StreamResult<T> {
        if self.terminated {
            return Err(StreamError::Closed {
                topic: self.topic.name.clone(),
            });
        }
        loop {
            {
                let slot = self.rx.borrow_and_update();
                match &*slot {
                    Slot::Value { seq, value } if *seq > self.last_seq => {
                        self.last_seq = *seq;
                        return Ok(value.clone());
                    }
                    Slot::Failed { error } => {
                        self.terminated = true;
                        return Err(error.clone());
                    }
                    _ => {}
                }
            }
            if self.rx.changed().await.is_err() {
                self.terminated = true;
                return Err(StreamError::Closed {
                    topic: self.topic.name.clone(),
                });
            }
        }
    }

    /// Non-blocking snapshot of the most recent value, if any.
    pub fn peek(&self) -> Option<T> {
        match &*self.rx.borrow() {
            Slot::Value { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    pub fn topic_name(&self) -> &str {
        &self.topic.name
    }
}

impl<T> Drop for Subscriber<T> {
    fn drop(&mut self) {
        let mut state = self.topic.state.lock();
        state.subscribers = state.subscribers.saturating_sub(1);
        if state.subscribers == 0 {
            let stopped = state.handle.take();
            drop(state);
            drop(stopped);
            debug!(topic = %self.topic.name, "last subscriber gone; producer stopped");
        }
    }
}

/// Cached latest-value getter backed by a live subscription.
///
/// Dropping the reader releases the subscription.
pub struct LatestReader<T> {
    sub: Subscriber<T>,
    cached: T,
}

impl<T: Clone + Send + Sync + 'static> LatestReader<T> {
    /// The most recent value. Never blocks; after a producer failure the
    /// last good value keeps being served.
    pub fn get(&mut self) -> T {
        if let Some(value) = self.sub.peek() {
            self.cached = value;
        }
        self.cached.clone()
    }
}
