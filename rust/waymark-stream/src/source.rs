//! Topic producers.
//!
//! A [`Source`] is the single underlying producer behind a topic (one
//! middleware subscription, one capture loop, one simulated stream). It
//! is started when the first subscriber attaches and stopped through its
//! [`SourceHandle`] when the last one detaches.

use std::sync::Arc;
use tokio::task::JoinHandle;

/// An event pushed by a producer.
pub enum SourceEvent<T> {
    Value(T),
    /// Terminal failure; tears the topic down.
    Error(String),
}

/// Push side handed to a producer on start.
pub struct Emitter<T> {
    push: Arc<dyn Fn(SourceEvent<T>) + Send + Sync>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            push: self.push.clone(),
        }
    }
}

impl<T: Send + 'static> Emitter<T> {
    pub fn new(push: impl Fn(SourceEvent<T>) + Send + Sync + 'static) -> Self {
        Self {
            push: Arc::new(push),
        }
    }

    pub fn emit(&self, value: T) {
        (self.push)(SourceEvent::Value(value));
    }

    pub fn fail(&self, message: impl Into<String>) {
        (self.push)(SourceEvent::Error(message.into()));
    }

    /// Adapt this emitter to accept a different wire type.
    ///
    /// The conversion runs once per produced value, before fan-out.
    pub fn map_input<W: Send + 'static>(
        self,
        convert: impl Fn(W) -> T + Send + Sync + 'static,
    ) -> Emitter<W> {
        let push = self.push;
        Emitter {
            push: Arc::new(move |event| match event {
                SourceEvent::Value(w) => (push)(SourceEvent::Value(convert(w))),
                SourceEvent::Error(e) => (push)(SourceEvent::Error(e)),
            }),
        }
    }
}

/// Stops the producer when dropped.
pub struct SourceHandle {
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl SourceHandle {
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
        }
    }

    /// A handle that aborts a spawned producer task.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self::new(move || task.abort())
    }

    /// For producers with nothing to tear down.
    pub fn noop() -> Self {
        Self { stop: None }
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

/// The single underlying producer behind a topic.
pub trait Source<T: Send + 'static>: Send + Sync + 'static {
    fn start(&self, emitter: Emitter<T>) -> SourceHandle;
}

impl<T, F> Source<T> for F
where
    T: Send + 'static,
    F: Fn(Emitter<T>) -> SourceHandle + Send + Sync + 'static,
{
    fn start(&self, emitter: Emitter<T>) -> SourceHandle {
        (self)(emitter)
    }
}

/// A source whose wire type differs from the topic's logical type.
pub struct MappedSource<W, T> {
    inner: Arc<dyn Source<W>>,
    convert: Arc<dyn Fn(W) -> T + Send + Sync>,
}

impl<W: Send + 'static, T: Send + 'static> MappedSource<W, T> {
    pub fn new(
        inner: impl Source<W>,
        convert: impl Fn(W) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(inner),
            convert: Arc::new(convert),
        }
    }
}

impl<W: Send + 'static, T: Send + 'static> Source<T> for MappedSource<W, T> {
    fn start(&self, emitter: Emitter<T>) -> SourceHandle {
        let convert = self.convert.clone();
        self.inner.start(emitter.map_input(move |w| convert(w)))
    }
}
