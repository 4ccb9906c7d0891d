//! Reactive stream substrate.
//!
//! A [`Topic`] fans one underlying producer out to any number of
//! subscribers at independent rates:
//!
//! ```text
//! transport thread ─► latest-value slot ─► sub1 (fast)
//!                                      ├─► sub2 (slow, drops older)
//!                                      └─► sub3 (slower, drops older)
//! ```
//!
//! - a new subscriber immediately observes the most recent value, then
//!   live values;
//! - a slow subscriber only ever misses *older* values, never the
//!   latest, and never slows a fast one;
//! - the producer starts on the first subscriber and stops exactly when
//!   the last one goes away.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod cancel;
pub mod error;
pub mod pool;
pub mod source;
pub mod topic;

pub use cancel::CancelToken;
pub use error::{StreamError, StreamResult};
pub use pool::{build_runtime, default_worker_threads};
pub use source::{Emitter, MappedSource, Source, SourceEvent, SourceHandle};
pub use topic::{LatestReader, Subscriber, Topic};
