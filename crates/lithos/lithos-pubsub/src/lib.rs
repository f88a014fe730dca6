//! Publish/subscribe over a framed TCP or Unix-domain socket, backed by a
//! durable message journal and per-publisher sequence counters. Grounded on
//! `original_source/pubsub/` (`SimplePublisherV2.h`, `SimpleSubscriber.h`,
//! `SequenceStorage.h`, `Common.h`).

mod codec;
mod error;
mod publisher;
mod recovery;
mod sequence_store;
mod subscriber;

pub use codec::Frame;
pub use error::PubSubError;
pub use publisher::{DuplexStream, Publisher};
pub use sequence_store::{FileSequenceStore, MasterSequenceStore, SequenceStore};
pub use subscriber::{Subscriber, SubscriberState};

pub(crate) fn now_ns() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64
}
