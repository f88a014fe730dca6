pub mod frame;
pub mod sequence;

pub use frame::{
    RecoveryComplete, RecoveryRequest, RecoveryResponse, SubscriptionRequest, SubscriptionResponse, Topic,
    TopicMessageHeader, magic,
};
pub use sequence::PublisherSequenceRecord;
