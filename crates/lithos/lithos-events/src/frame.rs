//! Wire frames exchanged between a publisher and its subscribers. Each frame
//! is a 4-byte magic followed by a fixed or variable header, matching
//! `original_source/pubsub/Common.h`'s `TopicMessage`/`SubscriptionRequest`/
//! etc. byte for byte (native-endian, no padding).

/// Bitmask values a subscriber can OR together when requesting topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Topic1 = 1,
    Topic2 = 2,
    Misc = 4,
    All = 7,
}

impl Topic {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Topic::Topic1),
            2 => Some(Topic::Topic2),
            4 => Some(Topic::Misc),
            7 => Some(Topic::All),
            _ => None,
        }
    }
}

pub mod magic {
    pub const TOPIC_MESSAGE: u32 = 0x54_4F_50_49;
    pub const SUBSCRIPTION_REQUEST: u32 = 0x53_55_42_53;
    pub const SUBSCRIPTION_RESPONSE: u32 = 0x53_55_4F_4B;
    pub const RECOVERY_REQUEST: u32 = 0x52_45_43_52;
    pub const RECOVERY_RESPONSE: u32 = 0x52_45_43_53;
    pub const RECOVERY_COMPLETE: u32 = 0x52_45_43_43;
}

pub const TOPIC_MESSAGE_HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 8 + 4;
pub const SUBSCRIPTION_REQUEST_SIZE: usize = 4 + 4 + 4 + 4 + 64;
pub const SUBSCRIPTION_RESPONSE_SIZE: usize = 4 + 4 + 4 + 4;
pub const RECOVERY_REQUEST_SIZE: usize = 4 + 4 + 4 + 4;
pub const RECOVERY_RESPONSE_SIZE: usize = 4 + 4 + 4 + 4 + 4;
pub const RECOVERY_COMPLETE_SIZE: usize = 4 + 4 + 8;

/// Fixed header of a topic message frame; `data` (of length `data_size`)
/// follows immediately after in the stream and is not part of this struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicMessageHeader {
    pub topic: u32,
    pub global_seq: u32,
    pub topic_seq: u32,
    pub timestamp: u64,
    pub data_size: u32,
}

impl TopicMessageHeader {
    pub fn to_bytes(self) -> [u8; TOPIC_MESSAGE_HEADER_SIZE] {
        let mut buf = [0u8; TOPIC_MESSAGE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&magic::TOPIC_MESSAGE.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.topic.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.global_seq.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.topic_seq.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.timestamp.to_ne_bytes());
        buf[24..28].copy_from_slice(&self.data_size.to_ne_bytes());
        buf
    }

    /// `buf` must start past the magic, i.e. at `topic`.
    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            topic: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            global_seq: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            topic_seq: u32::from_ne_bytes(buf[8..12].try_into().unwrap()),
            timestamp: u64::from_ne_bytes(buf[12..20].try_into().unwrap()),
            data_size: u32::from_ne_bytes(buf[20..24].try_into().unwrap()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub client_id: u32,
    pub topic_mask: u32,
    pub last_seq: u32,
    pub client_name: [u8; 64],
}

impl SubscriptionRequest {
    pub fn to_bytes(&self) -> [u8; SUBSCRIPTION_REQUEST_SIZE] {
        let mut buf = [0u8; SUBSCRIPTION_REQUEST_SIZE];
        buf[0..4].copy_from_slice(&magic::SUBSCRIPTION_REQUEST.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.client_id.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.topic_mask.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.last_seq.to_ne_bytes());
        buf[16..80].copy_from_slice(&self.client_name);
        buf
    }

    /// `buf` must start past the magic, i.e. at `client_id`.
    pub fn from_bytes(buf: &[u8]) -> Self {
        let mut client_name = [0u8; 64];
        client_name.copy_from_slice(&buf[12..76]);
        Self {
            client_id: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            topic_mask: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            last_seq: u32::from_ne_bytes(buf[8..12].try_into().unwrap()),
            client_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionResponse {
    pub result: u32,
    pub approved_topics: u32,
    pub current_seq: u32,
}

impl SubscriptionResponse {
    pub fn to_bytes(self) -> [u8; SUBSCRIPTION_RESPONSE_SIZE] {
        let mut buf = [0u8; SUBSCRIPTION_RESPONSE_SIZE];
        buf[0..4].copy_from_slice(&magic::SUBSCRIPTION_RESPONSE.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.result.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.approved_topics.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.current_seq.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            result: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            approved_topics: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            current_seq: u32::from_ne_bytes(buf[8..12].try_into().unwrap()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryRequest {
    pub client_id: u32,
    pub topic_mask: u32,
    pub last_seq: u32,
}

impl RecoveryRequest {
    pub fn to_bytes(self) -> [u8; RECOVERY_REQUEST_SIZE] {
        let mut buf = [0u8; RECOVERY_REQUEST_SIZE];
        buf[0..4].copy_from_slice(&magic::RECOVERY_REQUEST.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.client_id.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.topic_mask.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.last_seq.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            client_id: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            topic_mask: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            last_seq: u32::from_ne_bytes(buf[8..12].try_into().unwrap()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryResponse {
    pub result: u32,
    pub start_seq: u32,
    pub end_seq: u32,
    pub total: u32,
}

impl RecoveryResponse {
    pub fn to_bytes(self) -> [u8; RECOVERY_RESPONSE_SIZE] {
        let mut buf = [0u8; RECOVERY_RESPONSE_SIZE];
        buf[0..4].copy_from_slice(&magic::RECOVERY_RESPONSE.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.result.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.start_seq.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.end_seq.to_ne_bytes());
        buf[16..20].copy_from_slice(&self.total.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            result: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            start_seq: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            end_seq: u32::from_ne_bytes(buf[8..12].try_into().unwrap()),
            total: u32::from_ne_bytes(buf[12..16].try_into().unwrap()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryComplete {
    pub total_sent: u32,
    pub timestamp: u64,
}

impl RecoveryComplete {
    pub fn to_bytes(self) -> [u8; RECOVERY_COMPLETE_SIZE] {
        let mut buf = [0u8; RECOVERY_COMPLETE_SIZE];
        buf[0..4].copy_from_slice(&magic::RECOVERY_COMPLETE.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.total_sent.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            total_sent: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            timestamp: u64::from_ne_bytes(buf[4..12].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_message_header_roundtrip() {
        let header =
            TopicMessageHeader { topic: Topic::Topic2 as u32, global_seq: 9, topic_seq: 3, timestamp: 123_456, data_size: 64 };
        let bytes = header.to_bytes();
        assert_eq!(u32::from_ne_bytes(bytes[0..4].try_into().unwrap()), magic::TOPIC_MESSAGE);
        assert_eq!(TopicMessageHeader::from_bytes(&bytes[4..]), header);
    }

    #[test]
    fn subscription_request_roundtrip() {
        let mut client_name = [0u8; 64];
        client_name[..6].copy_from_slice(b"trader");
        let request = SubscriptionRequest { client_id: 7, topic_mask: Topic::All as u32, last_seq: 0, client_name };
        let bytes = request.to_bytes();
        assert_eq!(u32::from_ne_bytes(bytes[0..4].try_into().unwrap()), magic::SUBSCRIPTION_REQUEST);
        assert_eq!(SubscriptionRequest::from_bytes(&bytes[4..]), request);
    }

    #[test]
    fn topic_from_u32_rejects_unknown_bits() {
        assert_eq!(Topic::from_u32(3), None);
        assert_eq!(Topic::from_u32(4), Some(Topic::Misc));
    }
}
