use serde::Deserialize;

/// Where a [`Publisher`](https://docs.rs/lithos-pubsub) or
/// [`Subscriber`](https://docs.rs/lithos-pubsub) binds/connects.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    Unix { path: String },
    Tcp { host: String, port: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStoreBackend {
    File,
    Master,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    pub publisher_name: String,
    pub listen: Endpoint,
    #[serde(default = "defaults::journal_base_path")]
    pub journal_base_path: String,
    #[serde(default)]
    pub sequence_store: SequenceStoreBackend,
    #[serde(default = "defaults::sequence_store_dir")]
    pub sequence_store_dir: String,
    #[serde(default = "defaults::recovery_workers")]
    pub recovery_workers: usize,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberConfig {
    pub client_name: String,
    pub connect: Endpoint,
    #[serde(default = "defaults::topic_mask")]
    pub topic_mask: u32,
    #[serde(default = "defaults::reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

impl Default for SequenceStoreBackend {
    fn default() -> Self {
        SequenceStoreBackend::File
    }
}

mod defaults {
    pub fn journal_base_path() -> String {
        "/tmp/lithos_pubsub/journal".into()
    }

    pub fn sequence_store_dir() -> String {
        "/tmp/lithos_pubsub/sequences".into()
    }

    pub fn recovery_workers() -> usize {
        4
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn topic_mask() -> u32 {
        0b111
    }

    pub fn reconnect_delay_ms() -> u64 {
        1000
    }
}
