//! Strongly-typed TOML configuration: per-store descriptors for
//! [`MasterRegistry`](https://docs.rs/lithos-master) and server configs for the
//! publisher/subscriber binaries. Generalizes `obsidian-config`/`onyx-config`'s
//! `load()`/`ConfigError`/`defaults` shape to the new schemas.

mod descriptor;
mod error;
mod loader;
mod server;

pub use descriptor::{BackendKind, MasterDescriptor};
pub use error::ConfigError;
pub use loader::{load_toml, load_toml_dir};
pub use server::{Endpoint, PublisherConfig, SequenceStoreBackend, SubscriberConfig};
