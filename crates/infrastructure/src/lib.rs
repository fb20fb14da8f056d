pub mod error_handling;
pub mod export;
pub mod kv;
pub mod observability;
pub mod preferences_store;
pub mod preview;
pub mod publisher;
pub mod reel_store;

pub use export::{ExportBundler, BATCH_EXPORT_LIMIT};
pub use kv::{
    InMemoryKeyValueStore, KeyValueStoreFactory, PersistPolicy, SqliteKeyValueStore, StorageKeys,
};
pub use observability::MetricsCollector;
pub use preferences_store::KvPreferencesStore;
pub use preview::PreviewAsset;
pub use publisher::DryRunPublisher;
pub use reel_store::KvReelStore;
