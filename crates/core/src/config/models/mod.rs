pub mod app_config;
pub mod dispatcher;
pub mod generation;
pub mod observability;
pub mod storage;

pub use app_config::AppConfig;
pub use dispatcher::{DispatcherConfig, RetryConfig, RetryStrategy};
pub use generation::GenerationConfig;
pub use observability::{LogFormat, ObservabilityConfig};
pub use storage::{StorageBackend, StorageConfig};
