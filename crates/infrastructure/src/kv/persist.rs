use reelgen_core::StorageConfig;
use reelgen_domain::KeyValueStore;
use reelgen_errors::{ReelError, ReelResult};
use std::time::Duration;
use tracing::warn;

/// 写入重试策略：固定次数，线性递增的等待时间
#[derive(Debug, Clone)]
pub struct PersistPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for PersistPolicy {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

impl PersistPolicy {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            attempts: config.persist_retries.max(1),
            delay: config.persist_retry_delay(),
        }
    }

    pub fn no_delay(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    pub async fn write(&self, kv: &dyn KeyValueStore, key: &str, value: &str) -> ReelResult<()> {
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            match kv.set(key, value).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(key = key, attempt = attempt, error = %e, "写入键值存储失败");
                    last_error = Some(e);
                    if attempt < self.attempts && !self.delay.is_zero() {
                        tokio::time::sleep(self.delay * attempt).await;
                    }
                }
            }
        }

        Err(match last_error {
            Some(ReelError::Storage(msg)) => {
                ReelError::storage(format!("{key} 在 {} 次尝试后仍写入失败: {msg}", self.attempts))
            }
            Some(other) => other,
            None => ReelError::storage(format!("{key} 写入失败")),
        })
    }
}
