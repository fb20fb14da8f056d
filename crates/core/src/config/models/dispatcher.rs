use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub enabled: bool,
    pub poll_interval_seconds: u64,
    pub max_concurrent_publishes: usize,
    pub publish_timeout_seconds: u64,
    /// 每个 Reel 的最大发布尝试次数
    pub max_retries: u32,
    pub shutdown_grace_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: 5,
            max_concurrent_publishes: 4,
            publish_timeout_seconds: 30,
            max_retries: 3,
            shutdown_grace_seconds: 10,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_seconds == 0 {
            return Err(anyhow::anyhow!("轮询间隔必须大于0"));
        }
        if self.max_concurrent_publishes == 0 {
            return Err(anyhow::anyhow!("最大并发发布数必须大于0"));
        }
        if self.publish_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("发布超时时间必须大于0"));
        }
        if self.max_retries == 0 {
            return Err(anyhow::anyhow!("最大重试次数必须大于0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_seconds)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// 下一次轮询即可重试
    Immediate,
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub strategy: RetryStrategy,
    pub base_delay_seconds: u64,
    pub max_delay_seconds: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Exponential,
            base_delay_seconds: 30,
            max_delay_seconds: 900,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryConfig {
    pub fn immediate() -> Self {
        Self {
            strategy: RetryStrategy::Immediate,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!("退避倍数不能小于1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(anyhow::anyhow!("抖动因子必须在0.0到1.0之间"));
        }
        if self.max_delay_seconds < self.base_delay_seconds {
            return Err(anyhow::anyhow!("最大延迟不能小于基础延迟"));
        }
        Ok(())
    }
}
