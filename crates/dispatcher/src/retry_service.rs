use chrono::{DateTime, Utc};
use reelgen_core::{RetryConfig, RetryStrategy};
use std::time::Duration;
use tracing::debug;

/// 发布失败后的重试时间计算
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn immediate() -> Self {
        Self::new(RetryConfig::immediate())
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// `base * multiplier^attempts`，上限 `max_delay_seconds`，可选随机抖动
    pub fn calculate_delay(&self, attempts: u32) -> Duration {
        if self.config.strategy == RetryStrategy::Immediate {
            return Duration::ZERO;
        }

        let base = self.config.base_delay_seconds as f64;
        let max = self.config.max_delay_seconds as f64;
        let exponent = attempts.min(32) as i32;
        let mut delay = (base * self.config.backoff_multiplier.powi(exponent)).min(max);

        if self.config.jitter_factor > 0.0 {
            let jitter = (rand::random::<f64>() * 2.0 - 1.0) * self.config.jitter_factor;
            delay = (delay * (1.0 + jitter)).clamp(0.0, max);
        }

        Duration::from_secs_f64(delay)
    }

    /// 下次可被选中的时间；None 表示下一次轮询即可重试
    pub fn next_attempt_at(&self, attempts: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let delay = self.calculate_delay(attempts);
        if delay.is_zero() {
            return None;
        }
        let next = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d));
        debug!(
            attempts = attempts,
            delay_seconds = delay.as_secs_f64(),
            "计算下次重试时间"
        );
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_strategy_has_no_backoff() {
        let policy = RetryPolicy::immediate();
        assert_eq!(policy.calculate_delay(1), Duration::ZERO);
        assert!(policy.next_attempt_at(2, Utc::now()).is_none());
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy::new(RetryConfig {
            strategy: RetryStrategy::Exponential,
            base_delay_seconds: 30,
            max_delay_seconds: 200,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        });
        assert_eq!(policy.calculate_delay(0), Duration::from_secs(30));
        assert_eq!(policy.calculate_delay(1), Duration::from_secs(60));
        assert_eq!(policy.calculate_delay(2), Duration::from_secs(120));
        assert_eq!(policy.calculate_delay(3), Duration::from_secs(200));
        assert_eq!(policy.calculate_delay(100), Duration::from_secs(200));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::new(RetryConfig {
            jitter_factor: 0.5,
            ..RetryConfig::default()
        });
        for _ in 0..100 {
            let delay = policy.calculate_delay(1).as_secs_f64();
            assert!((30.0..=90.0).contains(&delay), "delay {delay}");
        }
    }

    #[test]
    fn test_next_attempt_at_offsets_now() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        let next = policy.next_attempt_at(1, now).unwrap();
        assert_eq!((next - now).num_seconds(), 60);
    }
}
