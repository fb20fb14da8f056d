use async_trait::async_trait;
use reelgen_domain::{PublishOutcome, Publisher, Reel};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// 不访问任何平台，只记录日志并返回成功
#[derive(Debug, Clone, Default)]
pub struct DryRunPublisher {
    latency: Duration,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, reel: &Reel) -> PublishOutcome {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let external_id = format!("IG_{}", Uuid::new_v4().simple());
        info!(
            reel_id = %reel.id,
            archetype = %reel.archetype,
            external_id = %external_id,
            "[dry-run] 模拟发布Reel"
        );
        PublishOutcome::success(external_id)
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgen_testing_utils::ReelBuilder;

    #[tokio::test]
    async fn test_dry_run_returns_ig_id() {
        let reel = ReelBuilder::new().build();
        match DryRunPublisher::new().publish(&reel).await {
            PublishOutcome::Success { external_id } => assert!(external_id.starts_with("IG_")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
