use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::Reel;

/// 发布结果。不保证幂等，调用方负责避免重复调用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishOutcome {
    Success { external_id: String },
    Failure { reason: String },
}

impl PublishOutcome {
    pub fn success(external_id: impl Into<String>) -> Self {
        Self::Success {
            external_id: external_id.into(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Success { .. })
    }
}

/// 外部发布能力（Instagram 等平台客户端）
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, reel: &Reel) -> PublishOutcome;

    fn name(&self) -> &str {
        "publisher"
    }
}
