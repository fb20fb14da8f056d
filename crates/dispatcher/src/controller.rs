use std::sync::Arc;

use chrono::{DateTime, Utc};
use reelgen_domain::{
    ContentSynthesizer, RandomSource, Reel, ReelFilter, ReelRepository, ReelStatus,
};
use reelgen_errors::{ReelError, ReelResult};
use reelgen_infrastructure::ExportBundler;
use tracing::{debug, info};

use crate::scheduler::ReelScheduler;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReelStatusSummary {
    pub draft: usize,
    pub queued: usize,
    pub posted: usize,
    pub archived: usize,
    pub failed: usize,
}

impl ReelStatusSummary {
    pub fn total(&self) -> usize {
        self.draft + self.queued + self.posted + self.archived + self.failed
    }
    pub fn active(&self) -> usize {
        self.draft + self.queued
    }
    pub fn finished(&self) -> usize {
        self.posted + self.archived + self.failed
    }
}

/// 导出结果：建议的文件名和压缩包内容
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// 用户操作入口：归档、重新生成、重新排队、手动排期、导出
pub struct ReelController {
    repo: Arc<dyn ReelRepository>,
    scheduler: Arc<ReelScheduler>,
}

impl ReelController {
    pub fn new(repo: Arc<dyn ReelRepository>, scheduler: Arc<ReelScheduler>) -> Self {
        Self { repo, scheduler }
    }

    pub async fn get(&self, reel_id: &str) -> ReelResult<Reel> {
        self.repo
            .find_by_id(reel_id)
            .await?
            .ok_or_else(|| ReelError::not_found(reel_id))
    }

    pub async fn list(&self, filter: &ReelFilter) -> ReelResult<Vec<Reel>> {
        self.repo.list(filter).await
    }

    /// 归档。已发布的 Reel 保留 post id；已归档时不做任何修改。
    pub async fn archive(&self, reel_id: &str) -> ReelResult<Reel> {
        let reel = self
            .repo
            .update(
                reel_id,
                Box::new(|r: &mut Reel| r.archive().map(|_| ())),
            )
            .await?;
        info!(reel_id = %reel.id, "Reel已归档");
        Ok(reel)
    }

    /// 用原有参数重新合成文案、标签和叠加层，状态、尝试次数和排期不变
    pub async fn regenerate(
        &self,
        reel_id: &str,
        random: &mut dyn RandomSource,
        now: DateTime<Utc>,
    ) -> ReelResult<Reel> {
        let current = self.get(reel_id).await?;
        let payload =
            ContentSynthesizer::synthesize(&current.generation_params(), current.archetype, random);

        let reel = self
            .repo
            .update(
                reel_id,
                Box::new(move |r: &mut Reel| {
                    r.apply_payload(payload, now);
                    Ok(())
                }),
            )
            .await?;
        info!(reel_id = %reel.id, status = %reel.status, "Reel已重新生成");
        Ok(reel)
    }

    /// failed → queued，尝试次数清零；未给出时间时立即到期
    pub async fn requeue(
        &self,
        reel_id: &str,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ReelResult<Reel> {
        let at = at.unwrap_or(now);
        let reel = self
            .repo
            .update(reel_id, Box::new(move |r: &mut Reel| r.requeue(at)))
            .await?;
        info!(reel_id = %reel.id, scheduled_at = %at, "Reel已重新排队");
        Ok(reel)
    }

    pub async fn schedule(
        &self,
        reel_id: &str,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ReelResult<Reel> {
        self.scheduler.schedule_manual(reel_id, at, now).await
    }

    pub async fn status_summary(&self) -> ReelResult<ReelStatusSummary> {
        let reels = self.repo.list(&ReelFilter::default()).await?;
        let mut summary = ReelStatusSummary::default();
        for reel in &reels {
            match reel.status {
                ReelStatus::Draft => summary.draft += 1,
                ReelStatus::Queued => summary.queued += 1,
                ReelStatus::Posted => summary.posted += 1,
                ReelStatus::Archived => summary.archived += 1,
                ReelStatus::Failed => summary.failed += 1,
            }
        }
        debug!(total = summary.total(), "统计Reel状态");
        Ok(summary)
    }

    pub async fn export(&self, reel_id: &str) -> ReelResult<ExportArtifact> {
        let reel = self.get(reel_id).await?;
        Ok(ExportArtifact {
            file_name: ExportBundler::bundle_file_name(&reel),
            bytes: ExportBundler::export_reel(&reel)?,
        })
    }

    /// 按给定 ID 顺序导出；未给出 ID 时取所有未归档 Reel
    pub async fn export_batch(&self, reel_ids: &[String]) -> ReelResult<ExportArtifact> {
        let reels = if reel_ids.is_empty() {
            self.repo
                .list(&ReelFilter::default())
                .await?
                .into_iter()
                .filter(|r| r.status != ReelStatus::Archived)
                .collect()
        } else {
            let mut reels = Vec::with_capacity(reel_ids.len());
            for id in reel_ids {
                reels.push(self.get(id).await?);
            }
            reels
        };

        Ok(ExportArtifact {
            file_name: "reelgen-batch.zip".to_string(),
            bytes: ExportBundler::export_batch(&reels)?,
        })
    }
}
