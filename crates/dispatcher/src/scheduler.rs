use chrono::{DateTime, Duration, Utc};
use reelgen_domain::{Reel, ReelFilter, ReelRepository};
use reelgen_errors::{ReelError, ReelResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 排期策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// 新生成批次中的第 index 个：now + (index*4+1) 小时，总是重新分配
    AutoOnGenerate { index: usize },
    /// 所有未终结 Reel 中的第 index 个：保留已有排期，否则 now + (index+1) 小时
    ScheduleAll { index: usize },
    /// 用户指定的时间
    Manual(DateTime<Utc>),
}

/// 单项排期失败
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub reel_id: String,
    pub error: ReelError,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    pub scheduled: Vec<Reel>,
    pub failures: Vec<ItemFailure>,
}

pub struct ReelScheduler {
    repo: Arc<dyn ReelRepository>,
    manual_offset: Duration,
}

impl ReelScheduler {
    pub fn new(repo: Arc<dyn ReelRepository>, manual_offset_minutes: i64) -> Self {
        Self {
            repo,
            manual_offset: Duration::minutes(manual_offset_minutes),
        }
    }

    pub fn resolve_time(reel: &Reel, now: DateTime<Utc>, policy: SchedulePolicy) -> DateTime<Utc> {
        match policy {
            SchedulePolicy::AutoOnGenerate { index } => now + Duration::hours(index as i64 * 4 + 1),
            SchedulePolicy::ScheduleAll { index } => reel
                .scheduled_at
                .unwrap_or_else(|| now + Duration::hours(index as i64 + 1)),
            SchedulePolicy::Manual(at) => at,
        }
    }

    /// 设置排期并进入 queued。已是 queued 时状态不变，只按策略更新时间。
    pub fn assign(reel: &mut Reel, now: DateTime<Utc>, policy: SchedulePolicy) -> ReelResult<()> {
        if let SchedulePolicy::Manual(at) = policy {
            if at <= now {
                return Err(ReelError::validation(format!(
                    "排期时间必须晚于当前时间: {}",
                    at.to_rfc3339()
                )));
            }
        }
        let at = Self::resolve_time(reel, now, policy);
        match policy {
            SchedulePolicy::Manual(_) => reel.schedule_manual(at),
            _ => reel.schedule(at),
        }
    }

    /// 对刚生成的一批 Reel 应用 auto-on-generate 策略
    pub async fn schedule_new_batch(&self, reel_ids: &[String], now: DateTime<Utc>) -> ScheduleReport {
        let mut report = ScheduleReport::default();
        for (index, reel_id) in reel_ids.iter().enumerate() {
            let policy = SchedulePolicy::AutoOnGenerate { index };
            self.apply(reel_id, now, policy, &mut report).await;
        }
        info!(
            scheduled = report.scheduled.len(),
            failed = report.failures.len(),
            "新批次已自动排期"
        );
        report
    }

    /// 按创建顺序为所有 draft/queued Reel 排期
    pub async fn schedule_all(&self, now: DateTime<Utc>) -> ReelResult<ScheduleReport> {
        let candidates: Vec<Reel> = self
            .repo
            .list(&ReelFilter::default())
            .await?
            .into_iter()
            .filter(|r| !r.status.is_terminal())
            .collect();

        let mut report = ScheduleReport::default();
        for (index, reel) in candidates.iter().enumerate() {
            let policy = SchedulePolicy::ScheduleAll { index };
            self.apply(&reel.id, now, policy, &mut report).await;
        }
        info!(
            scheduled = report.scheduled.len(),
            failed = report.failures.len(),
            "批量排期完成"
        );
        Ok(report)
    }

    /// 手动排期；未给出时间时使用默认偏移
    pub async fn schedule_manual(
        &self,
        reel_id: &str,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ReelResult<Reel> {
        let at = at.unwrap_or(now + self.manual_offset);
        let reel = self
            .repo
            .update(
                reel_id,
                Box::new(move |r: &mut Reel| Self::assign(r, now, SchedulePolicy::Manual(at))),
            )
            .await?;
        info!(reel_id = %reel.id, scheduled_at = %at, "Reel已手动排期");
        Ok(reel)
    }

    async fn apply(
        &self,
        reel_id: &str,
        now: DateTime<Utc>,
        policy: SchedulePolicy,
        report: &mut ScheduleReport,
    ) {
        let result = self
            .repo
            .update(
                reel_id,
                Box::new(move |r: &mut Reel| Self::assign(r, now, policy)),
            )
            .await;

        match result {
            Ok(reel) => {
                debug!(reel_id = %reel.id, scheduled_at = ?reel.scheduled_at, "排期成功");
                report.scheduled.push(reel);
            }
            Err(error) => {
                warn!(reel_id = reel_id, error = %error, "排期失败");
                report.failures.push(ItemFailure {
                    reel_id: reel_id.to_string(),
                    error,
                });
            }
        }
    }
}
