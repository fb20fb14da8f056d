use std::fmt;

use chrono::{DateTime, Utc};
use reelgen_errors::{ReelError, ReelResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{Archetype, DurationClass, OverlayStyle};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReelStatus {
    Draft,
    Queued,
    Posted,
    Archived,
    Failed,
}

impl ReelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReelStatus::Draft => "draft",
            ReelStatus::Queued => "queued",
            ReelStatus::Posted => "posted",
            ReelStatus::Archived => "archived",
            ReelStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReelStatus::Posted | ReelStatus::Archived | ReelStatus::Failed
        )
    }

    /// 状态机允许的转换。failed → queued 不在此列，只能走显式的 requeue。
    pub fn can_transition_to(&self, next: ReelStatus) -> bool {
        use ReelStatus::*;

        matches!(
            (self, next),
            (Draft, Queued)
                | (Queued, Queued)
                | (Queued, Posted)
                | (Queued, Failed)
                | (Draft, Archived)
                | (Queued, Archived)
                | (Posted, Archived)
                | (Failed, Archived)
                | (Archived, Archived)
        )
    }
}

impl fmt::Display for ReelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReelStatus {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ReelStatus::Draft),
            "queued" => Ok(ReelStatus::Queued),
            "posted" => Ok(ReelStatus::Posted),
            "archived" => Ok(ReelStatus::Archived),
            "failed" => Ok(ReelStatus::Failed),
            _ => Err(ReelError::validation(format!("无效的Reel状态: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Infographic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Number,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BlockPayload {
    Text { text: String },
    Chart { chart: ChartKind, value: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverlayBlock {
    /// 时间戳（秒）
    pub t: u32,
    pub kind: BlockKind,
    pub payload: BlockPayload,
}

/// 交给外部渲染器的叠加层文档
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverlayDocument {
    pub version: String,
    /// 时长（秒）
    pub duration: u32,
    pub blocks: Vec<OverlayBlock>,
}

impl OverlayDocument {
    pub const VERSION: &'static str = "1.0";

    pub fn new(duration: u32, blocks: Vec<OverlayBlock>) -> Self {
        Self {
            version: Self::VERSION.to_string(),
            duration,
            blocks,
        }
    }

    /// 时间戳非递减且不超过声明时长
    pub fn is_well_formed(&self) -> bool {
        self.blocks.windows(2).all(|w| w[0].t <= w[1].t)
            && self.blocks.iter().all(|b| b.t <= self.duration)
    }

    pub fn timestamps(&self) -> Vec<u32> {
        self.blocks.iter().map(|b| b.t).collect()
    }
}

/// ContentSynthesizer 的产出
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesisPayload {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub overlay: OverlayDocument,
}

/// 生成参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationParams {
    pub niche: String,
    pub product: String,
    pub duration_class: DurationClass,
    pub overlay_style: OverlayStyle,
}

impl GenerationParams {
    pub fn new(
        niche: impl Into<String>,
        product: impl Into<String>,
        duration_class: DurationClass,
        overlay_style: OverlayStyle,
    ) -> Self {
        Self {
            niche: niche.into().trim().to_string(),
            product: product.into().trim().to_string(),
            duration_class,
            overlay_style,
        }
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.niche.trim().is_empty() {
            return Err(ReelError::validation("niche不能为空"));
        }
        if self.product.trim().is_empty() {
            return Err(ReelError::validation("product不能为空"));
        }
        Ok(())
    }
}

/// Dispatcher 扫描到期项用的二级索引记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleRecord {
    pub reel_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserPreferences {
    #[serde(default)]
    pub niche: String,
    #[serde(default)]
    pub product: String,
    /// 下一批生成使用的轮换起点
    #[serde(default)]
    pub rotation_counter: u64,
}

impl UserPreferences {
    pub fn has_generation_defaults(&self) -> bool {
        !self.niche.trim().is_empty() && !self.product.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReelFilter {
    pub status: Option<ReelStatus>,
    pub archetype: Option<Archetype>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ReelFilter {
    pub fn with_status(status: ReelStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, reel: &Reel) -> bool {
        self.status.is_none_or(|s| reel.status == s)
            && self.archetype.is_none_or(|a| reel.archetype == a)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reel {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub niche: String,
    pub product: String,
    pub archetype: Archetype,
    pub duration_class: DurationClass,
    pub overlay_style: OverlayStyle,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub overlay: OverlayDocument,
    pub preview_ref: String,
    pub status: ReelStatus,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attempts: u32,
    pub max_retries: u32,
    /// 退避窗口，未到该时间的 queued 项不会被选中
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub post_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub fn preview_reference(reel_id: &str) -> String {
    format!("preview://{reel_id}/{}.mp4", Uuid::new_v4().simple())
}

impl Reel {
    pub fn draft(
        params: &GenerationParams,
        archetype: Archetype,
        payload: SynthesisPayload,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let preview_ref = preview_reference(&id);
        Self {
            id,
            created_at: now,
            niche: params.niche.clone(),
            product: params.product.clone(),
            archetype,
            duration_class: params.duration_class,
            overlay_style: params.overlay_style,
            caption: payload.caption,
            hashtags: payload.hashtags,
            overlay: payload.overlay,
            preview_ref,
            status: ReelStatus::Draft,
            scheduled_at: None,
            attempts: 0,
            max_retries,
            next_attempt_at: None,
            last_error: None,
            post_id: None,
            updated_at: now,
        }
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            niche: self.niche.clone(),
            product: self.product.clone(),
            duration_class: self.duration_class,
            overlay_style: self.overlay_style,
        }
    }

    fn transition(&mut self, next: ReelStatus) -> ReelResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ReelError::invalid_transition(&self.id, self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ReelStatus::Queued
            && self.scheduled_at.is_some_and(|at| at <= now)
            && self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// 设置排期并进入 queued；已经 queued 时只更新时间
    pub fn schedule(&mut self, at: DateTime<Utc>) -> ReelResult<()> {
        self.transition(ReelStatus::Queued)?;
        self.scheduled_at = Some(at);
        Ok(())
    }

    /// 手动排期：时间原样生效，清除之前失败留下的重试退避
    pub fn schedule_manual(&mut self, at: DateTime<Utc>) -> ReelResult<()> {
        self.schedule(at)?;
        self.next_attempt_at = None;
        Ok(())
    }

    /// 开始一次发布尝试，返回本次的尝试序号
    pub fn begin_attempt(&mut self) -> ReelResult<u32> {
        if self.status != ReelStatus::Queued {
            return Err(ReelError::invalid_transition(
                &self.id,
                self.status,
                "publishing",
            ));
        }
        if self.attempts >= self.max_retries {
            return Err(ReelError::PublishExhausted {
                id: self.id.clone(),
                attempts: self.attempts,
            });
        }
        self.attempts += 1;
        self.next_attempt_at = None;
        self.updated_at = Utc::now();
        Ok(self.attempts)
    }

    pub fn mark_posted(&mut self, post_id: String) -> ReelResult<()> {
        if post_id.trim().is_empty() {
            return Err(ReelError::validation("外部post id不能为空"));
        }
        if self.attempts == 0 {
            return Err(ReelError::invalid_transition(
                &self.id,
                "unattempted",
                ReelStatus::Posted,
            ));
        }
        self.transition(ReelStatus::Posted)?;
        self.post_id = Some(post_id);
        self.last_error = None;
        self.next_attempt_at = None;
        Ok(())
    }

    /// 记录一次失败。尝试次数耗尽时转为 failed 并返回 true。
    pub fn record_failure(
        &mut self,
        reason: String,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> ReelResult<bool> {
        if self.status != ReelStatus::Queued {
            return Err(ReelError::invalid_transition(
                &self.id,
                self.status,
                ReelStatus::Failed,
            ));
        }
        self.last_error = Some(reason);
        if self.attempts >= self.max_retries {
            self.transition(ReelStatus::Failed)?;
            self.next_attempt_at = None;
            return Ok(true);
        }
        self.next_attempt_at = next_attempt_at;
        self.updated_at = Utc::now();
        Ok(false)
    }

    /// 尝试次数已用完但仍停留在 queued（上次提交结果未能落盘）时直接转为 failed
    pub fn mark_exhausted(&mut self) -> ReelResult<()> {
        if self.status != ReelStatus::Queued || self.attempts < self.max_retries {
            return Err(ReelError::invalid_transition(
                &self.id,
                self.status,
                ReelStatus::Failed,
            ));
        }
        if self.last_error.is_none() {
            self.last_error = Some(
                ReelError::PublishExhausted {
                    id: self.id.clone(),
                    attempts: self.attempts,
                }
                .to_string(),
            );
        }
        self.transition(ReelStatus::Failed)?;
        self.next_attempt_at = None;
        Ok(())
    }

    /// 归档。已归档时返回 false。
    pub fn archive(&mut self) -> ReelResult<bool> {
        if self.status == ReelStatus::Archived {
            return Ok(false);
        }
        self.transition(ReelStatus::Archived)?;
        self.next_attempt_at = None;
        Ok(true)
    }

    /// 手动把 failed 重新排入队列，尝试次数清零
    pub fn requeue(&mut self, at: DateTime<Utc>) -> ReelResult<()> {
        if self.status != ReelStatus::Failed {
            return Err(ReelError::invalid_transition(
                &self.id,
                self.status,
                "requeued",
            ));
        }
        self.status = ReelStatus::Queued;
        self.attempts = 0;
        self.last_error = None;
        self.next_attempt_at = None;
        self.scheduled_at = Some(at);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 重新生成：替换文案、标签、叠加层与预览，不动状态/尝试次数/排期
    pub fn apply_payload(&mut self, payload: SynthesisPayload, now: DateTime<Utc>) {
        self.caption = payload.caption;
        self.hashtags = payload.hashtags;
        self.overlay = payload.overlay;
        self.preview_ref = preview_reference(&self.id);
        self.created_at = now;
        self.updated_at = now;
    }

    pub fn schedule_record(&self) -> Option<ScheduleRecord> {
        self.scheduled_at.map(|scheduled_at| ScheduleRecord {
            reel_id: self.id.clone(),
            scheduled_at,
            attempts: self.attempts,
            max_retries: self.max_retries,
        })
    }

    /// 文案 + 空行 + 空格分隔的标签
    pub fn caption_with_hashtags(&self) -> String {
        format!("{}\n\n{}", self.caption, self.hashtags.join(" "))
    }

    pub fn entity_description(&self) -> String {
        format!(
            "Reel {} ({}, {}, 状态: {})",
            self.id, self.archetype, self.duration_class, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_reel(max_retries: u32) -> Reel {
        let params = GenerationParams::new(
            "fitness",
            "protein shake",
            DurationClass::Seconds15,
            OverlayStyle::Text,
        );
        let payload = SynthesisPayload {
            caption: "hook\n\nbody".to_string(),
            hashtags: vec!["#fitness".to_string(); 5],
            overlay: OverlayDocument::new(15, vec![]),
        };
        Reel::draft(&params, Archetype::Cta, payload, max_retries, Utc::now())
    }

    #[test]
    fn test_terminal_states_never_leave() {
        use ReelStatus::*;
        for from in [Posted, Failed, Archived] {
            for to in [Draft, Queued] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
        assert!(!Posted.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Posted));
        assert!(!Draft.can_transition_to(Posted));
    }

    #[test]
    fn test_generation_params_validation() {
        let ok = GenerationParams::new("fitness", "protein", DurationClass::Seconds7, OverlayStyle::Text);
        assert!(ok.validate().is_ok());

        let empty_niche = GenerationParams::new("  ", "protein", DurationClass::Seconds7, OverlayStyle::Text);
        assert!(matches!(empty_niche.validate(), Err(ReelError::Validation(_))));

        let empty_product = GenerationParams::new("fitness", "", DurationClass::Seconds7, OverlayStyle::Text);
        assert!(matches!(empty_product.validate(), Err(ReelError::Validation(_))));
    }

    #[test]
    fn test_schedule_and_due() {
        let mut reel = sample_reel(3);
        let now = Utc::now();
        assert!(!reel.is_due(now));

        reel.schedule(now + Duration::hours(1)).unwrap();
        assert_eq!(reel.status, ReelStatus::Queued);
        assert!(!reel.is_due(now));
        assert!(reel.is_due(now + Duration::hours(1)));

        reel.next_attempt_at = Some(now + Duration::hours(2));
        assert!(!reel.is_due(now + Duration::hours(1)));
    }

    #[test]
    fn test_posted_requires_attempt_and_post_id() {
        let mut reel = sample_reel(3);
        reel.schedule(Utc::now()).unwrap();
        assert!(reel.mark_posted("IG_1".to_string()).is_err());

        reel.begin_attempt().unwrap();
        assert!(reel.mark_posted("  ".to_string()).is_err());
        reel.mark_posted("IG_1".to_string()).unwrap();
        assert_eq!(reel.status, ReelStatus::Posted);
        assert_eq!(reel.post_id.as_deref(), Some("IG_1"));

        assert!(reel.schedule(Utc::now()).is_err());
        assert!(reel.archive().unwrap());
        assert_eq!(reel.post_id.as_deref(), Some("IG_1"));
    }

    #[test]
    fn test_failure_exhausts_attempts() {
        let mut reel = sample_reel(2);
        reel.schedule(Utc::now()).unwrap();

        reel.begin_attempt().unwrap();
        assert!(!reel.record_failure("timeout".to_string(), None).unwrap());
        assert_eq!(reel.status, ReelStatus::Queued);

        reel.begin_attempt().unwrap();
        assert!(reel.record_failure("timeout".to_string(), None).unwrap());
        assert_eq!(reel.status, ReelStatus::Failed);
        assert_eq!(reel.attempts, 2);
        assert!(reel.post_id.is_none());

        assert!(reel.begin_attempt().is_err());
    }

    #[test]
    fn test_mark_exhausted_after_lost_commit() {
        let mut reel = sample_reel(1);
        reel.schedule(Utc::now()).unwrap();
        assert!(reel.mark_exhausted().is_err());

        reel.begin_attempt().unwrap();
        assert!(matches!(
            reel.begin_attempt(),
            Err(ReelError::PublishExhausted { attempts: 1, .. })
        ));

        reel.mark_exhausted().unwrap();
        assert_eq!(reel.status, ReelStatus::Failed);
        assert_eq!(reel.attempts, 1);
        assert!(reel.last_error.as_deref().unwrap().contains("已尝试 1 次"));
        assert!(reel.mark_exhausted().is_err());
    }

    #[test]
    fn test_manual_schedule_clears_backoff() {
        let mut reel = sample_reel(3);
        let now = Utc::now();
        reel.schedule(now).unwrap();
        reel.begin_attempt().unwrap();
        reel.record_failure("503".to_string(), Some(now + Duration::minutes(5)))
            .unwrap();

        let at = now + Duration::minutes(1);
        reel.schedule(at).unwrap();
        assert!(!reel.is_due(at));

        reel.schedule_manual(at).unwrap();
        assert_eq!(reel.scheduled_at, Some(at));
        assert!(reel.next_attempt_at.is_none());
        assert!(reel.is_due(at));
        assert_eq!(reel.attempts, 1);
    }

    #[test]
    fn test_requeue_only_from_failed() {
        let mut reel = sample_reel(1);
        assert!(reel.requeue(Utc::now()).is_err());

        reel.schedule(Utc::now()).unwrap();
        reel.begin_attempt().unwrap();
        reel.record_failure("boom".to_string(), None).unwrap();
        assert_eq!(reel.status, ReelStatus::Failed);

        let at = Utc::now() + Duration::minutes(10);
        reel.requeue(at).unwrap();
        assert_eq!(reel.status, ReelStatus::Queued);
        assert_eq!(reel.attempts, 0);
        assert_eq!(reel.scheduled_at, Some(at));
        assert!(reel.last_error.is_none());
    }

    #[test]
    fn test_archive_is_idempotent() {
        let mut reel = sample_reel(3);
        assert!(reel.archive().unwrap());
        assert!(!reel.archive().unwrap());
        assert!(reel.schedule(Utc::now()).is_err());
    }

    #[test]
    fn test_apply_payload_keeps_lifecycle_fields() {
        let mut reel = sample_reel(3);
        let at = Utc::now() + Duration::hours(3);
        reel.schedule(at).unwrap();
        let old_preview = reel.preview_ref.clone();

        let later = Utc::now() + Duration::minutes(5);
        reel.apply_payload(
            SynthesisPayload {
                caption: "new".to_string(),
                hashtags: vec!["#new".to_string(); 5],
                overlay: OverlayDocument::new(15, vec![]),
            },
            later,
        );

        assert_eq!(reel.caption, "new");
        assert_eq!(reel.created_at, later);
        assert_ne!(reel.preview_ref, old_preview);
        assert_eq!(reel.status, ReelStatus::Queued);
        assert_eq!(reel.scheduled_at, Some(at));
        assert_eq!(reel.attempts, 0);
    }

    #[test]
    fn test_overlay_json_shape() {
        let doc = OverlayDocument::new(
            15,
            vec![
                OverlayBlock {
                    t: 1,
                    kind: BlockKind::Text,
                    payload: BlockPayload::Text {
                        text: "Hook".to_string(),
                    },
                },
                OverlayBlock {
                    t: 2,
                    kind: BlockKind::Infographic,
                    payload: BlockPayload::Chart {
                        chart: ChartKind::Number,
                        value: 25,
                    },
                },
            ],
        );
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["duration"], 15);
        assert_eq!(json["blocks"][0]["t"], 1);
        assert_eq!(json["blocks"][0]["kind"], "text");
        assert_eq!(json["blocks"][0]["payload"]["text"], "Hook");
        assert_eq!(json["blocks"][1]["payload"]["chart"], "number");

        let back: OverlayDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }
}
