use chrono::{DateTime, Utc};
use reelgen_domain::{
    Archetype, ContentSynthesizer, CreativeRotator, GenerationParams, PreferencesRepository,
    RandomSource, Reel, ReelRepository,
};
use reelgen_errors::{ReelError, ReelResult};
use reelgen_infrastructure::MetricsCollector;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::scheduler::{ReelScheduler, ScheduleReport};

/// 每次生成的 Reel 数量
pub const BATCH_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// 生成后立即按 auto-on-generate 策略排期
    #[default]
    Auto,
    /// 保持草稿，由用户稍后排期
    Manual,
}

#[derive(Debug, Clone)]
pub struct GenerationFailure {
    pub index: usize,
    pub archetype: Archetype,
    pub error: ReelError,
}

#[derive(Debug, Clone)]
pub struct BatchGeneration {
    pub created: Vec<Reel>,
    pub failures: Vec<GenerationFailure>,
    /// 下一批使用的轮换计数
    pub next_counter: u64,
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub batch: BatchGeneration,
    pub schedule: Option<ScheduleReport>,
}

pub struct ReelGenerator {
    repo: Arc<dyn ReelRepository>,
    prefs: Arc<dyn PreferencesRepository>,
    scheduler: Arc<ReelScheduler>,
    metrics: Arc<MetricsCollector>,
    max_retries: u32,
}

impl ReelGenerator {
    pub fn new(
        repo: Arc<dyn ReelRepository>,
        prefs: Arc<dyn PreferencesRepository>,
        scheduler: Arc<ReelScheduler>,
        metrics: Arc<MetricsCollector>,
        max_retries: u32,
    ) -> Self {
        Self {
            repo,
            prefs,
            scheduler,
            metrics,
            max_retries,
        }
    }

    /// 以 counter 为轮换起点生成一批草稿。单项持久化失败不影响同批其他项。
    #[instrument(skip(self, params, random), fields(niche = %params.niche, counter = counter))]
    pub async fn generate_batch(
        &self,
        params: &GenerationParams,
        counter: u64,
        random: &mut dyn RandomSource,
        now: DateTime<Utc>,
    ) -> ReelResult<BatchGeneration> {
        params.validate()?;

        let mut created = Vec::with_capacity(BATCH_SIZE);
        let mut failures = Vec::new();

        for (index, archetype) in CreativeRotator::batch(counter, BATCH_SIZE)
            .into_iter()
            .enumerate()
        {
            let payload = ContentSynthesizer::synthesize(params, archetype, random);
            let reel = Reel::draft(params, archetype, payload, self.max_retries, now);
            match self.repo.create(reel).await {
                Ok(reel) => created.push(reel),
                Err(error) => {
                    warn!(index = index, archetype = %archetype, error = %error, "生成Reel失败");
                    failures.push(GenerationFailure {
                        index,
                        archetype,
                        error,
                    });
                }
            }
        }

        let next_counter = if created.is_empty() {
            counter
        } else {
            counter.wrapping_add(BATCH_SIZE as u64)
        };
        self.metrics.record_generated(created.len(), failures.len());
        info!(
            created = created.len(),
            failed = failures.len(),
            next_counter = next_counter,
            "批次生成完成"
        );

        Ok(BatchGeneration {
            created,
            failures,
            next_counter,
        })
    }

    /// 用户触发的生成：保存 niche/product 为默认值，生成一批，推进并保存轮换计数，
    /// Auto 模式下再为新批次排期
    pub async fn generate(
        &self,
        params: &GenerationParams,
        mode: GenerationMode,
        random: &mut dyn RandomSource,
        now: DateTime<Utc>,
    ) -> ReelResult<GenerationReport> {
        params.validate()?;

        let mut prefs = self.prefs.load().await?;
        prefs.niche = params.niche.clone();
        prefs.product = params.product.clone();
        self.prefs.save(&prefs).await?;

        let batch = self
            .generate_batch(params, prefs.rotation_counter, random, now)
            .await?;
        if batch.created.is_empty() {
            return Ok(GenerationReport {
                batch,
                schedule: None,
            });
        }

        prefs.rotation_counter = batch.next_counter;
        self.prefs.save(&prefs).await?;

        let schedule = match mode {
            GenerationMode::Auto => {
                let ids: Vec<String> = batch.created.iter().map(|r| r.id.clone()).collect();
                Some(self.scheduler.schedule_new_batch(&ids, now).await)
            }
            GenerationMode::Manual => None,
        };

        Ok(GenerationReport { batch, schedule })
    }
}
