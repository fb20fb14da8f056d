use chrono::{DateTime, Duration, Utc};
use reelgen_core::GenerationConfig;
use reelgen_domain::{GenerationParams, PreferencesRepository, StdRandom};
use reelgen_errors::ReelResult;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::generator::{BatchGeneration, ReelGenerator};

/// 每日自动生成：有默认 niche/product 且距上次生成超过间隔时生成一批草稿
pub struct AutoGenerator {
    generator: Arc<ReelGenerator>,
    prefs: Arc<dyn PreferencesRepository>,
    config: GenerationConfig,
}

impl AutoGenerator {
    pub fn new(
        generator: Arc<ReelGenerator>,
        prefs: Arc<dyn PreferencesRepository>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            generator,
            prefs,
            config,
        }
    }

    pub async fn is_due(&self, now: DateTime<Utc>) -> ReelResult<bool> {
        if !self.config.auto_generate_enabled {
            return Ok(false);
        }
        let prefs = self.prefs.load().await?;
        if !prefs.has_generation_defaults() {
            return Ok(false);
        }
        let interval = Duration::hours(self.config.auto_generate_interval_hours as i64);
        Ok(match self.prefs.last_auto_generation().await? {
            Some(last) => now - last >= interval,
            None => true,
        })
    }

    pub async fn run_if_due(&self, now: DateTime<Utc>) -> ReelResult<Option<BatchGeneration>> {
        if !self.is_due(now).await? {
            debug!("自动生成未到期，跳过");
            return Ok(None);
        }

        let mut prefs = self.prefs.load().await?;
        let params = GenerationParams::new(
            prefs.niche.clone(),
            prefs.product.clone(),
            self.config.default_duration,
            self.config.default_overlay_style,
        );

        let mut random = StdRandom::from_entropy();
        let batch = self
            .generator
            .generate_batch(&params, prefs.rotation_counter, &mut random, now)
            .await?;

        if !batch.created.is_empty() {
            prefs.rotation_counter = batch.next_counter;
            self.prefs.save(&prefs).await?;
            self.prefs.record_auto_generation(now).await?;
            info!(created = batch.created.len(), "每日自动生成完成");
        }

        Ok(Some(batch))
    }

    pub fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let check_interval = std::time::Duration::from_secs(self.config.auto_check_interval_seconds);

        tokio::spawn(async move {
            let mut ticker = interval(check_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_if_due(Utc::now()).await {
                            error!("自动生成失败: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("自动生成任务已停止");
                        break;
                    }
                }
            }
        })
    }
}
