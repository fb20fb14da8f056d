use std::sync::Arc;

use anyhow::{Context, Result};
use reelgen_core::AppConfig;
use reelgen_dispatcher::{
    AutoGenerator, ReelController, ReelDispatcher, ReelGenerator, ReelScheduler, RetryPolicy,
};
use reelgen_domain::{PreferencesRepository, Publisher, ReelRepository};
use reelgen_infrastructure::{
    DryRunPublisher, KeyValueStoreFactory, KvPreferencesStore, KvReelStore, MetricsCollector,
    PersistPolicy, StorageKeys,
};
use tokio::sync::broadcast;
use tracing::{error, info};

/// 主应用程序：按配置组装存储、生成、排期与发布组件
pub struct Application {
    config: AppConfig,
    repo: Arc<dyn ReelRepository>,
    prefs: Arc<dyn PreferencesRepository>,
    scheduler: Arc<ReelScheduler>,
    generator: Arc<ReelGenerator>,
    controller: ReelController,
    dispatcher: ReelDispatcher,
    auto_generator: Arc<AutoGenerator>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        Self::with_publisher(config, Arc::new(DryRunPublisher::new())).await
    }

    pub async fn with_publisher(config: AppConfig, publisher: Arc<dyn Publisher>) -> Result<Self> {
        info!(backend = ?config.storage.backend, publisher = publisher.name(), "初始化应用程序");

        let kv = KeyValueStoreFactory::create(&config.storage)
            .await
            .context("创建键值存储失败")?;
        let keys = StorageKeys::new(config.storage.key_prefix.clone());
        let policy = PersistPolicy::from_config(&config.storage);

        let repo: Arc<dyn ReelRepository> = Arc::new(
            KvReelStore::load(kv.clone(), keys.clone(), policy.clone())
                .await
                .context("加载Reel数据失败")?,
        );
        let prefs: Arc<dyn PreferencesRepository> =
            Arc::new(KvPreferencesStore::new(kv, keys, policy));

        let metrics = Arc::new(if config.observability.metrics_enabled {
            MetricsCollector::new()
        } else {
            MetricsCollector::disabled()
        });

        let scheduler = Arc::new(ReelScheduler::new(
            repo.clone(),
            config.generation.manual_schedule_offset_minutes,
        ));
        let generator = Arc::new(ReelGenerator::new(
            repo.clone(),
            prefs.clone(),
            scheduler.clone(),
            metrics.clone(),
            config.dispatcher.max_retries,
        ));
        let controller = ReelController::new(repo.clone(), scheduler.clone());
        let dispatcher = ReelDispatcher::new(
            repo.clone(),
            publisher,
            RetryPolicy::new(config.retry.clone()),
            config.dispatcher.clone(),
            metrics,
        );
        let auto_generator = Arc::new(AutoGenerator::new(
            generator.clone(),
            prefs.clone(),
            config.generation.clone(),
        ));

        Ok(Self {
            config,
            repo,
            prefs,
            scheduler,
            generator,
            controller,
            dispatcher,
            auto_generator,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn ReelRepository> {
        &self.repo
    }

    pub fn preferences(&self) -> &Arc<dyn PreferencesRepository> {
        &self.prefs
    }

    pub fn scheduler(&self) -> &ReelScheduler {
        &self.scheduler
    }

    pub fn generator(&self) -> &ReelGenerator {
        &self.generator
    }

    pub fn controller(&self) -> &ReelController {
        &self.controller
    }

    pub fn dispatcher(&self) -> &ReelDispatcher {
        &self.dispatcher
    }

    /// 运行后台组件直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut handles = Vec::new();

        if self.config.dispatcher.enabled {
            handles.push(
                self.dispatcher
                    .start_with_shutdown(shutdown_rx.resubscribe()),
            );
        } else {
            info!("发布调度器已在配置中禁用");
        }

        if self.config.generation.auto_generate_enabled {
            handles.push(
                Arc::clone(&self.auto_generator).start(shutdown_rx.resubscribe()),
            );
        }

        info!(components = handles.len(), "所有组件已启动");

        for handle in handles {
            if let Err(e) = handle.await {
                error!("后台任务异常退出: {e}");
            }
        }

        info!("所有组件已停止");
        Ok(())
    }
}
