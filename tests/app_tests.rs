use chrono::Utc;
use reelgen::app::Application;
use reelgen::shutdown::ShutdownManager;
use reelgen_core::{AppConfig, RetryConfig, StorageBackend};
use reelgen_dispatcher::{DispatchOutcome, GenerationMode};
use reelgen_domain::{
    DurationClass, GenerationParams, OverlayStyle, PreferencesRepository, ReelFilter, ReelStatus,
};
use reelgen_testing_utils::{FixedRandom, ScriptedPublisher};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn sqlite_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::Sqlite;
    config.storage.sqlite_url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("reelgen.db").display()
    );
    config.storage.persist_retry_delay_ms = 0;
    config.retry = RetryConfig::immediate();
    config.dispatcher.poll_interval_seconds = 1;
    config.generation.auto_generate_enabled = false;
    config
}

fn params() -> GenerationParams {
    GenerationParams::new(
        "fitness",
        "protein",
        DurationClass::Seconds15,
        OverlayStyle::Text,
    )
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = sqlite_config(&dir);

    let ids: Vec<String> = {
        let app = Application::new(config.clone()).await.unwrap();
        let report = app
            .generator()
            .generate(&params(), GenerationMode::Manual, &mut FixedRandom::new(), Utc::now())
            .await
            .unwrap();
        app.controller()
            .archive(&report.batch.created[0].id)
            .await
            .unwrap();
        report.batch.created.iter().map(|r| r.id.clone()).collect()
    };

    let app = Application::new(config).await.unwrap();
    let reels = app.controller().list(&ReelFilter::default()).await.unwrap();
    let reloaded: Vec<String> = reels.iter().map(|r| r.id.clone()).collect();
    assert_eq!(reloaded, ids);
    assert_eq!(reels[0].status, ReelStatus::Archived);

    let prefs = app.preferences().load().await.unwrap();
    assert_eq!(prefs.niche, "fitness");
    assert_eq!(prefs.rotation_counter, 3);
}

#[tokio::test]
async fn test_generate_schedule_and_publish() {
    let dir = TempDir::new().unwrap();
    let publisher = ScriptedPublisher::new();
    let app = Application::with_publisher(sqlite_config(&dir), Arc::new(publisher.clone()))
        .await
        .unwrap();

    let now = Utc::now();
    app.generator()
        .generate(&params(), GenerationMode::Auto, &mut FixedRandom::new(), now)
        .await
        .unwrap();

    // 第一个 Reel 排在 now+1h
    let later = now + chrono::Duration::hours(2);
    let outcomes = app.dispatcher().tick(later).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], DispatchOutcome::Posted { .. }));

    let summary = app.controller().status_summary().await.unwrap();
    assert_eq!(summary.posted, 1);
    assert_eq!(summary.queued, 2);
    assert_eq!(publisher.call_count(), 1);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let dir = TempDir::new().unwrap();
    let app = Arc::new(Application::new(sqlite_config(&dir)).await.unwrap());
    let shutdown = ShutdownManager::new();

    let handle = {
        let app = Arc::clone(&app);
        let rx = shutdown.subscribe().await;
        tokio::spawn(async move { app.run(rx).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.shutdown().await;

    let result = tokio::time::timeout(Duration::from_secs(15), handle)
        .await
        .expect("application should stop")
        .unwrap();
    assert!(result.is_ok());
}
