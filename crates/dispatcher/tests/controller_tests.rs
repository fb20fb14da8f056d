use chrono::{Duration, Utc};
use reelgen_dispatcher::{ReelController, ReelScheduler, ReelStatusSummary};
use reelgen_domain::{ReelError, ReelRepository, ReelStatus};
use reelgen_infrastructure::KvReelStore;
use reelgen_testing_utils::{FixedRandom, ReelBuilder};
use std::sync::Arc;

fn controller() -> (Arc<KvReelStore>, Arc<ReelScheduler>, ReelController) {
    let store = Arc::new(KvReelStore::in_memory());
    let scheduler = Arc::new(ReelScheduler::new(store.clone(), 10));
    let controller = ReelController::new(store.clone(), scheduler.clone());
    (store, scheduler, controller)
}

#[tokio::test]
async fn test_schedule_all_spaces_drafts_hourly() {
    let (store, scheduler, _) = controller();
    for id in ["a", "b", "c"] {
        store.create(ReelBuilder::new().with_id(id).build()).await.unwrap();
    }

    let now = Utc::now();
    let report = scheduler.schedule_all(now).await.unwrap();
    assert!(report.failures.is_empty());

    for (id, hours) in [("a", 1), ("b", 2), ("c", 3)] {
        let reel = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(reel.status, ReelStatus::Queued);
        assert_eq!(reel.scheduled_at, Some(now + Duration::hours(hours)));
    }
}

#[tokio::test]
async fn test_schedule_all_skips_terminal_and_keeps_manual_times() {
    let (store, scheduler, _) = controller();
    let now = Utc::now();
    let manual = now + Duration::minutes(30);
    store
        .create(ReelBuilder::new().with_id("posted").posted("IG_1").build())
        .await
        .unwrap();
    store
        .create(ReelBuilder::new().with_id("manual").queued_at(manual).build())
        .await
        .unwrap();
    store
        .create(ReelBuilder::new().with_id("draft").build())
        .await
        .unwrap();

    let report = scheduler.schedule_all(now).await.unwrap();
    assert_eq!(report.scheduled.len(), 2);

    let posted = store.find_by_id("posted").await.unwrap().unwrap();
    assert_eq!(posted.status, ReelStatus::Posted);
    assert!(posted.scheduled_at.is_none());

    let kept = store.find_by_id("manual").await.unwrap().unwrap();
    assert_eq!(kept.scheduled_at, Some(manual));

    let draft = store.find_by_id("draft").await.unwrap().unwrap();
    assert_eq!(draft.scheduled_at, Some(now + Duration::hours(2)));
}

#[tokio::test]
async fn test_manual_schedule_default_and_explicit() {
    let (store, _, controller) = controller();
    store.create(ReelBuilder::new().with_id("r1").build()).await.unwrap();
    let now = Utc::now();

    let reel = controller.schedule("r1", None, now).await.unwrap();
    assert_eq!(reel.status, ReelStatus::Queued);
    assert_eq!(reel.scheduled_at, Some(now + Duration::minutes(10)));

    let past = controller
        .schedule("r1", Some(now - Duration::minutes(1)), now)
        .await;
    assert!(matches!(past, Err(ReelError::Validation(_))));

    let at = now + Duration::hours(6);
    let reel = controller.schedule("r1", Some(at), now).await.unwrap();
    assert_eq!(reel.scheduled_at, Some(at));
}

#[tokio::test]
async fn test_manual_reschedule_overrides_retry_backoff() {
    let (store, _, controller) = controller();
    let now = Utc::now();
    let mut reel = ReelBuilder::new()
        .with_id("r1")
        .queued_at(now - Duration::minutes(1))
        .with_attempts(1)
        .build();
    reel.last_error = Some("发布暂时失败: 503".to_string());
    reel.next_attempt_at = Some(now + Duration::seconds(60));
    store.create(reel).await.unwrap();

    let at = now + Duration::seconds(10);
    let reel = controller.schedule("r1", Some(at), now).await.unwrap();
    assert_eq!(reel.scheduled_at, Some(at));
    assert!(reel.next_attempt_at.is_none());
    assert_eq!(reel.attempts, 1);

    assert!(store.find_due(at - Duration::seconds(1)).await.unwrap().is_empty());
    let due = store.find_due(at + Duration::seconds(1)).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, "r1");
}

#[tokio::test]
async fn test_archive_is_idempotent_and_keeps_post_id() {
    let (store, _, controller) = controller();
    store
        .create(ReelBuilder::new().with_id("p").posted("IG_9").build())
        .await
        .unwrap();

    let archived = controller.archive("p").await.unwrap();
    assert_eq!(archived.status, ReelStatus::Archived);
    assert_eq!(archived.post_id.as_deref(), Some("IG_9"));

    let again = controller.archive("p").await.unwrap();
    assert_eq!(again, archived);

    let missing = controller.archive("nope").await;
    assert!(matches!(missing, Err(ReelError::ReelNotFound { .. })));
}

#[tokio::test]
async fn test_regenerate_keeps_lifecycle_fields() {
    let (store, _, controller) = controller();
    let at = Utc::now() + Duration::hours(2);
    let original = store
        .create(ReelBuilder::new().with_id("r1").queued_at(at).build())
        .await
        .unwrap();

    let later = Utc::now() + Duration::minutes(5);
    let reel = controller
        .regenerate("r1", &mut FixedRandom::picking(1), later)
        .await
        .unwrap();

    assert_eq!(reel.status, ReelStatus::Queued);
    assert_eq!(reel.scheduled_at, Some(at));
    assert_eq!(reel.attempts, original.attempts);
    assert_eq!(reel.archetype, original.archetype);
    assert_eq!(reel.created_at, later);
    assert_ne!(reel.preview_ref, original.preview_ref);
    assert_ne!(reel.caption, original.caption);
    assert!(reel.overlay.is_well_formed());
}

#[tokio::test]
async fn test_requeue_only_from_failed() {
    let (store, _, controller) = controller();
    store
        .create(ReelBuilder::new().with_id("f").failed().build())
        .await
        .unwrap();
    store.create(ReelBuilder::new().with_id("d").build()).await.unwrap();
    let now = Utc::now();

    let reel = controller.requeue("f", None, now).await.unwrap();
    assert_eq!(reel.status, ReelStatus::Queued);
    assert_eq!(reel.attempts, 0);
    assert!(reel.last_error.is_none());
    assert_eq!(reel.scheduled_at, Some(now));
    assert!(reel.is_due(now));

    let draft = controller.requeue("d", None, now).await;
    assert!(matches!(draft, Err(ReelError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_status_summary_counts() {
    let (store, _, controller) = controller();
    let at = Utc::now();
    store.create(ReelBuilder::new().with_id("1").build()).await.unwrap();
    store.create(ReelBuilder::new().with_id("2").queued_at(at).build()).await.unwrap();
    store.create(ReelBuilder::new().with_id("3").queued_at(at).build()).await.unwrap();
    store.create(ReelBuilder::new().with_id("4").posted("IG_4").build()).await.unwrap();
    store.create(ReelBuilder::new().with_id("5").failed().build()).await.unwrap();
    store
        .create(ReelBuilder::new().with_id("6").with_status(ReelStatus::Archived).build())
        .await
        .unwrap();

    let summary = controller.status_summary().await.unwrap();
    assert_eq!(
        summary,
        ReelStatusSummary {
            draft: 1,
            queued: 2,
            posted: 1,
            archived: 1,
            failed: 1,
        }
    );
    assert_eq!(summary.total(), 6);
    assert_eq!(summary.active(), 3);
    assert_eq!(summary.finished(), 3);
}

#[tokio::test]
async fn test_export_does_not_change_state() {
    let (store, _, controller) = controller();
    let reel = store.create(ReelBuilder::new().with_id("r1").build()).await.unwrap();

    let artifact = controller.export("r1").await.unwrap();
    assert_eq!(artifact.file_name, "reelgen-r1.zip");
    assert!(artifact.bytes.starts_with(b"PK"));
    assert_eq!(store.find_by_id("r1").await.unwrap().unwrap(), reel);

    let missing = controller.export_batch(&["missing".to_string()]).await;
    assert!(matches!(missing, Err(ReelError::ReelNotFound { .. })));

    let empty = self::controller().2.export_batch(&[]).await;
    assert!(matches!(empty, Err(ReelError::Validation(_))));

    let batch = controller.export_batch(&[]).await.unwrap();
    assert!(batch.bytes.starts_with(b"PK"));
}
