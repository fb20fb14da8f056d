use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelgen_domain::{
    KeyValueStore, Reel, ReelFilter, ReelMutator, ReelRepository, ReelStatus, ScheduleRecord,
    MAX_HASHTAGS, MIN_HASHTAGS,
};
use reelgen_errors::{ReelError, ReelResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error_handling::{KvOperationContext, RepositoryErrorHelpers, RepositoryOperation};
use crate::kv::{InMemoryKeyValueStore, PersistPolicy, StorageKeys};

/// 基于键值存储的 Reel 仓储
///
/// 整个 Reel 集合序列化后写入 `{prefix}:reels`，这是唯一的权威数据；
/// `{prefix}:schedule` 只是从 queued 项派生出来的索引。
/// 所有修改都在同一把锁内完成：复制、修改、持久化，成功后才替换内存状态。
pub struct KvReelStore {
    kv: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    policy: PersistPolicy,
    reels: Mutex<Vec<Reel>>,
}

impl KvReelStore {
    /// 从存储中加载已有数据，并重建调度索引
    pub async fn load(
        kv: Arc<dyn KeyValueStore>,
        keys: StorageKeys,
        policy: PersistPolicy,
    ) -> ReelResult<Self> {
        let key = keys.reels();
        let reels: Vec<Reel> = match kv.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                RepositoryErrorHelpers::kv_decode_error(
                    KvOperationContext::new(RepositoryOperation::Load).with_key(&key),
                    e,
                )
            })?,
            None => Vec::new(),
        };

        info!(count = reels.len(), "已加载Reel数据");

        let store = Self {
            kv,
            keys,
            policy,
            reels: Mutex::new(reels),
        };
        {
            let reels = store.reels.lock().await;
            store.write_schedule_index(&reels).await;
        }
        Ok(store)
    }

    /// 内存存储上的空仓储
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryKeyValueStore::new()),
            keys: StorageKeys::default(),
            policy: PersistPolicy::no_delay(1),
            reels: Mutex::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.reels.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reels.lock().await.is_empty()
    }

    async fn persist(&self, reels: &[Reel]) -> ReelResult<()> {
        let payload = serde_json::to_string(reels)?;
        self.policy
            .write(self.kv.as_ref(), &self.keys.reels(), &payload)
            .await?;
        self.write_schedule_index(reels).await;
        Ok(())
    }

    /// 索引写失败只记录日志，不回滚已提交的 Reel 数据
    async fn write_schedule_index(&self, reels: &[Reel]) {
        let index = Self::build_index(reels);
        let payload = match serde_json::to_string(&index) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "序列化调度索引失败");
                return;
            }
        };
        if let Err(e) = self
            .policy
            .write(self.kv.as_ref(), &self.keys.schedule(), &payload)
            .await
        {
            warn!(error = %e, "写入调度索引失败，将在下次写入时重建");
        }
    }

    fn build_index(reels: &[Reel]) -> Vec<ScheduleRecord> {
        reels
            .iter()
            .filter(|r| r.status == ReelStatus::Queued)
            .filter_map(Reel::schedule_record)
            .collect()
    }

    fn check_invariants(reel: &Reel) -> ReelResult<()> {
        if !(MIN_HASHTAGS..=MAX_HASHTAGS).contains(&reel.hashtags.len()) {
            return Err(ReelError::validation(format!(
                "标签数量必须在{MIN_HASHTAGS}到{MAX_HASHTAGS}之间，实际为{}",
                reel.hashtags.len()
            )));
        }
        if !reel.overlay.is_well_formed() {
            return Err(ReelError::validation("叠加层时间戳无序或超出时长"));
        }
        if reel.status == ReelStatus::Queued && reel.scheduled_at.is_none() {
            return Err(ReelError::validation("queued状态必须有排期时间"));
        }
        if reel.attempts > reel.max_retries {
            return Err(ReelError::validation("尝试次数超过最大重试次数"));
        }
        // 已发布后归档的 Reel 保留 post id
        let post_id_consistent = match reel.status {
            ReelStatus::Posted => reel.post_id.is_some(),
            ReelStatus::Archived => true,
            _ => reel.post_id.is_none(),
        };
        if !post_id_consistent {
            return Err(ReelError::validation("post id 只能在posted状态下设置"));
        }
        Ok(())
    }
}

#[async_trait]
impl ReelRepository for KvReelStore {
    #[instrument(skip(self, reel), fields(reel_id = %reel.id, archetype = %reel.archetype))]
    async fn create(&self, reel: Reel) -> ReelResult<Reel> {
        Self::check_invariants(&reel)?;

        let mut guard = self.reels.lock().await;
        if guard.iter().any(|r| r.id == reel.id) {
            return Err(ReelError::validation(format!("Reel ID重复: {}", reel.id)));
        }

        let mut next = guard.clone();
        next.push(reel.clone());
        self.persist(&next).await?;
        *guard = next;

        debug!("Reel已创建");
        Ok(reel)
    }

    async fn find_by_id(&self, id: &str) -> ReelResult<Option<Reel>> {
        Ok(self.reels.lock().await.iter().find(|r| r.id == id).cloned())
    }

    #[instrument(skip(self, mutator))]
    async fn update(&self, id: &str, mutator: ReelMutator) -> ReelResult<Reel> {
        let mut guard = self.reels.lock().await;
        let index = guard
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ReelError::not_found(id))?;

        let mut updated = guard[index].clone();
        mutator(&mut updated)?;
        if updated == guard[index] {
            return Ok(updated);
        }
        Self::check_invariants(&updated)?;

        let mut next = guard.clone();
        next[index] = updated.clone();
        self.persist(&next).await?;
        *guard = next;

        debug!(status = %updated.status, attempts = updated.attempts, "Reel已更新");
        Ok(updated)
    }

    async fn list(&self, filter: &ReelFilter) -> ReelResult<Vec<Reel>> {
        let reels = self.reels.lock().await;
        Ok(reels
            .iter()
            .filter(|r| filter.matches(r))
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> ReelResult<Vec<Reel>> {
        let reels = self.reels.lock().await;
        let mut due: Vec<Reel> = reels.iter().filter(|r| r.is_due(now)).cloned().collect();
        due.sort_by_key(|r| r.scheduled_at);
        Ok(due)
    }

    async fn schedule_index(&self) -> ReelResult<Vec<ScheduleRecord>> {
        Ok(Self::build_index(&self.reels.lock().await))
    }
}
