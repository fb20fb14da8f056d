//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelgen_errors::ReelResult;

use crate::entities::{Reel, ReelFilter, ScheduleRecord, UserPreferences};

/// 对单个 Reel 的原子读-改-写。返回错误时不会提交任何修改。
pub type ReelMutator = Box<dyn FnOnce(&mut Reel) -> ReelResult<()> + Send>;

/// 字符串键值存储
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> ReelResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> ReelResult<()>;
}

/// Reel仓储抽象
#[async_trait]
pub trait ReelRepository: Send + Sync {
    async fn create(&self, reel: Reel) -> ReelResult<Reel>;
    async fn find_by_id(&self, id: &str) -> ReelResult<Option<Reel>>;
    /// 找不到时返回 ReelNotFound
    async fn update(&self, id: &str, mutator: ReelMutator) -> ReelResult<Reel>;
    async fn list(&self, filter: &ReelFilter) -> ReelResult<Vec<Reel>>;
    async fn find_due(&self, now: DateTime<Utc>) -> ReelResult<Vec<Reel>>;
    async fn schedule_index(&self) -> ReelResult<Vec<ScheduleRecord>>;
}

/// 用户偏好与自动生成时间戳
#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    async fn load(&self) -> ReelResult<UserPreferences>;
    async fn save(&self, prefs: &UserPreferences) -> ReelResult<()>;
    async fn last_auto_generation(&self) -> ReelResult<Option<DateTime<Utc>>>;
    async fn record_auto_generation(&self, at: DateTime<Utc>) -> ReelResult<()>;
}
