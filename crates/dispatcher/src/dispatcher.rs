use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use reelgen_core::DispatcherConfig;
use reelgen_domain::{PublishOutcome, Publisher, Reel, ReelRepository, ReelStatus};
use reelgen_errors::{ReelError, ReelResult};
use reelgen_infrastructure::MetricsCollector;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::retry_service::RetryPolicy;

/// 单次发布调度的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Posted {
        reel_id: String,
        post_id: String,
    },
    /// 失败但仍有剩余次数，error 为 PublishTransient 或 PublishTimeout
    Retrying {
        reel_id: String,
        attempts: u32,
        next_attempt_at: Option<DateTime<Utc>>,
        error: ReelError,
    },
    /// 尝试次数耗尽，error 为 PublishExhausted，reason 为最后一次失败原因
    Failed {
        reel_id: String,
        attempts: u32,
        reason: String,
        error: ReelError,
    },
    /// 发布期间 Reel 被归档或修改，结果被丢弃
    Discarded { reel_id: String },
    /// 选中后发现已不再到期
    Skipped { reel_id: String },
    Error { reel_id: String, error: ReelError },
}

impl DispatchOutcome {
    pub fn reel_id(&self) -> &str {
        match self {
            DispatchOutcome::Posted { reel_id, .. }
            | DispatchOutcome::Retrying { reel_id, .. }
            | DispatchOutcome::Failed { reel_id, .. }
            | DispatchOutcome::Discarded { reel_id }
            | DispatchOutcome::Skipped { reel_id }
            | DispatchOutcome::Error { reel_id, .. } => reel_id,
        }
    }
}

/// 进行中的 Reel 集合。同一 Reel 同一时刻只允许一个发布任务。
#[derive(Debug, Default, Clone)]
struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    fn try_claim(&self, reel_id: &str) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(reel_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            ids: Arc::clone(&self.ids),
            reel_id: reel_id.to_string(),
        })
    }

    fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    reel_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.reel_id);
    }
}

/// 停止调度循环的句柄
pub struct DispatcherHandle {
    shutdown_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl DispatcherHandle {
    /// 通知调度循环停止并等待进行中的发布在宽限期内结束
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join.await {
            error!("调度循环异常退出: {}", e);
        }
    }
}

/// 发布调度器：轮询到期 Reel，在并发上限内发布，记录重试与终态
#[derive(Clone)]
pub struct ReelDispatcher {
    repo: Arc<dyn ReelRepository>,
    publisher: Arc<dyn Publisher>,
    retry: RetryPolicy,
    config: DispatcherConfig,
    semaphore: Arc<Semaphore>,
    in_flight: InFlight,
    metrics: Arc<MetricsCollector>,
}

impl ReelDispatcher {
    pub fn new(
        repo: Arc<dyn ReelRepository>,
        publisher: Arc<dyn Publisher>,
        retry: RetryPolicy,
        config: DispatcherConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let permits = config.max_concurrent_publishes.max(1);
        Self {
            repo,
            publisher,
            retry,
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
            in_flight: InFlight::default(),
            metrics,
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// 为每个到期且未在发布中的 Reel 启动一个发布任务，返回启动数量
    pub async fn dispatch_due(
        &self,
        now: DateTime<Utc>,
        tasks: &mut JoinSet<DispatchOutcome>,
    ) -> ReelResult<usize> {
        let due = self.repo.find_due(now).await?;
        self.metrics.update_due_queue_depth(due.len());

        let mut spawned = 0;
        for reel in due {
            let Some(guard) = self.in_flight.try_claim(&reel.id) else {
                debug!(reel_id = %reel.id, "Reel正在发布中，跳过");
                continue;
            };
            let dispatcher = self.clone();
            tasks.spawn(async move {
                let outcome = dispatcher.dispatch_one(&reel.id, now).await;
                drop(guard);
                dispatcher.metrics.update_in_flight(dispatcher.in_flight.len());
                outcome
            });
            spawned += 1;
        }
        self.metrics.update_in_flight(self.in_flight.len());
        Ok(spawned)
    }

    /// 执行一轮调度并等待本轮启动的任务全部结束
    pub async fn tick(&self, now: DateTime<Utc>) -> ReelResult<Vec<DispatchOutcome>> {
        let mut tasks = JoinSet::new();
        self.dispatch_due(now, &mut tasks).await?;

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("发布任务异常退出: {}", e),
            }
        }
        Ok(outcomes)
    }

    /// 发布单个 Reel：开始尝试、调用发布器、提交结果，三步各自原子
    #[instrument(skip(self), fields(publisher = %self.publisher.name()))]
    pub async fn dispatch_one(&self, reel_id: &str, now: DateTime<Utc>) -> DispatchOutcome {
        let _permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                return DispatchOutcome::Error {
                    reel_id: reel_id.to_string(),
                    error: ReelError::internal(e.to_string()),
                }
            }
        };

        let reel = match self.begin_attempt(reel_id, now).await {
            Ok(reel) if reel.status == ReelStatus::Failed => {
                // 上次提交未落盘，次数已用完
                self.metrics.record_publish_failure(&reel.id, true, 0.0);
                return Self::exhausted(reel);
            }
            Ok(reel) => reel,
            Err(ReelError::InvalidTransition { .. }) | Err(ReelError::ReelNotFound { .. }) => {
                debug!(reel_id = reel_id, "Reel已不再到期，跳过");
                return DispatchOutcome::Skipped {
                    reel_id: reel_id.to_string(),
                };
            }
            Err(e) => {
                if e.is_fatal() {
                    error!(reel_id = reel_id, error = %e, "开始发布尝试失败");
                } else {
                    warn!(reel_id = reel_id, error = %e, retryable = e.is_retryable(), "开始发布尝试失败");
                }
                return DispatchOutcome::Error {
                    reel_id: reel_id.to_string(),
                    error: e,
                };
            }
        };

        let attempt = reel.attempts;
        self.metrics.record_publish_attempt(&reel.id, attempt);
        info!(reel_id = %reel.id, attempt = attempt, max_retries = reel.max_retries, "开始发布Reel");

        let started = Instant::now();
        let result = match timeout(self.config.publish_timeout(), self.publisher.publish(&reel)).await
        {
            Ok(PublishOutcome::Success { external_id }) => Ok(external_id),
            Ok(PublishOutcome::Failure { reason }) => Err(ReelError::PublishTransient(reason)),
            Err(_) => Err(ReelError::PublishTimeout(format!(
                "超过 {} 秒未完成",
                self.config.publish_timeout_seconds
            ))),
        };
        let elapsed = started.elapsed().as_secs_f64();

        self.commit(&reel, result, elapsed).await
    }

    fn exhausted(reel: Reel) -> DispatchOutcome {
        let error = ReelError::PublishExhausted {
            id: reel.id.clone(),
            attempts: reel.attempts,
        };
        let reason = reel.last_error.clone().unwrap_or_else(|| error.to_string());
        error!(
            reel_id = %reel.id,
            attempts = reel.attempts,
            reason = %reason,
            hint = error.user_message(),
            "Reel发布重试已耗尽"
        );
        DispatchOutcome::Failed {
            reel_id: reel.id,
            attempts: reel.attempts,
            reason,
            error,
        }
    }

    async fn begin_attempt(&self, reel_id: &str, now: DateTime<Utc>) -> ReelResult<Reel> {
        self.repo
            .update(
                reel_id,
                Box::new(move |r: &mut Reel| {
                    if !r.is_due(now) {
                        return Err(ReelError::invalid_transition(
                            &r.id,
                            r.status,
                            "publishing",
                        ));
                    }
                    if r.attempts >= r.max_retries {
                        return r.mark_exhausted();
                    }
                    r.begin_attempt().map(|_| ())
                }),
            )
            .await
    }

    async fn commit(
        &self,
        reel: &Reel,
        result: ReelResult<String>,
        elapsed: f64,
    ) -> DispatchOutcome {
        let reel_id = reel.id.clone();
        let attempt = reel.attempts;
        let next_attempt_at = self.retry.next_attempt_at(attempt, Utc::now());

        let posted_id = result.as_ref().ok().cloned();
        let publish_error = result.as_ref().err().cloned();
        let mutation_result = result;

        let result = self
            .repo
            .update(
                &reel_id,
                Box::new(move |r: &mut Reel| {
                    if r.status != ReelStatus::Queued || r.attempts != attempt {
                        return Err(ReelError::invalid_transition(&r.id, r.status, "commit"));
                    }
                    match mutation_result {
                        Ok(external_id) => r.mark_posted(external_id),
                        Err(e) => r.record_failure(e.to_string(), next_attempt_at).map(|_| ()),
                    }
                }),
            )
            .await;

        match result {
            Ok(updated) => match updated.status {
                ReelStatus::Posted => {
                    let post_id = updated.post_id.clone().unwrap_or_default();
                    self.metrics.record_publish_success(elapsed);
                    info!(reel_id = %reel_id, post_id = %post_id, attempt = attempt, "Reel发布成功");
                    DispatchOutcome::Posted { reel_id, post_id }
                }
                ReelStatus::Failed => {
                    self.metrics.record_publish_failure(&reel_id, true, elapsed);
                    Self::exhausted(updated)
                }
                _ => {
                    let error = publish_error
                        .unwrap_or_else(|| ReelError::internal("发布失败但没有错误信息"));
                    self.metrics.record_publish_failure(&reel_id, false, elapsed);
                    warn!(
                        reel_id = %reel_id,
                        attempt = attempt,
                        next_attempt_at = ?updated.next_attempt_at,
                        error = %error,
                        "Reel发布失败，等待重试"
                    );
                    DispatchOutcome::Retrying {
                        reel_id,
                        attempts: attempt,
                        next_attempt_at: updated.next_attempt_at,
                        error,
                    }
                }
            },
            Err(ReelError::InvalidTransition { .. }) | Err(ReelError::ReelNotFound { .. }) => {
                self.metrics.record_publish_discarded(&reel_id);
                warn!(reel_id = %reel_id, post_id = ?posted_id, "发布期间Reel状态已变化，丢弃发布结果");
                DispatchOutcome::Discarded { reel_id }
            }
            Err(e) => {
                error!(
                    reel_id = %reel_id,
                    post_id = ?posted_id,
                    error = %e,
                    "提交发布结果失败"
                );
                DispatchOutcome::Error { reel_id, error: e }
            }
        }
    }

    /// 启动后台调度循环
    pub fn start(&self) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let join = self.start_with_shutdown(shutdown_rx);
        DispatcherHandle { shutdown_tx, join }
    }

    /// 使用外部关闭信号启动后台调度循环
    pub fn start_with_shutdown(&self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(dispatcher.config.poll_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tasks: JoinSet<DispatchOutcome> = JoinSet::new();

            info!(
                poll_interval_seconds = dispatcher.config.poll_interval_seconds,
                max_concurrent = dispatcher.config.max_concurrent_publishes,
                "发布调度器已启动"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = dispatcher.dispatch_due(Utc::now(), &mut tasks).await {
                            error!("查询到期Reel失败: {}", e);
                        }
                    }
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        if let Err(e) = joined {
                            error!("发布任务异常退出: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("收到关闭信号，停止调度新的发布");
                        break;
                    }
                }
            }

            let grace = dispatcher.config.shutdown_grace();
            let drained = timeout(grace, async {
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        error!("发布任务异常退出: {}", e);
                    }
                }
            })
            .await;
            if drained.is_err() {
                warn!(remaining = tasks.len(), "宽限期内仍有发布未完成，强制取消");
                tasks.abort_all();
            }
            info!("发布调度器已停止");
        })
    }
}
