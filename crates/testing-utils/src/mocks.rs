//! Test doubles for the publisher, key-value store and random source

use async_trait::async_trait;
use reelgen_domain::{KeyValueStore, PublishOutcome, Publisher, RandomSource, Reel};
use reelgen_errors::{ReelError, ReelResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Deterministic random source: always picks the same index and never shuffles
#[derive(Debug, Clone, Default)]
pub struct FixedRandom {
    index: usize,
}

impl FixedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn picking(index: usize) -> Self {
        Self { index }
    }
}

impl RandomSource for FixedRandom {
    fn pick_index(&mut self, len: usize) -> usize {
        self.index % len.max(1)
    }

    fn shuffle(&mut self, _items: &mut [String]) {}
}

#[derive(Debug, Default)]
struct PublishTracking {
    calls: Vec<String>,
    active: HashMap<String, usize>,
    max_overlap_per_reel: usize,
    active_total: usize,
    max_concurrency: usize,
}

/// Publisher whose outcomes are scripted by the test
///
/// Outcomes are consumed in order; once the script is empty every call
/// succeeds.
#[derive(Clone)]
pub struct ScriptedPublisher {
    script: Arc<Mutex<VecDeque<PublishOutcome>>>,
    tracking: Arc<Mutex<PublishTracking>>,
    latency: Duration,
    gate: Option<Arc<Semaphore>>,
    counter: Arc<AtomicUsize>,
}

impl ScriptedPublisher {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            tracking: Arc::new(Mutex::new(PublishTracking::default())),
            latency: Duration::ZERO,
            gate: None,
            counter: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_outcomes(outcomes: Vec<PublishOutcome>) -> Self {
        let publisher = Self::new();
        publisher.script.lock().unwrap().extend(outcomes);
        publisher
    }

    pub fn always_failing(count: usize) -> Self {
        Self::with_outcomes(
            (0..count)
                .map(|i| PublishOutcome::failure(format!("scripted failure {}", i + 1)))
                .collect(),
        )
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every publish call blocks until `release` hands out a permit
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn push_outcome(&self, outcome: PublishOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.tracking.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.tracking.lock().unwrap().calls.len()
    }

    pub fn calls_for(&self, reel_id: &str) -> usize {
        self.tracking
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|id| id.as_str() == reel_id)
            .count()
    }

    /// Highest number of simultaneous calls observed for a single reel
    pub fn max_overlap_per_reel(&self) -> usize {
        self.tracking.lock().unwrap().max_overlap_per_reel
    }

    /// Highest number of simultaneous calls observed overall
    pub fn max_concurrency(&self) -> usize {
        self.tracking.lock().unwrap().max_concurrency
    }

    fn next_outcome(&self) -> PublishOutcome {
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        PublishOutcome::success(format!("IG_test_{n}"))
    }

    fn enter(&self, reel_id: &str) {
        let mut tracking = self.tracking.lock().unwrap();
        tracking.calls.push(reel_id.to_string());
        let active = tracking.active.entry(reel_id.to_string()).or_insert(0);
        *active += 1;
        let overlap = *active;
        tracking.max_overlap_per_reel = tracking.max_overlap_per_reel.max(overlap);
        tracking.active_total += 1;
        tracking.max_concurrency = tracking.max_concurrency.max(tracking.active_total);
    }

    fn exit(&self, reel_id: &str) {
        let mut tracking = self.tracking.lock().unwrap();
        if let Some(active) = tracking.active.get_mut(reel_id) {
            *active = active.saturating_sub(1);
        }
        tracking.active_total = tracking.active_total.saturating_sub(1);
    }
}

impl Default for ScriptedPublisher {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveCall<'a> {
    publisher: &'a ScriptedPublisher,
    reel_id: &'a str,
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.publisher.exit(self.reel_id);
    }
}

#[async_trait]
impl Publisher for ScriptedPublisher {
    async fn publish(&self, reel: &Reel) -> PublishOutcome {
        self.enter(&reel.id);
        // 超时取消时也要正确退出
        let _active = ActiveCall {
            publisher: self,
            reel_id: &reel.id,
        };

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.next_outcome()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// In-memory key-value store that fails writes on demand
#[derive(Debug, Clone, Default)]
pub struct FlakyKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_next_writes: Arc<AtomicUsize>,
    failing_keys: Arc<Mutex<Vec<String>>>,
    write_count: Arc<AtomicUsize>,
}

impl FlakyKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` writes (to any key) fail with a storage error
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_next_writes.store(n, Ordering::SeqCst);
    }

    /// Writes to keys ending with `suffix` always fail
    pub fn fail_writes_to(&self, suffix: &str) {
        self.failing_keys.lock().unwrap().push(suffix.to_string());
    }

    pub fn heal(&self) {
        self.fail_next_writes.store(0, Ordering::SeqCst);
        self.failing_keys.lock().unwrap().clear();
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for FlakyKeyValueStore {
    async fn get(&self, key: &str) -> ReelResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> ReelResult<()> {
        self.write_count.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_next_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_writes.store(remaining - 1, Ordering::SeqCst);
            return Err(ReelError::storage(format!("injected failure writing {key}")));
        }
        if self
            .failing_keys
            .lock()
            .unwrap()
            .iter()
            .any(|suffix| key.ends_with(suffix.as_str()))
        {
            return Err(ReelError::storage(format!("key {key} is unavailable")));
        }

        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
