//! Metrics collector for the reel lifecycle engine
//!
//! Records through the `metrics` facade; without an installed recorder every
//! call is a no-op.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use tracing::{debug, warn};

pub struct MetricsCollector {
    // Publish metrics
    publish_attempts_total: Counter,
    publish_success_total: Counter,
    publish_transient_failures_total: Counter,
    publish_exhausted_total: Counter,
    publish_discarded_total: Counter,
    publish_duration: Histogram,

    // Queue and generation metrics
    due_queue_depth: Gauge,
    in_flight_publishes: Gauge,
    reels_generated_total: Counter,
    generation_failures_total: Counter,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            publish_attempts_total: counter!("reelgen_publish_attempts_total"),
            publish_success_total: counter!("reelgen_publish_success_total"),
            publish_transient_failures_total: counter!("reelgen_publish_transient_failures_total"),
            publish_exhausted_total: counter!("reelgen_publish_exhausted_total"),
            publish_discarded_total: counter!("reelgen_publish_discarded_total"),
            publish_duration: histogram!("reelgen_publish_duration_seconds"),
            due_queue_depth: gauge!("reelgen_due_queue_depth"),
            in_flight_publishes: gauge!("reelgen_in_flight_publishes"),
            reels_generated_total: counter!("reelgen_reels_generated_total"),
            generation_failures_total: counter!("reelgen_generation_failures_total"),
        }
    }

    /// 关闭指标时使用，所有记录都不产生任何效果
    pub fn disabled() -> Self {
        Self {
            publish_attempts_total: Counter::noop(),
            publish_success_total: Counter::noop(),
            publish_transient_failures_total: Counter::noop(),
            publish_exhausted_total: Counter::noop(),
            publish_discarded_total: Counter::noop(),
            publish_duration: Histogram::noop(),
            due_queue_depth: Gauge::noop(),
            in_flight_publishes: Gauge::noop(),
            reels_generated_total: Counter::noop(),
            generation_failures_total: Counter::noop(),
        }
    }

    pub fn record_publish_attempt(&self, reel_id: &str, attempt: u32) {
        self.publish_attempts_total.increment(1);
        debug!(reel_id = reel_id, attempt = attempt, "Publish attempt started");
    }

    pub fn record_publish_success(&self, duration_seconds: f64) {
        self.publish_success_total.increment(1);
        self.publish_duration.record(duration_seconds);
    }

    pub fn record_publish_failure(&self, reel_id: &str, exhausted: bool, duration_seconds: f64) {
        self.publish_duration.record(duration_seconds);
        if exhausted {
            self.publish_exhausted_total.increment(1);
            warn!(reel_id = reel_id, "Publish retries exhausted");
        } else {
            self.publish_transient_failures_total.increment(1);
        }
    }

    pub fn record_publish_discarded(&self, reel_id: &str) {
        self.publish_discarded_total.increment(1);
        debug!(reel_id = reel_id, "Publish outcome discarded");
    }

    pub fn update_due_queue_depth(&self, depth: usize) {
        self.due_queue_depth.set(depth as f64);
    }

    pub fn update_in_flight(&self, count: usize) {
        self.in_flight_publishes.set(count as f64);
    }

    pub fn record_generated(&self, created: usize, failed: usize) {
        self.reels_generated_total.increment(created as u64);
        if failed > 0 {
            self.generation_failures_total.increment(failed as u64);
        }
    }
}
