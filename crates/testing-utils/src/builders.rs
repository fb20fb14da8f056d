//! Test data builders for creating test entities

use chrono::{DateTime, Utc};
use reelgen_domain::{
    Archetype, ContentSynthesizer, DurationClass, GenerationParams, OverlayStyle, Reel,
    ReelStatus,
};

use crate::mocks::FixedRandom;

/// Builder for creating test Reel entities
pub struct ReelBuilder {
    reel: Reel,
}

impl ReelBuilder {
    pub fn new() -> Self {
        let params = GenerationParams::new(
            "home fitness",
            "Protein Shake",
            DurationClass::Seconds15,
            OverlayStyle::Text,
        );
        let archetype = Archetype::Cta;
        let payload = ContentSynthesizer::synthesize(&params, archetype, &mut FixedRandom::new());
        Self {
            reel: Reel::draft(&params, archetype, payload, 3, Utc::now()),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.reel.id = id.to_string();
        self
    }

    pub fn with_archetype(mut self, archetype: Archetype) -> Self {
        self.reel.archetype = archetype;
        self
    }

    pub fn with_status(mut self, status: ReelStatus) -> Self {
        self.reel.status = status;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.reel.max_retries = max_retries;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.reel.attempts = attempts;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.reel.created_at = created_at;
        self
    }

    /// queued 并设置排期时间
    pub fn queued_at(mut self, at: DateTime<Utc>) -> Self {
        self.reel.status = ReelStatus::Queued;
        self.reel.scheduled_at = Some(at);
        self
    }

    pub fn posted(mut self, post_id: &str) -> Self {
        self.reel.status = ReelStatus::Posted;
        self.reel.attempts = self.reel.attempts.max(1);
        self.reel.post_id = Some(post_id.to_string());
        self
    }

    pub fn failed(mut self) -> Self {
        self.reel.status = ReelStatus::Failed;
        self.reel.attempts = self.reel.max_retries;
        self.reel.last_error = Some("publish failed".to_string());
        self
    }

    pub fn build(self) -> Reel {
        self.reel
    }
}

impl Default for ReelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
