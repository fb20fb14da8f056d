//! # Reelgen Testing Utils
//!
//! Shared test doubles for the reel lifecycle engine.
//!
//! - **ScriptedPublisher**: queued publish outcomes, latency, call log and overlap detection
//! - **FlakyKeyValueStore**: in-memory store that fails writes on demand
//! - **FixedRandom**: deterministic random source for synthesis
//! - **ReelBuilder**: Reel entities with sensible defaults
//!
//! ```toml
//! [dev-dependencies]
//! reelgen-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
