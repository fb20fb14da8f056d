pub mod entities;
pub mod publisher;
pub mod repositories;
pub mod rotation;
pub mod synthesis;
pub mod value_objects;

pub use entities::*;
pub use publisher::*;
pub use reelgen_errors::{ReelError, ReelResult};
pub use repositories::*;
pub use rotation::CreativeRotator;
pub use synthesis::{ContentSynthesizer, RandomSource, StdRandom, MAX_HASHTAGS, MIN_HASHTAGS};
pub use value_objects::*;
