pub mod auto_generation;
pub mod controller;
pub mod dispatcher;
pub mod generator;
pub mod retry_service;
pub mod scheduler;

pub use auto_generation::AutoGenerator;
pub use controller::{ExportArtifact, ReelController, ReelStatusSummary};
pub use dispatcher::{DispatchOutcome, DispatcherHandle, ReelDispatcher};
pub use generator::{
    BatchGeneration, GenerationFailure, GenerationMode, GenerationReport, ReelGenerator, BATCH_SIZE,
};
pub use retry_service::RetryPolicy;
pub use scheduler::{ItemFailure, ReelScheduler, SchedulePolicy, ScheduleReport};
