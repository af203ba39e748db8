//! Analysis job orchestration.
//!
//! This crate provides:
//! - Upload persistence and job submission
//! - A bounded worker pool running the frame pipeline
//! - Per-job cleanup, timeouts and typed failure records
//! - Course recommendation and output retention

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod processor;
pub mod recommender;
pub mod retention;

pub use config::{output_file_name, JobPaths, WorkerConfig};
pub use error::{OrchestratorError, WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use orchestrator::JobOrchestrator;
pub use processor::{execute_job, ProcessingContext};
pub use recommender::{default_catalog, CatalogRecommender, CourseRecommender};
pub use retention::OutputSweeper;
