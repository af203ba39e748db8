//! Analysis job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::AnalysisOutcome;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
///
/// Legal transitions are `Pending -> Processing -> {Success, Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Upload stored, waiting for a worker
    #[default]
    Pending,
    /// Frame analysis is running
    Processing,
    /// Analysis finished and the annotated video is available
    Success,
    /// Analysis failed
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Success)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse classification of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// The uploaded file could not be opened as a video
    VideoOpen,
    /// Frame analysis failed part way through
    Processing,
    /// Re-encoding the annotated video failed
    Conversion,
    /// The course recommender failed
    Recommendation,
    /// The job exceeded its time budget
    Timeout,
    /// Anything else, including worker panics
    Internal,
}

impl JobErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobErrorKind::VideoOpen => "video_open",
            JobErrorKind::Processing => "processing",
            JobErrorKind::Conversion => "conversion",
            JobErrorKind::Recommendation => "recommendation",
            JobErrorKind::Timeout => "timeout",
            JobErrorKind::Internal => "internal",
        }
    }
}

/// One analysis request for one uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    #[serde(rename = "job_id")]
    pub id: JobId,

    /// Current lifecycle status
    pub status: JobStatus,

    /// Analysis outcome; `null` until the job succeeded
    pub result: Option<AnalysisOutcome>,

    /// Human-readable failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Diagnostic trace for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Failure classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<JobErrorKind>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a pending job with a fresh ID.
    pub fn new() -> Self {
        Self::with_id(JobId::new())
    }

    /// Create a pending job with a caller-provided ID.
    pub fn with_id(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            result: None,
            message: None,
            details: None,
            error_kind: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start processing the job.
    pub fn start(mut self) -> Self {
        self.status = JobStatus::Processing;
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job as succeeded with its outcome.
    pub fn succeed(mut self, outcome: AnalysisOutcome) -> Self {
        self.status = JobStatus::Success;
        self.result = Some(outcome);
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job as failed.
    pub fn fail(
        mut self,
        kind: JobErrorKind,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        self.status = JobStatus::Error;
        self.error_kind = Some(kind);
        self.message = Some(message.into());
        self.details = Some(details.into());
        self.updated_at = Utc::now();
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}
