//! Video analysis job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::report::VideoReport;

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

/// Lifecycle of a video job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, not started yet
    #[default]
    Queued,
    /// Frames are being analyzed
    Running,
    /// Every sampled frame was analyzed
    Completed,
    /// Stopped on request; the report holds the frames analyzed so far
    Stopped,
    /// Aborted by an error
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Stopped => "stopped",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Stopped | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible status of a video job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoJobStatus {
    pub id: JobId,
    pub filename: String,
    pub state: JobState,
    pub report: VideoReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoJobStatus {
    pub fn new(id: JobId, filename: impl Into<String>, report: VideoReport) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename: filename.into(),
            state: JobState::Queued,
            report,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new state, refreshing `updated_at`.
    pub fn transition(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Mark as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.transition(JobState::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::Taxonomy;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Stopped.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_fail_records_error() {
        let mut status = VideoJobStatus::new(JobId::new(), "clip.mp4", VideoReport::new(Taxonomy::Basic, 5));
        assert_eq!(status.state, JobState::Queued);
        status.fail("FFmpeg not found in PATH");
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("FFmpeg not found in PATH"));
    }
}
