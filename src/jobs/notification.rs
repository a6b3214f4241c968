//! Job status notifications as reported by the backend

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunningStatus {
    Queued,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStatus {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

/// Observed job state; `Completed` is the only terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    InProgress,
    Completed(CompletionStatus),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed(_))
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            JobState::Completed(
                CompletionStatus::Failed | CompletionStatus::TimedOut | CompletionStatus::Cancelled
            )
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Queued => "queued",
            JobState::InProgress => "in progress",
            JobState::Completed(CompletionStatus::Succeeded) => "succeeded",
            JobState::Completed(CompletionStatus::Failed) => "failed",
            JobState::Completed(CompletionStatus::TimedOut) => "timed out",
            JobState::Completed(CompletionStatus::Cancelled) => "cancelled",
        };
        f.write_str(label)
    }
}

/// A child job that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub job_description: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobNotification {
    pub job_id: String,
    pub job_type: String,
    #[serde(default)]
    pub specification_id: Option<String>,
    pub running_status: RunningStatus,
    #[serde(default)]
    pub completion_status: Option<CompletionStatus>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub failures: Vec<JobFailure>,
    #[serde(default)]
    pub invoker_user_display_name: Option<String>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl JobNotification {
    /// A completed job without a completion status counts as succeeded
    pub fn state(&self) -> JobState {
        match self.running_status {
            RunningStatus::Queued => JobState::Queued,
            RunningStatus::InProgress => JobState::InProgress,
            RunningStatus::Completed => {
                JobState::Completed(self.completion_status.unwrap_or(CompletionStatus::Succeeded))
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    /// Outcome and child failures joined into one line; `None` when both are empty
    pub fn failure_summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(outcome) = self.outcome.as_deref().map(str::trim) {
            if !outcome.is_empty() {
                parts.push(outcome.to_string());
            }
        }
        parts.extend(
            self.failures
                .iter()
                .map(|f| format!("{}: {}", f.job_description, f.description)),
        );
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z][a-z0-9]*|[a-z0-9]+").expect("valid regex"));

/// `RefreshFundingJob` becomes `Refresh funding job`
pub fn describe_job_type(job_type: &str) -> String {
    let words: Vec<String> = WORD
        .find_iter(job_type)
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                word.as_str().to_string()
            } else {
                word.as_str().to_lowercase()
            }
        })
        .collect();
    if words.is_empty() {
        job_type.to_string()
    } else {
        words.join(" ")
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn completed_without_status_is_success() {
        let n = notification("j1", RunningStatus::Completed, 1);
        assert_eq!(n.state(), JobState::Completed(CompletionStatus::Succeeded));
        assert!(n.is_complete());
        assert!(!n.state().is_failure());
    }

    #[test]
    fn failure_summary_concatenates() {
        assert_eq!(
            failed("j1", 2).failure_summary().unwrap(),
            "Calculation run failed; Generate allocations: timeout contacting provider"
        );
        assert!(notification("j1", RunningStatus::Queued, 0)
            .failure_summary()
            .is_none());
    }

    #[test]
    fn parses_camel_case_payload() {
        let json = r#"{
            "jobId": "j7",
            "jobType": "AssignTemplateCalculationsJob",
            "specificationId": "spec-9",
            "runningStatus": "Completed",
            "completionStatus": "TimedOut",
            "created": "2024-05-01T09:00:00Z",
            "lastUpdated": "2024-05-01T09:05:00Z"
        }"#;
        let n: JobNotification = serde_json::from_str(json).unwrap();
        assert_eq!(n.state(), JobState::Completed(CompletionStatus::TimedOut));
        assert!(n.failures.is_empty());
        assert_eq!(n.state().to_string(), "timed out");
    }

    #[test]
    fn job_type_descriptions() {
        assert_eq!(describe_job_type("RefreshFundingJob"), "Refresh funding job");
        assert_eq!(
            describe_job_type("AssignTemplateCalculationsJob"),
            "Assign template calculations job"
        );
        assert_eq!(describe_job_type("---"), "---");
    }
}
