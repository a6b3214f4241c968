//! Status banner rendered for a subscription's latest notification

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::notification::{describe_job_type, JobNotification, JobState};
use super::subscription::SubscriptionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobBanner {
    pub subscription: SubscriptionId,
    pub job_id: String,
    pub title: String,
    pub state: JobState,
    /// Caller-supplied text, else the failure details of a failed job
    pub summary: Option<String>,
    pub invoker: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl JobBanner {
    pub fn new(
        subscription: SubscriptionId,
        notification: &JobNotification,
        summary_override: Option<&str>,
    ) -> Self {
        let state = notification.state();
        let summary = match summary_override {
            Some(text) => Some(text.to_string()),
            None if state.is_failure() => notification.failure_summary(),
            None => None,
        };
        Self {
            subscription,
            job_id: notification.job_id.clone(),
            title: format!("{} {}", describe_job_type(&notification.job_type), state),
            state,
            summary,
            invoker: notification.invoker_user_display_name.clone(),
            last_updated: notification.last_updated,
        }
    }

    pub fn is_error(&self) -> bool {
        self.state.is_failure()
    }
}

impl fmt::Display for JobBanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        if let Some(summary) = &self.summary {
            write!(f, ": {}", summary)?;
        }
        Ok(())
    }
}

/// Banner as emitted by the CLI in JSON output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerView<'a> {
    pub job_id: &'a str,
    pub title: &'a str,
    pub state: String,
    pub summary: Option<&'a str>,
    pub invoker: Option<&'a str>,
    pub last_updated: DateTime<Utc>,
}

impl<'a> From<&'a JobBanner> for BannerView<'a> {
    fn from(banner: &'a JobBanner) -> Self {
        Self {
            job_id: &banner.job_id,
            title: &banner.title,
            state: banner.state.to_string(),
            summary: banner.summary.as_deref(),
            invoker: banner.invoker.as_deref(),
            last_updated: banner.last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::notification::fixtures::*;
    use crate::jobs::notification::RunningStatus;
    use crate::jobs::{JobFilter, JobRegistry};

    #[test]
    fn failed_banner_concatenates_details() {
        let mut registry = JobRegistry::new();
        registry.subscribe(JobFilter::default());
        registry.notify(&failed("j1", 1));

        let banner = &registry.banners()[0];
        assert!(banner.is_error());
        assert_eq!(
            banner.to_string(),
            "Refresh funding job failed: Calculation run failed; \
             Generate allocations: timeout contacting provider"
        );
    }

    #[test]
    fn override_replaces_details() {
        let mut registry = JobRegistry::new();
        registry.subscribe_with_summary(JobFilter::default(), "Refresh failed, contact support");
        registry.notify(&failed("j1", 1));

        let banner = &registry.banners()[0];
        assert_eq!(banner.summary.as_deref(), Some("Refresh failed, contact support"));
    }

    #[test]
    fn running_job_has_no_summary() {
        let mut registry = JobRegistry::new();
        registry.subscribe(JobFilter::default());
        registry.notify(&notification("j1", RunningStatus::InProgress, 1));

        let banner = &registry.banners()[0];
        assert_eq!(banner.to_string(), "Refresh funding job in progress");
        assert_eq!(banner.invoker.as_deref(), Some("Test User"));

        let view = BannerView::from(banner);
        assert_eq!(serde_json::to_value(&view).unwrap()["state"], "in progress");
    }
}
