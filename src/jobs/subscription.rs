//! Standing job subscriptions and their last-known notification

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::banner::JobBanner;
use super::notification::JobNotification;

/// Which notifications a subscription cares about; empty fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilter {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub job_types: Vec<String>,
    #[serde(default)]
    pub specification_id: Option<String>,
}

impl JobFilter {
    pub fn for_specification(specification_id: impl Into<String>) -> Self {
        Self {
            specification_id: Some(specification_id.into()),
            ..Self::default()
        }
    }

    pub fn for_job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..Self::default()
        }
    }

    pub fn with_job_types<I, S>(mut self, job_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.job_types = job_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, notification: &JobNotification) -> bool {
        let job_id = self
            .job_id
            .as_ref()
            .map_or(true, |id| *id == notification.job_id);
        let job_type =
            self.job_types.is_empty() || self.job_types.contains(&notification.job_type);
        let specification = self
            .specification_id
            .as_ref()
            .map_or(true, |spec| notification.specification_id.as_ref() == Some(spec));
        job_id && job_type && specification
    }

    /// Filters without a job id follow whichever matching job is newest
    pub fn is_job_agnostic(&self) -> bool {
        self.job_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Subscription {
    id: SubscriptionId,
    filter: JobFilter,
    summary_override: Option<String>,
    latest: Option<JobNotification>,
}

impl Subscription {
    /// Store `notification` if it is newer than what is held; true on change
    fn offer(&mut self, notification: &JobNotification) -> bool {
        let Some(current) = &self.latest else {
            self.latest = Some(notification.clone());
            return true;
        };

        if current.job_id == notification.job_id {
            if notification.last_updated < current.last_updated || notification == current {
                return false;
            }
        } else if notification.created < current.created {
            debug!(
                subscription = %self.id,
                job_id = %notification.job_id,
                "ignored notification for an older job"
            );
            return false;
        }

        self.latest = Some(notification.clone());
        true
    }
}

/// Registry of standing subscriptions, in registration order
#[derive(Debug, Default)]
pub struct JobRegistry {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, filter: JobFilter) -> SubscriptionId {
        self.register(filter, None)
    }

    /// Subscribe with a fixed banner summary that replaces the failure details
    pub fn subscribe_with_summary(
        &mut self,
        filter: JobFilter,
        summary: impl Into<String>,
    ) -> SubscriptionId {
        self.register(filter, Some(summary.into()))
    }

    fn register(&mut self, filter: JobFilter, summary_override: Option<String>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        debug!(subscription = %id, ?filter, "subscribed");
        self.subscriptions.push(Subscription {
            id,
            filter,
            summary_override,
            latest: None,
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Match a notification against every subscription; returns those that changed
    pub fn notify(&mut self, notification: &JobNotification) -> Vec<SubscriptionId> {
        self.subscriptions
            .iter_mut()
            .filter(|s| s.filter.matches(notification))
            .filter_map(|s| s.offer(notification).then_some(s.id))
            .collect()
    }

    pub fn latest(&self, id: SubscriptionId) -> Option<&JobNotification> {
        self.subscriptions
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.latest.as_ref())
    }

    /// One banner per subscription holding a notification, in registration order
    pub fn banners(&self) -> Vec<JobBanner> {
        self.subscriptions
            .iter()
            .filter_map(|s| {
                let latest = s.latest.as_ref()?;
                Some(JobBanner::new(s.id, latest, s.summary_override.as_deref()))
            })
            .collect()
    }

    /// Every subscription has seen its job complete
    pub fn is_settled(&self) -> bool {
        !self.subscriptions.is_empty()
            && self
                .subscriptions
                .iter()
                .all(|s| s.latest.as_ref().is_some_and(JobNotification::is_complete))
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
