//! Periodic job status polling
//!
//! The poller runs on its own tokio task and only holds a weak reference to
//! the registry: once the owner drops the registry the task ends at the next
//! tick. A [`PollerHandle`] cancels it explicitly.

use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::notification::JobNotification;
use super::subscription::{JobRegistry, SubscriptionId};
use crate::config::JobsConfig;
use crate::error::{FundError, Result};
use crate::template::DocumentFormat;

/// Where job notifications come from
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<JobNotification>>;
}

/// Notifications read from a JSON or YAML file on every fetch
#[derive(Debug, Clone)]
pub struct FileJobSource {
    path: PathBuf,
}

impl FileJobSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(content: &str, format: DocumentFormat) -> Result<Vec<JobNotification>> {
        let parsed: std::result::Result<Vec<JobNotification>, String> = match format {
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| FundError::JobSource { message })
    }
}

#[async_trait]
impl JobStatusSource for FileJobSource {
    async fn fetch(&self) -> Result<Vec<JobNotification>> {
        let format = DocumentFormat::from_path(&self.path)?;
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FundError::JobSource {
                message: format!("{}: {}", self.path.display(), e),
            })?;
        Self::parse(&content, format)
    }
}

pub struct JobPoller {
    source: Arc<dyn JobStatusSource>,
    interval: Duration,
    stop_when_settled: bool,
}

impl JobPoller {
    pub fn new(source: Arc<dyn JobStatusSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            stop_when_settled: false,
        }
    }

    pub fn from_config(source: Arc<dyn JobStatusSource>, config: &JobsConfig) -> Self {
        Self::new(source, config.poll_interval()).stop_when_settled(config.stop_when_settled)
    }

    /// End the task once every subscription has seen its job complete
    pub fn stop_when_settled(mut self, stop: bool) -> Self {
        self.stop_when_settled = stop;
        self
    }

    /// Fetch once and feed every notification to the registry
    pub async fn poll_once(&self, registry: &RwLock<JobRegistry>) -> Result<Vec<SubscriptionId>> {
        let notifications = self.source.fetch().await?;
        let mut registry = registry.write();
        let mut changed: Vec<SubscriptionId> = notifications
            .iter()
            .flat_map(|n| registry.notify(n))
            .collect();
        changed.sort();
        changed.dedup();
        Ok(changed)
    }

    /// Spawn the polling loop; the first poll happens immediately
    pub fn start(self, registry: &Arc<RwLock<JobRegistry>>) -> PollerHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(Arc::downgrade(registry), token.clone()));
        PollerHandle { token, task }
    }

    #[instrument(skip_all, fields(interval_ms = self.interval.as_millis() as u64))]
    async fn run(self, registry: Weak<RwLock<JobRegistry>>, token: CancellationToken) -> usize {
        let mut ticker = interval(self.interval);
        let mut polls = 0;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(polls, "poller cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let Some(registry) = registry.upgrade() else {
                debug!(polls, "registry dropped, poller stopping");
                break;
            };

            match self.poll_once(&registry).await {
                Ok(changed) if !changed.is_empty() => {
                    debug!(changed = changed.len(), "job status changed");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "job status poll failed"),
            }
            polls += 1;

            if self.stop_when_settled && registry.read().is_settled() {
                info!(polls, "all tracked jobs settled, poller stopping");
                break;
            }
        }

        polls
    }
}

/// Running poller; dropping the handle leaves the task running
pub struct PollerHandle {
    token: CancellationToken,
    task: JoinHandle<usize>,
}

impl PollerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait, returning the number of polls made
    pub async fn stop(self) -> usize {
        self.token.cancel();
        self.join().await
    }

    /// Wait for the poller to end on its own
    pub async fn join(self) -> usize {
        match self.task.await {
            Ok(polls) => polls,
            Err(e) => {
                warn!(error = %e, "poller task failed");
                0
            }
        }
    }
}
