//! Jobs Module - observes long-running backend jobs
//!
//! Independent of the tree editor; shares no state with it.
//!
//! - `notification`: job status payloads and the observed state machine
//! - `subscription`: standing filters and last-known notification per filter
//! - `banner`: banner text per subscription
//! - `poller`: status sources and the tokio polling task

pub mod banner;
pub mod notification;
pub mod poller;
pub mod subscription;

pub use banner::{BannerView, JobBanner};
pub use notification::{
    describe_job_type, CompletionStatus, JobFailure, JobNotification, JobState, RunningStatus,
};
pub use poller::{FileJobSource, JobPoller, JobStatusSource, PollerHandle};
pub use subscription::{JobFilter, JobRegistry, SubscriptionId};
