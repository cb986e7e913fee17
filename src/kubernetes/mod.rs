mod client;
mod resources;

pub use client::KubeFetcher;
pub use resources::{ResourceRecord, WorkloadKind};

use async_trait::async_trait;
use thiserror::Error;

/// Failures while obtaining the resource collection
#[derive(Debug, Error)]
pub enum FetchError {
    /// Client configuration or connection setup failed
    #[error("{0}")]
    Client(String),
    /// The API server rejected or failed the request
    #[error("{0}")]
    Api(#[from] kube::Error),
    /// A listed item could not be turned into a record
    #[error("invalid {kind} item #{index}: {reason}")]
    InvalidRecord {
        kind: &'static str,
        index: usize,
        reason: String,
    },
}

/// Source of workload records
///
/// Each call returns the complete collection; an optional label selector
/// (e.g., "app=backup,tier=batch") is pushed down to the API.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// List CronJobs
    async fn fetch_scheduled_resources(
        &self,
        label_selector: Option<&str>,
    ) -> Result<Vec<ResourceRecord>, FetchError>;

    /// List Jobs
    async fn fetch_completion_resources(
        &self,
        label_selector: Option<&str>,
    ) -> Result<Vec<ResourceRecord>, FetchError>;
}
