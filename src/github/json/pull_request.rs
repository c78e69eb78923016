use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::Serialize;

use crate::github::json::page::{Connection, TotalCount};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
/// A pull-request node from the per-repository pull-request listing.
pub struct PullRequestNode {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    pub created_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub changed_files: Option<u64>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub participants: Option<TotalCount>,
    pub comments: Option<TotalCount>,
    pub review_threads: Option<TotalCount>,
    pub reviews: Option<TotalCount>,
}

impl PullRequestNode {
    /// Moment the pull request stopped being open: its merge, or otherwise its closing.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.merged_at.or(self.closed_at)
    }

    pub fn review_count(&self) -> u64 {
        self.reviews.unwrap_or_default().total_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// `data` member of the pull-request listing query; `repository` is `null` for unknown repositories.
pub struct PullRequestsData {
    pub repository: Option<RepositoryPullRequests>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryPullRequests {
    pub pull_requests: Connection<PullRequestNode>,
}
