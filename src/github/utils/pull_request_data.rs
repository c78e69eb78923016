//! Per-repository pull-request discovery and the rows of the pull-request dataset.

use async_trait::async_trait;
use log::{debug, trace};
use serde::Serialize;
use serde_json::json;

use crate::config::{Pagination, PullRequestCriteria};
use crate::github::client::executor::RequestExecutor;
use crate::github::client::transport::{ApiRequest, Transport};
use crate::github::json::pull_request::{PullRequestNode, PullRequestsData};
use crate::github::queries::REPOSITORY_PULL_REQUESTS_QUERY;
use crate::github::utils::pagination::{collect_qualified, Page, PageSource, Termination};
use crate::github::utils::repository_data::split_name_with_owner;
use crate::repominer_error::MineError;
use crate::statistics::summary::round_to;

impl PullRequestCriteria {
    /// Enough reviews AND open for at least the minimum duration. PRs missing either timestamp fail.
    pub fn admits(&self, pull_request: &PullRequestNode) -> bool {
        if pull_request.review_count() < self.min_reviews {
            return false;
        }

        match (pull_request.created_at, pull_request.finished_at()) {
            (Some(created_at), Some(finished_at)) => finished_at - created_at >= self.min_duration,
            _ => false,
        }
    }
}

/// A row of `github_prs_dataset.csv`. `title` stays last: it is the only free-text column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestRecord {
    pub repository: String,
    pub pr_number: u64,
    pub state: String,
    pub review_count: u64,
    pub created_at: String,
    pub closed_at: String,
    pub duration_hours: Option<f64>,
    pub changed_files: Option<u64>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub participants_count: Option<u64>,
    pub issue_comments_count: Option<u64>,
    pub review_threads_count: Option<u64>,
    pub comments_total: Option<u64>,
    pub title: String,
}

impl PullRequestRecord {
    pub fn from_node(repository: &str, node: &PullRequestNode) -> Self {
        let finished_at = node.finished_at();
        let duration_hours = match (node.created_at, finished_at) {
            (Some(created_at), Some(finished_at)) => {
                Some(round_to((finished_at - created_at).num_seconds() as f64 / 3600.0, 2))
            }
            _ => None,
        };

        let issue_comments = node.comments.map(|count| count.total_count);
        let review_threads = node.review_threads.map(|count| count.total_count);
        let comments_total = match (issue_comments, review_threads) {
            (None, None) => None,
            (comments, threads) => Some(comments.unwrap_or(0) + threads.unwrap_or(0)),
        };

        PullRequestRecord {
            repository: repository.to_string(),
            pr_number: node.number,
            state: node.state.clone(),
            review_count: node.review_count(),
            created_at: node.created_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
            closed_at: finished_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
            duration_hours,
            changed_files: node.changed_files,
            additions: node.additions,
            deletions: node.deletions,
            participants_count: node.participants.map(|count| count.total_count),
            issue_comments_count: issue_comments,
            review_threads_count: review_threads,
            comments_total,
            title: node.title.clone(),
        }
    }
}

/// Finished pull requests of one repository, newest first.
pub struct PullRequestSearch<'a, T: Transport> {
    executor: &'a RequestExecutor<T>,
    name_with_owner: String,
    owner: String,
    name: String,
}

impl<'a, T: Transport> PullRequestSearch<'a, T> {
    pub fn new(executor: &'a RequestExecutor<T>, name_with_owner: &str) -> Result<Self, MineError> {
        let (owner, name) = split_name_with_owner(name_with_owner)?;

        Ok(PullRequestSearch {
            executor,
            name_with_owner: name_with_owner.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl<'a, T: Transport> PageSource for PullRequestSearch<'a, T> {
    type Item = PullRequestNode;

    fn describe(&self) -> String {
        format!("pull requests of {}", self.name_with_owner)
    }

    async fn fetch_page(&self, cursor: Option<&str>, per_page: u32) -> Result<Page<PullRequestNode>, MineError> {
        let request = ApiRequest::graphql(
            REPOSITORY_PULL_REQUESTS_QUERY,
            json!({ "owner": self.owner, "name": self.name, "cursor": cursor, "perPage": per_page }),
        );

        let data: PullRequestsData = self.executor.execute_as(&request).await?;

        match data.repository {
            Some(repository) => Ok(Page::from(repository.pull_requests)),
            None => Err(MineError::RepositoryNotFound(self.name_with_owner.clone())),
        }
    }
}

/// Outcome of qualifying one repository's pull requests.
#[derive(Debug, Clone, PartialEq)]
pub enum Harvest {
    /// Exactly the per-repository target of qualifying PRs.
    Complete(Vec<PullRequestNode>),
    /// The listing ran out first; the PRs themselves are not kept.
    Incomplete { found: usize },
}

/// Runs the inner qualification loop for one repository. A fetch failure is an error, never a short harvest.
pub async fn harvest_pull_requests<T: Transport>(
    executor: &RequestExecutor<T>, name_with_owner: &str, pagination: &Pagination,
    criteria: &PullRequestCriteria,
) -> Result<Harvest, MineError> {
    let source = PullRequestSearch::new(executor, name_with_owner)?;

    let mut collected = collect_qualified(&source, pagination, |pull_request| {
        let admitted = criteria.admits(pull_request);
        trace!("[{}] PR#{} admitted = {}", name_with_owner, pull_request.number, admitted);
        admitted
    })
    .await;

    if collected.termination == Termination::FetchFailed {
        return Err(collected.error.take().unwrap_or_else(|| {
            MineError::Other(anyhow::anyhow!("Listing pull requests of [{}] failed", name_with_owner))
        }));
    }

    debug!(
        "[{}] yielded {} qualifying PR(s) in {} page(s) ({}).",
        name_with_owner,
        collected.items.len(),
        collected.pages,
        collected.termination
    );

    if collected.reached_target() {
        Ok(Harvest::Complete(collected.items))
    } else {
        Ok(Harvest::Incomplete {
            found: collected.items.len(),
        })
    }
}
