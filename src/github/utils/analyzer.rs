//! Repository & pull-request mining pipelines.
//!
//! The [`Analyzer`] owns the [`RequestExecutor`] and drives the qualification loops: the outer repository
//! discovery (which accepts a partial collection) and, for the `pull-requests` pipeline, one inner
//! pull-request loop per discovered repository (whose short harvests are thrown away).

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::config::{JavaConfig, Pagination, PopularConfig, PullRequestConfig};
use crate::github::client::executor::RequestExecutor;
use crate::github::client::transport::Transport;
use crate::github::json::repository::{RepositoryNode, RestRepository};
use crate::github::utils::pagination::collect_qualified;
use crate::github::utils::pull_request_data::{harvest_pull_requests, Harvest, PullRequestRecord};
use crate::github::utils::repository_data::{
    fetch_repository_details, has_min_pull_requests, DenyList, RepositoryRecord, RepositorySearch,
    RestRepositorySearch, SelectedRepository,
};

/// Output of the `pull-requests` pipeline.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PullRequestMining {
    /// Repositories that reached the per-repository target, in discovery order.
    pub selected: Vec<SelectedRepository>,
    pub records: Vec<PullRequestRecord>,
}

/// A [`Repository`](RepositoryNode) and pull-request miner.
pub struct Analyzer<T: Transport> {
    executor: RequestExecutor<T>,
}

impl<T: Transport> Analyzer<T> {
    pub fn new(executor: RequestExecutor<T>) -> Self {
        Analyzer { executor }
    }

    pub fn executor(&self) -> &RequestExecutor<T> {
        &self.executor
    }

    /// Outer loop of the `pull-requests` pipeline: repositories with at least `min_pull_requests` finished
    /// (merged + closed) pull requests. A short collection is returned as is.
    pub async fn discover_repositories(
        &self, search_query: &str, pagination: &Pagination, min_pull_requests: u64,
    ) -> Vec<RepositoryNode> {
        let source = RepositorySearch::with_pull_request_counts(&self.executor, search_query);

        let collected = collect_qualified(&source, pagination, |repository| {
            let qualifies = has_min_pull_requests(repository, min_pull_requests);
            if !qualifies {
                debug!(
                    "[{}] skipped: {} finished PR(s) < {}.",
                    repository.name_with_owner,
                    repository.finished_pull_requests(),
                    min_pull_requests
                );
            }
            qualifies
        })
        .await;

        info!(
            "Found {}/{} candidate repositories in {} page(s) ({}).",
            collected.items.len(),
            pagination.target,
            collected.pages,
            collected.termination
        );

        collected.into_partial()
    }

    /// The `pull-requests` pipeline: discovers candidate repositories, then qualifies the pull requests of
    /// each until `complete_repositories` of them reached the per-repository target.
    ///
    /// Repositories falling short of the target contribute nothing; a failing repository is logged and
    /// skipped.
    pub async fn mine_pull_requests(&self, config: &PullRequestConfig) -> PullRequestMining {
        let start = Instant::now();
        let candidates = self
            .discover_repositories(&config.search_query, &config.repositories, config.min_pull_requests)
            .await;

        let per_repository = config.pull_requests.target;
        let mut mining = PullRequestMining::default();

        for (index, repository) in candidates.iter().enumerate() {
            if mining.selected.len() >= config.complete_repositories {
                break;
            }

            let name = &repository.name_with_owner;
            info!(
                "[{}/{}] Qualifying pull requests of [{}] ({}/{} repositories complete)...",
                index + 1,
                candidates.len(),
                name,
                mining.selected.len(),
                config.complete_repositories
            );

            match harvest_pull_requests(&self.executor, name, &config.pull_requests, &config.criteria).await {
                Ok(Harvest::Complete(pull_requests)) => {
                    mining.records.extend(
                        pull_requests
                            .iter()
                            .take(per_repository)
                            .map(|pull_request| PullRequestRecord::from_node(name, pull_request)),
                    );
                    mining.selected.push(SelectedRepository {
                        repository_name: name.clone(),
                    });
                }
                Ok(Harvest::Incomplete { found }) => {
                    info!(
                        "[{}] only has {}/{} qualifying PRs; discarding them.",
                        name, found, per_repository
                    );
                }
                Err(e) => {
                    error!("Could not qualify the pull requests of [{}]; skipping it.", name);
                    error!("{}", e);
                }
            }
        }

        if mining.selected.len() < config.complete_repositories {
            warn!(
                "Ran out of candidates with {}/{} complete repositories.",
                mining.selected.len(),
                config.complete_repositories
            );
        }

        info!(
            "Collected {} PRs from {} repositories in {:?}.",
            mining.records.len(),
            mining.selected.len(),
            start.elapsed()
        );

        mining
    }

    /// The `popular` pipeline: the most starred repositories plus their per-repository counters. Repositories
    /// whose details cannot be fetched are skipped.
    pub async fn popular_repositories(&self, config: &PopularConfig, now: DateTime<Utc>) -> Vec<RepositoryRecord> {
        let repositories = self.list_repositories(&config.search_query, &config.repositories).await;
        info!("Fetching the details of {} repositories...", repositories.len());

        let mut records = Vec::with_capacity(repositories.len());

        for (index, repository) in repositories.iter().enumerate() {
            if index > 0 {
                pause(config.details_pause).await;
            }

            debug!("[{}/{}] Details of [{}]...", index + 1, repositories.len(), repository.name_with_owner);

            match fetch_repository_details(&self.executor, &repository.name_with_owner).await {
                Ok(details) => records.push(RepositoryRecord::new(repository, &details, now)),
                Err(e) => {
                    warn!("Skipping [{}]: {}", repository.name_with_owner, e);
                }
            }
        }

        info!("Collected details for {}/{} repositories.", records.len(), repositories.len());

        records
    }

    /// Accept-all listing of the search results, without pull-request counters. A short listing is returned
    /// as is.
    pub async fn list_repositories(&self, search_query: &str, pagination: &Pagination) -> Vec<RepositoryNode> {
        let source = RepositorySearch::summaries(&self.executor, search_query);
        let collected = collect_qualified(&source, pagination, |_| true).await;

        info!(
            "Listed {}/{} repositories in {} page(s) ({}).",
            collected.items.len(),
            pagination.target,
            collected.pages,
            collected.termination
        );

        collected.into_partial()
    }

    /// Candidates of the `java` pipeline: REST search results that no deny-listed keyword matches.
    pub async fn java_candidates(&self, config: &JavaConfig) -> Vec<RestRepository> {
        let source = RestRepositorySearch::new(&self.executor, &config.search_query);
        let deny_list = DenyList::new(&config.excluded_keywords);

        let collected = collect_qualified(&source, &config.candidates, |repository| {
            match deny_list.matching_keyword(repository) {
                Some(keyword) => {
                    debug!("[{}] skipped: matches '{}'.", repository.full_name, keyword);
                    false
                }
                None => true,
            }
        })
        .await;

        info!(
            "Found {}/{} Java candidates in {} page(s) ({}).",
            collected.items.len(),
            config.candidates.target,
            collected.pages,
            collected.termination
        );

        collected.into_partial()
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
