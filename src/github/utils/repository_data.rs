//! Repository discovery: the page sources over GitHub's repository search (GraphQL and REST), the
//! predicates that qualify their candidates and the records the `popular` pipeline writes.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, trace, warn};
use serde::Serialize;
use serde_json::json;

use crate::github::client::executor::RequestExecutor;
use crate::github::client::transport::{ApiRequest, Transport};
use crate::github::json::page::SearchPage;
use crate::github::json::rate_limit::{RateLimit, RateLimitWindow};
use crate::github::json::repository::{
    RepositoryDetails, RepositoryDetailsData, RepositoryNode, RepositorySearchData, RestRepository,
};
use crate::github::queries::{REPOSITORY_DETAILS_QUERY, SEARCH_REPOSITORIES_QUERY, SEARCH_REPOSITORY_SUMMARIES_QUERY};
use crate::github::utils::pagination::{Page, PageSource};
use crate::repominer_error::MineError;
use crate::statistics::summary::round_to;

/// GitHub's search endpoints never return more than this many results, whatever the `total_count`.
pub const SEARCH_RESULT_CAP: u64 = 1000;

/// REST search paging stops once fewer search requests than this are left.
pub const MIN_SEARCH_QUOTA: u64 = 5;

const NO_LANGUAGE: &str = "N/A";

/// GraphQL repository search for a free-form search string (qualifiers and sort included).
pub struct RepositorySearch<'a, T: Transport> {
    executor: &'a RequestExecutor<T>,
    document: &'static str,
    search_query: String,
}

impl<'a, T: Transport> RepositorySearch<'a, T> {
    /// Nodes carry their merged and closed pull-request counts.
    pub fn with_pull_request_counts(executor: &'a RequestExecutor<T>, search_query: &str) -> Self {
        RepositorySearch {
            executor,
            document: SEARCH_REPOSITORIES_QUERY,
            search_query: search_query.to_string(),
        }
    }

    /// Nodes only carry name, stars, dates and language.
    pub fn summaries(executor: &'a RequestExecutor<T>, search_query: &str) -> Self {
        RepositorySearch {
            executor,
            document: SEARCH_REPOSITORY_SUMMARIES_QUERY,
            search_query: search_query.to_string(),
        }
    }
}

#[async_trait]
impl<'a, T: Transport> PageSource for RepositorySearch<'a, T> {
    type Item = RepositoryNode;

    fn describe(&self) -> String {
        format!("repository search '{}'", self.search_query)
    }

    async fn fetch_page(&self, cursor: Option<&str>, per_page: u32) -> Result<Page<RepositoryNode>, MineError> {
        let request = ApiRequest::graphql(
            self.document,
            json!({ "searchQuery": self.search_query, "cursor": cursor, "perPage": per_page }),
        );

        let data: RepositorySearchData = self.executor.execute_as(&request).await?;

        Ok(Page::from(data.search))
    }
}

/// REST repository search (`/search/repositories`), sorted by stars. The cursor is the next page number.
pub struct RestRepositorySearch<'a, T: Transport> {
    executor: &'a RequestExecutor<T>,
    search_query: String,
}

impl<'a, T: Transport> RestRepositorySearch<'a, T> {
    pub fn new(executor: &'a RequestExecutor<T>, search_query: &str) -> Self {
        RestRepositorySearch {
            executor,
            search_query: search_query.to_string(),
        }
    }
}

#[async_trait]
impl<'a, T: Transport> PageSource for RestRepositorySearch<'a, T> {
    type Item = RestRepository;

    fn describe(&self) -> String {
        format!("REST repository search '{}'", self.search_query)
    }

    async fn fetch_page(&self, cursor: Option<&str>, per_page: u32) -> Result<Page<RestRepository>, MineError> {
        let page_number: u64 = cursor.and_then(|cursor| cursor.parse().ok()).unwrap_or(1);
        let page_param = page_number.to_string();
        let per_page_param = per_page.to_string();

        let request = ApiRequest::rest(
            "/search/repositories",
            &[
                ("q", self.search_query.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page_param.as_str()),
                ("page", page_param.as_str()),
            ],
        );

        let search: SearchPage<RestRepository> = self.executor.execute_as(&request).await?;
        let reachable = search.total_count.min(SEARCH_RESULT_CAP);
        let mut has_next_page =
            search.items.len() as u64 >= u64::from(per_page) && page_number * u64::from(per_page) < reachable;

        trace!(
            "REST search page {} returned {} item(s) out of {} reachable.",
            page_number,
            search.items.len(),
            reachable
        );

        if has_next_page {
            has_next_page = has_search_quota(self.executor).await;
        }

        Ok(Page {
            items: search.items,
            end_cursor: Some((page_number + 1).to_string()),
            has_next_page,
        })
    }
}

/// Search bucket of the token's rate limit. Querying it does not consume the bucket.
pub async fn search_quota<T: Transport>(executor: &RequestExecutor<T>) -> Result<RateLimitWindow, MineError> {
    let rate_limit: RateLimit = executor.execute_as(&ApiRequest::rest("/rate_limit", &[])).await?;

    Ok(rate_limit.resources.search)
}

/// Whether another search page may be requested. An unreadable quota does not stop the listing.
async fn has_search_quota<T: Transport>(executor: &RequestExecutor<T>) -> bool {
    match search_quota(executor).await {
        Ok(quota) if quota.remaining < MIN_SEARCH_QUOTA => {
            let reset = Utc
                .timestamp_opt(quota.reset, 0)
                .single()
                .map_or_else(|| quota.reset.to_string(), |reset| reset.format("%H:%M:%S UTC").to_string());
            warn!(
                "Only {}/{} search request(s) left until {}; ending the listing here.",
                quota.remaining, quota.limit, reset
            );
            false
        }
        Ok(quota) => {
            debug!("Search quota: {}/{} request(s) left.", quota.remaining, quota.limit);
            true
        }
        Err(e) => {
            warn!("Could not read the search quota; paging on. Error = {}", e);
            true
        }
    }
}

/// Outer predicate of the `pull-requests` pipeline.
pub fn has_min_pull_requests(repository: &RepositoryNode, min_pull_requests: u64) -> bool {
    repository.finished_pull_requests() >= min_pull_requests
}

/// Keyword deny-list over a repository's name, full name and description (case-insensitive).
#[derive(Debug, Clone, PartialEq)]
pub struct DenyList {
    keywords: Vec<String>,
}

impl DenyList {
    pub fn new(keywords: &[String]) -> Self {
        DenyList {
            keywords: keywords.iter().map(|keyword| keyword.to_lowercase()).collect(),
        }
    }

    /// The first keyword found in the repository, if any.
    pub fn matching_keyword(&self, repository: &RestRepository) -> Option<&str> {
        let haystacks = [
            repository.name.to_lowercase(),
            repository.full_name.to_lowercase(),
            repository.description.as_deref().unwrap_or_default().to_lowercase(),
        ];

        self.keywords
            .iter()
            .find(|keyword| haystacks.iter().any(|haystack| haystack.contains(keyword.as_str())))
            .map(String::as_str)
    }
}

/// Splits `owner/name`.
pub fn split_name_with_owner(name_with_owner: &str) -> Result<(&str, &str), MineError> {
    match name_with_owner.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(MineError::InvalidRepositoryName(name_with_owner.to_string())),
    }
}

/// Merged PRs, releases and issue counters of one repository.
pub async fn fetch_repository_details<T: Transport>(
    executor: &RequestExecutor<T>, name_with_owner: &str,
) -> Result<RepositoryDetails, MineError> {
    let (owner, name) = split_name_with_owner(name_with_owner)?;
    let request =
        ApiRequest::graphql(REPOSITORY_DETAILS_QUERY, json!({ "owner": owner, "name": name }));

    let data: RepositoryDetailsData = executor.execute_as(&request).await?;

    data.repository.ok_or_else(|| MineError::RepositoryNotFound(name_with_owner.to_string()))
}

/// Amount of issues labelled `bug` in a repository, read from the search's `total_count`.
pub async fn count_bug_issues<T: Transport>(
    executor: &RequestExecutor<T>, full_name: &str,
) -> Result<u64, MineError> {
    let query = format!("repo:{} type:issue label:bug", full_name);
    let request = ApiRequest::rest("/search/issues", &[("q", query.as_str()), ("per_page", "1")]);

    let search: SearchPage<serde_json::Value> = executor.execute_as(&request).await?;

    Ok(search.total_count)
}

/// A row of `popular_repositories.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryRecord {
    pub name_with_owner: String,
    pub stars: u64,
    pub primary_language: String,
    pub age_days: Option<i64>,
    pub days_since_last_push: Option<i64>,
    pub merged_pull_requests: u64,
    pub releases: u64,
    pub closed_issues_ratio: f64,
}

impl RepositoryRecord {
    pub fn new(node: &RepositoryNode, details: &RepositoryDetails, now: DateTime<Utc>) -> Self {
        let total_issues = details.total_issues.total_count;
        let closed_issues_ratio = if total_issues == 0 {
            0.0
        } else {
            round_to(details.closed_issues.total_count as f64 / total_issues as f64, 4)
        };

        RepositoryRecord {
            name_with_owner: node.name_with_owner.clone(),
            stars: node.stargazer_count,
            primary_language: node
                .primary_language
                .as_ref()
                .map_or_else(|| NO_LANGUAGE.to_string(), |language| language.name.clone()),
            age_days: node.created_at.map(|created_at| (now - created_at).num_days()),
            days_since_last_push: node.pushed_at.map(|pushed_at| (now - pushed_at).num_days()),
            merged_pull_requests: details.pull_requests.total_count,
            releases: details.releases.total_count,
            closed_issues_ratio,
        }
    }
}

/// A row of `selected_repositories.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedRepository {
    pub repository_name: String,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use serde_json::json;

    use crate::config::RetryPolicy;
    use crate::github::client::transport::{MockTransport, RawResponse};
    use crate::github::json::page::TotalCount;
    use crate::github::json::repository::Language;

    use super::*;

    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    fn executor(transport: MockTransport) -> RequestExecutor<MockTransport> {
        RequestExecutor::new(
            transport,
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::ZERO,
            },
        )
    }

    fn node(name_with_owner: &str, merged: u64, closed: u64) -> RepositoryNode {
        serde_json::from_value(json!({
            "nameWithOwner": name_with_owner,
            "stargazerCount": 100,
            "mergedPRs": { "totalCount": merged },
            "closedPRs": { "totalCount": closed }
        }))
        .unwrap()
    }

    #[test]
    fn pull_request_threshold_counts_merged_and_closed() {
        assert!(has_min_pull_requests(&node("a/b", 30, 20), 50));
        assert!(!has_min_pull_requests(&node("a/b", 30, 19), 50));
    }

    #[test]
    fn deny_list_checks_name_full_name_and_description() {
        let deny_list = DenyList::new(&["tutorial".to_string(), "Awesome".to_string()]);

        assert_eq!(deny_list.matching_keyword(&RestRepository::new("spring-projects/spring-boot", Some("Spring Boot"), 1)), None);
        assert!(deny_list.matching_keyword(&RestRepository::new("acme/spring-tutorial", None, 1)).is_some());
        assert!(deny_list.matching_keyword(&RestRepository::new("acme/lists", Some("An AWESOME list"), 1)).is_some());
        assert_eq!(
            deny_list.matching_keyword(&RestRepository::new("tutorial-org/app", None, 1)),
            Some("tutorial")
        );
    }

    #[test]
    fn names_must_be_owner_slash_name() {
        assert_eq!(split_name_with_owner("octo/cat").unwrap(), ("octo", "cat"));
        assert!(matches!(split_name_with_owner("octocat"), Err(MineError::InvalidRepositoryName(_))));
        assert!(split_name_with_owner("/cat").is_err());
        assert!(split_name_with_owner("a/b/c").is_err());
    }

    #[test]
    fn repository_record_derives_ages_and_issue_ratio() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let mut repository = node("octo/cat", 0, 0);
        repository.created_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        repository.pushed_at = Some(Utc.with_ymd_and_hms(2024, 1, 30, 12, 0, 0).unwrap());
        repository.primary_language = Some(Language {
            name: "Rust".to_string(),
        });
        let details = RepositoryDetails {
            pull_requests: TotalCount { total_count: 40 },
            releases: TotalCount { total_count: 3 },
            closed_issues: TotalCount { total_count: 2 },
            total_issues: TotalCount { total_count: 3 },
        };

        let record = RepositoryRecord::new(&repository, &details, now);

        assert_eq!(record.age_days, Some(30));
        assert_eq!(record.days_since_last_push, Some(0));
        assert_eq!(record.primary_language, "Rust");
        assert_eq!(record.merged_pull_requests, 40);
        assert_eq!(record.closed_issues_ratio, 0.6667);
    }

    #[test]
    fn repository_without_issues_or_language_has_neutral_values() {
        let record = RepositoryRecord::new(&node("octo/cat", 0, 0), &RepositoryDetails::default(), Utc::now());

        assert_eq!(record.closed_issues_ratio, 0.0);
        assert_eq!(record.primary_language, "N/A");
        assert_eq!(record.age_days, None);
    }

    #[test]
    fn rest_search_pages_stop_at_a_short_page() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|request| {
            assert_eq!(
                format!("{}", request),
                "GET /search/repositories?q=language:java&sort=stars&order=desc&per_page=2&page=3"
            );
            Ok(RawResponse::new(
                200,
                r#"{"total_count":5,"items":[{"name":"e","full_name":"o/e","stargazers_count":1,"html_url":"https://github.com/o/e","clone_url":"https://github.com/o/e.git"}]}"#,
            ))
        });
        let executor = executor(transport);

        let page = aw!(RestRepositorySearch::new(&executor, "language:java").fetch_page(Some("3"), 2)).unwrap();

        assert_eq!(page.items.len(), 1);
        assert!(!page.has_next_page);
    }

    #[test]
    fn rest_search_pages_stop_at_the_search_cap() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| {
            let items: Vec<_> = (0..100)
                .map(|i| {
                    json!({
                        "name": format!("r{}", i),
                        "full_name": format!("o/r{}", i),
                        "html_url": "https://github.com/o/r",
                        "clone_url": "https://github.com/o/r.git"
                    })
                })
                .collect();
            Ok(RawResponse::new(200, &json!({ "total_count": 50000, "items": items }).to_string()))
        });
        let executor = executor(transport);

        let page = aw!(RestRepositorySearch::new(&executor, "stars:>1").fetch_page(Some("10"), 100)).unwrap();

        assert_eq!(page.items.len(), 100);
        assert!(!page.has_next_page);
        assert_eq!(page.end_cursor.as_deref(), Some("11"));
    }

    fn full_search_page(total_count: u64) -> String {
        let items: Vec<_> = (0..2)
            .map(|i| {
                json!({
                    "name": format!("r{}", i),
                    "full_name": format!("o/r{}", i),
                    "html_url": "https://github.com/o/r",
                    "clone_url": "https://github.com/o/r.git"
                })
            })
            .collect();

        json!({ "total_count": total_count, "items": items }).to_string()
    }

    fn rate_limit(remaining: u64) -> String {
        json!({ "resources": { "search": { "limit": 30, "remaining": remaining, "reset": 1700000060 } } })
            .to_string()
    }

    #[test]
    fn rest_search_ends_the_listing_when_the_search_quota_runs_low() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(2).returning(|request| match format!("{}", request).as_str() {
            "GET /rate_limit" => Ok(RawResponse::new(200, &rate_limit(MIN_SEARCH_QUOTA - 1))),
            _ => Ok(RawResponse::new(200, &full_search_page(500))),
        });
        let executor = executor(transport);

        let page = aw!(RestRepositorySearch::new(&executor, "language:java").fetch_page(None, 2)).unwrap();

        assert_eq!(page.items.len(), 2);
        assert!(!page.has_next_page);
    }

    #[test]
    fn rest_search_pages_on_with_enough_quota_or_an_unreadable_one() {
        for quota_response in [
            RawResponse::new(200, &rate_limit(MIN_SEARCH_QUOTA)),
            RawResponse::new(403, r#"{"message":"Forbidden"}"#),
        ] {
            let mut transport = MockTransport::new();
            transport.expect_send().times(2).returning(move |request| match format!("{}", request).as_str() {
                "GET /rate_limit" => Ok(quota_response.clone()),
                _ => Ok(RawResponse::new(200, &full_search_page(500))),
            });
            let executor = executor(transport);

            let page = aw!(RestRepositorySearch::new(&executor, "language:java").fetch_page(Some("2"), 2)).unwrap();

            assert!(page.has_next_page);
            assert_eq!(page.end_cursor.as_deref(), Some("3"));
        }
    }

    #[test]
    fn search_quota_reads_the_search_bucket() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| Ok(RawResponse::new(200, &rate_limit(17))));
        let executor = executor(transport);

        let quota = aw!(search_quota(&executor)).unwrap();

        assert_eq!(quota.remaining, 17);
        assert_eq!(quota.limit, 30);
    }

    #[test]
    fn missing_repository_details_are_reported_as_not_found() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(RawResponse::new(200, r#"{"data":{"repository":null}}"#)));
        let executor = executor(transport);

        let result = aw!(fetch_repository_details(&executor, "ghost/gone"));

        assert!(matches!(result, Err(MineError::RepositoryNotFound(name)) if name == "ghost/gone"));
    }

    #[test]
    fn bug_issues_are_read_from_the_search_total() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| format!("{}", request).contains("label:bug"))
            .times(1)
            .returning(|_| Ok(RawResponse::new(200, r#"{"total_count":17,"items":[{}]}"#)));
        let executor = executor(transport);

        assert_eq!(aw!(count_bug_issues(&executor, "octo/cat")).unwrap(), 17);
    }
}
