use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::Serialize;

use crate::github::json::page::{Connection, TotalCount};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A repository node from the GraphQL repository search.
pub struct RepositoryNode {
    pub name_with_owner: String,
    #[serde(default)]
    pub stargazer_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_language: Option<Language>,
    #[serde(rename = "mergedPRs")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_prs: Option<TotalCount>,
    #[serde(rename = "closedPRs")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_prs: Option<TotalCount>,
}

impl RepositoryNode {
    /// Merged + closed (but not merged) pull requests.
    pub fn finished_pull_requests(&self) -> u64 {
        self.merged_prs.unwrap_or_default().total_count
            + self.closed_prs.unwrap_or_default().total_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// `data` member of the repository search query.
pub struct RepositorySearchData {
    pub search: Connection<RepositoryNode>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Per-repository counters fetched one repository at a time (too heavy for the search query).
pub struct RepositoryDetails {
    #[serde(default)]
    pub pull_requests: TotalCount,
    #[serde(default)]
    pub releases: TotalCount,
    #[serde(default)]
    pub closed_issues: TotalCount,
    #[serde(default)]
    pub total_issues: TotalCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// `data` member of the repository details query; `repository` is `null` for unknown repositories.
pub struct RepositoryDetailsData {
    pub repository: Option<RepositoryDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
/// Custom wrapper for a GitHub's REST repository (as returned by `/search/repositories`).
pub struct RestRepository {
    pub name: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    pub html_url: String,
    pub clone_url: String,
}

impl RestRepository {
    pub fn new(full_name: &str, description: Option<&str>, stargazers_count: u64) -> Self {
        let name = full_name.rsplit('/').next().unwrap_or(full_name);

        RestRepository {
            name: name.to_string(),
            full_name: full_name.to_string(),
            description: description.map(str::to_string),
            stargazers_count,
            html_url: format!("https://github.com/{}", full_name),
            clone_url: format!("https://github.com/{}.git", full_name),
        }
    }
}
