//! The single network seam of the miner. A [`Transport`] performs exactly one HTTP exchange per call and
//! never retries; retrying (and deciding whether a response is any good) is the
//! [`RequestExecutor`](crate::github::client::executor::RequestExecutor)'s job.
//! <br/><br/>
//!
//! ### Usage example:
//!
//! ```rust
//! use std::time::Duration;
//! use crate::github::client::transport::{ApiRequest, GitHubTransport, Transport};
//!
//! let transport = GitHubTransport::new("MY_AWESOME_PERSONAL_ACCESS_TOKEN", Duration::from_secs(60))?;
//! let response = transport
//!     .send(&ApiRequest::rest("/search/issues", &[("q", "repo:octo/cat type:issue label:bug")]))
//!     .await?;
//! ```
//!
//! See more: [https://docs.github.com/en/graphql/guides/forming-calls-with-graphql](https://docs.github.com/en/graphql/guides/forming-calls-with-graphql)

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use lazy_static::lazy_static;
use log::trace;
#[cfg(test)]
use mockall::automock;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::{json, Value};

use crate::nested;
use crate::repominer_error::MineError;
use crate::repominer_metadata;

pub const GITHUB_API_BASE_URL: &str = "https://api.github.com";
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

lazy_static! {
    static ref OPERATION_NAME: Regex = Regex::new(r"query\s+(\w+)").unwrap();
}

/// A request to GitHub, in either of the two dialects the miner speaks.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// `POST /graphql` with a `{ query, variables }` body.
    GraphQL { query: &'static str, variables: Value },
    /// `GET <path>` with query-string parameters.
    Rest { path: String, params: Vec<(String, String)> },
}

impl ApiRequest {
    pub fn graphql(query: &'static str, variables: Value) -> Self {
        ApiRequest::GraphQL { query, variables }
    }

    pub fn rest(path: &str, params: &[(&str, &str)]) -> Self {
        ApiRequest::Rest {
            path: path.to_string(),
            params: params.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect(),
        }
    }

    pub fn is_graphql(&self) -> bool {
        matches!(self, ApiRequest::GraphQL { .. })
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiRequest::GraphQL { query, variables } => {
                let operation = OPERATION_NAME
                    .captures(query)
                    .and_then(|captures| captures.get(1))
                    .map_or("anonymous", |name| name.as_str());

                write!(f, "GraphQL {} {}", operation, variables)
            }
            ApiRequest::Rest { path, params } => {
                if params.is_empty() {
                    write!(f, "GET {}", path)
                } else {
                    let query = params.iter().map(|(key, value)| format!("{}={}", key, value)).join("&");
                    write!(f, "GET {}?{}", path, query)
                }
            }
        }
    }
}

/// Status + body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: &str) -> Self {
        RawResponse {
            status,
            body: body.to_string(),
        }
    }
}

/// One HTTP exchange. An `Err` means no response was received at all (connection refused, timeout, ...).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> anyhow::Result<RawResponse>;
}

/// [`Transport`] against the real GitHub API, authenticated with a personal access token.
pub struct GitHubTransport {
    client: Client,
    base_url: String,
}

impl GitHubTransport {
    /// Builds a transport whose every request carries the token, the crate's `User-Agent` and GitHub's
    /// JSON media type, and gives up after `request_timeout`.
    pub fn new(github_token: &str, request_timeout: Duration) -> Result<Self, MineError> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", github_token)).map_err(|e| {
            MineError::Other(anyhow::anyhow!("GitHub token is not a valid header value: {}", e))
        })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(repominer_metadata::user_agent())
            .timeout(request_timeout)
            .build()
            .map_err(|e| MineError::Other(nested!(e)))?;

        Ok(GitHubTransport {
            client,
            base_url: GITHUB_API_BASE_URL.to_string(),
        })
    }
}

#[async_trait]
impl Transport for GitHubTransport {
    async fn send(&self, request: &ApiRequest) -> anyhow::Result<RawResponse> {
        trace!("Sending [{}]...", request);

        let builder = match request {
            ApiRequest::GraphQL { query, variables } => self
                .client
                .post(format!("{}/graphql", self.base_url))
                .json(&json!({ "query": query, "variables": variables })),
            ApiRequest::Rest { path, params } => {
                self.client.get(format!("{}{}", self.base_url, path)).query(params)
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        trace!("[{}] answered with status {} ({} bytes)", request, status, body.len());

        Ok(RawResponse { status, body })
    }
}
