use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Body of `GET /rate_limit`; only the search bucket is of interest.
pub struct RateLimit {
    pub resources: RateLimitResources,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitResources {
    pub search: RateLimitWindow,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One quota bucket. `reset` is a UNIX timestamp in seconds.
pub struct RateLimitWindow {
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub remaining: u64,
    #[serde(default)]
    pub reset: i64,
}
