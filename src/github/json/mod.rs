//! JSON wrappers for the GitHub GraphQL & REST payloads the miner consumes.

pub mod page;
pub mod pull_request;
pub mod rate_limit;
pub mod repository;
