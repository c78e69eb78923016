//! Pipelines and the data they produce: the generic paginated qualification loop, its repository and
//! pull-request page sources, and the [`Analyzer`](analyzer::Analyzer) that strings them together.

pub mod analyzer;
pub mod pagination;
pub mod pull_request_data;
pub mod repository_data;
