//! GitHub's wrappers & miscellaneous utilities. Everything ranging from the retrying
//! [`RequestExecutor`](client::executor::RequestExecutor) to the paginated qualification loops and the
//! [`Analyzer`](utils::analyzer::Analyzer) that orchestrates them is found in this module.

pub mod client;

pub mod json;

pub mod queries;

pub mod utils;
