//! Descriptive statistics over the mined datasets: per-metric summaries and their correlation against each
//! dataset's anchor metric.

pub mod describable;
pub mod metric;
pub mod summary;
