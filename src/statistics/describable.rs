use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::github::utils::pull_request_data::PullRequestRecord;
use crate::github::utils::repository_data::RepositoryRecord;
use crate::java::ck::ClassMetricsRow;
use crate::java::report::JavaRepositoryReport;
use crate::statistics::metric::{ClassMetric, JavaMetric, Metric, PullRequestMetric, RepositoryMetric};
use crate::statistics::summary::{describe_values, pearson, round_to, spearman, Summary};

const DECIMALS: i32 = 4;

/// Trait that reflects that a dataset is able to produce a [`Description`] of its metrics.
pub trait Describable {
    fn describe(&self, dataset: &str) -> Description;
}

/// Summary of one metric, plus its correlation against the dataset's anchor metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDescription {
    pub metric: String,
    #[serde(flatten)]
    pub summary: Option<Summary>,
    pub spearman_vs_anchor: Option<f64>,
    pub pearson_vs_anchor: Option<f64>,
}

/// The "end-product" of a mining run: how every metric of the dataset is distributed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    pub dataset: String,
    pub records: usize,
    pub anchor: String,
    pub metrics: Vec<MetricDescription>,
}

impl Description {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|e| format!("{{ \"error\": \"{}\" }}", e))
    }
}

impl Display for Description {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", &self.to_json())
    }
}

impl Describable for [PullRequestRecord] {
    fn describe(&self, dataset: &str) -> Description {
        describe_with::<PullRequestMetric, _>(self, dataset)
    }
}

impl Describable for [RepositoryRecord] {
    fn describe(&self, dataset: &str) -> Description {
        describe_with::<RepositoryMetric, _>(self, dataset)
    }
}

impl Describable for [JavaRepositoryReport] {
    fn describe(&self, dataset: &str) -> Description {
        describe_with::<JavaMetric, _>(self, dataset)
    }
}

impl Describable for [ClassMetricsRow] {
    fn describe(&self, dataset: &str) -> Description {
        describe_with::<ClassMetric, _>(self, dataset)
    }
}

/// Describes `records` along every `M` metric. Correlations only use rows where both the metric and the
/// anchor are known.
pub fn describe_with<M: Metric<Record = R>, R>(records: &[R], dataset: &str) -> Description {
    let anchor = M::anchor();

    let metrics = M::iter()
        .map(|metric| {
            let values: Vec<f64> = records
                .iter()
                .filter_map(|record| metric.measure(record))
                .filter(|value| value.is_finite())
                .collect();

            let (xs, ys): (Vec<f64>, Vec<f64>) = records
                .iter()
                .filter_map(|record| match (metric.measure(record), anchor.measure(record)) {
                    (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
                    _ => None,
                })
                .unzip();

            let (spearman_vs_anchor, pearson_vs_anchor) = if metric == anchor {
                (None, None)
            } else {
                (
                    spearman(&xs, &ys).map(|value| round_to(value, DECIMALS)),
                    pearson(&xs, &ys).map(|value| round_to(value, DECIMALS)),
                )
            };

            MetricDescription {
                metric: metric.to_string(),
                summary: describe_values(&values).map(rounded),
                spearman_vs_anchor,
                pearson_vs_anchor,
            }
        })
        .collect();

    Description {
        dataset: dataset.to_string(),
        records: records.len(),
        anchor: anchor.to_string(),
        metrics,
    }
}

fn rounded(summary: Summary) -> Summary {
    Summary {
        count: summary.count,
        mean: round_to(summary.mean, DECIMALS),
        median: round_to(summary.median, DECIMALS),
        min: round_to(summary.min, DECIMALS),
        max: round_to(summary.max, DECIMALS),
        std_dev: round_to(summary.std_dev, DECIMALS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stars: u64, releases: u64, age_days: Option<i64>) -> RepositoryRecord {
        RepositoryRecord {
            name_with_owner: format!("o/r{}", stars),
            stars,
            primary_language: "Rust".to_string(),
            age_days,
            days_since_last_push: Some(1),
            merged_pull_requests: 10,
            releases,
            closed_issues_ratio: 0.5,
        }
    }

    #[test]
    fn every_metric_is_described_and_correlated_against_the_anchor() {
        let records = vec![record(100, 1, Some(10)), record(200, 2, None), record(300, 3, Some(30))];

        let description = records.describe("popular_repositories");

        assert_eq!(description.records, 3);
        assert_eq!(description.anchor, "Stars");
        assert_eq!(description.metrics.len(), 6);

        let stars = &description.metrics[0];
        assert_eq!(stars.summary.as_ref().unwrap().mean, 200.0);
        assert_eq!(stars.spearman_vs_anchor, None);

        let age = description.metrics.iter().find(|m| m.metric == "AgeDays").unwrap();
        assert_eq!(age.summary.as_ref().unwrap().count, 2);

        let releases = description.metrics.iter().find(|m| m.metric == "Releases").unwrap();
        assert_eq!(releases.spearman_vs_anchor, Some(1.0));
        assert_eq!(releases.pearson_vs_anchor, Some(1.0));

        let ratio = description.metrics.iter().find(|m| m.metric == "ClosedIssuesRatio").unwrap();
        assert_eq!(ratio.pearson_vs_anchor, None);
    }

    #[test]
    fn classes_are_correlated_against_their_size() {
        let class = |loc: f64, wmc: f64, tcc: Option<f64>| ClassMetricsRow {
            repository: "octo/cat".to_string(),
            loc: Some(loc),
            wmc: Some(wmc),
            tcc,
            ..ClassMetricsRow::default()
        };
        let rows = vec![class(10.0, 1.0, Some(0.5)), class(20.0, 4.0, None), class(40.0, 9.0, Some(0.1))];

        let description = rows.describe("all_java_projects_class_metrics");

        assert_eq!(description.anchor, "Loc");
        assert_eq!(description.records, 3);

        let wmc = description.metrics.iter().find(|m| m.metric == "Wmc").unwrap();
        assert_eq!(wmc.spearman_vs_anchor, Some(1.0));

        let tcc = description.metrics.iter().find(|m| m.metric == "Tcc").unwrap();
        assert_eq!(tcc.summary.as_ref().unwrap().count, 2);

        let cbo = description.metrics.iter().find(|m| m.metric == "Cbo").unwrap();
        assert!(cbo.summary.is_none());
    }

    #[test]
    fn empty_datasets_still_describe_their_metrics() {
        let description = describe_with::<RepositoryMetric, RepositoryRecord>(&[], "empty");

        assert_eq!(description.records, 0);
        assert!(description.metrics.iter().all(|metric| metric.summary.is_none()));
        assert!(description.to_json().contains("\"dataset\": \"empty\""));
    }
}
