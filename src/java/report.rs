use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::github::json::repository::RestRepository;
use crate::java::ck::CkMetrics;
use crate::statistics::summary::round_to;

/// A row of `java_repositories_analysis.csv`. CK columns are empty when the analysis failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JavaRepositoryReport {
    pub repository: String,
    pub stars: u64,
    pub url: String,
    pub total_java_files: usize,
    pub total_loc: usize,
    pub total_bugs: u64,
    pub classes: Option<usize>,
    pub methods: Option<usize>,
    pub class_loc: Option<u64>,
    pub avg_cbo: Option<f64>,
    pub avg_wmc: Option<f64>,
    pub avg_rfc: Option<f64>,
    pub avg_lcom: Option<f64>,
    pub avg_tcc: Option<f64>,
    pub avg_dit: Option<f64>,
    pub avg_noc: Option<f64>,
    pub avg_method_wmc: Option<f64>,
    pub avg_method_loc: Option<f64>,
    pub avg_method_loops: Option<f64>,
    pub avg_method_comparisons: Option<f64>,
    pub bugs_per_class: Option<f64>,
    pub ck_output_dir: String,
    pub analysis_time_seconds: f64,
    pub analysis_date: String,
}

impl JavaRepositoryReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: &RestRepository, total_bugs: u64, total_java_files: usize, total_loc: usize,
        ck: Option<&CkMetrics>, ck_output_dir: Option<PathBuf>, elapsed: Duration, now: DateTime<Utc>,
    ) -> Self {
        JavaRepositoryReport {
            repository: repository.full_name.clone(),
            stars: repository.stargazers_count,
            url: repository.html_url.clone(),
            total_java_files,
            total_loc,
            total_bugs,
            classes: ck.map(|ck| ck.classes),
            methods: ck.map(|ck| ck.methods),
            class_loc: ck.map(|ck| ck.class_loc),
            avg_cbo: ck.map(|ck| ck.avg_cbo),
            avg_wmc: ck.map(|ck| ck.avg_wmc),
            avg_rfc: ck.map(|ck| ck.avg_rfc),
            avg_lcom: ck.map(|ck| ck.avg_lcom),
            avg_tcc: ck.map(|ck| ck.avg_tcc),
            avg_dit: ck.map(|ck| ck.avg_dit),
            avg_noc: ck.map(|ck| ck.avg_noc),
            avg_method_wmc: ck.map(|ck| ck.avg_method_wmc),
            avg_method_loc: ck.map(|ck| ck.avg_method_loc),
            avg_method_loops: ck.map(|ck| ck.avg_method_loops),
            avg_method_comparisons: ck.map(|ck| ck.avg_method_comparisons),
            bugs_per_class: ck.map(|ck| bugs_per_class(total_bugs, ck.classes)),
            ck_output_dir: ck_output_dir.map(|dir| dir.display().to_string()).unwrap_or_default(),
            analysis_time_seconds: round_to(elapsed.as_secs_f64(), 2),
            analysis_date: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Defect density; a repository without classes counts as having one.
pub fn bugs_per_class(bugs: u64, classes: usize) -> f64 {
    round_to(bugs as f64 / classes.max(1) as f64, 3)
}
