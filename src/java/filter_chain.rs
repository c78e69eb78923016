//! Cumulative, short-circuiting qualification of one Java repository.
//!
//! Stages run in a fixed order, cheapest first:
//!
//! 1. bug issues, read from the GitHub issue search (no clone needed);
//! 2. `.java` files in a shallow clone;
//! 3. lines of code across those files.
//!
//! The clone lives in a [`ScopedDir`](crate::java::staging::ScopedDir) and is gone once the verdict is
//! reached, whatever the verdict. Accepted repositories are then measured with CK; its output directory
//! survives only when the analysis succeeded.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
#[cfg(test)]
use mockall::automock;
use strum_macros::Display;

use crate::config::JavaCriteria;
use crate::github::client::executor::RequestExecutor;
use crate::github::client::transport::Transport;
use crate::github::json::repository::RestRepository;
use crate::github::utils::repository_data::count_bug_issues;
use crate::java::ck::CkMetrics;
use crate::java::report::JavaRepositoryReport;
use crate::java::source_scan::{count_java_files, count_lines_of_code};
use crate::java::staging::{StagingArea, StagingKind};
use crate::nested;
use crate::repominer_error::MineError;

/// Source of a repository's bug-issue count.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BugCounter: Send + Sync {
    async fn count_bugs(&self, full_name: &str) -> Result<u64, MineError>;
}

/// Materializes a repository's default branch into `target`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, repository: &RestRepository, target: &Path) -> Result<(), MineError>;
}

/// Static-analysis tool writing its raw output into `output`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetricsTool: Send + Sync {
    async fn analyse(&self, repository: &str, source: &Path, output: &Path) -> Result<CkMetrics, MineError>;
}

#[async_trait]
impl<T: Transport> BugCounter for RequestExecutor<T> {
    async fn count_bugs(&self, full_name: &str) -> Result<u64, MineError> {
        count_bug_issues(self, full_name).await
    }
}

#[derive(Display, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterStage {
    BugIssues,
    JavaFiles,
    LinesOfCode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(Box<JavaRepositoryReport>),
    Rejected { stage: FilterStage, reason: String },
}

pub struct FilterChain<'a, B: BugCounter, F: SourceFetcher, M: MetricsTool> {
    pub bug_counter: &'a B,
    pub fetcher: &'a F,
    pub tool: &'a M,
    pub staging: &'a StagingArea,
    pub criteria: &'a JavaCriteria,
}

impl<'a, B: BugCounter, F: SourceFetcher, M: MetricsTool> FilterChain<'a, B, F, M> {
    /// `Err` only for failures that prevented a verdict (bug count lookup, clone, filesystem); CK failures
    /// do not revoke an acceptance.
    pub async fn evaluate(&self, repository: &RestRepository) -> Result<Verdict, MineError> {
        let started = Instant::now();
        let name = repository.full_name.as_str();

        let bugs = self.bug_counter.count_bugs(name).await?;
        if bugs < self.criteria.min_bug_issues {
            return Ok(rejected(
                name,
                FilterStage::BugIssues,
                format!("{} bug issue(s), {} required", bugs, self.criteria.min_bug_issues),
            ));
        }

        let clone = self.staging.reserve(name, StagingKind::Clone)?;
        self.fetcher.fetch(repository, clone.path()).await?;

        let java_files = count_java_files(clone.path()).map_err(|e| MineError::IoError {
            msg: format!("Could not scan [{}]", clone.path().display()),
            nested: nested!(e),
        })?;
        if java_files < self.criteria.min_java_files {
            return Ok(rejected(
                name,
                FilterStage::JavaFiles,
                format!("{} .java file(s), {} required", java_files, self.criteria.min_java_files),
            ));
        }

        let lines_of_code = count_lines_of_code(clone.path()).map_err(|e| MineError::IoError {
            msg: format!("Could not count lines of [{}]", clone.path().display()),
            nested: nested!(e),
        })?;
        if lines_of_code < self.criteria.min_lines_of_code {
            return Ok(rejected(
                name,
                FilterStage::LinesOfCode,
                format!("{} line(s) of code, {} required", lines_of_code, self.criteria.min_lines_of_code),
            ));
        }

        info!(
            "[{}] accepted: {} bug issue(s), {} .java file(s), {} line(s) of code.",
            name, bugs, java_files, lines_of_code
        );

        let output = self.staging.reserve(name, StagingKind::CkOutput)?;
        let metrics = match self.tool.analyse(name, clone.path(), output.path()).await {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!("[{}] kept without CK metrics: {}", name, e);
                None
            }
        };
        drop(clone);

        let ck_output_dir = match metrics {
            Some(_) => Some(output.keep()),
            None => {
                drop(output);
                None
            }
        };

        Ok(Verdict::Accepted(Box::new(JavaRepositoryReport::new(
            repository,
            bugs,
            java_files,
            lines_of_code,
            metrics.as_ref(),
            ck_output_dir,
            started.elapsed(),
            Utc::now(),
        ))))
    }
}

fn rejected(name: &str, stage: FilterStage, reason: String) -> Verdict {
    debug!("[{}] rejected at {}: {}.", name, stage, reason);
    Verdict::Rejected { stage, reason }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::{tempdir, TempDir};

    use super::*;

    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    const CLASS_BODY: &str = "class Sample {\n    int value;\n    int get() {\n        return value;\n    }\n}\n";

    fn criteria(min_lines_of_code: usize) -> JavaCriteria {
        JavaCriteria {
            min_bug_issues: 1,
            min_java_files: 5,
            min_lines_of_code,
        }
    }

    fn repository() -> RestRepository {
        RestRepository::new("octo/spring-cat", Some("A Spring Boot service"), 42)
    }

    fn bugs(count: u64) -> MockBugCounter {
        let mut counter = MockBugCounter::new();
        counter.expect_count_bugs().times(1).returning(move |_| Ok(count));
        counter
    }

    /// A fetcher that writes `files` six-line classes into the clone target.
    fn java_sources(files: usize) -> MockSourceFetcher {
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().times(1).returning(move |_, target| {
            let sources = target.join("src/main/java");
            fs::create_dir_all(&sources).unwrap();
            for index in 0..files {
                fs::write(sources.join(format!("Sample{}.java", index)), CLASS_BODY).unwrap();
            }
            Ok(())
        });
        fetcher
    }

    fn staging() -> (TempDir, StagingArea) {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(&dir.path().join("staging"));
        (dir, staging)
    }

    #[test]
    fn repositories_without_enough_bugs_are_never_cloned() {
        let (_dir, staging) = staging();
        let counter = bugs(0);
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().never();
        let mut tool = MockMetricsTool::new();
        tool.expect_analyse().never();
        let criteria = criteria(10);

        let chain = FilterChain {
            bug_counter: &counter,
            fetcher: &fetcher,
            tool: &tool,
            staging: &staging,
            criteria: &criteria,
        };

        let verdict = aw!(chain.evaluate(&repository())).unwrap();

        assert!(matches!(verdict, Verdict::Rejected { stage: FilterStage::BugIssues, .. }));
        assert!(!staging.root().exists());
    }

    #[test]
    fn repositories_with_too_few_java_files_are_rejected_and_their_clone_removed() {
        let (_dir, staging) = staging();
        let counter = bugs(3);
        let fetcher = java_sources(2);
        let mut tool = MockMetricsTool::new();
        tool.expect_analyse().never();
        let criteria = criteria(10);

        let chain = FilterChain {
            bug_counter: &counter,
            fetcher: &fetcher,
            tool: &tool,
            staging: &staging,
            criteria: &criteria,
        };

        let verdict = aw!(chain.evaluate(&repository())).unwrap();

        assert!(matches!(verdict, Verdict::Rejected { stage: FilterStage::JavaFiles, .. }));
        assert!(!staging.entry_path("octo/spring-cat", StagingKind::Clone).exists());
    }

    #[test]
    fn repositories_with_too_few_lines_are_rejected_after_cloning_and_their_clone_removed() {
        let (_dir, staging) = staging();
        let counter = bugs(3);
        let fetcher = java_sources(6);
        let mut tool = MockMetricsTool::new();
        tool.expect_analyse().never();
        let criteria = criteria(2000);

        let chain = FilterChain {
            bug_counter: &counter,
            fetcher: &fetcher,
            tool: &tool,
            staging: &staging,
            criteria: &criteria,
        };

        let verdict = aw!(chain.evaluate(&repository())).unwrap();

        match verdict {
            Verdict::Rejected { stage, reason } => {
                assert_eq!(stage, FilterStage::LinesOfCode);
                assert!(reason.starts_with("36 line(s) of code"));
            }
            other => panic!("unexpected verdict {:?}", other),
        }
        assert!(staging.root().exists());
        assert!(!staging.entry_path("octo/spring-cat", StagingKind::Clone).exists());
    }

    #[test]
    fn accepted_repositories_keep_their_ck_output_only() {
        let (_dir, staging) = staging();
        let counter = bugs(8);
        let fetcher = java_sources(6);
        let mut tool = MockMetricsTool::new();
        tool.expect_analyse().times(1).returning(|_, source, output| {
            assert!(source.join("src/main/java/Sample0.java").exists());
            fs::create_dir_all(output).unwrap();
            fs::write(output.join("class.csv"), "file,class,type,cbo\n").unwrap();
            Ok(CkMetrics {
                classes: 4,
                methods: 6,
                ..CkMetrics::default()
            })
        });
        let criteria = criteria(30);

        let chain = FilterChain {
            bug_counter: &counter,
            fetcher: &fetcher,
            tool: &tool,
            staging: &staging,
            criteria: &criteria,
        };

        let verdict = aw!(chain.evaluate(&repository())).unwrap();

        let report = match verdict {
            Verdict::Accepted(report) => report,
            other => panic!("unexpected verdict {:?}", other),
        };
        let output = staging.entry_path("octo/spring-cat", StagingKind::CkOutput);
        assert_eq!(report.total_bugs, 8);
        assert_eq!(report.total_java_files, 6);
        assert_eq!(report.total_loc, 36);
        assert_eq!(report.classes, Some(4));
        assert_eq!(report.bugs_per_class, Some(2.0));
        assert_eq!(report.ck_output_dir, output.display().to_string());
        assert!(output.join("class.csv").exists());
        assert!(!staging.entry_path("octo/spring-cat", StagingKind::Clone).exists());
    }

    #[test]
    fn accepted_repositories_survive_a_failed_analysis_without_artifacts() {
        let (_dir, staging) = staging();
        let counter = bugs(8);
        let fetcher = java_sources(6);
        let mut tool = MockMetricsTool::new();
        tool.expect_analyse().times(1).returning(|repository, _, output| {
            fs::create_dir_all(output).unwrap();
            fs::write(output.join("class.csv"), "partial").unwrap();
            Err(MineError::StaticAnalysisError {
                repository: repository.to_string(),
                msg: "CK exited with Some(1)".to_string(),
            })
        });
        let criteria = criteria(30);

        let chain = FilterChain {
            bug_counter: &counter,
            fetcher: &fetcher,
            tool: &tool,
            staging: &staging,
            criteria: &criteria,
        };

        let verdict = aw!(chain.evaluate(&repository())).unwrap();

        let report = match verdict {
            Verdict::Accepted(report) => report,
            other => panic!("unexpected verdict {:?}", other),
        };
        assert_eq!(report.classes, None);
        assert_eq!(report.ck_output_dir, "");
        assert!(!staging.entry_path("octo/spring-cat", StagingKind::CkOutput).exists());
        assert!(!staging.entry_path("octo/spring-cat", StagingKind::Clone).exists());
    }

    #[test]
    fn clone_failures_are_errors_and_leave_nothing_behind() {
        let (_dir, staging) = staging();
        let counter = bugs(8);
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().times(1).returning(|repository, target| {
            fs::create_dir_all(target).unwrap();
            Err(MineError::CloneError {
                repository: repository.full_name.clone(),
                nested: anyhow::anyhow!("remote hung up"),
            })
        });
        let mut tool = MockMetricsTool::new();
        tool.expect_analyse().never();
        let criteria = criteria(30);

        let chain = FilterChain {
            bug_counter: &counter,
            fetcher: &fetcher,
            tool: &tool,
            staging: &staging,
            criteria: &criteria,
        };

        let result = aw!(chain.evaluate(&repository()));

        assert!(matches!(result, Err(MineError::CloneError { .. })));
        assert!(!staging.entry_path("octo/spring-cat", StagingKind::Clone).exists());
    }
}
