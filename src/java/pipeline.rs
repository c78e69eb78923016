use log::{debug, error, info};

use crate::config::JavaConfig;
use crate::github::client::transport::Transport;
use crate::github::json::repository::RestRepository;
use crate::github::utils::analyzer::Analyzer;
use crate::java::filter_chain::{BugCounter, FilterChain, MetricsTool, SourceFetcher, Verdict};
use crate::java::report::JavaRepositoryReport;
use crate::java::staging::StagingArea;

/// Outcome of a `java` run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JavaMining {
    pub candidates: usize,
    pub evaluated: usize,
    pub rejected: usize,
    pub failed: usize,
    pub reports: Vec<JavaRepositoryReport>,
}

/// Searches candidates, then pushes them through the filter chain until enough are accepted.
pub async fn mine_java_repositories<T: Transport, F: SourceFetcher, M: MetricsTool>(
    analyzer: &Analyzer<T>, config: &JavaConfig, fetcher: &F, tool: &M,
) -> JavaMining {
    let candidates = analyzer.java_candidates(config).await;
    let staging = StagingArea::new(&config.staging_dir);
    debug!("Staging clones and CK outputs under [{}].", staging.root().display());

    let chain = FilterChain {
        bug_counter: analyzer.executor(),
        fetcher,
        tool,
        staging: &staging,
        criteria: &config.criteria,
    };

    qualify_candidates(&chain, &candidates, config.valid_repositories).await
}

/// Evaluates `candidates` in order and stops as soon as `valid_repositories` were accepted. Failed
/// evaluations are logged and skipped.
pub async fn qualify_candidates<B: BugCounter, F: SourceFetcher, M: MetricsTool>(
    chain: &FilterChain<'_, B, F, M>, candidates: &[RestRepository], valid_repositories: usize,
) -> JavaMining {
    let mut mining = JavaMining {
        candidates: candidates.len(),
        ..JavaMining::default()
    };

    for (index, candidate) in candidates.iter().enumerate() {
        if mining.reports.len() >= valid_repositories {
            break;
        }

        info!("[{}/{}] Evaluating [{}]...", index + 1, candidates.len(), candidate.full_name);
        mining.evaluated += 1;

        match chain.evaluate(candidate).await {
            Ok(Verdict::Accepted(report)) => {
                mining.reports.push(*report);
                info!("{}/{} valid repositories.", mining.reports.len(), valid_repositories);
            }
            Ok(Verdict::Rejected { .. }) => mining.rejected += 1,
            Err(e) => {
                error!("[{}] skipped: {}", candidate.full_name, e);
                mining.failed += 1;
            }
        }
    }

    info!(
        "Java mining done: {} accepted, {} rejected, {} failed out of {} evaluated ({} candidates).",
        mining.reports.len(),
        mining.rejected,
        mining.failed,
        mining.evaluated,
        mining.candidates
    );

    mining
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::config::JavaCriteria;
    use crate::java::ck::CkMetrics;
    use crate::java::filter_chain::{MockBugCounter, MockMetricsTool, MockSourceFetcher};
    use crate::repominer_error::MineError;

    use super::*;

    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    fn candidates(names: &[&str]) -> Vec<RestRepository> {
        names.iter().map(|name| RestRepository::new(name, None, 100)).collect()
    }

    fn one_file_fetcher() -> MockSourceFetcher {
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().returning(|_, target| {
            fs::create_dir_all(target).unwrap();
            fs::write(target.join("App.java"), "class App {\n}\n").unwrap();
            Ok(())
        });
        fetcher
    }

    fn ck_tool() -> MockMetricsTool {
        let mut tool = MockMetricsTool::new();
        tool.expect_analyse().returning(|_, _, output| {
            fs::create_dir_all(output).unwrap();
            Ok(CkMetrics::default())
        });
        tool
    }

    #[test]
    fn evaluation_stops_once_enough_repositories_are_accepted() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let criteria = JavaCriteria {
            min_bug_issues: 1,
            min_java_files: 1,
            min_lines_of_code: 1,
        };
        let mut counter = MockBugCounter::new();
        counter.expect_count_bugs().times(3).returning(|name| match name {
            "o/no-bugs" => Ok(0),
            _ => Ok(4),
        });
        let (fetcher, tool) = (one_file_fetcher(), ck_tool());

        let chain = FilterChain {
            bug_counter: &counter,
            fetcher: &fetcher,
            tool: &tool,
            staging: &staging,
            criteria: &criteria,
        };

        let mining = aw!(qualify_candidates(&chain, &candidates(&["o/a", "o/no-bugs", "o/b", "o/never"]), 2));

        assert_eq!(mining.candidates, 4);
        assert_eq!(mining.evaluated, 3);
        assert_eq!(mining.rejected, 1);
        assert_eq!(mining.failed, 0);
        assert_eq!(mining.reports.iter().map(|r| r.repository.as_str()).collect::<Vec<_>>(), vec!["o/a", "o/b"]);
    }

    #[test]
    fn failed_evaluations_are_skipped() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let criteria = JavaCriteria {
            min_bug_issues: 0,
            min_java_files: 1,
            min_lines_of_code: 1,
        };
        let mut counter = MockBugCounter::new();
        counter.expect_count_bugs().times(2).returning(|name| match name {
            "o/gone" => Err(MineError::RepositoryNotFound(name.to_string())),
            _ => Ok(0),
        });
        let (fetcher, tool) = (one_file_fetcher(), ck_tool());

        let chain = FilterChain {
            bug_counter: &counter,
            fetcher: &fetcher,
            tool: &tool,
            staging: &staging,
            criteria: &criteria,
        };

        let mining = aw!(qualify_candidates(&chain, &candidates(&["o/gone", "o/kept"]), 5));

        assert_eq!(mining.failed, 1);
        assert_eq!(mining.reports.len(), 1);
        assert_eq!(mining.reports[0].repository, "o/kept");
    }

    #[test]
    fn a_zero_target_evaluates_nothing() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let criteria = JavaCriteria {
            min_bug_issues: 1,
            min_java_files: 1,
            min_lines_of_code: 1,
        };
        let mut counter = MockBugCounter::new();
        counter.expect_count_bugs().never();
        let (fetcher, tool) = (MockSourceFetcher::new(), MockMetricsTool::new());

        let chain = FilterChain {
            bug_counter: &counter,
            fetcher: &fetcher,
            tool: &tool,
            staging: &staging,
            criteria: &criteria,
        };

        let mining = aw!(qualify_candidates(&chain, &candidates(&["o/a"]), 0));

        assert_eq!(mining.evaluated, 0);
        assert!(mining.reports.is_empty());
    }
}
