//! The `java-classes` dataset: every class CK finds in the most starred Java repositories, one row per
//! class. Nothing is filtered; repositories that cannot be fetched or analysed are skipped.

use log::{debug, info, warn};

use crate::config::ClassMetricsConfig;
use crate::github::client::transport::Transport;
use crate::github::json::repository::RestRepository;
use crate::github::utils::analyzer::Analyzer;
use crate::java::ck::{read_class_rows, ClassMetricsRow};
use crate::java::filter_chain::{MetricsTool, SourceFetcher};
use crate::java::staging::{StagingArea, StagingKind};
use crate::repominer_error::MineError;

/// Outcome of a `java-classes` run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClassMetricsMining {
    pub repositories: usize,
    pub analysed: usize,
    pub failed: usize,
    pub rows: Vec<ClassMetricsRow>,
}

pub async fn mine_class_metrics<T: Transport, F: SourceFetcher, M: MetricsTool>(
    analyzer: &Analyzer<T>, config: &ClassMetricsConfig, fetcher: &F, tool: &M,
) -> ClassMetricsMining {
    let repositories: Vec<RestRepository> = analyzer
        .list_repositories(&config.search_query, &config.repositories)
        .await
        .into_iter()
        .map(|node| RestRepository::new(&node.name_with_owner, None, node.stargazer_count))
        .collect();

    let staging = StagingArea::new(&config.staging_dir);
    debug!("Staging clones and CK outputs under [{}].", staging.root().display());

    collect_class_metrics(&repositories, &staging, fetcher, tool).await
}

/// Fetches and analyses every repository in order, concatenating their classes.
pub async fn collect_class_metrics<F: SourceFetcher, M: MetricsTool>(
    repositories: &[RestRepository], staging: &StagingArea, fetcher: &F, tool: &M,
) -> ClassMetricsMining {
    let mut mining = ClassMetricsMining {
        repositories: repositories.len(),
        ..ClassMetricsMining::default()
    };

    for (index, repository) in repositories.iter().enumerate() {
        info!("[{}/{}] Analysing [{}]...", index + 1, repositories.len(), repository.full_name);

        match analyse_classes(repository, staging, fetcher, tool).await {
            Ok(rows) if rows.is_empty() => {
                warn!("[{}] skipped: CK reported no class.", repository.full_name);
                mining.failed += 1;
            }
            Ok(rows) => {
                info!("[{}]: {} class(es).", repository.full_name, rows.len());
                mining.analysed += 1;
                mining.rows.extend(rows);
            }
            Err(e) => {
                warn!("[{}] skipped: {}", repository.full_name, e);
                mining.failed += 1;
            }
        }
    }

    info!(
        "Class metrics done: {} class(es) from {} repositories, {} failed out of {}.",
        mining.rows.len(),
        mining.analysed,
        mining.failed,
        mining.repositories
    );

    mining
}

/// Both the clone and CK's output are gone once the rows are read.
async fn analyse_classes<F: SourceFetcher, M: MetricsTool>(
    repository: &RestRepository, staging: &StagingArea, fetcher: &F, tool: &M,
) -> Result<Vec<ClassMetricsRow>, MineError> {
    let name = repository.full_name.as_str();

    let clone = staging.reserve(name, StagingKind::Clone)?;
    fetcher.fetch(repository, clone.path()).await?;

    let output = staging.reserve(name, StagingKind::CkOutput)?;
    tool.analyse(name, clone.path(), output.path()).await?;

    Ok(read_class_rows(output.path(), name))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::java::ck::{CkMetrics, CLASS_CSV};
    use crate::java::filter_chain::{MockMetricsTool, MockSourceFetcher};

    use super::*;

    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    const CLASS_OUTPUT: &str = "\
file,class,type,cbo,wmc,dit,noc,rfc,lcom,tcc,lcc,loc
A.java,demo.A,class,2,10,1,0,5,3,0.5,0.5,100
B.java,demo.B,class,4,6,2,1,7,0,NaN,NaN,50
";

    fn repositories(names: &[&str]) -> Vec<RestRepository> {
        names.iter().map(|name| RestRepository::new(name, None, 10)).collect()
    }

    fn one_file_fetcher() -> MockSourceFetcher {
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().returning(|repository, target| {
            if repository.full_name == "o/unreachable" {
                return Err(MineError::CloneError {
                    repository: repository.full_name.clone(),
                    nested: anyhow::anyhow!("exit status: 128"),
                });
            }
            fs::create_dir_all(target).unwrap();
            fs::write(target.join("A.java"), "class A {}").unwrap();
            Ok(())
        });
        fetcher
    }

    #[test]
    fn classes_of_every_analysed_repository_are_concatenated() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let fetcher = one_file_fetcher();
        let mut tool = MockMetricsTool::new();
        tool.expect_analyse().times(3).returning(|repository, _, output| {
            fs::create_dir_all(output).unwrap();
            match repository {
                "o/empty" => fs::write(output.join(CLASS_CSV), "file,class,type,loc\n").unwrap(),
                _ => fs::write(output.join(CLASS_CSV), CLASS_OUTPUT).unwrap(),
            }
            Ok(CkMetrics::default())
        });

        let mining = aw!(collect_class_metrics(
            &repositories(&["o/a", "o/unreachable", "o/empty", "o/b"]),
            &staging,
            &fetcher,
            &tool
        ));

        assert_eq!(mining.repositories, 4);
        assert_eq!(mining.analysed, 2);
        assert_eq!(mining.failed, 2);
        assert_eq!(
            mining.rows.iter().map(|row| (row.repository.as_str(), row.class.as_str())).collect::<Vec<_>>(),
            vec![("o/a", "demo.A"), ("o/a", "demo.B"), ("o/b", "demo.A"), ("o/b", "demo.B")]
        );
    }

    #[test]
    fn analysis_failures_skip_the_repository_and_leave_nothing_staged() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let fetcher = one_file_fetcher();
        let mut tool = MockMetricsTool::new();
        tool.expect_analyse().times(1).returning(|repository, _, _| {
            Err(MineError::StaticAnalysisError {
                repository: repository.to_string(),
                msg: "CK exited with Some(1)".to_string(),
            })
        });

        let mining = aw!(collect_class_metrics(&repositories(&["o/broken"]), &staging, &fetcher, &tool));

        assert_eq!(mining.failed, 1);
        assert!(mining.rows.is_empty());
        assert!(!staging.entry_path("o/broken", StagingKind::Clone).exists());
        assert!(!staging.entry_path("o/broken", StagingKind::CkOutput).exists());
    }
}
