use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, trace};
use serde::Serialize;

use crate::nested;
use crate::repominer_error::MineError;

pub const POPULAR_REPOSITORIES_CSV: &str = "popular_repositories.csv";
pub const SELECTED_REPOSITORIES_CSV: &str = "selected_repositories.csv";
pub const PULL_REQUESTS_CSV: &str = "github_prs_dataset.csv";
pub const JAVA_REPOSITORIES_CSV: &str = "java_repositories_analysis.csv";
pub const CLASS_METRICS_CSV: &str = "all_java_projects_class_metrics.csv";

/// Writes `rows` into `<dir>/<file_name>` (header row first, `None` fields left blank) and returns the
/// written path. `dir` is created when missing; an existing file is overwritten.
pub fn write_csv<R: Serialize>(dir: &Path, file_name: &str, rows: &[R]) -> Result<PathBuf, MineError> {
    fs::create_dir_all(dir).map_err(|e| {
        trace!("Error = {:?}", e);
        MineError::IoError {
            msg: format!("Could not create output directory [{}]", dir.display()),
            nested: nested!(e),
        }
    })?;

    let path = dir.join(file_name);
    debug!("Writing {} row(s) into [{}]...", rows.len(), path.display());

    let csv_error = |e: csv::Error| {
        trace!("Error = {:?}", e);
        MineError::CsvError {
            msg: format!("Could not write [{}]", path.display()),
            nested: nested!(e),
        }
    };

    let mut writer = csv::WriterBuilder::new().has_headers(true).from_path(&path).map_err(csv_error)?;

    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }

    writer.flush().map_err(|e| MineError::IoError {
        msg: format!("Could not flush [{}]", path.display()),
        nested: nested!(e),
    })?;

    info!("Saved {} row(s) to [{}].", rows.len(), path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[derive(Serialize)]
    struct Row {
        repository: String,
        stars: u64,
        avg_cbo: Option<f64>,
        title: String,
    }

    #[test]
    fn rows_are_written_with_a_header_and_blank_unknowns() {
        let dir = tempdir().unwrap();
        let rows = vec![
            Row {
                repository: "octo/cat".to_string(),
                stars: 12,
                avg_cbo: Some(2.5),
                title: "Fix, with a comma".to_string(),
            },
            Row {
                repository: "octo/dog".to_string(),
                stars: 3,
                avg_cbo: None,
                title: "Plain".to_string(),
            },
        ];

        let path = write_csv(&dir.path().join("result"), "rows.csv", &rows).unwrap();

        assert_eq!(path, dir.path().join("result/rows.csv"));
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "repository,stars,avg_cbo,title\nocto/cat,12,2.5,\"Fix, with a comma\"\nocto/dog,3,,Plain\n"
        );
    }

    #[test]
    fn existing_files_are_overwritten() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("rows.csv"), "stale content\nmore\nlines\n").unwrap();

        let rows = vec![Row {
            repository: "octo/cat".to_string(),
            stars: 1,
            avg_cbo: None,
            title: "t".to_string(),
        }];
        write_csv(dir.path(), "rows.csv", &rows).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("rows.csv")).unwrap(), "repository,stars,avg_cbo,title\nocto/cat,1,,t\n");
    }
}
