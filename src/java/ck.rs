//! CK (<https://github.com/mauricioaniche/ck>) invocation and the aggregation of its `class.csv` and
//! `method.csv` outputs.

use std::ffi::OsStr;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use repominer_lib::repominer_trace_time;

use crate::java::filter_chain::MetricsTool;
use crate::java::process::run_bounded;
use crate::java::source_scan::java_files;
use crate::nested;
use crate::repominer_error::MineError;
use crate::statistics::summary::round_to;

pub const CLASS_CSV: &str = "class.csv";
pub const METHOD_CSV: &str = "method.csv";
/// Smaller outputs only hold a header line.
pub const MIN_OUTPUT_BYTES: u64 = 100;

const DECIMALS: i32 = 2;

/// Per-repository CK aggregates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CkMetrics {
    pub classes: usize,
    pub methods: usize,
    pub class_loc: u64,
    pub avg_cbo: f64,
    pub avg_wmc: f64,
    pub avg_rfc: f64,
    pub avg_lcom: f64,
    pub avg_tcc: f64,
    pub avg_dit: f64,
    pub avg_noc: f64,
    pub avg_method_wmc: f64,
    pub avg_method_loc: f64,
    pub avg_method_loops: f64,
    pub avg_method_comparisons: f64,
}

#[derive(Debug, Deserialize)]
struct ClassRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    cbo: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    wmc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    rfc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    lcom: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    tcc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    dit: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    noc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    loc: Option<f64>,
}

/// One `class.csv` line of a repository, as kept in the class-level dataset. Unknown cells stay blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetricsRow {
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub class: String,
    #[serde(rename = "type", default)]
    pub class_type: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub cbo: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub wmc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub dit: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub noc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub rfc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lcom: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub tcc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lcc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub loc: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MethodRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    wmc: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    loc: Option<f64>,
    #[serde(rename = "loopQty", default, deserialize_with = "csv::invalid_option")]
    loop_qty: Option<f64>,
    #[serde(rename = "comparisonsQty", default, deserialize_with = "csv::invalid_option")]
    comparisons_qty: Option<f64>,
}

/// Class count, summed `loc` and class-level averages of a CK `class.csv`, stored into `metrics`.
pub fn parse_class_metrics<R: Read>(reader: R, metrics: &mut CkMetrics) {
    let rows: Vec<ClassRow> = read_rows(reader);
    let count = rows.len();

    metrics.classes = count;
    metrics.class_loc = rows.iter().map(|row| finite(row.loc) as u64).sum();

    if count == 0 {
        return;
    }

    metrics.avg_cbo = average(rows.iter().map(|row| row.cbo), count);
    metrics.avg_wmc = average(rows.iter().map(|row| row.wmc), count);
    metrics.avg_rfc = average(rows.iter().map(|row| row.rfc), count);
    metrics.avg_lcom = average(rows.iter().map(|row| row.lcom), count);
    metrics.avg_tcc = average(rows.iter().map(|row| row.tcc), count).max(0.0);
    metrics.avg_dit = average(rows.iter().map(|row| row.dit), count);
    metrics.avg_noc = average(rows.iter().map(|row| row.noc), count);
}

/// Method-level aggregates of a CK `method.csv`, stored into `metrics`.
pub fn parse_method_metrics<R: Read>(reader: R, metrics: &mut CkMetrics) {
    let rows: Vec<MethodRow> = read_rows(reader);
    let count = rows.len();

    metrics.methods = count;

    if count == 0 {
        return;
    }

    metrics.avg_method_wmc = average(rows.iter().map(|row| row.wmc), count);
    metrics.avg_method_loc = average(rows.iter().map(|row| row.loc), count);
    metrics.avg_method_loops = average(rows.iter().map(|row| row.loop_qty), count);
    metrics.avg_method_comparisons = average(rows.iter().map(|row| row.comparisons_qty), count);
}

/// Every class of a CK `class.csv`, tagged with `repository`. `NaN` cells become blanks.
pub fn parse_class_rows<R: Read>(reader: R, repository: &str) -> Vec<ClassMetricsRow> {
    let rows: Vec<ClassMetricsRow> = read_rows(reader);

    rows.into_iter()
        .map(|row| ClassMetricsRow {
            repository: repository.to_string(),
            cbo: row.cbo.filter(|v| v.is_finite()),
            wmc: row.wmc.filter(|v| v.is_finite()),
            dit: row.dit.filter(|v| v.is_finite()),
            noc: row.noc.filter(|v| v.is_finite()),
            rfc: row.rfc.filter(|v| v.is_finite()),
            lcom: row.lcom.filter(|v| v.is_finite()),
            tcc: row.tcc.filter(|v| v.is_finite()),
            lcc: row.lcc.filter(|v| v.is_finite()),
            loc: row.loc.filter(|v| v.is_finite()),
            ..row
        })
        .collect()
}

/// The classes CK wrote into `output`; a missing `class.csv` yields none.
pub fn read_class_rows(output: &Path, repository: &str) -> Vec<ClassMetricsRow> {
    match fs::File::open(output.join(CLASS_CSV)) {
        Ok(file) => parse_class_rows(file, repository),
        Err(e) => {
            debug!("No {} in [{}]: {}", CLASS_CSV, output.display(), e);
            Vec::new()
        }
    }
}

/// Rows that cannot be decoded at all are skipped; unknown/blank/`NaN` cells count as 0.
fn read_rows<R: Read, D: for<'de> Deserialize<'de>>(mut reader: R) -> Vec<D> {
    let mut bytes = Vec::new();
    if let Err(e) = reader.read_to_end(&mut bytes) {
        warn!("Could not read CK output: {}", e);
        return Vec::new();
    }
    let content = String::from_utf8_lossy(&bytes);

    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(content.as_bytes());
    let rows = csv_reader
        .deserialize()
        .filter_map(|row| match row {
            Ok(row) => Some(row),
            Err(e) => {
                trace!("Skipping CK row: {}", e);
                None
            }
        })
        .collect();

    rows
}

fn finite(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn average<I: Iterator<Item = Option<f64>>>(values: I, count: usize) -> f64 {
    round_to(values.map(finite).sum::<f64>() / count as f64, DECIMALS)
}

/// The directory CK should analyse: a lone top-level directory (with no `.java` file next to it) is
/// descended into.
pub fn analysis_root(source: &Path) -> PathBuf {
    let entries: Vec<PathBuf> = match fs::read_dir(source) {
        Ok(entries) => entries.filter_map(|entry| entry.ok().map(|entry| entry.path())).collect(),
        Err(_) => return source.to_path_buf(),
    };

    let directories: Vec<&PathBuf> = entries.iter().filter(|path| path.is_dir()).collect();
    let has_top_level_java = entries
        .iter()
        .any(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "java"));

    match directories.as_slice() {
        [only] if !has_top_level_java => only.to_path_buf(),
        _ => source.to_path_buf(),
    }
}

/// Whether CK left at least one non-trivial CSV in `output`.
pub fn has_usable_output(output: &Path) -> bool {
    [CLASS_CSV, METHOD_CSV].iter().any(|name| {
        fs::metadata(output.join(name)).map_or(false, |metadata| metadata.len() > MIN_OUTPUT_BYTES)
    })
}

/// Runs `java -jar <jar>` with a bounded wall-clock time.
#[derive(Debug, Clone, PartialEq)]
pub struct CkRunner {
    pub java: String,
    pub jar: PathBuf,
    pub timeout: Duration,
}

impl CkRunner {
    pub fn new(jar: &Path) -> Self {
        CkRunner {
            java: "java".to_string(),
            jar: jar.to_path_buf(),
            timeout: Duration::from_secs(600),
        }
    }

    #[repominer_trace_time]
    fn read_metrics(output: &Path) -> CkMetrics {
        let mut metrics = CkMetrics::default();

        match fs::File::open(output.join(CLASS_CSV)) {
            Ok(file) => parse_class_metrics(file, &mut metrics),
            Err(e) => debug!("No {} in [{}]: {}", CLASS_CSV, output.display(), e),
        }

        match fs::File::open(output.join(METHOD_CSV)) {
            Ok(file) => parse_method_metrics(file, &mut metrics),
            Err(e) => debug!("No {} in [{}]: {}", METHOD_CSV, output.display(), e),
        }

        metrics
    }
}

#[async_trait]
impl MetricsTool for CkRunner {
    async fn analyse(&self, repository: &str, source: &Path, output: &Path) -> Result<CkMetrics, MineError> {
        fs::create_dir_all(output).map_err(|e| MineError::IoError {
            msg: format!("Could not create CK output directory [{}]", output.display()),
            nested: nested!(e),
        })?;

        let root = analysis_root(source);
        if java_files(&root).map_or(true, |files| files.is_empty()) {
            return Err(MineError::StaticAnalysisError {
                repository: repository.to_string(),
                msg: format!("no .java file under [{}]", root.display()),
            });
        }

        // CK concatenates the output prefix with the file names, hence the trailing separator.
        let output_prefix = format!("{}{}", output.display(), std::path::MAIN_SEPARATOR);
        let args = [
            OsStr::new("-jar"),
            self.jar.as_os_str(),
            root.as_os_str(),
            OsStr::new("true"),
            OsStr::new("0"),
            OsStr::new("false"),
            OsStr::new(&output_prefix),
        ];

        info!("Running CK on [{}]...", repository);
        let process = run_bounded(&self.java, args, &[], self.timeout).await.map_err(|e| {
            MineError::StaticAnalysisError {
                repository: repository.to_string(),
                msg: e.to_string(),
            }
        })?;

        if !process.success() {
            return Err(MineError::StaticAnalysisError {
                repository: repository.to_string(),
                msg: format!("CK exited with {:?}: {}", process.exit_code, process.last_error_line()),
            });
        }

        if !has_usable_output(output) {
            return Err(MineError::StaticAnalysisError {
                repository: repository.to_string(),
                msg: format!("CK produced no usable {} / {}", CLASS_CSV, METHOD_CSV),
            });
        }

        let metrics = Self::read_metrics(output);
        debug!("[{}]: {} classes, {} methods.", repository, metrics.classes, metrics.methods);

        Ok(metrics)
    }
}

/// Downloads the CK jar to `path` unless it is already there.
pub async fn ensure_jar(path: &Path, url: &str) -> Result<(), MineError> {
    if path.is_file() {
        trace!("CK jar found at [{}].", path.display());
        return Ok(());
    }

    info!("Downloading CK from {}...", url);

    let bytes = reqwest::get(url)
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| MineError::IoError {
            msg: format!("Could not download CK from {}", url),
            nested: nested!(e),
        })?
        .bytes()
        .await
        .map_err(|e| MineError::IoError {
            msg: format!("Could not read CK download from {}", url),
            nested: nested!(e),
        })?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| MineError::IoError {
            msg: format!("Could not create [{}]", parent.display()),
            nested: nested!(e),
        })?;
    }

    fs::write(path, &bytes).map_err(|e| MineError::IoError {
        msg: format!("Could not save CK jar to [{}]", path.display()),
        nested: nested!(e),
    })?;

    info!("CK saved to [{}] ({} bytes).", path.display(), bytes.len());

    Ok(())
}
