use std::process;

use chrono::Utc;
use clap::{Arg, ArgMatches, Command};
use console::{Emoji, Term};
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use crate::config::*;
use crate::github::client::executor::RequestExecutor;
use crate::github::client::transport::GitHubTransport;
use crate::github::utils::analyzer::Analyzer;
use crate::java::archive::ArchiveDownloader;
use crate::java::ck::{ensure_jar, CkRunner};
use crate::java::class_metrics::mine_class_metrics;
use crate::java::clone::{FallbackFetcher, GitCloner};
use crate::java::pipeline::mine_java_repositories;
use crate::report::dataset::{
    write_csv, CLASS_METRICS_CSV, JAVA_REPOSITORIES_CSV, POPULAR_REPOSITORIES_CSV, PULL_REQUESTS_CSV,
    SELECTED_REPOSITORIES_CSV,
};
use crate::repominer_error::MineError;
use crate::statistics::describable::{Describable, Description};
use crate::statistics::metric::{ClassMetric, JavaMetric, Metric, PullRequestMetric, RepositoryMetric};

#[path = "error.rs"]
mod repominer_error;

#[path = "metadata.rs"]
mod repominer_metadata;

mod config;

mod github;

mod java;

mod report;

mod statistics;

// Subcommands ---
const POPULAR_COMMAND: &str = "popular";
const PULL_REQUESTS_COMMAND: &str = "pull-requests";
const JAVA_COMMAND: &str = "java";
const JAVA_CLASSES_COMMAND: &str = "java-classes";

// CLI flags ---
const PRINT_LEGENDS_FLAG: &str = "print-legends";
const SILENT_MODE_FLAG: &str = "silent-mode";

// GitHub's search endpoints serve at most 100 items per page
const MAX_PER_PAGE: u32 = 100;

type Miner = Analyzer<GitHubTransport>;

/// `git` first; GitHub's source archives when it gives up.
type Fetcher = FallbackFetcher<GitCloner, ArchiveDownloader>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // an optional .env file may hold GITHUB_TOKEN; a missing file is fine ---
    dotenvy::dotenv().ok();

    // initialize CLI access ---
    let args = setup_cli();

    // determine if console is user attended or not (ie: output is being piped into a file) ---
    let console_is_user_attended = console::user_attended();

    // parse obligatory params ---
    let github_token = args
        .value_of(GITHUB_TOKEN_PARAM)
        .filter(|token| !token.trim().is_empty())
        .unwrap_or_else(|| {
            eprintln!(
                "{} (or the {} environment variable) is an obligatory param! Aborting operation.",
                GITHUB_TOKEN_PARAM, GITHUB_TOKEN_ENV
            );
            process::exit(1)
        });

    // parse optional params & flags ---
    let silent_mode: bool = !console_is_user_attended || args.is_present(SILENT_MODE_FLAG);

    let print_metric_legends: bool = !silent_mode && args.is_present(PRINT_LEGENDS_FLAG);

    // initialize logging facade ---
    let log_level = if !silent_mode {
        args.value_of_t_or_exit(LOG_LEVEL_PARAM)
    } else {
        // piping results into a file should not carry the logs' noise
        LevelFilter::Off
    };

    init_logging(log_level);

    let client = ClientConfig::from_matches(github_token, &args);

    let (command, command_args) = args.subcommand().unwrap_or_else(|| {
        eprintln!(
            "A subcommand ({}, {}, {} or {}) is required.",
            POPULAR_COMMAND, PULL_REQUESTS_COMMAND, JAVA_COMMAND, JAVA_CLASSES_COMMAND
        );
        process::exit(1)
    });

    // initialize app ---
    if !silent_mode {
        let stdout = Term::stdout();

        let pick_emoji = Emoji("⛏️", "*");
        let folder_emoji = Emoji("📁", "*");
        let hourglass_emoji = Emoji("⏳", "*");

        stdout.write_line(get_logo())?;
        stdout.write_line(&format!("{} Mining [{}].", pick_emoji, command))?;
        stdout.write_line(&format!("{} Datasets will be saved into [{}].", folder_emoji, client.output_dir.display()))?;
        stdout.write_line(&format!(
            "{} Requests are attempted up to [{}] time(s), pausing [{}ms] between pages.",
            hourglass_emoji,
            client.retry.max_attempts,
            client.page_pause.as_millis()
        ))?;
        stdout.write_line(&"=".repeat(stdout.size().1 as usize))?; // print separator for whole length of stdout
    }

    // initialize the miner ---
    let transport = GitHubTransport::new(&client.github_token, client.request_timeout).unwrap_or_else(|e| {
        error!("Could not initialize GitHub's transport. Aborting operation.");
        error!("{}", e);
        process::exit(1)
    });
    let miner: Miner = Analyzer::new(RequestExecutor::new(transport, client.retry));

    // execute the selected pipeline ---
    let result_out = Term::stdout(); // result always ignores 'silent' flag

    let outcome = match command {
        POPULAR_COMMAND => {
            print_metrics_legends::<RepositoryMetric>(print_metric_legends, &result_out);
            run_popular(&miner, &client, command_args).await
        }
        PULL_REQUESTS_COMMAND => {
            print_metrics_legends::<PullRequestMetric>(print_metric_legends, &result_out);
            run_pull_requests(&miner, &client, command_args).await
        }
        JAVA_COMMAND => {
            print_metrics_legends::<JavaMetric>(print_metric_legends, &result_out);
            run_java(&miner, &client, command_args).await
        }
        JAVA_CLASSES_COMMAND => {
            print_metrics_legends::<ClassMetric>(print_metric_legends, &result_out);
            run_java_classes(&miner, &client, command_args).await
        }
        unknown => {
            eprintln!("Unknown subcommand [{}].", unknown);
            process::exit(1)
        }
    };

    match outcome {
        Ok(description) => {
            result_out.write_line(&format!("{}", description))?;
            Ok(())
        }
        Err(e) => {
            error!("Mining [{}] failed. Aborting operation.", command);
            error!("{}", e);
            process::exit(1)
        }
    }
}

/// `popular`: the most starred repositories, with maturity and activity details.
async fn run_popular(miner: &Miner, client: &ClientConfig, args: &ArgMatches) -> Result<Description, MineError> {
    let config = PopularConfig::from_matches(client, args);
    info!("Searching {} repositories with query [{}]...", config.repositories.target, config.search_query);

    let records = miner.popular_repositories(&config, Utc::now()).await;

    write_csv(&client.output_dir, POPULAR_REPOSITORIES_CSV, &records)?;

    Ok(records.describe("popular_repositories"))
}

/// `pull-requests`: reviewed pull requests of repositories with enough finished ones.
async fn run_pull_requests(
    miner: &Miner, client: &ClientConfig, args: &ArgMatches,
) -> Result<Description, MineError> {
    let config = PullRequestConfig::from_matches(client, args);
    info!(
        "Looking for {} repositories with {} qualifying pull requests each...",
        config.complete_repositories, config.pull_requests.target
    );

    let mining = miner.mine_pull_requests(&config).await;

    write_csv(&client.output_dir, SELECTED_REPOSITORIES_CSV, &mining.selected)?;
    write_csv(&client.output_dir, PULL_REQUESTS_CSV, &mining.records)?;

    Ok(mining.records.describe("github_prs_dataset"))
}

/// `java`: filter-chained Java repositories measured with CK.
async fn run_java(miner: &Miner, client: &ClientConfig, args: &ArgMatches) -> Result<Description, MineError> {
    let config = JavaConfig::from_matches(client, args);
    info!(
        "Looking for {} valid Java repositories among {} candidates...",
        config.valid_repositories, config.candidates.target
    );

    ensure_jar(&config.ck_jar, &config.ck_jar_url).await?;

    let mining = mine_java_repositories(miner, &config, &fetcher(), &CkRunner::new(&config.ck_jar)).await;

    write_csv(&client.output_dir, JAVA_REPOSITORIES_CSV, &mining.reports)?;

    Ok(mining.reports.describe("java_repositories_analysis"))
}

/// `java-classes`: CK's per-class metrics of the most starred Java repositories.
async fn run_java_classes(
    miner: &Miner, client: &ClientConfig, args: &ArgMatches,
) -> Result<Description, MineError> {
    let config = ClassMetricsConfig::from_matches(client, args);
    info!(
        "Measuring the classes of {} repositories found with query [{}]...",
        config.repositories.target, config.search_query
    );

    ensure_jar(&config.ck_jar, &config.ck_jar_url).await?;

    let mining = mine_class_metrics(miner, &config, &fetcher(), &CkRunner::new(&config.ck_jar)).await;

    write_csv(&client.output_dir, CLASS_METRICS_CSV, &mining.rows)?;

    Ok(mining.rows.describe("all_java_projects_class_metrics"))
}

fn fetcher() -> Fetcher {
    FallbackFetcher {
        primary: GitCloner::default(),
        fallback: ArchiveDownloader::default(),
    }
}

/// Retrieves the application's ASCII-art logo.
fn get_logo() -> &'static str {
    r#"
                                                   _
         _ __ ___ _ __   ___  _ __ ___ (_)_ __   ___ _ __
        | '__/ _ \ '_ \ / _ \| '_ ` _ \| | '_ \ / _ \ '__|
        | | |  __/ |_) | (_) | | | | | | | | | |  __/ |
        |_|  \___| .__/ \___/|_| |_| |_|_|_| |_|\___|_|
                 |_|
        ------------ Dig first, ask questions later ------------
    "#
}

/// Prints the legends of every `M` metric into target [`Term`], if `toggle` is `true`.
fn print_metrics_legends<M: Metric>(toggle: bool, term: &Term) {
    if !toggle {
        return;
    }

    term.write_line(&M::legends()).unwrap_or_else(|e| {
        error!("An error has occurred while printing metrics' legends to term! Error = {}", e);
    });
    term.write_line(&"=".repeat(term.size().1 as usize)).unwrap_or_else(|e| {
        error!("An error has occurred while printing line separator term! Error = {}", e);
    });
}

/// Initializes the `Log` crate's logging facade.
fn init_logging(log_level: LevelFilter) {
    let mut config = ConfigBuilder::new();
    config.add_filter_allow_str(repominer_metadata::package_name());
    let _ = config.set_time_offset_to_local(); // falls back to UTC when the local offset is unknown

    TermLogger::init(log_level, config.build(), TerminalMode::Mixed, ColorChoice::Auto).unwrap() // we want to panic if the logger couldn't be initialized, so the unwrap() is adequate
}

/// Sets up the CLI for the whole application.
fn setup_cli() -> ArgMatches {
    build_cli().get_matches()
}

/// Global params are accepted before and after the subcommand.
fn build_cli() -> Command<'static> {
    Command::new(repominer_metadata::package_name())
        .version(repominer_metadata::full_version())
        .author(repominer_metadata::authors())
        .about(repominer_metadata::description())
        .subcommand_required(true)
        .arg_required_else_help(true)
        // global params start here ---
        .arg(
            Arg::new(GITHUB_TOKEN_PARAM)
                .long(GITHUB_TOKEN_PARAM)
                .short('G')
                .help("Sets the personal access token under which every GitHub request is performed")
                .takes_value(true)
                .global(true)
                .env(GITHUB_TOKEN_ENV)
                .hide_env_values(true),
        )
        .arg(
            Arg::new(LOG_LEVEL_PARAM)
                .long(LOG_LEVEL_PARAM)
                .short('L')
                .help("Overrides the logging verbosity for the whole application")
                .required(false)
                .takes_value(true)
                .possible_values([
                    LevelFilter::Info.as_str(),
                    LevelFilter::Debug.as_str(),
                    LevelFilter::Trace.as_str(),
                    LevelFilter::Warn.as_str(),
                    LevelFilter::Error.as_str(),
                    LevelFilter::Off.as_str(),
                ])
                .ignore_case(true)
                .default_value(repominer_metadata::default_log_level().as_str())
                .conflicts_with(SILENT_MODE_FLAG)
                .global(true),
        )
        .arg(
            Arg::new(OUTPUT_DIR_PARAM)
                .long(OUTPUT_DIR_PARAM)
                .short('o')
                .help("Directory the CSV datasets are written into")
                .takes_value(true)
                .default_value(DEFAULT_OUTPUT_DIR)
                .global(true),
        )
        .arg(
            number_arg(MAX_RETRIES_PARAM, "Attempts per request before giving up on transient failures", DEFAULT_MAX_RETRIES)
                .validator(at_least_one)
                .global(true),
        )
        .arg(
            number_arg(
                RETRY_DELAY_PARAM,
                "Base delay (seconds) between attempts; attempt N waits N times this delay",
                DEFAULT_RETRY_DELAY_SECS,
            )
            .global(true),
        )
        .arg(
            number_arg(PAGE_PAUSE_PARAM, "Pause (milliseconds) between two page fetches", DEFAULT_PAGE_PAUSE_MS)
                .global(true),
        )
        .arg(
            number_arg(REQUEST_TIMEOUT_PARAM, "Timeout (seconds) of a single request", DEFAULT_REQUEST_TIMEOUT_SECS)
                .global(true),
        )
        // optional flags start here ---
        .arg(
            Arg::new(SILENT_MODE_FLAG)
                .long(SILENT_MODE_FLAG)
                .short('s')
                .help(
                    "Marks the operation as silent, which turns off all logging and printing to stdout, \
                    with the sole exception of the statistics summary. This makes it useful for piping \
                    just the results, without the added 'noise'. (NOTE: piping is automatically detected, \
                    which activates silent-mode without having to explicitly add the flag to the command)",
                )
                .takes_value(false)
                .global(true),
        )
        .arg(
            Arg::new(PRINT_LEGENDS_FLAG)
                .long(PRINT_LEGENDS_FLAG)
                .short('l')
                .help("Prints the metrics' legends before the statistics summary. Ignored in silent mode")
                .takes_value(false)
                .global(true),
        )
        // subcommands start here ---
        .subcommand(
            Command::new(POPULAR_COMMAND)
                .about("Collects the most starred repositories and their maturity/activity details")
                .arg(number_arg(REPOSITORIES_PARAM, "Amount of repositories to collect", DEFAULT_POPULAR_REPOSITORIES))
                .arg(per_page_arg(DEFAULT_POPULAR_PER_PAGE))
                .arg(max_pages_arg(DEFAULT_POPULAR_MAX_PAGES))
                .arg(search_query_arg(DEFAULT_POPULAR_SEARCH_QUERY))
                .arg(number_arg(
                    DETAILS_PAUSE_PARAM,
                    "Pause (milliseconds) between two repository detail lookups",
                    DEFAULT_DETAILS_PAUSE_MS,
                )),
        )
        .subcommand(
            Command::new(PULL_REQUESTS_COMMAND)
                .about("Collects reviewed pull requests of repositories with enough finished pull requests")
                .arg(number_arg(CANDIDATES_PARAM, "Amount of candidate repositories to discover", DEFAULT_CANDIDATES))
                .arg(number_arg(
                    MIN_PULL_REQUESTS_PARAM,
                    "Minimum merged + closed pull requests of a candidate repository",
                    DEFAULT_MIN_PULL_REQUESTS,
                ))
                .arg(number_arg(
                    REPOSITORIES_PARAM,
                    "Amount of repositories that must reach the per-repository target",
                    DEFAULT_COMPLETE_REPOSITORIES,
                ))
                .arg(number_arg(
                    PRS_PER_REPOSITORY_PARAM,
                    "Qualifying pull requests required (and kept) per repository",
                    DEFAULT_PRS_PER_REPOSITORY,
                ))
                .arg(number_arg(MIN_REVIEWS_PARAM, "Minimum reviews of a qualifying pull request", DEFAULT_MIN_REVIEWS))
                .arg(number_arg(
                    MIN_DURATION_HOURS_PARAM,
                    "Minimum hours between a pull request's creation and its merge/close",
                    DEFAULT_MIN_DURATION_HOURS,
                ))
                .arg(per_page_arg(DEFAULT_REPOSITORY_PAGE_SIZE))
                .arg(
                    number_arg(PR_PAGE_SIZE_PARAM, "Pull requests per page", DEFAULT_PR_PAGE_SIZE)
                        .validator(valid_page_size),
                )
                .arg(max_pages_arg(DEFAULT_PR_MAX_PAGES))
                .arg(number_arg(
                    PR_PAGE_PAUSE_PARAM,
                    "Pause (milliseconds) between two pull-request pages",
                    DEFAULT_PR_PAGE_PAUSE_MS,
                ))
                .arg(search_query_arg(DEFAULT_PR_SEARCH_QUERY)),
        )
        .subcommand(
            Command::new(JAVA_COMMAND)
                .about("Filters Java repositories by bugs, files and lines of code, then measures them with CK")
                .arg(number_arg(
                    VALID_REPOSITORIES_PARAM,
                    "Amount of accepted repositories after which mining stops",
                    DEFAULT_VALID_REPOSITORIES,
                ))
                .arg(number_arg(MIN_BUGS_PARAM, "Minimum issues labelled 'bug'", DEFAULT_MIN_BUGS))
                .arg(number_arg(MIN_JAVA_FILES_PARAM, "Minimum .java files in the clone", DEFAULT_MIN_JAVA_FILES))
                .arg(number_arg(MIN_LOC_PARAM, "Minimum lines of Java code in the clone", DEFAULT_MIN_LOC))
                .arg(per_page_arg(DEFAULT_JAVA_PER_PAGE))
                .arg(max_pages_arg(DEFAULT_JAVA_MAX_PAGES))
                .arg(search_query_arg(DEFAULT_JAVA_SEARCH_QUERY))
                .arg(
                    Arg::new(EXCLUDE_PARAM)
                        .long(EXCLUDE_PARAM)
                        .help("Comma-separated keywords; repositories mentioning any of them are skipped")
                        .takes_value(true)
                        .default_value(DEFAULT_EXCLUDED_KEYWORDS),
                )
                .arg(ck_jar_arg())
                .arg(ck_jar_url_arg())
                .arg(staging_dir_arg()),
        )
        .subcommand(
            Command::new(JAVA_CLASSES_COMMAND)
                .about("Measures every class of the most starred Java repositories with CK")
                .arg(number_arg(REPOSITORIES_PARAM, "Amount of repositories to analyse", DEFAULT_CLASS_REPOSITORIES))
                .arg(per_page_arg(DEFAULT_CLASS_PER_PAGE))
                .arg(max_pages_arg(DEFAULT_CLASS_MAX_PAGES))
                .arg(search_query_arg(DEFAULT_CLASS_SEARCH_QUERY))
                .arg(ck_jar_arg())
                .arg(ck_jar_url_arg())
                .arg(staging_dir_arg()),
        )
}

/// A non-negative integer param.
fn number_arg<'a>(name: &'a str, help: &'a str, default: &'a str) -> Arg<'a> {
    Arg::new(name)
        .long(name)
        .help(help)
        .takes_value(true)
        .validator(|value| value.parse::<u64>().map(|_| ()).map_err(|_| "Supplied value must be a non-negative integer number"))
        .default_value(default)
}

fn per_page_arg(default: &str) -> Arg {
    number_arg(PER_PAGE_PARAM, "Repositories per search page", default).validator(valid_page_size)
}

fn max_pages_arg(default: &str) -> Arg {
    number_arg(MAX_PAGES_PARAM, "Maximum search pages to walk (0 = no limit)", default)
}

fn search_query_arg(default: &str) -> Arg {
    Arg::new(SEARCH_QUERY_PARAM)
        .long(SEARCH_QUERY_PARAM)
        .short('q')
        .help("GitHub search query used to discover repositories")
        .takes_value(true)
        .default_value(default)
}

fn ck_jar_arg() -> Arg<'static> {
    Arg::new(CK_JAR_PARAM)
        .long(CK_JAR_PARAM)
        .help("Path of the CK jar; downloaded when missing")
        .takes_value(true)
        .default_value(DEFAULT_CK_JAR)
}

fn ck_jar_url_arg() -> Arg<'static> {
    Arg::new(CK_JAR_URL_PARAM)
        .long(CK_JAR_URL_PARAM)
        .help("Where the CK jar is downloaded from")
        .takes_value(true)
        .default_value(DEFAULT_CK_JAR_URL)
}

fn staging_dir_arg() -> Arg<'static> {
    Arg::new(STAGING_DIR_PARAM)
        .long(STAGING_DIR_PARAM)
        .help("Directory clones and CK outputs are staged into")
        .takes_value(true)
        .default_value(DEFAULT_STAGING_DIR)
}

fn valid_page_size(value: &str) -> Result<(), String> {
    match value.parse::<u32>() {
        Ok(size) if (1..=MAX_PER_PAGE).contains(&size) => Ok(()),
        _ => Err(format!("Supplied value must be an integer number between 1 and {}, but was {}", MAX_PER_PAGE, value)),
    }
}

fn at_least_one(value: &str) -> Result<(), String> {
    match value.parse::<u32>() {
        Ok(count) if count >= 1 => Ok(()),
        _ => Err(format!("Supplied value must be a positive integer number, but was {}", value)),
    }
}
