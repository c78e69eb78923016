//! Immutable run configuration. Every loop receives the slice of configuration it needs as an explicit
//! value; nothing here is mutated once the CLI has been parsed.

use std::path::PathBuf;
use std::time::Duration;

use clap::ArgMatches;

// Global CLI params ---
pub const GITHUB_TOKEN_PARAM: &str = "github-token";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const LOG_LEVEL_PARAM: &str = "log-level";
pub const OUTPUT_DIR_PARAM: &str = "output-dir";
pub const MAX_RETRIES_PARAM: &str = "max-retries";
pub const RETRY_DELAY_PARAM: &str = "retry-delay";
pub const PAGE_PAUSE_PARAM: &str = "page-pause-ms";
pub const REQUEST_TIMEOUT_PARAM: &str = "request-timeout";

// Shared subcommand params ---
pub const PER_PAGE_PARAM: &str = "per-page";
pub const MAX_PAGES_PARAM: &str = "max-pages";
pub const SEARCH_QUERY_PARAM: &str = "search-query";
pub const REPOSITORIES_PARAM: &str = "repositories";

// `popular` params ---
pub const DETAILS_PAUSE_PARAM: &str = "details-pause-ms";

// `pull-requests` params ---
pub const CANDIDATES_PARAM: &str = "candidates";
pub const MIN_PULL_REQUESTS_PARAM: &str = "min-pull-requests";
pub const PRS_PER_REPOSITORY_PARAM: &str = "prs-per-repository";
pub const MIN_REVIEWS_PARAM: &str = "min-reviews";
pub const MIN_DURATION_HOURS_PARAM: &str = "min-duration-hours";
pub const PR_PAGE_SIZE_PARAM: &str = "pr-page-size";
pub const PR_PAGE_PAUSE_PARAM: &str = "pr-page-pause-ms";

// `java` params ---
pub const VALID_REPOSITORIES_PARAM: &str = "valid-repositories";
pub const MIN_BUGS_PARAM: &str = "min-bugs";
pub const MIN_JAVA_FILES_PARAM: &str = "min-java-files";
pub const MIN_LOC_PARAM: &str = "min-loc";
pub const EXCLUDE_PARAM: &str = "exclude";
pub const CK_JAR_PARAM: &str = "ck-jar";
pub const CK_JAR_URL_PARAM: &str = "ck-jar-url";
pub const STAGING_DIR_PARAM: &str = "staging-dir";

// Default values ---
pub const DEFAULT_OUTPUT_DIR: &str = "result";
pub const DEFAULT_MAX_RETRIES: &str = "3";
pub const DEFAULT_RETRY_DELAY_SECS: &str = "5";
pub const DEFAULT_PAGE_PAUSE_MS: &str = "1000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "60";

pub const DEFAULT_POPULAR_REPOSITORIES: &str = "1000";
pub const DEFAULT_POPULAR_PER_PAGE: &str = "100";
pub const DEFAULT_POPULAR_MAX_PAGES: &str = "10";
pub const DEFAULT_POPULAR_SEARCH_QUERY: &str = "stars:>=1 sort:stars-desc";
pub const DEFAULT_DETAILS_PAUSE_MS: &str = "500";

pub const DEFAULT_CANDIDATES: &str = "500";
pub const DEFAULT_MIN_PULL_REQUESTS: &str = "50";
pub const DEFAULT_COMPLETE_REPOSITORIES: &str = "201";
pub const DEFAULT_PRS_PER_REPOSITORY: &str = "100";
pub const DEFAULT_MIN_REVIEWS: &str = "1";
pub const DEFAULT_MIN_DURATION_HOURS: &str = "1";
pub const DEFAULT_REPOSITORY_PAGE_SIZE: &str = "50";
pub const DEFAULT_PR_PAGE_SIZE: &str = "50";
pub const DEFAULT_PR_MAX_PAGES: &str = "10";
pub const DEFAULT_PR_PAGE_PAUSE_MS: &str = "500";
pub const DEFAULT_PR_SEARCH_QUERY: &str = "stars:>1 sort:stars-desc";

pub const DEFAULT_VALID_REPOSITORIES: &str = "520";
pub const DEFAULT_MIN_BUGS: &str = "1";
pub const DEFAULT_MIN_JAVA_FILES: &str = "5";
pub const DEFAULT_MIN_LOC: &str = "2000";
pub const DEFAULT_JAVA_PER_PAGE: &str = "100";
pub const DEFAULT_JAVA_MAX_PAGES: &str = "20";
pub const DEFAULT_JAVA_SEARCH_QUERY: &str =
    "language:java stars:>10 (topic:spring-boot OR \"spring-boot\" in:readme,description)";
pub const DEFAULT_EXCLUDED_KEYWORDS: &str =
    "guide,tutorial,awesome,interview,leetcode,algorithm,book,course,learning,study,example,sample";
pub const DEFAULT_CK_JAR: &str = "ck.jar";
pub const DEFAULT_CK_JAR_URL: &str =
    "https://github.com/mauricioaniche/ck/releases/download/0.7.1/ck-0.7.1-jar-with-dependencies.jar";
pub const DEFAULT_STAGING_DIR: &str = "temp_repos";

pub const DEFAULT_CLASS_REPOSITORIES: &str = "1000";
pub const DEFAULT_CLASS_PER_PAGE: &str = "100";
pub const DEFAULT_CLASS_MAX_PAGES: &str = "10";
pub const DEFAULT_CLASS_SEARCH_QUERY: &str = "language:Java sort:stars-desc";

/// Share of searched Java repositories expected to survive the filter chain (1 in 5), padded by a 1.5x
/// margin: candidates requested = ceil(valid * 15 / 2).
const JAVA_CANDIDATE_NUMERATOR: usize = 15;
const JAVA_CANDIDATE_DENOMINATOR: usize = 2;

/// Linear backoff policy for the request executor: attempt `n` failing transiently waits `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Bounds of one qualification loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    /// Amount of qualifying items after which the loop stops.
    pub target: usize,
    pub per_page: u32,
    /// `None` walks pages until the remote source is exhausted.
    pub max_pages: Option<u32>,
    /// Self-throttling pause between two page fetches.
    pub page_pause: Duration,
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub github_token: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub page_pause: Duration,
    pub output_dir: PathBuf,
}

impl ClientConfig {
    pub fn from_matches(github_token: &str, matches: &ArgMatches) -> Self {
        ClientConfig {
            github_token: github_token.to_string(),
            retry: RetryPolicy {
                max_attempts: matches.value_of_t_or_exit(MAX_RETRIES_PARAM),
                base_delay: Duration::from_secs(matches.value_of_t_or_exit(RETRY_DELAY_PARAM)),
            },
            request_timeout: Duration::from_secs(matches.value_of_t_or_exit(REQUEST_TIMEOUT_PARAM)),
            page_pause: Duration::from_millis(matches.value_of_t_or_exit(PAGE_PAUSE_PARAM)),
            output_dir: PathBuf::from(matches.value_of(OUTPUT_DIR_PARAM).unwrap_or(DEFAULT_OUTPUT_DIR)),
        }
    }
}

/// `popular` subcommand settings.
#[derive(Debug, Clone)]
pub struct PopularConfig {
    pub search_query: String,
    pub repositories: Pagination,
    pub details_pause: Duration,
}

impl PopularConfig {
    pub fn from_matches(client: &ClientConfig, matches: &ArgMatches) -> Self {
        PopularConfig {
            search_query: search_query(matches, DEFAULT_POPULAR_SEARCH_QUERY),
            repositories: Pagination {
                target: matches.value_of_t_or_exit(REPOSITORIES_PARAM),
                per_page: matches.value_of_t_or_exit(PER_PAGE_PARAM),
                max_pages: max_pages(matches),
                page_pause: client.page_pause,
            },
            details_pause: Duration::from_millis(matches.value_of_t_or_exit(DETAILS_PAUSE_PARAM)),
        }
    }
}

/// Conjunctive pull-request predicate: enough reviews AND open for long enough.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestCriteria {
    pub min_reviews: u64,
    pub min_duration: chrono::Duration,
}

/// `pull-requests` subcommand settings.
#[derive(Debug, Clone)]
pub struct PullRequestConfig {
    pub search_query: String,
    /// Outer loop: repository candidates qualified by their merged + closed PR count.
    pub repositories: Pagination,
    pub min_pull_requests: u64,
    /// Inner loop: `target` is the per-repository amount of qualifying PRs.
    pub pull_requests: Pagination,
    pub criteria: PullRequestCriteria,
    /// Amount of repositories that must reach the per-repository target before mining stops.
    pub complete_repositories: usize,
}

impl PullRequestConfig {
    pub fn from_matches(client: &ClientConfig, matches: &ArgMatches) -> Self {
        PullRequestConfig {
            search_query: search_query(matches, DEFAULT_PR_SEARCH_QUERY),
            repositories: Pagination {
                target: matches.value_of_t_or_exit(CANDIDATES_PARAM),
                per_page: matches.value_of_t_or_exit(PER_PAGE_PARAM),
                max_pages: max_pages(matches),
                page_pause: client.page_pause,
            },
            min_pull_requests: matches.value_of_t_or_exit(MIN_PULL_REQUESTS_PARAM),
            pull_requests: Pagination {
                target: matches.value_of_t_or_exit(PRS_PER_REPOSITORY_PARAM),
                per_page: matches.value_of_t_or_exit(PR_PAGE_SIZE_PARAM),
                max_pages: None,
                page_pause: Duration::from_millis(matches.value_of_t_or_exit(PR_PAGE_PAUSE_PARAM)),
            },
            criteria: PullRequestCriteria {
                min_reviews: matches.value_of_t_or_exit(MIN_REVIEWS_PARAM),
                min_duration: chrono::Duration::hours(
                    matches.value_of_t_or_exit(MIN_DURATION_HOURS_PARAM),
                ),
            },
            complete_repositories: matches.value_of_t_or_exit(REPOSITORIES_PARAM),
        }
    }
}

/// Cumulative thresholds of the Java filter chain, checked in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct JavaCriteria {
    pub min_bug_issues: u64,
    pub min_java_files: usize,
    pub min_lines_of_code: usize,
}

/// `java` subcommand settings.
#[derive(Debug, Clone)]
pub struct JavaConfig {
    pub search_query: String,
    pub candidates: Pagination,
    pub excluded_keywords: Vec<String>,
    pub criteria: JavaCriteria,
    pub valid_repositories: usize,
    pub ck_jar: PathBuf,
    pub ck_jar_url: String,
    pub staging_dir: PathBuf,
}

impl JavaConfig {
    pub fn from_matches(client: &ClientConfig, matches: &ArgMatches) -> Self {
        let valid_repositories: usize = matches.value_of_t_or_exit(VALID_REPOSITORIES_PARAM);

        JavaConfig {
            search_query: search_query(matches, DEFAULT_JAVA_SEARCH_QUERY),
            candidates: Pagination {
                target: estimated_java_candidates(valid_repositories),
                per_page: matches.value_of_t_or_exit(PER_PAGE_PARAM),
                max_pages: max_pages(matches),
                page_pause: client.page_pause,
            },
            excluded_keywords: parse_keywords(
                matches.value_of(EXCLUDE_PARAM).unwrap_or(DEFAULT_EXCLUDED_KEYWORDS),
            ),
            criteria: JavaCriteria {
                min_bug_issues: matches.value_of_t_or_exit(MIN_BUGS_PARAM),
                min_java_files: matches.value_of_t_or_exit(MIN_JAVA_FILES_PARAM),
                min_lines_of_code: matches.value_of_t_or_exit(MIN_LOC_PARAM),
            },
            valid_repositories,
            ck_jar: PathBuf::from(matches.value_of(CK_JAR_PARAM).unwrap_or(DEFAULT_CK_JAR)),
            ck_jar_url: matches.value_of(CK_JAR_URL_PARAM).unwrap_or(DEFAULT_CK_JAR_URL).to_string(),
            staging_dir: PathBuf::from(
                matches.value_of(STAGING_DIR_PARAM).unwrap_or(DEFAULT_STAGING_DIR),
            ),
        }
    }
}

/// `java-classes` subcommand settings.
#[derive(Debug, Clone)]
pub struct ClassMetricsConfig {
    pub search_query: String,
    pub repositories: Pagination,
    pub ck_jar: PathBuf,
    pub ck_jar_url: String,
    pub staging_dir: PathBuf,
}

impl ClassMetricsConfig {
    pub fn from_matches(client: &ClientConfig, matches: &ArgMatches) -> Self {
        ClassMetricsConfig {
            search_query: search_query(matches, DEFAULT_CLASS_SEARCH_QUERY),
            repositories: Pagination {
                target: matches.value_of_t_or_exit(REPOSITORIES_PARAM),
                per_page: matches.value_of_t_or_exit(PER_PAGE_PARAM),
                max_pages: max_pages(matches),
                page_pause: client.page_pause,
            },
            ck_jar: PathBuf::from(matches.value_of(CK_JAR_PARAM).unwrap_or(DEFAULT_CK_JAR)),
            ck_jar_url: matches.value_of(CK_JAR_URL_PARAM).unwrap_or(DEFAULT_CK_JAR_URL).to_string(),
            staging_dir: PathBuf::from(
                matches.value_of(STAGING_DIR_PARAM).unwrap_or(DEFAULT_STAGING_DIR),
            ),
        }
    }
}

/// Amount of search candidates needed to (probably) end up with `valid_repositories` accepted ones.
pub fn estimated_java_candidates(valid_repositories: usize) -> usize {
    num::integer::div_ceil(valid_repositories * JAVA_CANDIDATE_NUMERATOR, JAVA_CANDIDATE_DENOMINATOR)
}

/// Splits a comma-separated keyword list, lower-casing and dropping blanks.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|keyword| keyword.trim().to_ascii_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

fn search_query(matches: &ArgMatches, default: &str) -> String {
    matches.value_of(SEARCH_QUERY_PARAM).unwrap_or(default).to_string()
}

/// `0` means "no page limit".
fn max_pages(matches: &ArgMatches) -> Option<u32> {
    match matches.value_of_t_or_exit::<u32>(MAX_PAGES_PARAM) {
        0 => None,
        pages => Some(pages),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_grows_linearly_with_the_attempt_number() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        };

        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(15));
    }

    #[test]
    fn java_candidates_are_padded_for_the_expected_rejection_rate() {
        assert_eq!(estimated_java_candidates(520), 3900);
        assert_eq!(estimated_java_candidates(1), 8);
        assert_eq!(estimated_java_candidates(0), 0);
    }

    #[test]
    fn keywords_are_trimmed_lowercased_and_blank_entries_dropped() {
        assert_eq!(
            parse_keywords(" Guide, TUTORIAL ,,awesome,"),
            vec!["guide".to_string(), "tutorial".to_string(), "awesome".to_string()]
        );
        assert!(parse_keywords("").is_empty());
    }
}
