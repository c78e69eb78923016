//! The measurable columns of each dataset.

use std::fmt::Display;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::github::utils::pull_request_data::PullRequestRecord;
use crate::github::utils::repository_data::RepositoryRecord;
use crate::java::ck::ClassMetricsRow;
use crate::java::report::JavaRepositoryReport;

/// A numeric column of a dataset whose rows are `Self::Record`s.
pub trait Metric: IntoEnumIterator + Display + Copy + PartialEq {
    type Record;

    /// The value of this metric for one row; `None` when unknown.
    fn measure(&self, record: &Self::Record) -> Option<f64>;

    /// The metric every other one is correlated against.
    fn anchor() -> Self;

    fn legend(&self) -> &'static str;

    /// A verbose explanation of every metric of the dataset.
    fn legends() -> String {
        let mut result = String::new();

        for metric in Self::iter() {
            let name = metric.to_string();

            result.push('\n');
            result.push_str(&"-".repeat(name.len()));
            result.push('\n');
            result.push_str(&name);
            result.push('\n');
            result.push_str(&"-".repeat(name.len()));
            result.push_str("\n\n");
            result.push_str(metric.legend());
            result.push('\n');
        }

        result
    }
}

#[derive(Display, EnumIter, Debug, Copy, Clone, PartialEq, Eq)]
pub enum PullRequestMetric {
    ReviewCount,
    DurationHours,
    ChangedFiles,
    Additions,
    Deletions,
    Participants,
    IssueComments,
    ReviewThreads,
    CommentsTotal,
}

impl Metric for PullRequestMetric {
    type Record = PullRequestRecord;

    fn measure(&self, record: &PullRequestRecord) -> Option<f64> {
        match self {
            PullRequestMetric::ReviewCount => Some(record.review_count as f64),
            PullRequestMetric::DurationHours => record.duration_hours,
            PullRequestMetric::ChangedFiles => record.changed_files.map(|v| v as f64),
            PullRequestMetric::Additions => record.additions.map(|v| v as f64),
            PullRequestMetric::Deletions => record.deletions.map(|v| v as f64),
            PullRequestMetric::Participants => record.participants_count.map(|v| v as f64),
            PullRequestMetric::IssueComments => record.issue_comments_count.map(|v| v as f64),
            PullRequestMetric::ReviewThreads => record.review_threads_count.map(|v| v as f64),
            PullRequestMetric::CommentsTotal => record.comments_total.map(|v| v as f64),
        }
    }

    fn anchor() -> Self {
        PullRequestMetric::ReviewCount
    }

    fn legend(&self) -> &'static str {
        match self {
            PullRequestMetric::ReviewCount => "Amount of reviews submitted on the PR (approvals, change requests and review comments).",
            PullRequestMetric::DurationHours =>
                "Hours between the PR's creation and its merge (or its closing, when it was never merged).",
            PullRequestMetric::ChangedFiles => "Amount of files touched by the PR.",
            PullRequestMetric::Additions => "Lines added by the PR.",
            PullRequestMetric::Deletions => "Lines removed by the PR.",
            PullRequestMetric::Participants => "People involved in the PR's discussion, author included.",
            PullRequestMetric::IssueComments => "Plain conversation comments (not attached to any line of the diff).",
            PullRequestMetric::ReviewThreads => "Discussion threads opened on specific lines of the diff.",
            PullRequestMetric::CommentsTotal =>
                "Conversation comments plus review threads: the overall size of the PR's discussion.",
        }
    }
}

#[derive(Display, EnumIter, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RepositoryMetric {
    Stars,
    AgeDays,
    DaysSinceLastPush,
    MergedPullRequests,
    Releases,
    ClosedIssuesRatio,
}

impl Metric for RepositoryMetric {
    type Record = RepositoryRecord;

    fn measure(&self, record: &RepositoryRecord) -> Option<f64> {
        match self {
            RepositoryMetric::Stars => Some(record.stars as f64),
            RepositoryMetric::AgeDays => record.age_days.map(|v| v as f64),
            RepositoryMetric::DaysSinceLastPush => record.days_since_last_push.map(|v| v as f64),
            RepositoryMetric::MergedPullRequests => Some(record.merged_pull_requests as f64),
            RepositoryMetric::Releases => Some(record.releases as f64),
            RepositoryMetric::ClosedIssuesRatio => Some(record.closed_issues_ratio),
        }
    }

    fn anchor() -> Self {
        RepositoryMetric::Stars
    }

    fn legend(&self) -> &'static str {
        match self {
            RepositoryMetric::Stars => "Stargazers of the repository; the popularity proxy the search is sorted by.",
            RepositoryMetric::AgeDays => "Days since the repository was created (maturity).",
            RepositoryMetric::DaysSinceLastPush => "Days since the last push to any branch (update frequency).",
            RepositoryMetric::MergedPullRequests => "Pull requests accepted into the repository (external contribution).",
            RepositoryMetric::Releases => "Published releases (release cadence).",
            RepositoryMetric::ClosedIssuesRatio => "Closed issues over total issues; 0 for repositories without issues.",
        }
    }
}

#[derive(Display, EnumIter, Debug, Copy, Clone, PartialEq, Eq)]
pub enum JavaMetric {
    Bugs,
    Stars,
    JavaFiles,
    LinesOfCode,
    Classes,
    Methods,
    Cbo,
    Wmc,
    Rfc,
    Lcom,
    Tcc,
    Dit,
    Noc,
    MethodLoc,
    BugsPerClass,
    AnalysisSeconds,
}

impl Metric for JavaMetric {
    type Record = JavaRepositoryReport;

    fn measure(&self, report: &JavaRepositoryReport) -> Option<f64> {
        match self {
            JavaMetric::Bugs => Some(report.total_bugs as f64),
            JavaMetric::Stars => Some(report.stars as f64),
            JavaMetric::JavaFiles => Some(report.total_java_files as f64),
            JavaMetric::LinesOfCode => Some(report.total_loc as f64),
            JavaMetric::Classes => report.classes.map(|v| v as f64),
            JavaMetric::Methods => report.methods.map(|v| v as f64),
            JavaMetric::Cbo => report.avg_cbo,
            JavaMetric::Wmc => report.avg_wmc,
            JavaMetric::Rfc => report.avg_rfc,
            JavaMetric::Lcom => report.avg_lcom,
            JavaMetric::Tcc => report.avg_tcc,
            JavaMetric::Dit => report.avg_dit,
            JavaMetric::Noc => report.avg_noc,
            JavaMetric::MethodLoc => report.avg_method_loc,
            JavaMetric::BugsPerClass => report.bugs_per_class,
            JavaMetric::AnalysisSeconds => Some(report.analysis_time_seconds),
        }
    }

    fn anchor() -> Self {
        JavaMetric::Bugs
    }

    fn legend(&self) -> &'static str {
        match self {
            JavaMetric::Bugs => "Issues labelled `bug` in the repository.",
            JavaMetric::Stars => "Stargazers of the repository.",
            JavaMetric::JavaFiles => "`.java` files in the default branch.",
            JavaMetric::LinesOfCode => "Non-blank, non-comment lines across all `.java` files.",
            JavaMetric::Classes => "Classes reported by CK.",
            JavaMetric::Methods => "Methods reported by CK.",
            JavaMetric::Cbo => "Average Coupling Between Objects: classes a class depends on.",
            JavaMetric::Wmc => "Average Weighted Methods per Class: summed cyclomatic complexity of a class' methods.",
            JavaMetric::Rfc => "Average Response For a Class: distinct methods invoked by a class.",
            JavaMetric::Lcom => "Average Lack of Cohesion of Methods.",
            JavaMetric::Tcc => "Average Tight Class Cohesion (classes where CK could not compute it are ignored).",
            JavaMetric::Dit => "Average Depth of Inheritance Tree.",
            JavaMetric::Noc => "Average Number Of Children (direct subclasses).",
            JavaMetric::MethodLoc => "Average lines of code per method.",
            JavaMetric::BugsPerClass => "Bug issues per CK class (defect density proxy).",
            JavaMetric::AnalysisSeconds => "Wall-clock seconds spent cloning, scanning and analysing the repository.",
        }
    }
}

/// Per-class CK columns, correlated against the size of the class.
#[derive(Display, EnumIter, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClassMetric {
    Loc,
    Cbo,
    Wmc,
    Rfc,
    Lcom,
    Tcc,
    Dit,
    Noc,
}

impl Metric for ClassMetric {
    type Record = ClassMetricsRow;

    fn measure(&self, row: &ClassMetricsRow) -> Option<f64> {
        match self {
            ClassMetric::Loc => row.loc,
            ClassMetric::Cbo => row.cbo,
            ClassMetric::Wmc => row.wmc,
            ClassMetric::Rfc => row.rfc,
            ClassMetric::Lcom => row.lcom,
            ClassMetric::Tcc => row.tcc,
            ClassMetric::Dit => row.dit,
            ClassMetric::Noc => row.noc,
        }
    }

    fn anchor() -> Self {
        ClassMetric::Loc
    }

    fn legend(&self) -> &'static str {
        match self {
            ClassMetric::Loc => "Lines of code of the class.",
            ClassMetric::Cbo => "Coupling Between Objects: classes this class depends on.",
            ClassMetric::Wmc => "Weighted Methods per Class: summed cyclomatic complexity of its methods.",
            ClassMetric::Rfc => "Response For a Class: distinct methods it invokes.",
            ClassMetric::Lcom => "Lack of Cohesion of Methods.",
            ClassMetric::Tcc => "Tight Class Cohesion; blank when CK could not compute it.",
            ClassMetric::Dit => "Depth of Inheritance Tree.",
            ClassMetric::Noc => "Number Of Children (direct subclasses).",
        }
    }
}
