use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Execution status shared by CIPEs, run groups and runs.
///
/// Values the cloud adds later deserialize to [`CipeStatus::Unknown`] so that
/// decision logic can treat them as "not eligible" instead of failing the whole
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CipeStatus {
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
    Canceled,
    TimedOut,
    #[serde(other)]
    Unknown,
}

impl CipeStatus {
    /// Terminal statuses that count as a failure for notifications.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed | Self::Canceled | Self::TimedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::TimedOut => "TIMED_OUT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Progress of AI fix generation or verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AiFixStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Failed,
    NotExecutable,
    #[serde(other)]
    Unknown,
}

/// What the user (or the cloud on their behalf) did with a suggested fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserAction {
    #[default]
    None,
    Applied,
    Rejected,
    AppliedAutomatically,
    #[serde(other)]
    Unknown,
}

/// A CI Pipeline Execution: one CI run for a commit pushed to a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cipe {
    /// Stable execution id, the key for all diffing and deduplication
    #[serde(rename = "ciPipelineExecutionId", alias = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub branch: String,
    pub status: CipeStatus,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commit_title: Option<String>,
    #[serde(default)]
    pub commit_url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cipe_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ai_fixes_enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub run_groups: Vec<RunGroup>,
}

/// A named execution lane within a CIPE, usually one CI agent or environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunGroup {
    pub run_group: String,
    #[serde(default)]
    pub status: Option<CipeStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub ai_fix: Option<AiFix>,
}

/// One task invocation (an `nx` command) inside a run group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(default)]
    pub link_id: Option<String>,
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub run_url: Option<String>,
    #[serde(default)]
    pub status: Option<CipeStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub command: String,
    #[serde(default)]
    pub num_tasks: Option<u32>,
    #[serde(default)]
    pub num_failed_tasks: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub failed_tasks: Vec<String>,
}

/// AI-assisted fix attached to a failing run group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiFix {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ai_fix_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_ids: Vec<String>,
    /// Unified diff of the proposed change, once generated
    #[serde(default)]
    pub suggested_fix: Option<String>,
    #[serde(default)]
    pub suggested_fix_description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggested_fix_status: AiFixStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub verification_status: AiFixStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_action: UserAction,
    #[serde(default, deserialize_with = "null_as_default")]
    pub could_auto_apply_tasks: bool,
    #[serde(default)]
    pub failure_classification: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Cipe {
    pub fn is_in_progress(&self) -> bool {
        self.status == CipeStatus::InProgress
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.run_groups.iter().flat_map(|group| group.runs.iter())
    }

    /// First run that failed, in run group order.
    pub fn find_failed_run(&self) -> Option<&Run> {
        self.runs().find(|run| run.is_failed())
    }

    pub fn has_failed_run(&self) -> bool {
        self.find_failed_run().is_some()
    }

    /// True when any run group carries an AI fix record, with or without a suggestion.
    pub fn has_any_ai_fix(&self) -> bool {
        self.run_groups.iter().any(|group| group.ai_fix.is_some())
    }

    /// Completed, or still running with a run that already failed.
    ///
    /// A CIPE in this state has had its one chance at a generic notification.
    pub fn has_notifiable_state(&self) -> bool {
        !self.is_in_progress() || self.has_failed_run()
    }

    pub fn run_group(&self, id: &str) -> Option<&RunGroup> {
        self.run_groups.iter().find(|group| group.run_group == id)
    }
}

impl RunGroup {
    pub fn suggested_fix(&self) -> Option<&str> {
        self.ai_fix.as_ref()?.suggested_fix.as_deref()
    }
}

impl Run {
    pub fn is_failed(&self) -> bool {
        self.status.is_some_and(CipeStatus::is_failed)
            || self.num_failed_tasks.is_some_and(|failed| failed > 0)
    }

    /// Identity of the run within its group.
    pub fn identity(&self) -> Option<&str> {
        self.link_id.as_deref().or(self.execution_id.as_deref())
    }
}

impl AiFix {
    /// A fix exists once a diff is present and generation has started.
    pub fn has_suggestion(&self) -> bool {
        self.suggested_fix.is_some() && self.suggested_fix_status != AiFixStatus::NotStarted
    }

    /// A suggestion is waiting for the user to act on it.
    pub fn is_actionable(&self) -> bool {
        self.suggested_fix.is_some() && self.user_action == UserAction::None
    }

    pub fn was_applied(&self) -> bool {
        matches!(
            self.user_action,
            UserAction::Applied | UserAction::AppliedAutomatically
        )
    }

    /// Auto-applicable fixes are only announced once verification has finished.
    pub fn awaits_auto_apply_verification(&self) -> bool {
        self.could_auto_apply_tasks && self.verification_status != AiFixStatus::Completed
    }
}
