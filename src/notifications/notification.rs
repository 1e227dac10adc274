use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CipeWatchError;
use crate::model::{Cipe, Run, RunGroup, UserAction};
use crate::status::ai_fix_message;

const MAX_COMMAND_LENGTH: usize = 70;
const TRUNCATED_COMMAND_LENGTH: usize = 60;

/// User preference for which CIPE notifications to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSetting {
    All,
    #[default]
    Errors,
    None,
}

impl FromStr for NotificationSetting {
    type Err = CipeWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "errors" => Ok(Self::Errors),
            "none" => Ok(Self::None),
            other => Err(CipeWatchError::Config(format!(
                "unknown notification setting '{other}' (expected all, errors or none)"
            ))),
        }
    }
}

impl fmt::Display for NotificationSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Errors => "errors",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// A CIPE succeeded
    Info,
    /// A CIPE or one of its runs failed
    Error,
    /// A suggested AI fix is ready for review
    AiFix,
    /// The cloud applied an AI fix to the branch
    FixApplied,
}

/// Action offered with a notification. Targets are opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NotificationAction {
    /// Open a link
    Open { label: String, url: String },
    /// Run an editor command with the CIPE and run group as arguments
    Command {
        label: String,
        command: String,
        cipe_id: String,
        run_group: Option<String>,
    },
}

impl NotificationAction {
    pub fn label(&self) -> &str {
        match self {
            Self::Open { label, .. } | Self::Command { label, .. } => label,
        }
    }

    fn open(label: &str, url: &str) -> Self {
        Self::Open {
            label: label.to_string(),
            url: url.to_string(),
        }
    }

    fn command(label: &str, command: &str, cipe_id: &str, run_group: Option<&str>) -> Self {
        Self::Command {
            label: label.to_string(),
            command: command.to_string(),
            cipe_id: cipe_id.to_string(),
            run_group: run_group.map(str::to_string),
        }
    }
}

/// A single user-facing notification decided by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub cipe_id: String,
    pub message: String,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub fn success(cipe: &Cipe) -> Self {
        Self {
            kind: NotificationKind::Info,
            cipe_id: cipe.id.clone(),
            message: format!("CI succeeded for #{}.", cipe.branch),
            actions: result_actions(cipe, &cipe.cipe_url, false),
        }
    }

    pub fn failure(cipe: &Cipe) -> Self {
        Self {
            kind: NotificationKind::Error,
            cipe_id: cipe.id.clone(),
            message: format!("CI failed for #{}.", cipe.branch),
            actions: result_actions(cipe, &cipe.cipe_url, true),
        }
    }

    pub fn run_failure(cipe: &Cipe, run: &Run) -> Self {
        let result_url = run.run_url.as_deref().unwrap_or(&cipe.cipe_url);
        Self {
            kind: NotificationKind::Error,
            cipe_id: cipe.id.clone(),
            message: format!(
                "\"{}\" failed on #{}.",
                truncate_command(&run.command),
                cipe.branch
            ),
            actions: result_actions(cipe, result_url, true),
        }
    }

    pub fn ai_fix(cipe: &Cipe, run_group: &RunGroup) -> Self {
        let group = Some(run_group.run_group.as_str());
        Self {
            kind: NotificationKind::AiFix,
            cipe_id: cipe.id.clone(),
            message: ai_fix_message(&cipe.branch),
            actions: vec![
                NotificationAction::command("Show Fix", "openFixDetails", &cipe.id, group),
                NotificationAction::command("Reject", "rejectAiFix", &cipe.id, group),
            ],
        }
    }

    pub fn fix_applied(cipe: &Cipe, user_action: UserAction) -> Self {
        let message = if user_action == UserAction::AppliedAutomatically {
            format!("Cloud automatically applied a fix for #{}", cipe.branch)
        } else {
            format!("Cloud applied a fix for #{}", cipe.branch)
        };

        Self {
            kind: NotificationKind::FixApplied,
            cipe_id: cipe.id.clone(),
            message,
            actions: cipe
                .commit_url
                .iter()
                .map(|url| NotificationAction::open("View PR", url))
                .collect(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

fn result_actions(cipe: &Cipe, result_url: &str, is_error: bool) -> Vec<NotificationAction> {
    let mut actions = Vec::new();
    if is_error {
        actions.push(NotificationAction::command(
            "Help me fix this error",
            "helpMeFixCipeError",
            &cipe.id,
            None,
        ));
    }
    if let Some(commit_url) = &cipe.commit_url {
        actions.push(NotificationAction::open("View Commit", commit_url));
    }
    actions.push(NotificationAction::open("View Results", result_url));
    actions
}

fn truncate_command(command: &str) -> String {
    if command.chars().count() > MAX_COMMAND_LENGTH {
        let head: String = command.chars().take(TRUNCATED_COMMAND_LENGTH).collect();
        format!("{head}[...]")
    } else {
        command.to_string()
    }
}
