use std::fmt::Write;

use crate::model::{AiFixStatus, Cipe, UserAction};
use crate::notifications::{Notification, NotificationAction};
use crate::polling::{next_tier, PollingTiers};
use crate::source::FetchOutcome;
use crate::status::AiFixSummary;
use crate::view::ViewState;

use super::styling::{kind_tag, muted, Tone};
use super::tables::{color_coded_status_cell, color_coded_tier_cell, create_cyan_header, create_table};

/// Prints the snapshot overview: recent CIPEs, implied polling tier and AI fix badge.
pub fn print_status(outcome: &FetchOutcome, tiers: &PollingTiers) {
    println!("{}", render_status(outcome, tiers));
}

pub fn print_notifications(notifications: &[Notification]) {
    println!("{}", render_notifications(notifications));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", Tone::Heading.paint(emoji), Tone::Heading.paint(title).underlined());
}

fn ai_fix_label(cipe: &Cipe) -> String {
    let Some(fix) = cipe.run_groups.iter().find_map(|group| group.ai_fix.as_ref()) else {
        return "-".to_string();
    };

    match fix.user_action {
        UserAction::Applied => "applied".to_string(),
        UserAction::AppliedAutomatically => "auto-applied".to_string(),
        UserAction::Rejected => "rejected".to_string(),
        _ if fix.is_actionable() => "ready".to_string(),
        _ => match fix.suggested_fix_status {
            AiFixStatus::NotStarted | AiFixStatus::InProgress => "generating".to_string(),
            AiFixStatus::Failed | AiFixStatus::NotExecutable => "unavailable".to_string(),
            _ => "pending".to_string(),
        },
    }
}

pub fn render_status(outcome: &FetchOutcome, tiers: &PollingTiers) -> String {
    let mut output = String::new();

    if let Some(error) = &outcome.error {
        let _ = writeln!(output, "{} {}\n", Tone::Failure.paint("Fetch error:"), error);
    }

    add_section_header(&mut output, "📡", "Recent CIPEs");
    let cipes = outcome.cipes_or_empty();
    if cipes.is_empty() {
        let _ = writeln!(output, "{}\n", Tone::Warning.paint("No CIPEs found."));
    } else {
        let mut table = create_table();
        table.set_header(create_cyan_header(&[
            "Branch",
            "Status",
            "Commit",
            "Completed",
            "Failed Runs",
            "AI Fix",
        ]));
        for cipe in cipes {
            let failed_runs = cipe.runs().filter(|run| run.is_failed()).count();
            table.add_row(vec![
                comfy_table::Cell::new(&cipe.branch),
                color_coded_status_cell(cipe.status),
                comfy_table::Cell::new(cipe.commit_title.as_deref().unwrap_or("-")),
                comfy_table::Cell::new(
                    cipe.completed_at
                        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                comfy_table::Cell::new(failed_runs),
                comfy_table::Cell::new(ai_fix_label(cipe)),
            ]);
        }
        let _ = writeln!(output, "{table}\n");
    }

    add_section_header(&mut output, "⏱️", "Polling");
    let mut table = create_table();
    table.set_header(create_cyan_header(&["Tier", "Reason", "View"]));
    match next_tier(outcome) {
        Some((tier, reason)) => {
            table.add_row(vec![
                color_coded_tier_cell(tier, tiers.describe(tier)),
                comfy_table::Cell::new(reason),
                comfy_table::Cell::new(snapshot_view(outcome)),
            ]);
        }
        None => {
            table.add_row(vec![
                comfy_table::Cell::new("unchanged"),
                comfy_table::Cell::new("fetch error"),
                comfy_table::Cell::new(snapshot_view(outcome)),
            ]);
        }
    }
    let _ = writeln!(output, "{table}\n");

    add_section_header(&mut output, "🤖", "AI Fixes");
    let summary = AiFixSummary::from_cipes(cipes);
    match (summary.label(), summary.message.as_deref()) {
        (Some(label), Some(message)) => {
            let _ = writeln!(output, "  {} {}", Tone::AiFix.paint(label), muted(message));
        }
        _ => {
            let _ = writeln!(output, "  {}", muted("No AI fixes awaiting review"));
        }
    }

    output
}

fn snapshot_view(outcome: &FetchOutcome) -> ViewState {
    crate::view::derive_view(None, outcome.info.as_deref())
}

pub fn render_notification(notification: &Notification) -> String {
    let mut line = format!("{} {}", kind_tag(notification.kind), notification.message);
    for action in &notification.actions {
        let target = match action {
            NotificationAction::Open { url, .. } => url.as_str(),
            NotificationAction::Command { command, .. } => command.as_str(),
        };
        let _ = write!(line, "\n    {} {}", Tone::Accent.paint(action.label()), muted(target));
    }
    line
}

pub fn render_notifications(notifications: &[Notification]) -> String {
    if notifications.is_empty() {
        return muted("No notifications.").to_string();
    }

    notifications
        .iter()
        .map(render_notification)
        .collect::<Vec<_>>()
        .join("\n")
}
