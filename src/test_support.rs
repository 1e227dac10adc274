//! Snapshot builders shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::model::{AiFix, AiFixStatus, Cipe, CipeStatus, Run, RunGroup, UserAction};
use crate::monitor::Presenter;
use crate::notifications::Notification;
use crate::source::{CipeSource, FetchError, FetchOutcome};
use crate::status::AiFixSummary;
use crate::view::ViewState;

pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    now() - Duration::minutes(minutes)
}

pub fn cipe(id: &str, status: CipeStatus) -> Cipe {
    Cipe {
        id: id.to_string(),
        branch: "feature".to_string(),
        status,
        created_at: Some(minutes_ago(30)),
        completed_at: None,
        commit_title: Some("fix things".to_string()),
        commit_url: Some(format!("https://git.example.com/commit/{id}")),
        author: Some("dev".to_string()),
        cipe_url: format!("https://cloud.example.com/cipes/{id}"),
        ai_fixes_enabled: false,
        run_groups: vec![run_group("main-group", vec![run("run-1", Some(CipeStatus::InProgress))])],
    }
}

pub fn in_progress(id: &str) -> Cipe {
    cipe(id, CipeStatus::InProgress)
}

pub fn succeeded(id: &str) -> Cipe {
    completed(id, CipeStatus::Succeeded, 1)
}

pub fn failed(id: &str) -> Cipe {
    completed(id, CipeStatus::Failed, 1)
}

pub fn completed(id: &str, status: CipeStatus, minutes: i64) -> Cipe {
    let mut cipe = cipe(id, status);
    cipe.completed_at = Some(minutes_ago(minutes));
    cipe.run_groups[0].runs[0].status = Some(status);
    if status.is_failed() {
        cipe.run_groups[0].runs[0].num_failed_tasks = Some(1);
    }
    cipe
}

pub fn with_failed_run(mut cipe: Cipe, command: &str) -> Cipe {
    let mut failed = run("run-failed", Some(CipeStatus::Failed));
    failed.command = command.to_string();
    failed.num_failed_tasks = Some(1);
    cipe.run_groups[0].runs.push(failed);
    cipe
}

pub fn with_ai_fix(mut cipe: Cipe, fix: AiFix) -> Cipe {
    cipe.run_groups[0].ai_fix = Some(fix);
    cipe
}

pub fn run_group(id: &str, runs: Vec<Run>) -> RunGroup {
    RunGroup {
        run_group: id.to_string(),
        status: None,
        runs,
        ai_fix: None,
    }
}

pub fn run(id: &str, status: Option<CipeStatus>) -> Run {
    Run {
        link_id: Some(id.to_string()),
        execution_id: None,
        run_url: Some(format!("https://cloud.example.com/runs/{id}")),
        status,
        command: "nx affected -t build".to_string(),
        num_tasks: Some(3),
        num_failed_tasks: None,
        failed_tasks: Vec::new(),
    }
}

/// A fix that is still being generated.
pub fn pending_fix() -> AiFix {
    AiFix {
        ai_fix_id: "fix-1".to_string(),
        task_ids: vec!["app:test".to_string()],
        suggested_fix: None,
        suggested_fix_description: None,
        suggested_fix_status: AiFixStatus::InProgress,
        verification_status: AiFixStatus::NotStarted,
        user_action: UserAction::None,
        could_auto_apply_tasks: false,
        failure_classification: None,
    }
}

/// A fix with a generated diff awaiting the user.
pub fn suggested_fix() -> AiFix {
    AiFix {
        suggested_fix: Some("--- a/app.ts\n+++ b/app.ts".to_string()),
        suggested_fix_status: AiFixStatus::Completed,
        ..pending_fix()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    View(ViewState),
    Notified(Notification),
    Badge(usize),
    ErrorContext(Option<String>),
}

/// Presenter that records every call. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    events: Arc<Mutex<Vec<PresenterEvent>>>,
}

impl RecordingPresenter {
    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PresenterEvent::Notified(notification) => Some(notification),
                _ => None,
            })
            .collect()
    }

    pub fn views(&self) -> Vec<ViewState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PresenterEvent::View(view) => Some(view),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: PresenterEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Presenter for RecordingPresenter {
    fn set_view(&mut self, view: ViewState) {
        self.record(PresenterEvent::View(view));
    }

    fn notify(&mut self, notification: &Notification) {
        self.record(PresenterEvent::Notified(notification.clone()));
    }

    fn set_badge(&mut self, summary: &AiFixSummary) {
        self.record(PresenterEvent::Badge(summary.count));
    }

    fn set_error_context(&mut self, error: Option<&FetchError>) {
        self.record(PresenterEvent::ErrorContext(error.map(|e| e.message.clone())));
    }
}

/// Source that replays scripted outcomes, repeating the last one once exhausted.
///
/// `with_latency` makes every fetch take that long on the tokio clock.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    outcomes: Arc<Mutex<VecDeque<FetchOutcome>>>,
    last: Arc<Mutex<FetchOutcome>>,
    calls: Arc<AtomicUsize>,
    latency: std::time::Duration,
}

impl ScriptedSource {
    pub fn new(outcomes: Vec<FetchOutcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            last: Arc::new(Mutex::new(FetchOutcome::cipes(Vec::new()))),
            calls: Arc::new(AtomicUsize::new(0)),
            latency: std::time::Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fetches started so far, including one still in flight.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> FetchOutcome {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.outcomes.lock().unwrap().pop_front() {
            *last = next;
        }
        last.clone()
    }
}

impl CipeSource for ScriptedSource {
    async fn fetch_recent(&self) -> Result<FetchOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.next_outcome();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(outcome)
    }
}
