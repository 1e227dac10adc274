use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

use super::memory::NotificationMemory;
use super::notification::{Notification, NotificationSetting};
use crate::model::{AiFix, Cipe, CipeStatus};
use crate::status::AiFixBadge;

/// Seconds a failed CIPE waits for an AI fix before the plain failure is reported.
pub const DEFAULT_AI_FIX_WAIT_SECS: i64 = 5 * 60;

/// Decides which notifications a new CIPE snapshot deserves.
///
/// The engine is a pure comparison of two snapshots plus two pieces of memory:
/// the ids that were already notified, and the time the previous snapshot was
/// evaluated. Each CIPE produces at most one generic (success/failure)
/// notification or AI fix notification over the engine's lifetime; fix-applied
/// notifications are tracked separately.
#[derive(Debug)]
pub struct NotificationEngine {
    notified: NotificationMemory,
    applied: NotificationMemory,
    ai_fix_wait: Duration,
    previous_evaluation: Option<DateTime<Utc>>,
}

impl Default for NotificationEngine {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_AI_FIX_WAIT_SECS))
    }
}

impl NotificationEngine {
    pub fn new(ai_fix_wait: Duration) -> Self {
        Self {
            notified: NotificationMemory::new(),
            applied: NotificationMemory::new(),
            ai_fix_wait,
            previous_evaluation: None,
        }
    }

    pub fn memory(&self) -> &NotificationMemory {
        &self.notified
    }

    /// Compares the previous snapshot with the new one and returns the
    /// notifications to show.
    ///
    /// The badge is refreshed from `new` on every call, whatever the setting.
    /// `old` is `None` on the very first load; nothing is announced then, since a
    /// CIPE that just finished cannot be told apart from one loaded for the
    /// first time.
    ///
    /// # Arguments
    ///
    /// * `old` - Previously observed snapshot, if any
    /// * `new` - Snapshot that was just fetched
    /// * `setting` - Current user notification preference
    /// * `now` - Evaluation time for the AI fix wait window
    /// * `badge` - Status badge to refresh
    pub fn compare(
        &mut self,
        old: Option<&[Cipe]>,
        new: &[Cipe],
        setting: NotificationSetting,
        now: DateTime<Utc>,
        badge: &mut AiFixBadge,
    ) -> Vec<Notification> {
        badge.refresh(new);

        let previous_evaluation = self.previous_evaluation.replace(now).unwrap_or(now);

        let Some(old) = old else {
            debug!("Initial CIPE load with {} entries, no notifications", new.len());
            return Vec::new();
        };

        let mut notifications = Vec::new();

        for new_cipe in new {
            let old_cipe = old.iter().find(|cipe| cipe.id == new_cipe.id);

            for notification in self.ai_fix_notifications(old_cipe, new_cipe) {
                info!("AI fix notification for CIPE {} ({})", new_cipe.id, notification.message);
                notifications.push(notification);
            }

            if setting == NotificationSetting::None || self.notified.is_settled(&new_cipe.id) {
                continue;
            }

            if let Some(notification) =
                self.cipe_notification(old_cipe, new_cipe, setting, previous_evaluation, now)
            {
                info!("CIPE notification for {}: {}", new_cipe.id, notification.message);
                self.notified.settle(&new_cipe.id);
                notifications.push(notification);
            }
        }

        notifications
    }

    /// AI fix notifications: a suggestion that just appeared, or a fix that was just applied.
    ///
    /// Every run group is inspected, so one cycle can yield both kinds for the
    /// same CIPE. Each kind is emitted at most once per CIPE.
    fn ai_fix_notifications(&mut self, old: Option<&Cipe>, new: &Cipe) -> Vec<Notification> {
        let mut notifications = Vec::new();

        for group in &new.run_groups {
            let Some(fix) = group.ai_fix.as_ref().filter(|fix| fix.has_suggestion()) else {
                continue;
            };
            let old_fix = old
                .and_then(|cipe| cipe.run_group(&group.run_group))
                .and_then(|group| group.ai_fix.as_ref());

            if fix.was_applied() {
                let action_changed = old_fix.map(|f| f.user_action) != Some(fix.user_action);
                if action_changed && self.applied.settle(&new.id) {
                    notifications.push(Notification::fix_applied(new, fix.user_action));
                }
                continue;
            }

            let already_announceable = old.is_some() && old_fix.is_some_and(is_announceable);
            if already_announceable {
                continue;
            }

            if fix.awaits_auto_apply_verification() {
                debug!(
                    "Deferring AI fix notification for CIPE {} until verification completes",
                    new.id
                );
                continue;
            }

            if !self.notified.settle(&new.id) {
                debug!("CIPE {} already notified, skipping AI fix notification", new.id);
                continue;
            }
            notifications.push(Notification::ai_fix(new, group));
        }

        notifications
    }

    fn cipe_notification(
        &self,
        old: Option<&Cipe>,
        new: &Cipe,
        setting: NotificationSetting,
        previous_evaluation: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        if !self.could_show_cipe_notification(old, new, previous_evaluation, now) {
            return None;
        }

        if self.should_suppress_failure_notification(new, now) {
            debug!("Withholding notification for CIPE {} while an AI fix may arrive", new.id);
            return None;
        }

        match new.status {
            CipeStatus::Succeeded => {
                (setting == NotificationSetting::All).then(|| Notification::success(new))
            }
            status if status.is_failed() => Some(Notification::failure(new)),
            CipeStatus::InProgress => new
                .find_failed_run()
                .map(|run| Notification::run_failure(new, run)),
            _ => None,
        }
    }

    /// Whether this transition is the CIPE first reaching a notifiable state.
    ///
    /// The old snapshot is judged at the time it was evaluated, so a failure that
    /// was withheld while waiting for an AI fix is reported once the window
    /// closes, even though the CIPE data itself did not change.
    fn could_show_cipe_notification(
        &self,
        old: Option<&Cipe>,
        new: &Cipe,
        previous_evaluation: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(old) = old else {
            return new.has_notifiable_state();
        };

        if !old.has_notifiable_state() {
            return true;
        }

        let was_suppressed = self.should_suppress_failure_notification(old, previous_evaluation);
        let is_suppressed = self.should_suppress_failure_notification(new, now);

        was_suppressed && !is_suppressed && self.has_passed_ai_fix_wait(new, now)
    }

    fn should_suppress_failure_notification(&self, cipe: &Cipe, at: DateTime<Utc>) -> bool {
        cipe.has_any_ai_fix() || (cipe.ai_fixes_enabled && !self.has_passed_ai_fix_wait(cipe, at))
    }

    /// A failed CIPE with no AI fix whose completion is older than the wait window.
    fn has_passed_ai_fix_wait(&self, cipe: &Cipe, at: DateTime<Utc>) -> bool {
        let Some(completed_at) = cipe.completed_at else {
            return false;
        };

        cipe.status == CipeStatus::Failed
            && !cipe.has_any_ai_fix()
            && completed_at
                .checked_add_signed(self.ai_fix_wait)
                .is_some_and(|deadline| deadline < at)
    }
}

fn is_announceable(fix: &AiFix) -> bool {
    fix.suggested_fix.is_some() && !fix.awaits_auto_apply_verification()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AiFixStatus, UserAction};
    use crate::notifications::NotificationKind;
    use crate::test_support::*;

    fn engine() -> NotificationEngine {
        NotificationEngine::default()
    }

    fn compare(
        engine: &mut NotificationEngine,
        old: &[Cipe],
        new: &[Cipe],
        setting: NotificationSetting,
    ) -> Vec<Notification> {
        compare_at(engine, old, new, setting, now())
    }

    fn compare_at(
        engine: &mut NotificationEngine,
        old: &[Cipe],
        new: &[Cipe],
        setting: NotificationSetting,
        at: DateTime<Utc>,
    ) -> Vec<Notification> {
        engine.compare(Some(old), new, setting, at, &mut AiFixBadge::new())
    }

    fn kinds(notifications: &[Notification]) -> Vec<NotificationKind> {
        notifications.iter().map(|n| n.kind).collect()
    }

    mod generic_notifications {
        use super::*;

        #[test]
        fn new_success_notifies_with_all_setting() {
            let result = compare(&mut engine(), &[], &[succeeded("a")], NotificationSetting::All);
            assert_eq!(kinds(&result), [NotificationKind::Info]);
            assert_eq!(result[0].message, "CI succeeded for #feature.");
        }

        #[test]
        fn new_success_is_silent_with_errors_setting() {
            let result =
                compare(&mut engine(), &[], &[succeeded("a")], NotificationSetting::Errors);
            assert!(result.is_empty(), "errors setting should hide success");
        }

        #[test]
        fn progress_to_failure_notifies_error() {
            let result = compare(
                &mut engine(),
                &[in_progress("a")],
                &[failed("a")],
                NotificationSetting::Errors,
            );
            assert_eq!(kinds(&result), [NotificationKind::Error]);
            assert_eq!(result[0].message, "CI failed for #feature.");
        }

        #[test]
        fn canceled_and_timed_out_count_as_failures() {
            for status in [CipeStatus::Canceled, CipeStatus::TimedOut] {
                let result = compare(
                    &mut engine(),
                    &[in_progress("a")],
                    &[completed("a", status, 1)],
                    NotificationSetting::Errors,
                );
                assert_eq!(kinds(&result), [NotificationKind::Error], "{status:?}");
            }
        }

        #[test]
        fn failed_run_while_in_progress_notifies_command() {
            let result = compare(
                &mut engine(),
                &[in_progress("a")],
                &[with_failed_run(in_progress("a"), "nx test app")],
                NotificationSetting::Errors,
            );
            assert_eq!(kinds(&result), [NotificationKind::Error]);
            assert_eq!(result[0].message, "\"nx test app\" failed on #feature.");
        }

        #[test]
        fn new_in_progress_cipe_is_silent() {
            let result =
                compare(&mut engine(), &[], &[in_progress("a")], NotificationSetting::All);
            assert!(result.is_empty());
        }

        #[test]
        fn unchanged_snapshot_never_notifies() {
            let snapshot = vec![succeeded("a"), failed("b"), in_progress("c")];
            let result = compare(&mut engine(), &snapshot, &snapshot, NotificationSetting::All);
            assert!(result.is_empty(), "(old, old) must be silent");
        }

        #[test]
        fn none_setting_suppresses_generic_notifications() {
            let result = compare(
                &mut engine(),
                &[in_progress("a")],
                &[failed("a")],
                NotificationSetting::None,
            );
            assert!(result.is_empty());
        }

        #[test]
        fn unknown_status_is_not_eligible() {
            let result = compare(
                &mut engine(),
                &[in_progress("a")],
                &[cipe("a", CipeStatus::Unknown)],
                NotificationSetting::All,
            );
            assert!(result.is_empty());
        }

        #[test]
        fn initial_load_is_silent_but_refreshes_badge() {
            let mut engine = engine();
            let mut badge = AiFixBadge::new();
            let snapshot = vec![failed("a"), with_ai_fix(failed("b"), suggested_fix())];

            let result =
                engine.compare(None, &snapshot, NotificationSetting::All, now(), &mut badge);

            assert!(result.is_empty());
            assert_eq!(badge.count(), 1);
        }
    }

    mod at_most_once {
        use super::*;

        #[test]
        fn success_after_reported_failure_does_not_renotify() {
            let mut engine = engine();
            let first = compare(
                &mut engine,
                &[in_progress("a")],
                &[with_failed_run(in_progress("a"), "nx lint")],
                NotificationSetting::All,
            );
            assert_eq!(first.len(), 1);

            let second = compare(
                &mut engine,
                &[in_progress("a")],
                &[succeeded("a")],
                NotificationSetting::All,
            );
            assert!(second.is_empty(), "settled CIPE must stay silent");
        }

        #[test]
        fn replayed_transition_notifies_once() {
            let mut engine = engine();
            let old = [in_progress("a")];
            let new = [failed("a")];

            assert_eq!(compare(&mut engine, &old, &new, NotificationSetting::All).len(), 1);
            assert!(compare(&mut engine, &old, &new, NotificationSetting::All).is_empty());
            assert!(engine.memory().is_settled("a"));
        }

        #[test]
        fn sequence_of_snapshots_yields_one_generic_notification_per_cipe() {
            let mut engine = engine();
            let snapshots = vec![
                vec![in_progress("a"), in_progress("b")],
                vec![with_failed_run(in_progress("a"), "nx test"), in_progress("b")],
                vec![failed("a"), succeeded("b")],
                vec![succeeded("a"), succeeded("b")],
                vec![succeeded("a"), failed("b"), failed("c")],
                vec![failed("c")],
                vec![],
                vec![failed("c"), failed("a")],
            ];

            let mut previous: Option<Vec<Cipe>> = None;
            let mut all = Vec::new();
            for snapshot in &snapshots {
                all.extend(engine.compare(
                    previous.as_deref(),
                    snapshot,
                    NotificationSetting::All,
                    now(),
                    &mut AiFixBadge::new(),
                ));
                previous = Some(snapshot.clone());
            }

            for id in ["a", "b", "c"] {
                let count = all.iter().filter(|n| n.cipe_id == id).count();
                assert_eq!(count, 1, "CIPE {id} should notify exactly once, got {count}");
            }
        }
    }

    mod ai_fix_wait {
        use super::*;

        fn waiting_failure(minutes: i64) -> Cipe {
            let mut cipe = completed("a", CipeStatus::Failed, minutes);
            cipe.ai_fixes_enabled = true;
            cipe
        }

        #[test]
        fn failure_is_withheld_then_reported_once_window_passes() {
            let mut engine = engine();

            let immediate = compare(
                &mut engine,
                &[],
                &[waiting_failure(1)],
                NotificationSetting::Errors,
            );
            assert!(immediate.is_empty(), "failure should wait for an AI fix");

            let delayed = compare(
                &mut engine,
                &[waiting_failure(1)],
                &[waiting_failure(6)],
                NotificationSetting::Errors,
            );
            assert_eq!(kinds(&delayed), [NotificationKind::Error]);

            let again = compare(
                &mut engine,
                &[waiting_failure(6)],
                &[waiting_failure(7)],
                NotificationSetting::Errors,
            );
            assert!(again.is_empty(), "delayed notification fires once");
        }

        #[test]
        fn unchanged_failure_is_reported_when_time_passes() {
            let mut engine = engine();
            let failure = waiting_failure(1);

            let first = compare_at(
                &mut engine,
                &[],
                &[failure.clone()],
                NotificationSetting::Errors,
                now(),
            );
            assert!(first.is_empty());

            let still_waiting = compare_at(
                &mut engine,
                &[failure.clone()],
                &[failure.clone()],
                NotificationSetting::Errors,
                now() + Duration::minutes(2),
            );
            assert!(still_waiting.is_empty());

            let delayed = compare_at(
                &mut engine,
                &[failure.clone()],
                &[failure],
                NotificationSetting::Errors,
                now() + Duration::minutes(6),
            );
            assert_eq!(kinds(&delayed), [NotificationKind::Error]);
        }

        #[test]
        fn missing_completion_time_keeps_waiting() {
            let mut engine = engine();
            let mut cipe = waiting_failure(10);
            cipe.completed_at = None;

            assert!(compare(&mut engine, &[], &[cipe.clone()], NotificationSetting::All).is_empty());
            let later = compare_at(
                &mut engine,
                &[cipe.clone()],
                &[cipe],
                NotificationSetting::All,
                now() + Duration::hours(1),
            );
            assert!(later.is_empty(), "no completedAt means the window never elapses");
        }

        #[test]
        fn failure_without_ai_fixes_enabled_is_immediate() {
            let result =
                compare(&mut engine(), &[], &[failed("a")], NotificationSetting::Errors);
            assert_eq!(kinds(&result), [NotificationKind::Error]);
        }

        #[test]
        fn pending_fix_suppresses_failure_indefinitely() {
            let mut engine = engine();
            let cipe = with_ai_fix(completed("a", CipeStatus::Failed, 30), pending_fix());

            let result = compare(
                &mut engine,
                &[in_progress("a")],
                &[cipe.clone()],
                NotificationSetting::All,
            );
            assert!(result.is_empty(), "AI fix in the works suppresses failure");

            let later = compare_at(
                &mut engine,
                &[cipe.clone()],
                &[cipe],
                NotificationSetting::All,
                now() + Duration::hours(2),
            );
            assert!(later.is_empty());
        }

        #[test]
        fn custom_wait_window_is_respected() {
            let mut engine = NotificationEngine::new(Duration::minutes(1));
            let result = compare(
                &mut engine,
                &[waiting_failure(0)],
                &[waiting_failure(2)],
                NotificationSetting::Errors,
            );
            assert_eq!(kinds(&result), [NotificationKind::Error]);
        }

        #[test]
        fn far_future_completion_time_keeps_waiting() {
            let completed_at = DateTime::<Utc>::MAX_UTC.timestamp_millis();
            let feed = format!(
                r#"[{{"ciPipelineExecutionId": "a", "status": "FAILED", "aiFixesEnabled": true, "completedAt": {completed_at}}}]"#
            );
            let outcome = crate::source::parse_feed(&feed).unwrap();

            let result = compare(
                &mut engine(),
                &[in_progress("a")],
                outcome.cipes_or_empty(),
                NotificationSetting::All,
            );
            assert!(result.is_empty(), "deadline past the calendar never elapses");
        }

        #[test]
        fn unbounded_wait_window_never_elapses() {
            let mut engine = NotificationEngine::new(Duration::MAX);
            let result = compare_at(
                &mut engine,
                &[waiting_failure(0)],
                &[waiting_failure(10)],
                NotificationSetting::Errors,
                DateTime::<Utc>::MAX_UTC,
            );
            assert!(result.is_empty());
        }
    }

    mod ai_fix_notifications {
        use super::*;

        #[test]
        fn new_suggestion_takes_precedence_over_failure() {
            let mut engine = engine();
            let result = compare(
                &mut engine,
                &[in_progress("a")],
                &[with_ai_fix(failed("a"), suggested_fix())],
                NotificationSetting::Errors,
            );

            assert_eq!(kinds(&result), [NotificationKind::AiFix]);
            assert_eq!(result[0].message, "CI failed. Cloud AI has a fix for #feature");
            assert!(engine.memory().is_settled("a"));
        }

        #[test]
        fn suggestion_appearing_later_notifies_once() {
            let mut engine = engine();
            let waiting = with_ai_fix(failed("a"), pending_fix());
            let ready = with_ai_fix(failed("a"), suggested_fix());

            assert!(compare(&mut engine, &[in_progress("a")], &[waiting.clone()], NotificationSetting::All)
                .is_empty());
            let result = compare(&mut engine, &[waiting], &[ready.clone()], NotificationSetting::All);
            assert_eq!(kinds(&result), [NotificationKind::AiFix]);

            let repeat = compare(&mut engine, &[ready.clone()], &[ready], NotificationSetting::All);
            assert!(repeat.is_empty());
        }

        #[test]
        fn suggestion_for_cipe_missing_from_old_snapshot() {
            let result = compare(
                &mut engine(),
                &[],
                &[with_ai_fix(failed("a"), suggested_fix())],
                NotificationSetting::Errors,
            );
            assert_eq!(kinds(&result), [NotificationKind::AiFix]);
        }

        #[test]
        fn fires_even_when_notifications_are_disabled() {
            let result = compare(
                &mut engine(),
                &[in_progress("a")],
                &[with_ai_fix(failed("a"), suggested_fix())],
                NotificationSetting::None,
            );
            assert_eq!(kinds(&result), [NotificationKind::AiFix]);
        }

        #[test]
        fn skipped_for_already_settled_cipe() {
            let mut engine = engine();
            let failure = compare(&mut engine, &[in_progress("a")], &[failed("a")], NotificationSetting::All);
            assert_eq!(failure.len(), 1);

            let result = compare(
                &mut engine,
                &[failed("a")],
                &[with_ai_fix(failed("a"), suggested_fix())],
                NotificationSetting::All,
            );
            assert!(result.is_empty(), "settled CIPE gets no AI fix notification");
        }

        #[test]
        fn suggestion_with_not_started_status_is_ignored() {
            let mut fix = suggested_fix();
            fix.suggested_fix_status = AiFixStatus::NotStarted;

            let result = compare(
                &mut engine(),
                &[in_progress("a")],
                &[with_ai_fix(failed("a"), fix)],
                NotificationSetting::All,
            );
            assert!(result.is_empty());
        }

        #[test]
        fn multiple_run_groups_produce_one_notification() {
            let mut cipe = with_ai_fix(failed("a"), suggested_fix());
            let mut second = run_group("windows", vec![run("run-2", Some(CipeStatus::Failed))]);
            second.ai_fix = Some(suggested_fix());
            cipe.run_groups.push(second);

            let result =
                compare(&mut engine(), &[in_progress("a")], &[cipe], NotificationSetting::All);
            assert_eq!(kinds(&result), [NotificationKind::AiFix]);
        }

        #[test]
        fn applied_fix_and_new_suggestion_in_one_cycle() {
            let mut engine = engine();
            let old = with_ai_fix(failed("a"), suggested_fix());

            let mut applied_fix = suggested_fix();
            applied_fix.user_action = UserAction::Applied;
            let mut new = with_ai_fix(failed("a"), applied_fix);
            let mut second = run_group("windows", vec![run("run-2", Some(CipeStatus::Failed))]);
            second.ai_fix = Some(suggested_fix());
            new.run_groups.push(second);

            let result = compare(&mut engine, &[old], &[new], NotificationSetting::All);
            assert_eq!(
                kinds(&result),
                [NotificationKind::FixApplied, NotificationKind::AiFix]
            );
        }

        #[test]
        fn auto_apply_waits_for_verification() {
            let mut engine = engine();
            let mut unverified = suggested_fix();
            unverified.could_auto_apply_tasks = true;
            unverified.verification_status = AiFixStatus::InProgress;
            let mut verified = unverified.clone();
            verified.verification_status = AiFixStatus::Completed;

            let before = with_ai_fix(failed("a"), unverified);
            let after = with_ai_fix(failed("a"), verified);

            let deferred = compare(&mut engine, &[in_progress("a")], &[before.clone()], NotificationSetting::All);
            assert!(deferred.is_empty(), "unverified auto-apply fix is deferred");

            let result = compare(&mut engine, &[before], &[after], NotificationSetting::All);
            assert_eq!(kinds(&result), [NotificationKind::AiFix]);
        }

        #[test]
        fn applied_fix_notifies_once() {
            let mut engine = engine();
            let ready = with_ai_fix(failed("a"), suggested_fix());
            let mut applied_fix = suggested_fix();
            applied_fix.user_action = UserAction::AppliedAutomatically;
            let applied = with_ai_fix(failed("a"), applied_fix);

            let first = compare(&mut engine, &[in_progress("a")], &[ready.clone()], NotificationSetting::All);
            assert_eq!(kinds(&first), [NotificationKind::AiFix]);

            let result = compare(&mut engine, &[ready], &[applied.clone()], NotificationSetting::All);
            assert_eq!(kinds(&result), [NotificationKind::FixApplied]);
            assert_eq!(result[0].message, "Cloud automatically applied a fix for #feature");

            let repeat = compare(&mut engine, &[applied.clone()], &[applied], NotificationSetting::All);
            assert!(repeat.is_empty());
        }

        #[test]
        fn rejected_fix_is_silent() {
            let mut engine = engine();
            let ready = with_ai_fix(failed("a"), suggested_fix());
            let mut rejected_fix = suggested_fix();
            rejected_fix.user_action = UserAction::Rejected;

            compare(&mut engine, &[in_progress("a")], &[ready.clone()], NotificationSetting::All);
            let result = compare(
                &mut engine,
                &[ready],
                &[with_ai_fix(failed("a"), rejected_fix)],
                NotificationSetting::All,
            );
            assert!(result.is_empty());
        }
    }

    #[test]
    fn test_badge_refreshes_when_notifications_disabled() {
        let mut engine = engine();
        let mut badge = AiFixBadge::new();
        let snapshot = vec![with_ai_fix(failed("a"), suggested_fix())];

        let result =
            engine.compare(Some(&[][..]), &snapshot, NotificationSetting::None, now(), &mut badge);

        assert_eq!(badge.count(), 1);
        assert_eq!(kinds(&result), [NotificationKind::AiFix]);
    }
}
