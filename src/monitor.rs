use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::model::Cipe;
use crate::notifications::{Notification, NotificationEngine, NotificationSetting};
use crate::source::{FetchError, FetchOutcome};
use crate::status::{AiFixBadge, AiFixSummary};
use crate::view::{OnboardingInfo, ViewState, ViewStateMachine};

/// Outbound side of the monitor: whatever renders views, notifications and badges.
pub trait Presenter {
    fn set_view(&mut self, view: ViewState);

    fn notify(&mut self, notification: &Notification);

    fn set_badge(&mut self, summary: &AiFixSummary);

    /// Latest fetch error, or `None` once a fetch succeeds again.
    fn set_error_context(&mut self, error: Option<&FetchError>);
}

/// Single writer for everything derived from fetched snapshots.
///
/// Each fetch result goes through [`CloudMonitor::apply_fetch`] in fetch order.
/// The monitor keeps the last good snapshot, runs the notification engine and
/// the view state machine on it, and forwards changes to the presenter.
pub struct CloudMonitor<P> {
    presenter: P,
    engine: NotificationEngine,
    view: ViewStateMachine,
    badge: AiFixBadge,
    recent_cipes: Option<Vec<Cipe>>,
    workspace_url: Option<String>,
    last_error: Option<FetchError>,
}

impl<P: Presenter> CloudMonitor<P> {
    pub fn new(presenter: P, engine: NotificationEngine) -> Self {
        Self {
            presenter,
            engine,
            view: ViewStateMachine::new(),
            badge: AiFixBadge::new(),
            recent_cipes: None,
            workspace_url: None,
            last_error: None,
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    pub fn view(&self) -> ViewState {
        self.view.current()
    }

    pub fn recent_cipes(&self) -> Option<&[Cipe]> {
        self.recent_cipes.as_deref()
    }

    pub fn workspace_url(&self) -> Option<&str> {
        self.workspace_url.as_deref()
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn badge(&self) -> &AiFixSummary {
        self.badge.summary()
    }

    /// Applies one fetch result.
    ///
    /// A result carrying an error only updates the error context: the previous
    /// snapshot is kept and no notification is evaluated.
    pub fn apply_fetch(
        &mut self,
        outcome: FetchOutcome,
        setting: NotificationSetting,
        now: DateTime<Utc>,
    ) -> Vec<Notification> {
        if let Some(error) = outcome.error {
            if error.is_authentication() {
                warn!("Cloud authentication failed, notifications paused: {}", error.message);
            } else {
                warn!("Keeping previous CIPEs after fetch error: {error}");
            }
            self.presenter.set_error_context(Some(&error));
            self.last_error = Some(error);
            return Vec::new();
        }

        if self.last_error.take().is_some() {
            info!("CIPE fetch recovered");
            self.presenter.set_error_context(None);
        }

        if outcome.workspace_url.is_some() {
            self.workspace_url = outcome.workspace_url;
        }

        let cipes = outcome.info.unwrap_or_default();
        debug!("Applying snapshot with {} CIPEs", cipes.len());

        let previous_badge = self.badge.summary().clone();
        let notifications = self.engine.compare(
            self.recent_cipes.as_deref(),
            &cipes,
            setting,
            now,
            &mut self.badge,
        );
        if *self.badge.summary() != previous_badge {
            self.presenter.set_badge(self.badge.summary());
        }

        if let Some(view) = self.view.update_recent_cipes(cipes.clone()) {
            self.presenter.set_view(view);
        }
        self.recent_cipes = Some(cipes);

        for notification in &notifications {
            self.presenter.notify(notification);
        }

        notifications
    }

    pub fn apply_onboarding(&mut self, info: OnboardingInfo) {
        debug!("Onboarding info updated: {info:?}");
        if let Some(view) = self.view.update_onboarding(info) {
            self.presenter.set_view(view);
        }
    }
}
