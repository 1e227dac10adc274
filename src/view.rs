use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::Cipe;

/// Which cloud panel should be visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewState {
    Loading,
    Onboarding,
    RecentCipe,
}

impl ViewState {
    pub fn id(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Onboarding => "onboarding",
            Self::RecentCipe => "recent-cipe",
        }
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Cloud onboarding progress for the workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingInfo {
    /// `None` when the claim check itself could not be performed
    #[serde(default)]
    pub is_workspace_claimed: Option<bool>,
    #[serde(default)]
    pub is_connected_to_cloud: bool,
    #[serde(default, rename = "hasNxInCI")]
    pub has_nx_in_ci: bool,
}

impl OnboardingInfo {
    /// All onboarding steps are done. An unknown claim state counts as claimed.
    pub fn is_complete(&self) -> bool {
        self.is_workspace_claimed.unwrap_or(true) && self.is_connected_to_cloud && self.has_nx_in_ci
    }
}

/// Pure view derivation from the latest known facts.
///
/// `recent_cipes` is `None` until the first snapshot has been loaded.
pub fn derive_view(onboarding: Option<&OnboardingInfo>, recent_cipes: Option<&[Cipe]>) -> ViewState {
    let has_recent_cipes = recent_cipes.is_some_and(|cipes| !cipes.is_empty());
    let onboarding_complete = onboarding.is_some_and(OnboardingInfo::is_complete);

    if has_recent_cipes || onboarding_complete {
        ViewState::RecentCipe
    } else if onboarding.is_some() {
        ViewState::Onboarding
    } else {
        ViewState::Loading
    }
}

/// Tracks the visible view and reports only real changes.
///
/// The view is recomputed from scratch on every input instead of being patched
/// incrementally.
#[derive(Debug)]
pub struct ViewStateMachine {
    onboarding: Option<OnboardingInfo>,
    recent_cipes: Option<Vec<Cipe>>,
    current: ViewState,
}

impl Default for ViewStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStateMachine {
    pub fn new() -> Self {
        Self {
            onboarding: None,
            recent_cipes: None,
            current: ViewState::Loading,
        }
    }

    pub fn current(&self) -> ViewState {
        self.current
    }

    /// Records new onboarding info, returning the new view if it changed.
    pub fn update_onboarding(&mut self, info: OnboardingInfo) -> Option<ViewState> {
        self.onboarding = Some(info);
        self.recompute()
    }

    /// Records the latest CIPE list, returning the new view if it changed.
    pub fn update_recent_cipes(&mut self, cipes: Vec<Cipe>) -> Option<ViewState> {
        self.recent_cipes = Some(cipes);
        self.recompute()
    }

    fn recompute(&mut self) -> Option<ViewState> {
        let next = derive_view(self.onboarding.as_ref(), self.recent_cipes.as_deref());
        if next == self.current {
            return None;
        }

        debug!("Cloud view changed from {} to {next}", self.current);
        self.current = next;
        Some(next)
    }
}
