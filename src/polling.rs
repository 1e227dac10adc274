use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};

use crate::model::Cipe;
use crate::source::{CipeSource, FetchOutcome};

/// Adaptive refresh interval classes, from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollingTier {
    /// Authentication failed, wait for the user to log in again
    Sleep,
    /// Nothing is running
    Cold,
    /// A CIPE is in progress
    Hot,
    /// An AI fix is being generated or verified
    AiFix,
}

impl PollingTier {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sleep => "SLEEP",
            Self::Cold => "COLD",
            Self::Hot => "HOT",
            Self::AiFix => "AI FIX",
        }
    }
}

/// Interval used for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingTiers {
    pub sleep: Duration,
    pub cold: Duration,
    pub hot: Duration,
    pub ai_fix: Duration,
}

impl Default for PollingTiers {
    fn default() -> Self {
        Self {
            sleep: Duration::from_secs(60 * 60),
            cold: Duration::from_secs(3 * 60),
            hot: Duration::from_secs(10),
            ai_fix: Duration::from_secs(3),
        }
    }
}

impl PollingTiers {
    pub fn interval(&self, tier: PollingTier) -> Duration {
        match tier {
            PollingTier::Sleep => self.sleep,
            PollingTier::Cold => self.cold,
            PollingTier::Hot => self.hot,
            PollingTier::AiFix => self.ai_fix,
        }
    }

    pub fn describe(&self, tier: PollingTier) -> String {
        format!("{} ({})", tier.name(), format_interval(self.interval(tier)))
    }
}

/// The only mutable polling state: which tier the next wait uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingContext {
    pub tier: PollingTier,
}

impl Default for PollingContext {
    fn default() -> Self {
        Self {
            tier: PollingTier::Cold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Waiting,
    Polling,
}

/// Tier decision for one fetch result together with the reason for logging.
///
/// Returns `None` when the result carries a non-authentication error; the
/// current tier is kept in that case.
pub fn next_tier(outcome: &FetchOutcome) -> Option<(PollingTier, &'static str)> {
    if let Some(error) = &outcome.error {
        if error.is_authentication() {
            return Some((PollingTier::Sleep, "authentication error"));
        }
        return None;
    }

    Some(tier_for_cipes(outcome.cipes_or_empty()))
}

/// Tier implied by a snapshot alone. In-progress CIPEs take precedence over AI fixes.
pub fn tier_for_cipes(cipes: &[Cipe]) -> (PollingTier, &'static str) {
    if cipes.iter().any(Cipe::is_in_progress) {
        (PollingTier::Hot, "CIPE in progress")
    } else if cipes.iter().any(Cipe::has_any_ai_fix) {
        (PollingTier::AiFix, "AI fix in progress")
    } else {
        (PollingTier::Cold, "default")
    }
}

/// Drives the data source one fetch at a time and adapts its own interval.
///
/// The scheduler never runs two fetches concurrently: [`PollingScheduler::poll`]
/// takes `&mut self`, so the `Polling` state is held for the whole fetch.
pub struct PollingScheduler<S> {
    source: S,
    tiers: PollingTiers,
    context: PollingContext,
    state: SchedulerState,
}

impl<S: CipeSource> PollingScheduler<S> {
    /// Creates a scheduler in the `Polling` state so the first fetch happens immediately.
    pub fn new(source: S, tiers: PollingTiers) -> Self {
        Self {
            source,
            tiers,
            context: PollingContext::default(),
            state: SchedulerState::Polling,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn tier(&self) -> PollingTier {
        self.context.tier
    }

    /// Time to wait before the next regular fetch.
    pub fn interval(&self) -> Duration {
        self.tiers.interval(self.context.tier)
    }

    /// Fetches once, adjusts the tier and returns to `Waiting`.
    ///
    /// Returns `None` when the source itself failed; the tier is left unchanged
    /// and polling continues on the next tick.
    pub async fn poll(&mut self) -> Option<FetchOutcome> {
        self.state = SchedulerState::Polling;
        let result = self.source.fetch_recent().await;
        self.state = SchedulerState::Waiting;

        match result {
            Ok(outcome) => {
                self.adjust_tier(&outcome);
                Some(outcome)
            }
            Err(e) => {
                warn!("Failed to fetch recent CIPEs: {e}");
                None
            }
        }
    }

    fn adjust_tier(&mut self, outcome: &FetchOutcome) {
        let Some((tier, reason)) = next_tier(outcome) else {
            debug!(
                "Keeping {} polling after fetch error",
                self.tiers.describe(self.context.tier)
            );
            return;
        };

        if tier != self.context.tier {
            info!(
                "Polling frequency changed from {} to {} (reason: {reason})",
                self.tiers.describe(self.context.tier),
                self.tiers.describe(tier)
            );
            self.context.tier = tier;
        }
    }
}

fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        plural(secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        plural(secs / 60, "minute")
    } else if secs > 0 {
        plural(secs, "second")
    } else {
        format!("{}ms", interval.as_millis())
    }
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

impl fmt::Display for PollingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
