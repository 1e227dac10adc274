use crate::model::Cipe;

/// Snapshot-derived summary of AI fixes waiting for the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiFixSummary {
    /// Run groups whose suggested fix has not been applied or rejected yet
    pub count: usize,
    /// First actionable fix in snapshot order, as `(cipe id, run group id)`
    pub first: Option<(String, String)>,
    /// Human-readable tooltip for the first fix
    pub message: Option<String>,
}

impl AiFixSummary {
    /// Derives the summary from the latest snapshot only.
    pub fn from_cipes(cipes: &[Cipe]) -> Self {
        let actionable: Vec<_> = cipes
            .iter()
            .flat_map(|cipe| cipe.run_groups.iter().map(move |group| (cipe, group)))
            .filter(|(_, group)| group.ai_fix.as_ref().is_some_and(|fix| fix.is_actionable()))
            .collect();

        let first = actionable.first();

        Self {
            count: actionable.len(),
            first: first.map(|(cipe, group)| (cipe.id.clone(), group.run_group.clone())),
            message: first.map(|(cipe, _)| ai_fix_message(&cipe.branch)),
        }
    }

    pub fn has_fix(&self) -> bool {
        self.count > 0
    }

    /// Short label for a status bar item.
    pub fn label(&self) -> Option<String> {
        match self.count {
            0 => None,
            1 => Some("Cloud AI Fix".to_string()),
            n => Some(format!("Cloud AI Fixes ({n})")),
        }
    }
}

pub fn ai_fix_message(branch: &str) -> String {
    format!("CI failed. Cloud AI has a fix for #{branch}")
}

/// Status bar badge owned by the monitor and refreshed on every snapshot.
#[derive(Debug, Default)]
pub struct AiFixBadge {
    summary: AiFixSummary,
}

impl AiFixBadge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the badge, returning `true` when it changed.
    pub fn refresh(&mut self, cipes: &[Cipe]) -> bool {
        let summary = AiFixSummary::from_cipes(cipes);
        if summary == self.summary {
            return false;
        }
        self.summary = summary;
        true
    }

    pub fn summary(&self) -> &AiFixSummary {
        &self.summary
    }

    pub fn count(&self) -> usize {
        self.summary.count
    }
}
