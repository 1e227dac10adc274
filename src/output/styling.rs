use std::fmt::Display;

use console::{style, StyledObject};

use crate::notifications::NotificationKind;

/// Role a piece of terminal output plays. Each tone has one fixed style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Heading,
    Muted,
    Accent,
    Warning,
    Failure,
    Success,
    AiFix,
}

impl Tone {
    pub fn paint(self, text: impl Display) -> StyledObject<String> {
        let text = style(text.to_string());
        match self {
            Tone::Heading => text.bright(),
            Tone::Muted => text.dim(),
            Tone::Accent => text.cyan(),
            Tone::Warning => text.bright().yellow(),
            Tone::Failure => text.bright().red(),
            Tone::Success => text.bright().green(),
            Tone::AiFix => text.magenta().bold(),
        }
    }
}

impl From<NotificationKind> for Tone {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Info | NotificationKind::FixApplied => Tone::Success,
            NotificationKind::Error => Tone::Failure,
            NotificationKind::AiFix => Tone::AiFix,
        }
    }
}

/// Bracketed tag that prefixes a rendered notification, e.g. `[ai-fix]`.
pub fn kind_tag(kind: NotificationKind) -> String {
    let label = match kind {
        NotificationKind::Info => "info",
        NotificationKind::Error => "error",
        NotificationKind::AiFix => "ai-fix",
        NotificationKind::FixApplied => "fix-applied",
    };
    format!("[{}]", Tone::from(kind).paint(label))
}

pub fn muted(text: impl Display) -> StyledObject<String> {
    Tone::Muted.paint(text)
}
