use chrono::Local;

use crate::monitor::Presenter;
use crate::notifications::Notification;
use crate::source::FetchError;
use crate::status::AiFixSummary;
use crate::view::ViewState;

use super::status::render_notification;
use super::styling::{muted, Tone};

/// Presenter for `cipewatch watch`: one timestamped line per event on stdout.
#[derive(Debug, Default)]
pub struct ConsolePresenter;

impl ConsolePresenter {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, line: impl std::fmt::Display) {
        println!("{} {line}", muted(Local::now().format("%H:%M:%S")));
    }
}

impl Presenter for ConsolePresenter {
    fn set_view(&mut self, view: ViewState) {
        self.emit(format!("{} {}", muted("view"), Tone::Accent.paint(view)));
    }

    fn notify(&mut self, notification: &Notification) {
        self.emit(render_notification(notification));
    }

    fn set_badge(&mut self, summary: &AiFixSummary) {
        match summary.label() {
            Some(label) => self.emit(format!(
                "{} {}",
                Tone::AiFix.paint(label),
                muted(summary.message.as_deref().unwrap_or_default())
            )),
            None => self.emit(muted("No AI fixes awaiting review")),
        }
    }

    fn set_error_context(&mut self, error: Option<&FetchError>) {
        match error {
            Some(error) if error.is_authentication() => self.emit(format!(
                "{} {}",
                Tone::Failure.paint("authentication error, polling paused:"),
                error.message
            )),
            Some(error) => self.emit(format!("{} {error}", Tone::Warning.paint("fetch failed:"))),
            None => self.emit(muted("fetch recovered")),
        }
    }
}
