mod console;
mod status;
mod styling;
mod tables;

pub use console::ConsolePresenter;
pub use status::{print_notifications, print_status, render_notification, render_status};
pub use styling::{muted, Tone};

/// Prints the `cipewatch` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        Tone::AiFix.paint("📡 cipewatch"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("CI Pipeline Execution Watcher")
    );
}
