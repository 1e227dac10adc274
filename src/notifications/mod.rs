pub mod engine;
pub mod memory;
pub mod notification;

pub use engine::{NotificationEngine, DEFAULT_AI_FIX_WAIT_SECS};
pub use memory::NotificationMemory;
pub use notification::{Notification, NotificationAction, NotificationKind, NotificationSetting};
