use std::collections::HashSet;

/// CIPE ids that have already produced a notification.
///
/// Ids are never removed during the process lifetime. Restarting the process
/// clears the history.
#[derive(Debug, Default)]
pub struct NotificationMemory {
    settled: HashSet<String>,
}

impl NotificationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_settled(&self, cipe_id: &str) -> bool {
        self.settled.contains(cipe_id)
    }

    /// Marks the id as notified. Returns `false` if it already was.
    pub fn settle(&mut self, cipe_id: &str) -> bool {
        self.settled.insert(cipe_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.settled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settled.is_empty()
    }
}
