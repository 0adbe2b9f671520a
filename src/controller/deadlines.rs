use tokio::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expired {
    HideNotification,
    RestoreCopyLabel(String),
}

/// Pending UI timeouts. One slot per kind: re-arming replaces the previous
/// deadline instead of queueing another one.
#[derive(Debug, Default)]
pub struct Deadlines {
    hide_notification: Option<Instant>,
    restore_copy_label: Option<(Instant, String)>,
}

impl Deadlines {
    pub fn arm_notification(&mut self, at: Instant) {
        self.hide_notification = Some(at);
    }

    /// Keeps the label captured by an earlier, still pending, arm so a double
    /// click does not make "Copied!" the label to restore.
    pub fn arm_copy_label(&mut self, at: Instant, label: String) {
        let label = match self.restore_copy_label.take() {
            Some((_, pending)) => pending,
            None => label,
        };
        self.restore_copy_label = Some((at, label));
    }

    pub fn next(&self) -> Option<Instant> {
        let copy = self.restore_copy_label.as_ref().map(|(at, _)| *at);
        match (self.hide_notification, copy) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn take_due(&mut self, now: Instant) -> Vec<Expired> {
        let mut expired = Vec::new();
        if self.hide_notification.is_some_and(|at| at <= now) {
            self.hide_notification = None;
            expired.push(Expired::HideNotification);
        }
        if self
            .restore_copy_label
            .as_ref()
            .is_some_and(|(at, _)| *at <= now)
        {
            if let Some((_, label)) = self.restore_copy_label.take() {
                expired.push(Expired::RestoreCopyLabel(label));
            }
        }
        expired
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
