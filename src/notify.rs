//! User-visible sync status notifications.

use tracing::info;

/// Boundary to the UI's snackbar (or equivalent). Implementations must be
/// cheap and non-blocking; the sync core calls this from async context.
pub trait Notifier: Send + Sync {
  fn notify(&self, message: &str);
}

/// Default notifier that routes messages to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn notify(&self, message: &str) {
    info!(message, "sync notification");
  }
}
