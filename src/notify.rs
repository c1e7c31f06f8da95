use tracing::warn;

/// User-visible notifications (toasts). Delivery belongs to the host application.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// Writes notifications to the log; used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        warn!(target: "notify", "{}", message);
    }
}
