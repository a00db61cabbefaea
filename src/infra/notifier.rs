use std::io::Write;

use crate::usecases::contracts::Notifier;

const NOTIFICATION_DISPLAYED: &str = "NOTIFICATION_DISPLAYED";
const NOTIFICATION_SUPPRESSED: &str = "NOTIFICATION_SUPPRESSED";

/// Writes notifications as `[title] body` lines.
pub struct ConsoleNotifier<W: Write> {
    enabled: bool,
    out: std::cell::RefCell<W>,
}

impl ConsoleNotifier<std::io::Stdout> {
    pub fn stdout(enabled: bool) -> Self {
        Self::new(std::io::stdout(), enabled)
    }
}

impl<W: Write> ConsoleNotifier<W> {
    pub fn new(out: W, enabled: bool) -> Self {
        Self {
            enabled,
            out: std::cell::RefCell::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> Notifier for ConsoleNotifier<W> {
    fn display_simple_notification(
        &self,
        title: &str,
        body: &str,
        should_alert: bool,
        chat_id: &str,
    ) {
        if !self.enabled {
            tracing::debug!(
                code = NOTIFICATION_SUPPRESSED,
                chat_id,
                "notifications disabled in config"
            );
            return;
        }

        tracing::info!(
            code = NOTIFICATION_DISPLAYED,
            chat_id,
            should_alert,
            "displaying notification"
        );

        let mut out = self.out.borrow_mut();
        if let Err(error) = writeln!(out, "[{title}] {body}") {
            tracing::warn!(error = %error, chat_id, "failed to write notification");
        }
    }
}
