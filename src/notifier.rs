//! User-visible notices via notify-rust (D-Bus).
//!
//! Every failure a channel absorbs still surfaces here; the desktop
//! notification itself is best-effort.

use notify_rust::Notification;
use tracing::{debug, warn};

pub struct Notifier {
    enabled: bool,
}

impl Notifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn notice(&self, summary: &str, body: &str) {
        debug!("Notice: {summary} — {body}");

        if !self.enabled {
            return;
        }

        if let Err(e) = Notification::new()
            .summary(summary)
            .body(body)
            .icon("video-display")
            .timeout(3000)
            .show()
        {
            warn!("Failed to show notification: {e}");
        }
    }
}
