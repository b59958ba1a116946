use chrono::{Local, NaiveTime};

/// Distance from the bottom, in viewport units, within which the viewport
/// still counts as following the tail.
pub const BOTTOM_THRESHOLD: f64 = 50.0;

/// Append-only operator log. Entries are timestamped at append time and
/// never truncated or rotated; callers that need a cap must impose one at
/// the presentation layer.
#[derive(Debug, Default)]
pub struct LogBuffer {
    text: String,
    entries: u64,
}

impl LogBuffer {
    /// Append one entry and return it (without the trailing newline).
    pub fn push(&mut self, message: &str) -> String {
        let entry = format_entry(Local::now().time(), message);
        self.text.push_str(&entry);
        self.text.push('\n');
        self.entries += 1;
        entry
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }
}

pub fn format_entry(time: NaiveTime, message: &str) -> String {
    format!("[{}] {message}", time.format("%H:%M:%S"))
}

/// Viewport geometry reported by the presentation layer. Units are
/// whatever the viewport measures in, as long as all three agree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

/// Follow-the-tail policy for the log viewport: new output moves the
/// viewport only while it was already at or near the bottom, so an
/// operator reading older entries is not interrupted.
#[derive(Debug, Clone)]
pub struct Autoscroll {
    threshold: f64,
    at_bottom: bool,
}

impl Default for Autoscroll {
    fn default() -> Self {
        Self::new(BOTTOM_THRESHOLD)
    }
}

impl Autoscroll {
    /// Starts out following the tail, matching a freshly mounted viewport
    /// scrolled to the bottom.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            at_bottom: true,
        }
    }

    /// Recompute the tail flag from a manual scroll.
    pub fn observe_scroll(&mut self, metrics: ScrollMetrics) {
        self.at_bottom = metrics.scroll_top + metrics.viewport_height
            >= metrics.content_height - self.threshold;
    }

    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    /// Offset to scroll to after an append, given post-append geometry.
    /// `None` leaves the viewport untouched.
    pub fn target_after_append(&self, metrics: ScrollMetrics) -> Option<f64> {
        self.at_bottom
            .then(|| (metrics.content_height - metrics.viewport_height).max(0.0))
    }
}
