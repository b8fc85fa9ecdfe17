use std::time::Duration;

use tokio::time::Instant;

/// Trailing-edge debounce with an upper bound.
///
/// Fires `window` after the latest touch, but never later than `max_wait` after the first
/// touch of a burst.
#[derive(Clone, Debug)]
pub struct Debounce {
    window: Duration,
    max_wait: Duration,
    first: Option<Instant>,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration, max_wait: Duration) -> Self {
        Self {
            window,
            max_wait: max_wait.max(window),
            first: None,
            last: None,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.first.get_or_insert(now);
        self.last = Some(now);
    }

    pub fn deadline(&self) -> Option<Instant> {
        let (first, last) = (self.first?, self.last?);
        Some((last + self.window).min(first + self.max_wait))
    }

    /// `true` when the max-wait bound, not the quiet window, sets the deadline.
    pub fn is_capped(&self) -> bool {
        match (self.first, self.last) {
            (Some(first), Some(last)) => first + self.max_wait < last + self.window,
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.first.is_some()
    }

    pub fn reset(&mut self) {
        self.first = None;
        self.last = None;
    }
}
