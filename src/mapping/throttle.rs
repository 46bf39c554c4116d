//! Pulse throttle: named-timer debouncer for held inputs

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Last emission instant per action class
///
/// Entries are created on first emission and never removed; the key space is
/// the fixed set of throttle classes in the mapping table. Uses the monotonic
/// clock, so wall-clock adjustments neither stall nor burst emissions.
#[derive(Debug, Default, Clone)]
pub struct ThrottleRegistry {
    last_emission: HashMap<String, Instant>,
}

impl ThrottleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true at most once per `window` for `class`
    ///
    /// The window is closed at both ends: a pulse landing exactly `window`
    /// after the last emission is still throttled.
    pub fn pulse(&mut self, class: &str, window: Duration) -> bool {
        self.pulse_at(class, window, Instant::now())
    }

    /// Same as [`pulse`](Self::pulse) with an explicit clock reading
    pub fn pulse_at(&mut self, class: &str, window: Duration, now: Instant) -> bool {
        match self.last_emission.get_mut(class) {
            Some(last) => {
                let elapsed = now.saturating_duration_since(*last);
                if elapsed <= window {
                    debug!(
                        "Throttled {} ({}ms of {}ms elapsed)",
                        class,
                        elapsed.as_millis(),
                        window.as_millis()
                    );
                    return false;
                }
                *last = now;
                true
            }
            None => {
                self.last_emission.insert(class.to_owned(), now);
                true
            }
        }
    }

    pub fn last_emission(&self, class: &str) -> Option<Instant> {
        self.last_emission.get(class).copied()
    }

    pub fn len(&self) -> usize {
        self.last_emission.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_emission.is_empty()
    }
}
