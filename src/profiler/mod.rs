//! Named stopwatch for timing render sections.
//!
//! Purely observational: timing never changes what gets rendered or cached.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

/// A completed timing period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopwatchEvent {
    pub name: String,
    pub category: String,
    pub duration: Duration,
}

#[derive(Debug)]
struct Running {
    category: String,
    started: Instant,
}

/// Collects start/stop timings keyed by event name.
///
/// # Examples
///
/// ```
/// use rendercache::profiler::Stopwatch;
///
/// let stopwatch = Stopwatch::new();
/// stopwatch.start("render", "template");
/// let event = stopwatch.stop("render").unwrap();
/// assert_eq!(event.category, "template");
/// assert_eq!(stopwatch.events().len(), 1);
/// assert!(stopwatch.stop("render").is_none());
/// ```
#[derive(Debug, Default)]
pub struct Stopwatch {
    running: DashMap<String, Running>,
    finished: DashMap<String, Vec<StopwatchEvent>>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the timer for `name`.
    pub fn start(&self, name: &str, category: &str) {
        self.running.insert(
            name.to_owned(),
            Running {
                category: category.to_owned(),
                started: Instant::now(),
            },
        );
    }

    /// Stops the timer for `name` and records the period.
    ///
    /// Returns `None` if `name` was never started.
    pub fn stop(&self, name: &str) -> Option<StopwatchEvent> {
        let Some((name, running)) = self.running.remove(name) else {
            warn!(event = name, "stopwatch stopped without being started");
            return None;
        };

        let event = StopwatchEvent {
            name,
            category: running.category,
            duration: running.started.elapsed(),
        };
        debug!(
            event = %event.name,
            category = %event.category,
            elapsed = ?event.duration,
            "stopwatch event"
        );

        self.finished
            .entry(event.name.clone())
            .or_default()
            .push(event.clone());
        Some(event)
    }

    /// Returns `true` while `name` is being timed.
    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains_key(name)
    }

    /// All recorded periods, grouped by name in no particular order.
    pub fn events(&self) -> Vec<StopwatchEvent> {
        self.finished
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// Sum of all recorded periods for `name`.
    pub fn total(&self, name: &str) -> Duration {
        self.finished
            .get(name)
            .map(|events| events.iter().map(|e| e.duration).sum())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_periods_accumulate() {
        let stopwatch = Stopwatch::new();
        for _ in 0..3 {
            stopwatch.start("render", "template");
            assert!(stopwatch.is_running("render"));
            stopwatch.stop("render");
        }
        assert!(!stopwatch.is_running("render"));
        assert_eq!(stopwatch.events().len(), 3);
        let sum: Duration = stopwatch.events().iter().map(|e| e.duration).sum();
        assert_eq!(stopwatch.total("render"), sum);
    }

    #[test]
    fn unknown_event_has_zero_total() {
        let stopwatch = Stopwatch::new();
        assert_eq!(stopwatch.total("nothing"), Duration::ZERO);
        assert!(stopwatch.stop("nothing").is_none());
    }
}
