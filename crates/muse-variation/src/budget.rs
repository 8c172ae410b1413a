// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tracks how much of a variation's generation budget has been spent.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fraction of a limit at which [`BudgetTracker::check`] starts reporting
/// [`BudgetStatus::Warning`] instead of [`BudgetStatus::WithinLimits`].
const WARNING_THRESHOLD: f64 = 0.8;

/// Caps on a single variation's generation. Any field left `None` is
/// unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BudgetLimit {
    /// Maximum number of phrases the pipeline may emit.
    pub max_phrases: Option<u32>,
    /// Maximum wall-clock time generation may run for.
    pub max_duration: Option<Duration>,
}

/// Running counters against a [`BudgetLimit`], safe to share across the
/// tasks that make up a single variation's generation.
#[derive(Debug)]
pub struct BudgetTracker {
    limit: BudgetLimit,
    phrases_used: AtomicU32,
    start: Mutex<Option<Instant>>,
}

impl BudgetTracker {
    /// A tracker with nothing spent yet against `limit`.
    #[must_use]
    pub fn new(limit: BudgetLimit) -> Self {
        Self {
            limit,
            phrases_used: AtomicU32::new(0),
            start: Mutex::new(None),
        }
    }

    /// Start the duration clock. A no-op if already started.
    pub fn start_timer(&self) {
        let mut guard = self.start.lock().expect("budget timer lock poisoned");
        if guard.is_none() {
            *guard = Some(Instant::now());
        }
    }

    /// Record that one more phrase was emitted.
    pub fn record_phrase(&self) {
        self.phrases_used.fetch_add(1, Ordering::Relaxed);
    }

    fn elapsed(&self) -> Duration {
        self.start
            .lock()
            .expect("budget timer lock poisoned")
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    /// How many phrases have been recorded so far.
    #[must_use]
    pub fn phrases_used(&self) -> u32 {
        self.phrases_used.load(Ordering::Relaxed)
    }

    /// Evaluate current usage against the configured limits.
    #[must_use]
    pub fn check(&self) -> BudgetStatus {
        let phrases = self.phrases_used();
        if let Some(max) = self.limit.max_phrases {
            if phrases >= max {
                return BudgetStatus::Exceeded(BudgetViolation::PhrasesExceeded {
                    used: phrases,
                    limit: max,
                });
            }
        }

        let elapsed = self.elapsed();
        if let Some(max) = self.limit.max_duration {
            if elapsed >= max {
                return BudgetStatus::Exceeded(BudgetViolation::DurationExceeded {
                    elapsed,
                    limit: max,
                });
            }
        }

        let mut max_pct: f64 = 0.0;
        if let Some(max) = self.limit.max_phrases {
            if max > 0 {
                max_pct = max_pct.max(f64::from(phrases) / f64::from(max));
            }
        }
        if let Some(max) = self.limit.max_duration {
            let max_secs = max.as_secs_f64();
            if max_secs > 0.0 {
                max_pct = max_pct.max(elapsed.as_secs_f64() / max_secs);
            }
        }

        if max_pct >= WARNING_THRESHOLD {
            BudgetStatus::Warning { usage_pct: max_pct }
        } else {
            BudgetStatus::WithinLimits
        }
    }

    /// Remaining headroom per dimension, `None` where unbounded.
    #[must_use]
    pub fn remaining(&self) -> BudgetRemaining {
        BudgetRemaining {
            phrases: self
                .limit
                .max_phrases
                .map(|max| max.saturating_sub(self.phrases_used())),
            duration: self
                .limit
                .max_duration
                .map(|max| max.saturating_sub(self.elapsed())),
        }
    }
}

/// Outcome of [`BudgetTracker::check`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetStatus {
    /// Comfortably under every configured limit.
    WithinLimits,
    /// At least one dimension has crossed [`WARNING_THRESHOLD`] of its limit.
    Warning {
        /// Highest usage fraction across all configured dimensions.
        usage_pct: f64,
    },
    /// A limit has been reached or crossed.
    Exceeded(BudgetViolation),
}

/// Which dimension was exceeded and by how much.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetViolation {
    /// Phrase-count limit reached.
    PhrasesExceeded {
        /// Phrases emitted.
        used: u32,
        /// Configured limit.
        limit: u32,
    },
    /// Wall-clock limit reached.
    DurationExceeded {
        /// Time elapsed.
        elapsed: Duration,
        /// Configured limit.
        limit: Duration,
    },
}

impl fmt::Display for BudgetViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetViolation::PhrasesExceeded { used, limit } => {
                write!(f, "phrase budget exceeded: {used}/{limit}")
            }
            BudgetViolation::DurationExceeded { elapsed, limit } => {
                write!(
                    f,
                    "duration budget exceeded: {:.1}s/{:.1}s",
                    elapsed.as_secs_f64(),
                    limit.as_secs_f64()
                )
            }
        }
    }
}

/// Remaining headroom per budget dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetRemaining {
    /// Phrases still available, if bounded.
    pub phrases: Option<u32>,
    /// Time still available, if bounded.
    pub duration: Option<Duration>,
}
