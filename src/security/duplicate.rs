//! Per-sender repeat detection.
//!
//! Keeps a short window of recent normalized messages for every
//! `(chat, user)` pair and reports a bonus when a new message is a near
//! copy of one still in the window. Advertisers tend to paste the same pitch
//! repeatedly; ordinary chatter rarely repeats itself verbatim.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::DuplicateConfig;
use crate::security::matcher::{SIMILARITY_CHAR_LIMIT, length_bound, message_similarity};
use crate::{ChatId, UserId};

#[derive(Debug)]
struct Recent {
    at: Instant,
    text: String,
    /// Characters that take part in similarity, capped at the comparison limit.
    compared_chars: usize,
}

/// Recent traffic of a single sender in a single chat.
#[derive(Debug, Default)]
struct SenderWindow {
    /// Oldest first.
    messages: VecDeque<Recent>,
}

impl SenderWindow {
    /// Drop entries older than `horizon`.
    fn prune(&mut self, now: Instant, horizon: Duration) {
        while let Some(oldest) = self.messages.front() {
            if now.saturating_duration_since(oldest.at) > horizon {
                self.messages.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Tracks recent messages per `(chat, user)` and scores repeats.
#[derive(Debug)]
pub struct DuplicateSignal {
    config: DuplicateConfig,
    windows: DashMap<(ChatId, UserId), SenderWindow>,
    /// Set while the tracked-sender count is above the warning threshold.
    over_threshold: AtomicBool,
}

impl DuplicateSignal {
    pub fn new(config: DuplicateConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
            over_threshold: AtomicBool::new(false),
        }
    }

    fn horizon(&self) -> Duration {
        Duration::from_secs(self.config.horizon_secs)
    }

    /// Record `normalized` for the sender and return the duplicate bonus if a
    /// similar message is still inside the horizon, `0.0` otherwise.
    ///
    /// Only the entry for this sender is locked.
    pub fn observe(&self, chat_id: ChatId, user_id: UserId, normalized: &str, now: Instant) -> f32 {
        let horizon = self.horizon();
        let threshold = self.config.similarity_threshold;
        let compared_chars = normalized.chars().take(SIMILARITY_CHAR_LIMIT).count();
        let score = {
            let mut window = self.windows.entry((chat_id, user_id)).or_default();
            window.prune(now, horizon);

            // the length bound rules out most pairs before the edit distance runs
            let repeated = window.messages.iter().any(|previous| {
                length_bound(previous.compared_chars, compared_chars) > threshold
                    && message_similarity(&previous.text, normalized) > threshold
            });

            window.messages.push_back(Recent {
                at: now,
                text: normalized.to_string(),
                compared_chars,
            });
            while window.messages.len() > self.config.max_entries_per_sender.max(1) {
                window.messages.pop_front();
            }

            if repeated { self.config.bonus } else { 0.0 }
        };

        if score > 0.0 {
            debug!(chat_id, user_id, "Repeated message inside duplicate window");
        }
        self.check_growth();
        score
    }

    /// Drop expired entries and empty windows. Returns the number of windows
    /// removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let horizon = self.horizon();
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window.prune(now, horizon);
            !window.messages.is_empty()
        });
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, remaining = self.windows.len(), "Swept duplicate windows");
        }
        self.check_growth();
        removed
    }

    /// Forget everything recorded for one sender.
    pub fn forget(&self, chat_id: ChatId, user_id: UserId) -> bool {
        self.windows.remove(&(chat_id, user_id)).is_some()
    }

    pub fn tracked_senders(&self) -> usize {
        self.windows.len()
    }

    /// Warn once each time the tracked-sender count crosses the threshold.
    fn check_growth(&self) {
        let tracked = self.windows.len();
        let over = tracked > self.config.warn_tracked_senders;
        if over && !self.over_threshold.swap(true, Ordering::Relaxed) {
            warn!(
                tracked,
                threshold = self.config.warn_tracked_senders,
                "Duplicate windows growing; call sweep_windows periodically"
            );
        } else if !over {
            self.over_threshold.store(false, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal() -> DuplicateSignal {
        DuplicateSignal::new(DuplicateConfig::default())
    }

    #[test]
    fn test_first_message_scores_zero() {
        let dup = signal();
        assert_eq!(dup.observe(1, 1, "سكليف", Instant::now()), 0.0);
        assert_eq!(dup.tracked_senders(), 1);
    }

    #[test]
    fn test_repeat_inside_horizon() {
        let dup = signal();
        let now = Instant::now();
        dup.observe(1, 1, "سكليف معتمد للتواصل", now);
        let score = dup.observe(1, 1, "سكليف معتمد للتواصل", now + Duration::from_secs(60));
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_near_copy_counts() {
        let dup = signal();
        let now = Instant::now();
        dup.observe(1, 1, "سكليف معتمد للتواصل واتس", now);
        let score = dup.observe(1, 1, "سكليف معتمد للتواصل واتساب", now + Duration::from_secs(1));
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_repeat_after_horizon_scores_zero() {
        let dup = signal();
        let now = Instant::now();
        dup.observe(1, 1, "سكليف", now);
        let later = now + Duration::from_secs(301);
        assert_eq!(dup.observe(1, 1, "سكليف", later), 0.0);
    }

    #[test]
    fn test_senders_are_independent() {
        let dup = signal();
        let now = Instant::now();
        dup.observe(1, 1, "سكليف", now);
        assert_eq!(dup.observe(1, 2, "سكليف", now), 0.0);
        assert_eq!(dup.observe(2, 1, "سكليف", now), 0.0);
        assert_eq!(dup.tracked_senders(), 3);
    }

    #[test]
    fn test_different_message_scores_zero() {
        let dup = signal();
        let now = Instant::now();
        dup.observe(1, 1, "مرحبا كيفك", now);
        assert_eq!(dup.observe(1, 1, "وش الواجب اليوم", now), 0.0);
    }

    #[test]
    fn test_window_is_capped() {
        let config = DuplicateConfig {
            max_entries_per_sender: 2,
            ..DuplicateConfig::default()
        };
        let dup = DuplicateSignal::new(config);
        let now = Instant::now();
        dup.observe(1, 1, "الاولى رسالة مختلفة", now);
        dup.observe(1, 1, "abc", now);
        dup.observe(1, 1, "xyz", now);
        // the first message was evicted
        assert_eq!(dup.observe(1, 1, "الاولى رسالة مختلفة", now), 0.0);
    }

    #[test]
    fn test_sweep_drops_expired_windows() {
        let dup = signal();
        let now = Instant::now();
        dup.observe(1, 1, "a", now);
        dup.observe(2, 2, "b", now + Duration::from_secs(200));
        let removed = dup.sweep(now + Duration::from_secs(400));
        assert_eq!(removed, 1);
        assert_eq!(dup.tracked_senders(), 1);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let dup = signal();
        let now = Instant::now();
        dup.observe(1, 1, "abcd", now);
        // one edit over five characters is exactly 0.8
        assert_eq!(dup.observe(1, 1, "abcde", now), 0.0);
        // one edit over six characters clears it
        assert_eq!(dup.observe(1, 1, "abcdef", now), 0.5);
    }

    #[test]
    fn test_length_mismatch_skips_comparison() {
        let dup = signal();
        let now = Instant::now();
        let long = "سكليف ".repeat(100);
        dup.observe(1, 1, &long, now);
        assert_eq!(dup.observe(1, 1, "سكليف", now), 0.0);
        assert_eq!(dup.observe(1, 1, &long, now), 0.5);
    }

    #[test]
    fn test_forget() {
        let dup = signal();
        dup.observe(1, 1, "a", Instant::now());
        assert!(dup.forget(1, 1));
        assert!(!dup.forget(1, 1));
    }
}
