// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! WebChannel reconnect backoff: 1, 2, 4, … seconds, capped at 30,
//! resetting to 1 after any successful frame (spec §4.8, §8 scenario 6).

use std::time::Duration;

use crate::constants;

#[derive(Debug, Clone)]
pub struct Backoff {
    current_secs: u64,
    initial_secs: u64,
    max_secs: u64,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            current_secs: constants::BACKOFF_INITIAL_SECS,
            initial_secs: constants::BACKOFF_INITIAL_SECS,
            max_secs: constants::BACKOFF_MAX_SECS,
        }
    }

    /// The delay to wait before the next reconnect attempt; advances the
    /// schedule for next time (doubles, capped at `max_secs`).
    pub fn next_delay(&mut self) -> Duration {
        let delay = Duration::from_secs(self.current_secs);
        self.current_secs = (self.current_secs * 2).min(self.max_secs);
        delay
    }

    pub fn reset(&mut self) {
        self.current_secs = self.initial_secs;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §8 scenario 6: three consecutive failures sleep 1s, 2s, 4s;
    /// a successful frame resets to 1s.
    #[test]
    fn schedule_matches_scenario_six() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn schedule_caps_at_thirty_seconds() {
        let mut backoff = Backoff::new();
        let mut last = Duration::ZERO;
        for _ in 0..10 {
            last = backoff.next_delay();
        }
        assert_eq!(last, Duration::from_secs(30));
    }
}
