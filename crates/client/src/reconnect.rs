//! Backoff schedule for re-opening a dropped push channel.
//!
//! Reconnection is opt-in. The transport owns the retry loop and reports
//! each attempt to its consumer as
//! [`TransportEvent::Reconnecting`](crate::events::TransportEvent::Reconnecting);
//! this module only decides how long to wait and when to give up.

use std::time::Duration;

/// Exponential backoff policy for the push channel.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    /// Delays never grow past this.
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Stop after this many failed attempts; `None` retries until closed.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

/// One pending reconnection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number since the connection dropped.
    pub number: u32,
    /// How long to wait before dialing.
    pub delay: Duration,
}

/// Attempt schedule for one outage. Start a fresh one per dropped
/// connection so the delay resets after a successful reconnect.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    attempts: u32,
    delay: Duration,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            config: config.clone(),
            attempts: 0,
            delay: config.initial_delay.min(config.max_delay),
        }
    }

    /// The next attempt, or `None` once `max_attempts` is used up.
    pub fn next_attempt(&mut self) -> Option<Attempt> {
        if self
            .config
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
        {
            return None;
        }

        self.attempts += 1;
        let attempt = Attempt {
            number: self.attempts,
            delay: self.delay,
        };
        let grown = self.delay.as_secs_f64() * self.config.multiplier.max(1.0);
        self.delay = Duration::try_from_secs_f64(grown)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);
        Some(attempt)
    }
}
