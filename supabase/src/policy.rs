//! Refresh timing rules shared by the gate and the browser provider.
//!
//! DESIGN
//! ======
//! Two constants drive every refresh decision: the lead time (how long before
//! expiry a refresh should happen) and the cooldown (minimum spacing between
//! two refreshes). The cooldown doubles as the floor for scheduled delays, so
//! a session that is already inside its lead window never produces a zero or
//! negative timer.

use std::time::Duration;

pub const DEFAULT_REFRESH_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_REFRESH_LEAD_SECS: u64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Minimum time between two refreshes; also the delay floor.
    pub cooldown: Duration,
    /// How long before expiry a refresh is due.
    pub lead_time: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(DEFAULT_REFRESH_COOLDOWN_SECS),
            lead_time: Duration::from_secs(DEFAULT_REFRESH_LEAD_SECS),
        }
    }
}

impl RefreshPolicy {
    #[must_use]
    pub fn new(cooldown: Duration, lead_time: Duration) -> Self {
        Self { cooldown, lead_time }
    }

    /// Delay until the next proactive refresh of a session expiring at
    /// `expires_at` (epoch seconds): `max(expiry - now - lead, cooldown)`.
    #[must_use]
    pub fn refresh_delay(&self, expires_at: i64, now_ms: i64) -> Duration {
        let remaining_ms = expires_at
            .saturating_mul(1000)
            .saturating_sub(now_ms)
            .saturating_sub(millis(self.lead_time));
        let floor_ms = millis(self.cooldown);
        let delay_ms = remaining_ms.max(floor_ms).max(1);
        Duration::from_millis(u64::try_from(delay_ms).unwrap_or(u64::MAX))
    }

    /// True when a refresh recorded at `last_ms` is still inside the cooldown.
    #[must_use]
    pub fn within_cooldown(&self, last_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(last_ms) < millis(self.cooldown)
    }

    /// True when a session expiring at `expires_at` is inside its lead window
    /// (or already expired).
    #[must_use]
    pub fn needs_refresh(&self, expires_at: i64, now_ms: i64) -> bool {
        expires_at.saturating_mul(1000).saturating_sub(now_ms) <= millis(self.lead_time)
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
