//! Restart rate limiting with cooldown.
//!
//! ```text
//! cooldown running            → Suppressed
//! cooldown expired            → clear, fall through
//! restarts in window >= max   → enter cooldown, Suppressed
//! otherwise                   → Proceed
//! ```

use tracing::{debug, warn};

use svcwatch_core::RateLimits;
use svcwatch_state::ServiceRuntimeState;

/// The rate limiter's answer for a requested restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The restart may be issued.
    Proceed,
    /// The restart must not be issued.
    Suppressed {
        /// When the current cooldown ends.
        cooldown_until: u64,
        /// This call tripped the limit and started the cooldown.
        cooldown_started: bool,
    },
}

impl Admission {
    pub fn is_suppressed(self) -> bool {
        matches!(self, Admission::Suppressed { .. })
    }
}

/// Decide whether a requested restart may run at `now`.
///
/// May set or clear `state.cooldown_until`; never touches the ledger. The
/// caller appends to the ledger only after a restart command succeeds.
pub fn admit(state: &mut ServiceRuntimeState, limits: &RateLimits, now: u64) -> Admission {
    if let Some(until) = state.cooldown_until {
        if now < until {
            debug!(cooldown_until = until, now, "restart suppressed by running cooldown");
            return Admission::Suppressed {
                cooldown_until: until,
                cooldown_started: false,
            };
        }
        debug!(cooldown_until = until, now, "cooldown expired");
        state.cooldown_until = None;
    }

    let window_start = now.saturating_sub(limits.window_secs);
    let recent = state.restarts_since(window_start);
    if recent >= limits.max_restarts as usize {
        let until = now.saturating_add(limits.cooldown_secs);
        state.cooldown_until = Some(until);
        warn!(
            recent,
            max_restarts = limits.max_restarts,
            window_secs = limits.window_secs,
            cooldown_until = until,
            "restart rate limit reached, entering cooldown"
        );
        return Admission::Suppressed {
            cooldown_until: until,
            cooldown_started: true,
        };
    }

    Admission::Proceed
}
