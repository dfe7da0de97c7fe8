//! Gate evaluator — may an adjustment attempt run now?

use std::time::Duration;

use chrono::{DateTime, Utc};

use rightsize_core::ScalerState;

/// Minimum time between two successful adjustments of one scaler.
pub const COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Gate with the fixed five-minute cooldown.
pub fn allowed(
    state: Option<ScalerState>,
    adjusted_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    allowed_with_cooldown(COOLDOWN, state, adjusted_at, now)
}

/// Pure, total gate decision.
///
/// `Error` always closes the gate until the record is reset externally.
/// A never-adjusted record is always allowed. Otherwise the cooldown must
/// have fully elapsed; a timestamp in the future counts as not elapsed.
pub fn allowed_with_cooldown(
    cooldown: Duration,
    state: Option<ScalerState>,
    adjusted_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if state == Some(ScalerState::Error) {
        return false;
    }
    match adjusted_at {
        None => true,
        Some(at) => match (now - at).to_std() {
            Ok(elapsed) => elapsed >= cooldown,
            Err(_) => false,
        },
    }
}
