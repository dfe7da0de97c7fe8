//! Concurrency calculator — one bounded step toward the backlog.

use serde::Serialize;

/// Which branch of the threshold comparison was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// Outcome of one calculation. Only `new` is ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub old: i32,
    pub new: i32,
    pub direction: Direction,
}

/// Compute the next reserved concurrency.
///
/// Backlog strictly above the threshold steps up (capped at `max`);
/// anything else, including an exact match, steps down (floored at `min`).
pub fn next_concurrency(
    current: i32,
    avg_backlog: f64,
    threshold: i32,
    min: i32,
    max: i32,
    step: i32,
) -> i32 {
    decide(current, avg_backlog, threshold, min, max, step).new
}

/// Same as [`next_concurrency`], keeping the old value and direction.
pub fn decide(
    current: i32,
    avg_backlog: f64,
    threshold: i32,
    min: i32,
    max: i32,
    step: i32,
) -> Decision {
    if avg_backlog > f64::from(threshold) {
        Decision {
            old: current,
            new: current.saturating_add(step).min(max),
            direction: Direction::Up,
        }
    } else {
        Decision {
            old: current,
            new: current.saturating_sub(step).max(min),
            direction: Direction::Down,
        }
    }
}
