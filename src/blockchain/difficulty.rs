use serde::Serialize;

use super::{Block, DIFF_ADJUST_WINDOW, DIFF_MAX, DIFF_MIN};

/// Result of one retarget evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Retarget {
    pub previous: u32,
    pub next: u32,
    pub actual_secs: f64,
    pub target_secs: f64,
}

impl Retarget {
    pub fn changed(&self) -> bool {
        self.previous != self.next
    }
}

/// Compare the time spanned by the last `DIFF_ADJUST_WINDOW` blocks with
/// `block_time_target * DIFF_ADJUST_WINDOW`. Faster than half the window
/// raises difficulty by one; slower than twice lowers it by one, never
/// below `DIFF_MIN`. `None` until the chain holds a full window.
pub fn retarget(chain: &[Block], difficulty: u32, block_time_target: u64) -> Option<Retarget> {
    if chain.len() < DIFF_ADJUST_WINDOW {
        return None;
    }

    let recent = &chain[chain.len() - DIFF_ADJUST_WINDOW..];
    let actual_secs = recent[recent.len() - 1].timestamp - recent[0].timestamp;
    let target_secs = block_time_target.saturating_mul(DIFF_ADJUST_WINDOW as u64) as f64;

    let next = if actual_secs < target_secs * 0.5 {
        difficulty.saturating_add(1).min(DIFF_MAX)
    } else if actual_secs > target_secs * 2.0 {
        difficulty.saturating_sub(1).max(DIFF_MIN)
    } else {
        difficulty
    };

    Some(Retarget {
        previous: difficulty,
        next,
        actual_secs,
        target_secs,
    })
}
