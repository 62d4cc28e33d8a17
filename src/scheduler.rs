use std::path::Path;

use chrono::Utc;

use crate::error::Result;
use crate::models::CycleState;

/// The feeds selected for one run, plus the cursor to persist for the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePlan {
    pub indices: Vec<usize>,
    pub next: CycleState,
}

/// Compute the round-robin window for this run.
///
/// The selected indices are `(start + i) mod N` for `i` in `[0, min(M, N))`;
/// the cursor advances to `(start + M) mod N`. A run whose window reaches or
/// wraps past the end of the list completes a cycle. With no feeds
/// configured there is nothing to do and the state is left untouched.
pub fn plan_cycle(state: &CycleState, total_feeds: usize, max_per_run: usize) -> CyclePlan {
    if total_feeds == 0 || max_per_run == 0 {
        return CyclePlan {
            indices: Vec::new(),
            next: state.clone(),
        };
    }

    // A cursor beyond the list (feeds were removed since the last run)
    // restarts from the beginning.
    let start = if state.last_index < total_feeds {
        state.last_index
    } else {
        0
    };

    let indices: Vec<usize> = (0..max_per_run.min(total_feeds))
        .map(|i| (start + i) % total_feeds)
        .collect();

    let next_index = (start + max_per_run) % total_feeds;
    let completed = next_index < start || start + max_per_run >= total_feeds;

    CyclePlan {
        indices,
        next: CycleState {
            last_index: next_index,
            cycle_count: state.cycle_count + u64::from(completed),
            cycle_completed: completed,
            last_run: Some(Utc::now()),
        },
    }
}

/// Read the persisted cursor. A missing or corrupt state file falls back to
/// a fresh default cursor rather than failing the run.
pub fn load_state(path: &Path) -> CycleState {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Invalid cycle state file {:?}, starting over: {}", path, e);
                CycleState::default()
            }
        },
        Err(_) => CycleState::default(),
    }
}

pub fn save_state(path: &Path, state: &CycleState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(state)?)?;
    Ok(())
}
