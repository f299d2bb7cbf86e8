//! Applies queued updates to the displayed leaderboard one at a time.
//!
//! Each [`Pacer::step`] pops at most one update, merges it into the board,
//! re-sorts and reports whether the rank order moved. The caller uses
//! [`Step::next_delay`] to decide when to step again: after the settle
//! delay when routes swapped places, straight away when they did not, and
//! after the idle poll delay when there was nothing to do.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::config::PacingConfig;
use crate::entity::RankedEntity;
use crate::queue::UpdateQueue;

/// Immutable snapshot of the displayed leaderboard, fastest route first.
pub type Board = Arc<Vec<RankedEntity>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    /// An update was applied this step.
    Draining,
    /// The queue was empty; waiting to check again.
    IdleWait,
}

/// Result of a single pacer step.
#[derive(Debug, Clone)]
pub enum Step {
    Applied { board: Board, order_changed: bool },
    Idle,
}

impl Step {
    pub fn state(&self) -> PacerState {
        match self {
            Step::Applied { .. } => PacerState::Draining,
            Step::Idle => PacerState::IdleWait,
        }
    }

    pub fn next_delay(&self, config: &PacingConfig) -> Duration {
        match self {
            Step::Applied {
                order_changed: true,
                ..
            } => config.settle_delay,
            Step::Applied {
                order_changed: false,
                ..
            } => Duration::ZERO,
            Step::Idle => config.idle_poll_delay,
        }
    }
}

/// Sole owner and writer of the displayed leaderboard.
#[derive(Debug, Default)]
pub struct Pacer {
    displayed: Board,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing board, sorted the same way steps sort.
    pub fn with_board(mut entities: Vec<RankedEntity>) -> Self {
        sort_board(&mut entities);
        Self {
            displayed: Arc::new(entities),
        }
    }

    pub fn board(&self) -> Board {
        Arc::clone(&self.displayed)
    }

    pub fn step(&mut self, queue: &mut UpdateQueue) -> Step {
        let Some(update) = queue.pop_front() else {
            return Step::Idle;
        };

        let key = update.key.clone();
        let (next, order_changed) = apply_update(&self.displayed, update);
        self.displayed = Arc::new(next);

        trace!(
            route = %key,
            order_changed,
            pending = queue.len(),
            "Applied leaderboard update"
        );

        Step::Applied {
            board: self.board(),
            order_changed,
        }
    }
}

/// Merges `update` into `prev` and re-sorts. Returns the new board and
/// whether any position now holds a different route than before, which
/// includes the board growing by one.
pub fn apply_update(prev: &[RankedEntity], update: RankedEntity) -> (Vec<RankedEntity>, bool) {
    let mut next = prev.to_vec();
    match next.iter_mut().find(|e| e.key == update.key) {
        Some(existing) => *existing = update,
        None => next.push(update),
    }
    sort_board(&mut next);

    debug_assert!(
        {
            let mut keys: Vec<_> = next.iter().map(|e| e.key.as_str()).collect();
            keys.sort_unstable();
            keys.windows(2).all(|w| w[0] != w[1])
        },
        "duplicate route key on the displayed board"
    );

    let order_changed = next.len() != prev.len()
        || next.iter().zip(prev).any(|(now, before)| now.key != before.key);

    (next, order_changed)
}

/// Descending by value. `sort_by` is stable, so ties keep their order;
/// `-0.0` and `0.0` count as a tie.
fn sort_board(entities: &mut [RankedEntity]) {
    entities.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
}
