//! Drives the fetch loop and the pacer loop.
//!
//! Both loops are `spawn_local` tasks on the current [`tokio::task::LocalSet`],
//! so they interleave on one thread and share the [`UpdateQueue`] through a
//! plain `RefCell`. Each step runs to completion between timer waits. The
//! only other shared surface is the `watch` channel holding the current
//! board.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::PacingConfig;
use crate::output::Sink;
use crate::pacer::{Board, Pacer, Step};
use crate::queue::UpdateQueue;
use crate::reconcile::reconcile;
use crate::source::SnapshotSource;

/// Cancellation handle for one loop. Dropping it also cancels.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl CancelHandle {
    fn pair() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn cancel(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

struct LoopTask {
    cancel: CancelHandle,
    join: JoinHandle<()>,
}

impl LoopTask {
    async fn stop(mut self) {
        self.cancel.cancel();
        let _ = self.join.await;
    }
}

/// Handle to a running leaderboard.
pub struct RuntimeHandle {
    state: watch::Receiver<Board>,
    fetch: Option<LoopTask>,
    pacer: LoopTask,
}

impl RuntimeHandle {
    /// Receiver for the displayed board; updated after every applied step.
    pub fn state(&self) -> watch::Receiver<Board> {
        self.state.clone()
    }

    pub fn current(&self) -> Board {
        self.state.borrow().clone()
    }

    /// Stops fetching. The pacer keeps draining whatever is already queued.
    pub async fn stop_fetching(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.stop().await;
            debug!("Fetch loop stopped");
        }
    }

    /// Cancels both loops and waits for them to finish.
    pub async fn shutdown(mut self) {
        self.stop_fetching().await;
        self.pacer.stop().await;
        info!("Leaderboard runtime stopped");
    }
}

pub struct LeaderboardRuntime;

impl LeaderboardRuntime {
    /// Spawns the fetch and pacer loops on the current `LocalSet`, starting
    /// from an empty board.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a `LocalSet`.
    pub fn start<S, K>(source: S, sink: K, config: PacingConfig) -> RuntimeHandle
    where
        S: SnapshotSource + 'static,
        K: Sink + 'static,
    {
        Self::start_with(Pacer::new(), source, sink, config)
    }

    /// Like [`LeaderboardRuntime::start`], but resumes from `pacer`'s board.
    pub fn start_with<S, K>(
        pacer: Pacer,
        source: S,
        sink: K,
        config: PacingConfig,
    ) -> RuntimeHandle
    where
        S: SnapshotSource + 'static,
        K: Sink + 'static,
    {
        let queue = Rc::new(RefCell::new(UpdateQueue::new()));
        let (publisher, state) = watch::channel(pacer.board());

        info!(
            fetch_ms = config.fetch_interval.as_millis() as u64,
            settle_ms = config.settle_delay.as_millis() as u64,
            idle_ms = config.idle_poll_delay.as_millis() as u64,
            "Starting leaderboard runtime"
        );

        let (fetch_cancel, fetch_rx) = CancelHandle::pair();
        let fetch_join = tokio::task::spawn_local(fetch_loop(
            source,
            Rc::clone(&queue),
            state.clone(),
            config.fetch_interval,
            fetch_rx,
        ));

        let (pacer_cancel, pacer_rx) = CancelHandle::pair();
        let pacer_join = tokio::task::spawn_local(pacer_loop(
            pacer, queue, publisher, sink, config, pacer_rx,
        ));

        RuntimeHandle {
            state,
            fetch: Some(LoopTask {
                cancel: fetch_cancel,
                join: fetch_join,
            }),
            pacer: LoopTask {
                cancel: pacer_cancel,
                join: pacer_join,
            },
        }
    }
}

/// Fetches on a fixed interval and queues whatever differs from the
/// displayed board. A failed fetch is logged and the cycle skipped.
async fn fetch_loop<S: SnapshotSource>(
    source: S,
    queue: Rc<RefCell<UpdateQueue>>,
    state: watch::Receiver<Board>,
    every: Duration,
    mut cancel: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut cancel => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            _ = &mut cancel => break,
            fetched = source.fetch() => fetched,
        };

        match fetched {
            Ok(records) => {
                let displayed = state.borrow().clone();
                let out = reconcile(records, &displayed);
                if !out.changed.is_empty() {
                    let mut queue = queue.borrow_mut();
                    queue.upsert_all(out.changed);
                    debug!(pending = queue.len(), "Queued leaderboard updates");
                }
            }
            Err(e) => warn!(error = %e, "Snapshot fetch failed, skipping cycle"),
        }
    }
}

/// Applies one queued update per step and waits as the step dictates.
async fn pacer_loop<K: Sink>(
    mut pacer: Pacer,
    queue: Rc<RefCell<UpdateQueue>>,
    publisher: watch::Sender<Board>,
    mut sink: K,
    config: PacingConfig,
    mut cancel: oneshot::Receiver<()>,
) {
    loop {
        let step = pacer.step(&mut queue.borrow_mut());

        if let Step::Applied { board, .. } = &step {
            publisher.send_replace(Board::clone(board));
            sink.publish(board);
        }

        let delay = step.next_delay(&config);
        tokio::select! {
            _ = &mut cancel => break,
            _ = pause(delay) => {}
        }
    }
}

/// Sleeps for `delay`; a zero delay still yields so the fetch loop gets a
/// turn between back-to-back steps.
async fn pause(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}
