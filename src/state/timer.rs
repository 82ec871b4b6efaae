use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Events produced by timers and consumed by the engine loop.
///
/// Every event carries the session epoch captured when it was scheduled; the
/// engine discards events whose epoch no longer matches, so a cancelled or
/// superseded timer can never act on a later question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledEvent {
    /// The countdown for the current question reached zero.
    QuestionDeadline {
        /// Epoch the countdown was started under.
        epoch: u64,
    },
    /// The post-grading delay before revealing the leaderboard elapsed.
    LeaderboardReveal {
        /// Epoch the reveal was scheduled under.
        epoch: u64,
    },
    /// The post-grading delay before moving on elapsed.
    NextQuestion {
        /// Epoch the advance was scheduled under.
        epoch: u64,
    },
}

/// Handle for the single live question countdown.
///
/// Dropping or cancelling the handle tears the ticking task down; the
/// replace-then-spawn discipline in `AppState` guarantees at most one
/// countdown exists at any instant.
#[derive(Debug)]
pub struct QuestionCountdown {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
    epoch: u64,
}

impl QuestionCountdown {
    /// Spawn a 1 Hz countdown for `duration_secs` seconds.
    ///
    /// Remaining seconds are published on `remaining_tx` after every tick;
    /// when the countdown reaches zero a [`ScheduledEvent::QuestionDeadline`]
    /// is emitted and the task exits.
    pub fn spawn(
        duration_secs: u32,
        epoch: u64,
        remaining_tx: watch::Sender<u32>,
        events: mpsc::UnboundedSender<ScheduledEvent>,
    ) -> Self {
        let (cancel, mut cancelled) = watch::channel(false);

        // Publish the full duration before the task even runs, so a
        // submission racing the question start reads a fresh value.
        let _ = remaining_tx.send(duration_secs);

        let handle = tokio::spawn(async move {
            let mut remaining = duration_secs;

            let mut ticker =
                time::interval_at(Instant::now() + Duration::from_secs(1), Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            debug!(epoch, remaining, "countdown cancelled");
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        remaining = remaining.saturating_sub(1);
                        let _ = remaining_tx.send(remaining);
                        if remaining == 0 {
                            let _ = events.send(ScheduledEvent::QuestionDeadline { epoch });
                            return;
                        }
                    }
                }
            }
        });

        Self {
            cancel,
            handle,
            epoch,
        }
    }

    /// Epoch this countdown was started under.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Stop the countdown without emitting a deadline event.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
        self.handle.abort();
    }
}

/// Schedule a one-shot event after `delay`.
///
/// The task is fire-and-forget; stale deliveries are filtered by the epoch
/// check in the engine loop, and the returned handle lets `force_stop` abort
/// the sleep early.
pub fn schedule_after(
    delay: Duration,
    event: ScheduledEvent,
    events: mpsc::UnboundedSender<ScheduledEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        time::sleep(delay).await;
        let _ = events.send(event);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn countdown_emits_exactly_one_deadline() {
        let (remaining_tx, remaining_rx) = watch::channel(0u32);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let countdown = QuestionCountdown::spawn(3, 7, remaining_tx, events_tx);
        assert_eq!(countdown.epoch(), 7);

        let event = events_rx.recv().await.unwrap();
        assert_eq!(event, ScheduledEvent::QuestionDeadline { epoch: 7 });
        assert_eq!(*remaining_rx.borrow(), 0);

        // The task exited after the deadline; nothing else may arrive.
        time::sleep(Duration::from_secs(5)).await;
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_countdown_stays_silent() {
        let (remaining_tx, _remaining_rx) = watch::channel(0u32);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let countdown = QuestionCountdown::spawn(30, 1, remaining_tx, events_tx);
        countdown.cancel();

        time::sleep(Duration::from_secs(60)).await;
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_event_fires_after_the_delay() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        schedule_after(
            Duration::from_secs(3),
            ScheduledEvent::LeaderboardReveal { epoch: 2 },
            events_tx,
        );

        let event = events_rx.recv().await.unwrap();
        assert_eq!(event, ScheduledEvent::LeaderboardReveal { epoch: 2 });
    }
}
