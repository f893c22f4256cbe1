//! Timed playback of a prepared event list.
//!
//! One spawned task per run. Events are handled strictly in log order: wait
//! for the deadline (cancellable), then await the applier to completion.
//! Applier errors are logged and skipped; a slow apply is reported but never
//! abandoned.

use std::sync::Arc;
use std::time::Duration;

use retrace_core::{Applier, Timed};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EngineError;

pub const DEFAULT_SLOW_APPLY: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// Waiting for the next event's deadline.
    Scheduled,
    /// The last event was handed to the applier.
    Fired,
    Cancelled,
    Completed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub applied: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl PlaybackReport {
    /// Events that reached the applier, successfully or not.
    pub fn processed(&self) -> usize {
        self.applied + self.failed
    }
}

pub struct Scheduler<E> {
    applier: Arc<dyn Applier<E>>,
    slow_apply: Duration,
}

impl<E> Clone for Scheduler<E> {
    fn clone(&self) -> Self {
        Self {
            applier: Arc::clone(&self.applier),
            slow_apply: self.slow_apply,
        }
    }
}

impl<E> Scheduler<E>
where
    E: Timed + Send + Sync + 'static,
{
    pub fn new(applier: Arc<dyn Applier<E>>) -> Self {
        Self {
            applier,
            slow_apply: DEFAULT_SLOW_APPLY,
        }
    }

    /// How long an apply may run before it is reported as slow.
    pub fn with_slow_apply(mut self, threshold: Duration) -> Self {
        self.slow_apply = threshold;
        self
    }

    /// Start a run. Each event fires at `base + event.time()`. Every run gets
    /// its own cancellation token.
    pub fn play(&self, events: Vec<E>, base: Instant) -> PlaybackHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PlaybackState::Idle);
        let task = tokio::spawn(run(
            events,
            base,
            Arc::clone(&self.applier),
            self.slow_apply,
            cancel.clone(),
            state_tx,
        ));
        PlaybackHandle {
            cancel,
            state: state_rx,
            task,
        }
    }
}

async fn run<E: Timed>(
    events: Vec<E>,
    base: Instant,
    applier: Arc<dyn Applier<E>>,
    slow_apply: Duration,
    cancel: CancellationToken,
    state: watch::Sender<PlaybackState>,
) -> PlaybackReport {
    let mut report = PlaybackReport::default();
    info!(events = events.len(), "playback started");

    for (index, event) in events.iter().enumerate() {
        state.send_replace(PlaybackState::Scheduled);
        let deadline = base + Duration::from_millis(event.time());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                state.send_replace(PlaybackState::Cancelled);
                debug!(index, applied = report.applied, "playback cancelled");
                return report;
            }
            _ = tokio::time::sleep_until(deadline) => {}
        }

        let mut apply = applier.apply(event);
        let result = match tokio::time::timeout(slow_apply, &mut apply).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    index,
                    time = event.time(),
                    threshold_ms = slow_apply.as_millis() as u64,
                    "event apply is slow, still waiting"
                );
                apply.await
            }
        };
        match result {
            Ok(()) => report.applied += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    index,
                    time = event.time(),
                    error_kind = e.error_kind(),
                    error = %e,
                    "event apply failed, continuing"
                );
            }
        }
        state.send_replace(PlaybackState::Fired);
    }

    state.send_replace(PlaybackState::Completed);
    info!(applied = report.applied, failed = report.failed, "playback completed");
    report
}

/// Control surface for one run.
pub struct PlaybackHandle {
    cancel: CancellationToken,
    state: watch::Receiver<PlaybackState>,
    task: JoinHandle<PlaybackReport>,
}

impl PlaybackHandle {
    /// Cancel the run. A pending wait ends at once; an apply already in
    /// flight finishes first.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(mut self) -> Result<PlaybackReport, EngineError> {
        self.join().await
    }

    /// Like [`wait`](Self::wait) but cancel-safe: dropping the future leaves
    /// the run attached to this handle. Do not call again once it returned.
    pub async fn join(&mut self) -> Result<PlaybackReport, EngineError> {
        (&mut self.task)
            .await
            .map_err(|e| EngineError::Playback(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use retrace_core::ApplyError;

    #[derive(Debug)]
    struct Tick(u64);

    impl Timed for Tick {
        fn time(&self) -> u64 {
            self.0
        }
    }

    /// Records the mock-clock offset at which each event was applied.
    struct Recording {
        base: Instant,
        applied: Mutex<Vec<(u64, u64)>>,
        fail_at: Option<u64>,
        stall_at: Option<u64>,
    }

    impl Recording {
        fn new(base: Instant) -> Arc<Self> {
            Arc::new(Self {
                base,
                applied: Mutex::new(Vec::new()),
                fail_at: None,
                stall_at: None,
            })
        }

        fn times(&self) -> Vec<u64> {
            self.applied.lock().iter().map(|(t, _)| *t).collect()
        }
    }

    #[async_trait]
    impl Applier<Tick> for Recording {
        async fn apply(&self, event: &Tick) -> Result<(), ApplyError> {
            if self.stall_at == Some(event.0) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            if self.fail_at == Some(event.0) {
                return Err(ApplyError::Rejected("bad event".into()));
            }
            let offset = self.base.elapsed().as_millis() as u64;
            self.applied.lock().push((event.0, offset));
            Ok(())
        }
    }

    fn ticks(times: &[u64]) -> Vec<Tick> {
        times.iter().copied().map(Tick).collect()
    }

    #[tokio::test]
    async fn events_fire_at_their_deadlines() {
        tokio::time::pause();
        let base = Instant::now();
        let applier = Recording::new(base);
        let scheduler = Scheduler::new(applier.clone() as Arc<dyn Applier<Tick>>);

        let handle = scheduler.play(ticks(&[10, 20, 30]), base);
        let mut state = handle.subscribe();
        let report = handle.wait().await.unwrap();

        assert_eq!(report, PlaybackReport { applied: 3, failed: 0, cancelled: false });
        let applied = applier.applied.lock().clone();
        assert_eq!(applier.times(), vec![10, 20, 30]);
        // The paused clock rounds deadlines up to the next whole millisecond.
        for (time, offset) in applied {
            assert!((time..=time + 2).contains(&offset), "{time} fired at {offset}");
        }
        assert_eq!(*state.borrow_and_update(), PlaybackState::Completed);
    }

    #[tokio::test]
    async fn stop_cancels_pending_events() {
        tokio::time::pause();
        let base = Instant::now();
        let applier = Recording::new(base);
        let scheduler = Scheduler::new(applier.clone() as Arc<dyn Applier<Tick>>);

        let handle = scheduler.play(ticks(&[10, 20, 30]), base);
        tokio::time::sleep(Duration::from_millis(15)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(handle.state(), PlaybackState::Cancelled);
        let report = handle.wait().await.unwrap();
        assert_eq!(report, PlaybackReport { applied: 1, failed: 0, cancelled: true });
        assert_eq!(applier.times(), vec![10]);
    }

    #[tokio::test]
    async fn failures_are_skipped() {
        tokio::time::pause();
        let base = Instant::now();
        let applier = Arc::new(Recording {
            base,
            applied: Mutex::new(Vec::new()),
            fail_at: Some(20),
            stall_at: None,
        });
        let scheduler = Scheduler::new(applier.clone() as Arc<dyn Applier<Tick>>);

        let report = scheduler.play(ticks(&[10, 20, 30]), base).wait().await.unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(applier.times(), vec![10, 30]);
    }

    fn stalling(base: Instant, at: u64) -> Arc<Recording> {
        Arc::new(Recording {
            base,
            applied: Mutex::new(Vec::new()),
            fail_at: None,
            stall_at: Some(at),
        })
    }

    #[tokio::test]
    async fn slow_apply_is_awaited_past_the_threshold() {
        tokio::time::pause();
        let base = Instant::now();
        let applier = stalling(base, 0);
        let scheduler = Scheduler::new(applier.clone() as Arc<dyn Applier<Tick>>)
            .with_slow_apply(Duration::from_millis(100));

        let report = scheduler.play(ticks(&[0, 50]), base).wait().await.unwrap();
        assert_eq!(report, PlaybackReport { applied: 2, failed: 0, cancelled: false });

        // The second event waits for the first apply to finish, not for the threshold.
        let applied = applier.applied.lock().clone();
        assert_eq!(applier.times(), vec![0, 50]);
        assert!(applied[0].1 >= 200);
        assert!(applied[1].1 >= applied[0].1);
    }

    #[tokio::test]
    async fn stop_lets_in_flight_apply_finish() {
        tokio::time::pause();
        let base = Instant::now();
        let applier = stalling(base, 10);
        let scheduler = Scheduler::new(applier.clone() as Arc<dyn Applier<Tick>>);

        let handle = scheduler.play(ticks(&[10, 20]), base);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state(), PlaybackState::Scheduled);
        handle.stop();

        let report = handle.wait().await.unwrap();
        assert_eq!(report, PlaybackReport { applied: 1, failed: 0, cancelled: true });
        assert_eq!(applier.times(), vec![10]);
    }

    #[tokio::test]
    async fn late_events_fire_immediately_in_order() {
        tokio::time::pause();
        let base = Instant::now();
        tokio::time::advance(Duration::from_millis(500)).await;
        let applier = Recording::new(base);
        let scheduler = Scheduler::new(applier.clone() as Arc<dyn Applier<Tick>>);

        let report = scheduler.play(ticks(&[0, 5, 3]), base).wait().await.unwrap();
        assert_eq!(report.applied, 3);
        assert_eq!(applier.times(), vec![0, 5, 3]);
    }

    #[tokio::test]
    async fn runs_have_independent_tokens() {
        tokio::time::pause();
        let base = Instant::now();
        let applier = Recording::new(base);
        let scheduler = Scheduler::new(applier.clone() as Arc<dyn Applier<Tick>>);

        let first = scheduler.play(ticks(&[10]), base);
        first.stop();
        let second = scheduler.play(ticks(&[20]), base);

        assert!(first.wait().await.unwrap().cancelled);
        let report = second.wait().await.unwrap();
        assert!(!report.cancelled);
        assert_eq!(applier.times(), vec![20]);
    }
}
