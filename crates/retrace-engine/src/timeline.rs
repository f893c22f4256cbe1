//! Seekable playback tracks.
//!
//! A [`Track`] owns one log and at most one scheduler run. Seeking stops the
//! current run, waits for any in-flight apply, then starts a new run from a
//! plan prepared for the seek point.

use std::sync::Arc;
use std::time::Duration;

use retrace_core::debug::DebugEvent;
use retrace_core::{Applier, Event, Timed};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::EngineError;
use crate::reconcile::reconcile;
use crate::scheduler::{PlaybackHandle, PlaybackReport, PlaybackState, Scheduler};

/// Event types a track can seek within.
pub trait Seekable: Timed + Clone + Send + Sync + 'static {
    /// Same event at another time.
    fn restamp(&self, time: u64) -> Self;

    /// Events to play so that starting at `from` reproduces the log's state.
    fn plan(log: &[Self], from: u64) -> Vec<Self>;
}

impl Seekable for Event {
    fn restamp(&self, time: u64) -> Self {
        self.at(time)
    }

    fn plan(log: &[Self], from: u64) -> Vec<Self> {
        if from == 0 {
            log.to_vec()
        } else {
            reconcile(log, from)
        }
    }
}

/// Debug start/stop carry no collapsible state; seeking only drops what is
/// already behind the seek point.
impl Seekable for DebugEvent {
    fn restamp(&self, time: u64) -> Self {
        self.at(time)
    }

    fn plan(log: &[Self], from: u64) -> Vec<Self> {
        log.iter()
            .filter(|e| e.time() >= from)
            .map(|e| e.at(e.time() - from))
            .collect()
    }
}

struct Run<E> {
    handle: PlaybackHandle,
    plan: Vec<E>,
    base: Instant,
}

pub struct Track<E> {
    events: Vec<E>,
    scheduler: Scheduler<E>,
    current: Option<Run<E>>,
    paused: Option<Vec<E>>,
}

pub type Timeline = Track<Event>;
pub type DebugTrack = Track<DebugEvent>;

impl<E: Seekable> Track<E> {
    pub fn new(events: Vec<E>, applier: Arc<dyn Applier<E>>) -> Self {
        Self {
            events,
            scheduler: Scheduler::new(applier),
            current: None,
            paused: None,
        }
    }

    pub fn with_slow_apply(mut self, threshold: Duration) -> Self {
        self.scheduler = self.scheduler.with_slow_apply(threshold);
        self
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    /// Time of the last event.
    pub fn duration(&self) -> u64 {
        self.events.iter().map(Timed::time).max().unwrap_or(0)
    }

    pub fn plan(&self, from: u64) -> Vec<E> {
        E::plan(&self.events, from)
    }

    pub fn state(&self) -> PlaybackState {
        self.current
            .as_ref()
            .map(|run| run.handle.state())
            .unwrap_or(PlaybackState::Idle)
    }

    /// Stop whatever is playing and play from `from`, with the plan's time
    /// zero at `base`.
    #[instrument(skip(self, base), fields(events = self.events.len()))]
    pub async fn play_from(&mut self, from: u64, base: Instant) {
        self.halt().await;
        self.paused = None;
        let plan = self.plan(from);
        info!(planned = plan.len(), "track playing");
        self.start(plan, base);
    }

    pub async fn seek(&mut self, to: u64) {
        self.play_from(to, Instant::now()).await;
    }

    /// Cancel the current run without waiting for it.
    pub fn stop(&mut self) {
        if let Some(run) = &self.current {
            run.handle.stop();
        }
        self.paused = None;
    }

    /// Stop and remember what has not fired yet, relative to now.
    pub async fn pause(&mut self) {
        let Some(run) = self.current.take() else {
            return;
        };
        let elapsed = run.base.elapsed().as_millis() as u64;
        run.handle.stop();
        let processed = match run.handle.wait().await {
            Ok(report) => report.processed(),
            Err(e) => {
                warn!(error = %e, "paused run did not finish cleanly");
                run.plan.len()
            }
        };
        let remaining = run
            .plan
            .iter()
            .skip(processed)
            .map(|e| e.restamp(e.time().saturating_sub(elapsed)))
            .collect();
        self.paused = Some(remaining);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    /// Continue a paused track with its remaining events due from `base`.
    pub fn resume(&mut self, base: Instant) {
        if let Some(remaining) = self.paused.take() {
            self.start(remaining, base);
        }
    }

    /// Wait for the current run to end on its own or after a stop. Safe to
    /// drop mid-wait; the run stays attached.
    pub async fn finish(&mut self) -> Result<Option<PlaybackReport>, EngineError> {
        let Some(run) = self.current.as_mut() else {
            return Ok(None);
        };
        let result = run.handle.join().await;
        self.current = None;
        result.map(Some)
    }

    pub fn into_events(mut self) -> Vec<E> {
        self.stop();
        self.events
    }

    fn start(&mut self, plan: Vec<E>, base: Instant) {
        let handle = self.scheduler.play(plan.clone(), base);
        self.current = Some(Run { handle, plan, base });
    }

    async fn halt(&mut self) {
        if let Some(run) = self.current.take() {
            run.handle.stop();
            if let Err(e) = run.handle.wait().await {
                warn!(error = %e, "previous run did not finish cleanly");
            }
        }
    }
}
