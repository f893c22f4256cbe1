use std::sync::Arc;

use retrace_core::AudioTransport;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::EngineError;
use crate::scheduler::PlaybackReport;
use crate::timeline::{DebugTrack, Timeline};

/// Reports from both tracks after a session finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub editor: Option<PlaybackReport>,
    pub debug: Option<PlaybackReport>,
}

/// Drives the editor timeline, the debug track and an optional audio
/// transport from one shared start instant. Control calls fan out to every
/// track; nothing else keeps them in step.
pub struct SessionPlayer {
    timeline: Timeline,
    debug: DebugTrack,
    audio: Option<Arc<dyn AudioTransport>>,
    /// Session time at `base`, while playing.
    origin: Option<(u64, Instant)>,
    paused_at: Option<u64>,
    /// Reports of tracks that already ended during the current `finish`.
    report: SessionReport,
}

impl SessionPlayer {
    pub fn new(timeline: Timeline, debug: DebugTrack) -> Self {
        Self {
            timeline,
            debug,
            audio: None,
            origin: None,
            paused_at: None,
            report: SessionReport::default(),
        }
    }

    pub fn with_audio(mut self, audio: Arc<dyn AudioTransport>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn debug_track(&self) -> &DebugTrack {
        &self.debug
    }

    pub fn duration(&self) -> u64 {
        self.timeline.duration().max(self.debug.duration())
    }

    /// Current session time in milliseconds.
    pub fn position(&self) -> u64 {
        match (self.origin, self.paused_at) {
            (_, Some(at)) => at,
            (Some((from, base)), None) => from + base.elapsed().as_millis() as u64,
            (None, None) => 0,
        }
    }

    #[instrument(skip(self))]
    pub async fn play_from(&mut self, from: u64) {
        let base = Instant::now();
        self.timeline.play_from(from, base).await;
        self.debug.play_from(from, base).await;
        if let Some(audio) = &self.audio {
            if let Err(e) = audio.start(from).await {
                warn!(error = %e, "audio failed to start, continuing without it");
            }
        }
        self.origin = Some((from, base));
        self.paused_at = None;
        self.report = SessionReport::default();
        info!("session playing");
    }

    pub async fn seek(&mut self, to: u64) {
        self.play_from(to).await;
    }

    pub async fn stop(&mut self) {
        self.timeline.stop();
        self.debug.stop();
        if let Some(audio) = &self.audio {
            audio.stop().await;
        }
        self.origin = None;
        self.paused_at = None;
        info!("session stopped");
    }

    pub async fn pause(&mut self) {
        if self.origin.is_none() || self.paused_at.is_some() {
            return;
        }
        let at = self.position();
        self.timeline.pause().await;
        self.debug.pause().await;
        if let Some(audio) = &self.audio {
            audio.pause().await;
        }
        self.paused_at = Some(at);
        info!(at, "session paused");
    }

    pub async fn resume(&mut self) {
        let Some(at) = self.paused_at.take() else {
            return;
        };
        let base = Instant::now();
        self.timeline.resume(base);
        self.debug.resume(base);
        if let Some(audio) = &self.audio {
            audio.resume().await;
        }
        self.origin = Some((at, base));
        info!(at, "session resumed");
    }

    /// Wait for both tracks to end. Safe to drop mid-wait: a track that
    /// already ended keeps its report for the next call.
    pub async fn finish(&mut self) -> Result<SessionReport, EngineError> {
        if let Some(editor) = self.timeline.finish().await? {
            self.report.editor = Some(editor);
        }
        if let Some(debug) = self.debug.finish().await? {
            self.report.debug = Some(debug);
        }
        self.origin = None;
        Ok(std::mem::take(&mut self.report))
    }
}
