//! Turns host editor activity into an event log.
//!
//! The recorder owns all of its state. Host callbacks are modeled as
//! [`Activity`] values and fed through [`Recorder::record`], either directly
//! or from a channel via [`Recorder::run`].

mod folds;
mod groups;
mod pending;

pub use folds::{FoldTracker, ViewportChange};
pub use groups::{GroupState, GroupTracker, GroupTransition};
pub use pending::PendingPaths;

use retrace_core::debug::DebugEvent;
use retrace_core::{
    ContentEdit, DocPath, Event, EventPayload, Range, Selection, SessionId, ViewColumn,
};
use retrace_store::{PathCodec, SessionDocument, SessionLog};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::EngineError;

/// One host callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Activity {
    Opened {
        path: DocPath,
        content: String,
        view_column: Option<ViewColumn>,
    },
    Closed {
        path: DocPath,
        content: String,
        view_column: Option<ViewColumn>,
    },
    Created {
        path: DocPath,
        content: String,
    },
    Deleted {
        path: DocPath,
    },
    Renamed {
        old_path: DocPath,
        new_path: DocPath,
        content: String,
    },
    Saved {
        path: DocPath,
        content: String,
        view_column: Option<ViewColumn>,
    },
    Changed {
        path: DocPath,
        view_column: Option<ViewColumn>,
        edits: Vec<ContentEdit>,
    },
    SelectionChanged {
        path: DocPath,
        view_column: Option<ViewColumn>,
        selections: Vec<Selection>,
    },
    /// Viewport moved. Folding is inferred from gaps between the ranges.
    VisibleRangesChanged {
        path: DocPath,
        view_column: Option<ViewColumn>,
        ranges: Vec<Range>,
        line_count: u32,
    },
    ViewColumnChanged {
        path: DocPath,
        view_column: Option<ViewColumn>,
    },
    /// An editor became the active one.
    EditorShown {
        path: DocPath,
        view_column: Option<ViewColumn>,
        selections: Vec<Selection>,
        ranges: Vec<Range>,
    },
    VisibleEditorsChanged {
        editors: Vec<VisibleEditor>,
    },
    DebugSessionStarted {
        name: String,
    },
    DebugSessionStopped,
}

impl Activity {
    fn paths(&self) -> Vec<&DocPath> {
        match self {
            Self::Opened { path, .. }
            | Self::Closed { path, .. }
            | Self::Created { path, .. }
            | Self::Deleted { path }
            | Self::Saved { path, .. }
            | Self::Changed { path, .. }
            | Self::SelectionChanged { path, .. }
            | Self::VisibleRangesChanged { path, .. }
            | Self::ViewColumnChanged { path, .. }
            | Self::EditorShown { path, .. } => vec![path],
            Self::Renamed {
                old_path, new_path, ..
            } => vec![old_path, new_path],
            Self::VisibleEditorsChanged { .. }
            | Self::DebugSessionStarted { .. }
            | Self::DebugSessionStopped => Vec::new(),
        }
    }

    /// Completion callbacks for the mutations the player performs.
    fn completes_mutation(&self) -> bool {
        matches!(
            self,
            Self::Opened { .. }
                | Self::Created { .. }
                | Self::Deleted { .. }
                | Self::Saved { .. }
                | Self::Renamed { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleEditor {
    pub path: DocPath,
    pub view_column: Option<ViewColumn>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenDocument {
    pub path: DocPath,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Stopped,
}

impl RecorderState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopped => "stopped",
        }
    }
}

pub struct Recorder {
    id: SessionId,
    state: RecorderState,
    start_time: u64,
    last_time: u64,
    events: Vec<Event>,
    debug_events: Vec<DebugEvent>,
    pending: PendingPaths,
    folds: FoldTracker,
    groups: GroupTracker,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            state: RecorderState::Idle,
            start_time: 0,
            last_time: 0,
            events: Vec::new(),
            debug_events: Vec::new(),
            pending: PendingPaths::default(),
            folds: FoldTracker::default(),
            groups: GroupTracker::default(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Raw log, times in epoch milliseconds.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn debug_events(&self) -> &[DebugEvent] {
        &self.debug_events
    }

    /// Begin recording. Every open document gets an `Open` event; the focused
    /// one goes last and keeps its view column.
    #[instrument(skip(self, documents), fields(session_id = %self.id, documents = documents.len()))]
    pub fn start(
        &mut self,
        start_time: u64,
        documents: Vec<OpenDocument>,
        focused: Option<VisibleEditor>,
    ) -> Result<(), EngineError> {
        if self.state != RecorderState::Idle {
            return Err(EngineError::RecorderState {
                expected: RecorderState::Idle.as_str(),
                actual: self.state.as_str(),
            });
        }
        self.state = RecorderState::Recording;
        self.start_time = start_time;
        self.last_time = start_time;

        let (focused_doc, others): (Vec<_>, Vec<_>) = documents
            .into_iter()
            .partition(|d| focused.as_ref().is_some_and(|f| f.path == d.path));

        for doc in others {
            self.push(EventPayload::Open {
                path: doc.path,
                content: doc.content,
                view_column: None,
            });
        }
        if let (Some(doc), Some(editor)) = (focused_doc.into_iter().last(), focused) {
            self.push(EventPayload::Open {
                path: doc.path,
                content: doc.content,
                view_column: editor.view_column,
            });
        }

        info!(events = self.events.len(), "recording started");
        Ok(())
    }

    pub fn start_now(
        &mut self,
        documents: Vec<OpenDocument>,
        focused: Option<VisibleEditor>,
    ) -> Result<(), EngineError> {
        self.start(now_ms(), documents, focused)
    }

    /// Mark a path as about to be mutated by playback. The next lifecycle
    /// callback for it is treated as feedback.
    pub fn suppress(&mut self, path: DocPath) {
        self.pending.push(path);
    }

    pub fn release(&mut self, path: &DocPath) -> bool {
        self.pending.release(path)
    }

    pub fn record(&mut self, activity: Activity) {
        self.record_at(activity, now_ms());
    }

    /// Ingest one activity observed at `at` (epoch milliseconds). Times
    /// earlier than the previous event are clamped forward.
    pub fn record_at(&mut self, activity: Activity, at: u64) {
        if self.state != RecorderState::Recording {
            debug!(state = self.state.as_str(), "activity ignored");
            return;
        }
        if self.is_feedback(&activity) {
            return;
        }
        self.last_time = self.last_time.max(at);

        match activity {
            Activity::Opened {
                path,
                content,
                view_column,
            } => self.push(EventPayload::Open {
                path,
                content,
                view_column,
            }),
            Activity::Closed {
                path,
                content,
                view_column,
            } => {
                self.folds.forget(&path);
                self.push(EventPayload::Close {
                    path,
                    content,
                    view_column,
                });
            }
            Activity::Created { path, content } => self.push(EventPayload::Create { path, content }),
            Activity::Deleted { path } => {
                self.folds.forget(&path);
                self.push(EventPayload::Delete { path });
            }
            Activity::Renamed {
                old_path,
                new_path,
                content,
            } => {
                self.folds.forget(&old_path);
                self.push(EventPayload::Rename {
                    old_path,
                    new_path,
                    content,
                });
            }
            Activity::Saved {
                path,
                content,
                view_column,
            } => self.push(EventPayload::Save {
                path,
                content,
                view_column,
            }),
            Activity::Changed {
                path,
                view_column,
                edits,
            } => self.push(EventPayload::Change {
                path,
                view_column,
                edits,
            }),
            Activity::SelectionChanged {
                path,
                view_column,
                selections,
            } => self.push(EventPayload::Selection {
                path,
                view_column,
                selections,
            }),
            Activity::VisibleRangesChanged {
                path,
                view_column,
                ranges,
                line_count,
            } => self.record_viewport(path, view_column, ranges, line_count),
            Activity::ViewColumnChanged { path, view_column } => {
                self.push(EventPayload::ViewColumn { path, view_column })
            }
            Activity::EditorShown {
                path,
                view_column,
                selections,
                ranges,
            } => self.push(EventPayload::Visible {
                path,
                view_column,
                selections,
                ranges,
            }),
            Activity::VisibleEditorsChanged { editors } => self.record_visible_editors(editors),
            Activity::DebugSessionStarted { name } => {
                self.debug_events.push(DebugEvent::DebugStart {
                    time: self.last_time,
                    name,
                });
            }
            Activity::DebugSessionStopped => {
                self.debug_events.push(DebugEvent::DebugStop {
                    time: self.last_time,
                });
            }
        }
    }

    pub fn stop(&mut self) {
        if self.state == RecorderState::Recording {
            self.state = RecorderState::Stopped;
            info!(session_id = %self.id, events = self.events.len(), "recording stopped");
        }
    }

    /// The host stopped delivering callbacks. The log so far stays valid.
    pub fn subscription_lost(&mut self) {
        if self.state == RecorderState::Recording {
            self.state = RecorderState::Stopped;
            warn!(session_id = %self.id, events = self.events.len(), "activity subscription lost, recording stopped");
        }
    }

    /// Log with times relative to the session start.
    pub fn export_log(&self) -> SessionLog {
        SessionLog {
            id: Some(self.id.clone()),
            events: self
                .events
                .iter()
                .map(|e| e.shifted_back(self.start_time))
                .collect(),
            debug_events: self
                .debug_events
                .iter()
                .map(|e| e.at(retrace_core::Timed::time(e).saturating_sub(self.start_time)))
                .collect(),
        }
    }

    pub fn export(&self, codec: &PathCodec) -> SessionDocument {
        SessionDocument::encode(&self.export_log(), codec)
    }

    /// Drain activity from `rx` until the token is cancelled (a stop) or the
    /// channel closes (a lost subscription).
    pub async fn run(mut self, mut rx: mpsc::Receiver<Activity>, cancel: CancellationToken) -> Self {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.stop();
                    break;
                }
                msg = rx.recv() => match msg {
                    Some(activity) => self.record(activity),
                    None => {
                        self.subscription_lost();
                        break;
                    }
                },
            }
        }
        self
    }

    fn is_feedback(&mut self, activity: &Activity) -> bool {
        let pending: Vec<DocPath> = activity
            .paths()
            .into_iter()
            .filter(|p| self.pending.contains(p))
            .cloned()
            .collect();
        if pending.is_empty() {
            return false;
        }
        if activity.completes_mutation() {
            for path in &pending {
                self.pending.release(path);
            }
        }
        debug!(paths = pending.len(), "playback feedback dropped");
        true
    }

    fn record_viewport(
        &mut self,
        path: DocPath,
        view_column: Option<ViewColumn>,
        ranges: Vec<Range>,
        line_count: u32,
    ) {
        match self.folds.observe(&path, view_column, &ranges, line_count) {
            ViewportChange::Unfolded(lines) => {
                for line in lines {
                    self.push(EventPayload::FoldDown {
                        path: path.clone(),
                        view_column,
                        line,
                    });
                }
            }
            ViewportChange::Folded(lines) => {
                for line in lines {
                    self.push(EventPayload::FoldUp {
                        path: path.clone(),
                        view_column,
                        line,
                    });
                }
            }
            ViewportChange::Scrolled => self.push(EventPayload::VisibleRange {
                path,
                view_column,
                ranges,
            }),
        }
    }

    fn record_visible_editors(&mut self, editors: Vec<VisibleEditor>) {
        let visible: Vec<(DocPath, Option<ViewColumn>)> = editors
            .into_iter()
            .map(|e| (e.path, e.view_column))
            .collect();
        for transition in self.groups.observe(&visible) {
            let payload = match transition {
                GroupTransition::Group(path, column) => EventPayload::Group {
                    path,
                    view_column: Some(column),
                },
                GroupTransition::Ungroup(path, column) => EventPayload::Ungroup {
                    path,
                    view_column: Some(column),
                },
            };
            if !self.pending.contains(payload.path()) {
                self.push(payload);
            }
        }
    }

    fn push(&mut self, payload: EventPayload) {
        self.events.push(Event::new(self.last_time, payload));
    }
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
