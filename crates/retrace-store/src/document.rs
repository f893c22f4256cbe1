use serde::{Deserialize, Serialize};

use retrace_core::debug::DebugEvent;
use retrace_core::{Event, SessionId};

use crate::codec::{PathCodec, WireEvent};
use crate::error::CodecError;

pub const SESSION_VERSION: u32 = 1;

const DEBUG_START: u8 = 0;
const DEBUG_STOP: u8 = 1;

/// Stored debug-track event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDebugEvent {
    #[serde(rename = "type")]
    pub kind: u8,
    pub time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The durable session document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SessionId>,
    /// Set on a seek plan: a collapsed past numbered from zero followed by
    /// the shifted future, so event times may step back once.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub plan: bool,
    pub events: Vec<WireEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debug_events: Vec<WireDebugEvent>,
}

/// A decoded session: the editor log plus the debug track, times relative
/// to session start.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionLog {
    pub id: Option<SessionId>,
    pub events: Vec<Event>,
    pub debug_events: Vec<DebugEvent>,
}

impl SessionDocument {
    pub fn encode(log: &SessionLog, codec: &PathCodec) -> Self {
        Self {
            version: SESSION_VERSION,
            id: log.id.clone(),
            plan: false,
            events: log.events.iter().map(|e| codec.encode(e)).collect(),
            debug_events: log.debug_events.iter().map(debug_to_wire).collect(),
        }
    }

    /// Encode a log already prepared for playback from a seek point.
    pub fn encode_plan(log: &SessionLog, codec: &PathCodec) -> Self {
        Self {
            plan: true,
            ..Self::encode(log, codec)
        }
    }

    /// Decode every event. The first malformed event fails the whole
    /// document; nothing is partially returned. Recorded sessions must be in
    /// time order; plans are exempt.
    pub fn decode(self, codec: &PathCodec) -> Result<SessionLog, CodecError> {
        if self.version != SESSION_VERSION {
            return Err(CodecError::UnsupportedVersion(self.version));
        }

        let mut events = Vec::with_capacity(self.events.len());
        let mut last = 0u64;
        for (index, wire) in self.events.into_iter().enumerate() {
            let event = codec.decode(index, wire)?;
            if !self.plan && event.time() < last {
                return Err(CodecError::OutOfOrder {
                    index,
                    time: event.time(),
                });
            }
            last = event.time();
            events.push(event);
        }

        let debug_events = self
            .debug_events
            .into_iter()
            .enumerate()
            .map(|(index, wire)| debug_from_wire(index, wire))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SessionLog {
            id: self.id,
            events,
            debug_events,
        })
    }
}

fn debug_to_wire(event: &DebugEvent) -> WireDebugEvent {
    match event {
        DebugEvent::DebugStart { time, name } => WireDebugEvent {
            kind: DEBUG_START,
            time: *time,
            name: Some(name.clone()),
        },
        DebugEvent::DebugStop { time } => WireDebugEvent {
            kind: DEBUG_STOP,
            time: *time,
            name: None,
        },
    }
}

fn debug_from_wire(index: usize, wire: WireDebugEvent) -> Result<DebugEvent, CodecError> {
    match wire.kind {
        DEBUG_START => Ok(DebugEvent::DebugStart {
            time: wire.time,
            name: wire.name.ok_or(CodecError::MissingDebugName { index })?,
        }),
        DEBUG_STOP => Ok(DebugEvent::DebugStop { time: wire.time }),
        tag => Err(CodecError::UnknownDebugKind { index, tag }),
    }
}
