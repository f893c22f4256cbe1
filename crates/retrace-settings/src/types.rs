//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every section implements [`Default`]
//! and is `#[serde(default)]`, so a partial file only overrides what it names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root settings, loaded from `~/.retrace/settings.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetraceSettings {
    pub version: String,
    pub logging: LoggingSettings,
    pub playback: PlaybackSettings,
    pub session: SessionSettings,
}

impl Default for RetraceSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            logging: LoggingSettings::default(),
            playback: PlaybackSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter. `RUST_LOG` still wins when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module level overrides, e.g. `{"retrace_engine": "debug"}`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackSettings {
    /// An applier call running longer than this is logged as slow. Playback
    /// still waits for it to finish.
    pub slow_apply_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            slow_apply_ms: 10_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// File name of the session document inside a session directory.
    pub file_name: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            file_name: "session.json".to_string(),
        }
    }
}
