use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use retrace_core::debug::DebugEvent;
use retrace_core::{Applier, ApplyError, Event, Timed};
use retrace_engine::{DebugTrack, Seekable, SessionPlayer, Timeline};
use retrace_settings::RetraceSettings;
use retrace_store::{load_session, PathCodec, SessionDocument, SessionLog};
use retrace_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "retrace", about = "Inspect and replay recorded editor sessions")]
struct Cli {
    /// Session root that stored paths are relative to. Defaults to the
    /// directory holding the session file.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a session.
    Inspect { session: PathBuf },
    /// Print the session as it would be played after seeking to `--at`.
    Seek {
        session: PathBuf,
        #[arg(long)]
        at: u64,
    },
    /// Play a session through a logging applier.
    Replay {
        session: PathBuf,
        #[arg(long, default_value_t = 0)]
        from: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match retrace_settings::load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("retrace: settings unreadable, using defaults: {e}");
            RetraceSettings::default()
        }
    };
    init_telemetry(&TelemetryConfig::from(&settings.logging));

    match cli.command {
        Command::Inspect { session } => {
            let (log, _) = open(&session, cli.root.as_deref(), &settings)?;
            inspect(&log);
        }
        Command::Seek { session, at } => {
            let (log, codec) = open(&session, cli.root.as_deref(), &settings)?;
            let doc = seek_document(&log, at, &codec);
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Command::Replay { session, from } => {
            let (log, _) = open(&session, cli.root.as_deref(), &settings)?;
            replay(log, from, &settings).await?;
        }
    }
    Ok(())
}

/// A directory argument resolves to the configured session file inside it.
fn open(session: &Path, root: Option<&Path>, settings: &RetraceSettings) -> Result<(SessionLog, PathCodec)> {
    let file = if session.is_dir() {
        session.join(&settings.session.file_name)
    } else {
        session.to_path_buf()
    };
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let codec = PathCodec::new(root);
    let log = load_session(&file, &codec)
        .with_context(|| format!("session {} cannot be loaded", file.display()))?;
    Ok((log, codec))
}

/// The session as played after seeking to `at`, loadable like any session.
fn seek_document(log: &SessionLog, at: u64, codec: &PathCodec) -> SessionDocument {
    let planned = SessionLog {
        id: log.id.clone(),
        events: Event::plan(&log.events, at),
        debug_events: DebugEvent::plan(&log.debug_events, at),
    };
    SessionDocument::encode_plan(&planned, codec)
}

fn inspect(log: &SessionLog) {
    let mut kinds: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in &log.events {
        *kinds.entry(event.kind().as_str()).or_default() += 1;
    }
    let duration = log.events.last().map(Event::time).unwrap_or(0);

    if let Some(id) = &log.id {
        println!("session   {id}");
    }
    println!("events    {}", log.events.len());
    println!("duration  {duration}ms");
    println!("debug     {}", log.debug_events.len());
    for (kind, count) in kinds {
        println!("  {kind:<14}{count}");
    }
}

async fn replay(log: SessionLog, from: u64, settings: &RetraceSettings) -> Result<()> {
    let slow_apply = Duration::from_millis(settings.playback.slow_apply_ms);
    let applier = Arc::new(LoggingApplier);
    let timeline = Timeline::new(log.events, applier.clone()).with_slow_apply(slow_apply);
    let debug = DebugTrack::new(log.debug_events, applier).with_slow_apply(slow_apply);
    let mut player = SessionPlayer::new(timeline, debug);

    info!(from, duration = player.duration(), "replaying session");
    player.play_from(from).await;

    let finished = tokio::select! {
        result = player.finish() => Some(result?),
        _ = tokio::signal::ctrl_c() => None,
    };
    let report = match finished {
        Some(report) => report,
        None => {
            warn!("interrupted, stopping playback");
            player.stop().await;
            player.finish().await?
        }
    };

    if let Some(editor) = report.editor {
        info!(
            applied = editor.applied,
            failed = editor.failed,
            cancelled = editor.cancelled,
            "replay finished"
        );
    }
    if let Some(debug_report) = report.debug {
        info!(applied = debug_report.applied, cancelled = debug_report.cancelled, "debug track finished");
    }
    Ok(())
}

/// Applier that only reports what it would do.
struct LoggingApplier;

#[async_trait]
impl Applier<Event> for LoggingApplier {
    async fn apply(&self, event: &Event) -> Result<(), ApplyError> {
        info!(
            time = event.time(),
            kind = %event.kind(),
            path = %event.path(),
            view_column = ?event.view_column(),
            "apply"
        );
        Ok(())
    }
}

#[async_trait]
impl Applier<DebugEvent> for LoggingApplier {
    async fn apply(&self, event: &DebugEvent) -> Result<(), ApplyError> {
        match event {
            DebugEvent::DebugStart { name, .. } => info!(time = event.time(), name, "debug session start"),
            DebugEvent::DebugStop { .. } => info!(time = event.time(), "debug session stop"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::{DocPath, EventPayload, Position, Selection, ViewColumn};
    use retrace_store::{save_session, write_document};

    #[test]
    fn directory_argument_opens_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PathCodec::new(dir.path());
        let log = SessionLog {
            id: None,
            events: vec![Event::new(
                0,
                EventPayload::Delete {
                    path: DocPath::new(dir.path().join("src/a.rs")),
                },
            )],
            debug_events: vec![],
        };
        save_session(&dir.path().join("session.json"), &log, &codec).unwrap();

        let (loaded, _) = open(dir.path(), None, &RetraceSettings::default()).unwrap();
        assert_eq!(loaded, log);
    }

    #[test]
    fn missing_session_reports_cannot_be_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let err = open(&dir.path().join("gone.json"), None, &RetraceSettings::default()).unwrap_err();
        assert!(err.to_string().contains("cannot be loaded"));
    }

    #[test]
    fn seek_output_loads_as_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PathCodec::new(dir.path());
        let doc = |name: &str| DocPath::new(dir.path().join(name));
        let mut events: Vec<Event> = ["a.rs", "b.rs", "c.rs", "d.rs"]
            .iter()
            .zip(1..)
            .map(|(name, time)| {
                Event::new(
                    time,
                    EventPayload::Open { path: doc(name), content: String::new(), view_column: None },
                )
            })
            .collect();
        events.push(Event::new(
            12,
            EventPayload::Selection {
                path: doc("a.rs"),
                view_column: Some(ViewColumn(1)),
                selections: vec![Selection::caret(Position::new(3, 0))],
            },
        ));
        let log = SessionLog { id: None, events, debug_events: vec![] };
        save_session(&dir.path().join("session.json"), &log, &codec).unwrap();

        let (loaded, codec) = open(dir.path(), None, &RetraceSettings::default()).unwrap();
        let planned = dir.path().join("seek.json");
        write_document(&planned, &seek_document(&loaded, 10, &codec)).unwrap();

        // Four collapsed opens renumbered 0..=3, then the selection shifted to 2.
        let (replayable, _) = open(&planned, None, &RetraceSettings::default()).unwrap();
        let times: Vec<u64> = replayable.events.iter().map(Event::time).collect();
        assert_eq!(times, vec![0, 1, 2, 3, 2]);
        assert_eq!(replayable.events, Event::plan(&log.events, 10));
    }

    #[test]
    fn cli_parses_seek() {
        let cli = Cli::try_parse_from(["retrace", "seek", "s.json", "--at", "1500"]).unwrap();
        assert!(matches!(cli.command, Command::Seek { at: 1500, .. }));
    }
}
