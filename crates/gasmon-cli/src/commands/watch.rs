//! Watch command implementation.
//!
//! Runs the live dashboard for one device: every snapshot change is printed,
//! the alarm rings the terminal bell while the status is ALERT, and single
//! letter commands typed on stdin (followed by Enter) drive the alarm.
//! With `--demo` the dashboard reads an in-memory store fed by the simulator.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use gasmon_core::{
    AlarmController, AlarmHandle, AlarmState, AudioOutput, Dashboard, DashboardSnapshot,
    DataStore, DeviceId, MockStore,
};

use crate::audio::TerminalBell;
use crate::cli::{OutputFormat, Pattern};
use crate::commands::simulate::{SimulateArgs, run_simulator};
use crate::format::{
    FormatOptions, format_snapshot_csv_header, format_snapshot_csv_line, format_snapshot_json,
    format_snapshot_line,
};
use crate::style;
use crate::util::append_output;

/// Interval of the demo simulator.
const DEMO_INTERVAL: Duration = Duration::from_secs(1);

/// Operator commands read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    EnableSound,
    StopAlarm,
    TestAlarm,
    Quit,
}

/// Map one input line to a command. Unknown input is ignored.
pub fn parse_key(line: &str) -> Option<Key> {
    match line.trim().to_ascii_lowercase().as_str() {
        "e" | "enable" | "sound" => Some(Key::EnableSound),
        "s" | "stop" | "mute" => Some(Key::StopAlarm),
        "t" | "test" => Some(Key::TestAlarm),
        "q" | "quit" | "exit" => Some(Key::Quit),
        _ => None,
    }
}

/// Where the data comes from.
pub enum Source {
    Store(Arc<dyn DataStore>),
    Demo,
}

/// Arguments for the watch command.
pub struct WatchArgs<'a> {
    pub source: Source,
    pub device: DeviceId,
    pub sound: bool,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

/// Turns snapshots into output, skipping updates that would print the same
/// line twice.
pub struct Renderer {
    format: OutputFormat,
    opts: FormatOptions,
    header_written: bool,
    last: Option<String>,
}

impl Renderer {
    pub fn new(format: OutputFormat, opts: FormatOptions) -> Self {
        Self {
            format,
            header_written: opts.no_header,
            opts,
            last: None,
        }
    }

    /// Text to emit for this update, if any.
    pub fn render(
        &mut self,
        snapshot: &DashboardSnapshot,
        alarm: &AlarmState,
    ) -> Result<Option<String>> {
        let line = match self.format {
            OutputFormat::Text => format_snapshot_line(snapshot, Some(alarm), &self.opts),
            OutputFormat::Json => format_snapshot_json(snapshot, Some(alarm))?,
            OutputFormat::Csv => format_snapshot_csv_line(snapshot),
        };
        if line.is_empty() || self.last.as_deref() == Some(line.as_str()) {
            return Ok(None);
        }
        self.last = Some(line.clone());

        if self.format == OutputFormat::Csv && !self.header_written {
            self.header_written = true;
            return Ok(Some(format!("{}{}", format_snapshot_csv_header(), line)));
        }
        Ok(Some(line))
    }
}

/// Forward stdin commands until stdin closes or the receiver goes away.
fn spawn_key_reader(tx: mpsc::Sender<Key>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(key) = parse_key(&line)
                && tx.send(key).await.is_err()
            {
                break;
            }
        }
        debug!("Key reader stopped");
    })
}

/// Operator-facing text for a command that failed.
fn key_failure_message(key: Key, err: &dyn std::fmt::Display) -> String {
    match key {
        Key::EnableSound => format!("Sound unavailable: {}", err),
        Key::StopAlarm => format!("Could not stop the alarm: {}", err),
        Key::TestAlarm => format!("Alarm test failed: {}", err),
        Key::Quit => format!("Quit failed: {}", err),
    }
}

/// Apply one operator command. Returns false to quit.
async fn handle_key(alarm: &AlarmHandle, key: Key, quiet: bool, no_color: bool) -> bool {
    let result = match key {
        Key::Quit => return false,
        Key::EnableSound => alarm.enable_sound().await,
        Key::StopAlarm => alarm.stop_alarm().await,
        Key::TestAlarm => alarm.start_test().await,
    };
    if let Err(e) = result {
        warn!("{:?} failed: {}", key, e);
        if !quiet {
            eprintln!(
                "{}",
                style::format_warning(&key_failure_message(key, &e), no_color)
            );
        }
    }
    true
}

/// Drive the dashboard until `stop` resolves, a quit key arrives or the
/// dashboard ends. Returns the last alarm state.
pub async fn run_dashboard<F>(
    store: Arc<dyn DataStore>,
    device: DeviceId,
    audio: Arc<dyn AudioOutput>,
    sound: bool,
    mut keys: mpsc::Receiver<Key>,
    renderer: &mut Renderer,
    mut emit: impl FnMut(&str) -> Result<()>,
    stop: F,
) -> Result<AlarmState>
where
    F: Future<Output = ()>,
{
    let controller = AlarmController::start(audio);
    let alarm = controller.handle();
    let dashboard = Dashboard::start(store, device, Some(alarm.clone())).await;

    let mut snapshots = dashboard.subscribe();
    let mut alarm_states = alarm.subscribe();

    if sound {
        handle_key(&alarm, Key::EnableSound, true, true).await;
    }

    let result = async {
        if let Some(text) = renderer.render(&snapshots.borrow_and_update(), &alarm.state())? {
            emit(&text)?;
        }

        tokio::pin!(stop);
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = alarm_states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(key) = keys.recv() => {
                    if !handle_key(&alarm, key, false, renderer.opts.no_color).await {
                        break;
                    }
                }
            }

            let snapshot = snapshots.borrow_and_update().clone();
            let state = *alarm_states.borrow_and_update();
            if let Some(text) = renderer.render(&snapshot, &state)? {
                emit(&text)?;
            }
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    let last = alarm.state();
    dashboard.shutdown().await;
    controller.shutdown().await;
    result.map(|()| last)
}

pub async fn cmd_watch(args: WatchArgs<'_>) -> Result<()> {
    let WatchArgs {
        source,
        device,
        sound,
        format,
        output,
        quiet,
        opts,
    } = args;

    let cancel = CancellationToken::new();
    let (store, simulator): (Arc<dyn DataStore>, _) = match source {
        Source::Store(store) => (store, None),
        Source::Demo => {
            let store: Arc<dyn DataStore> = Arc::new(MockStore::new());
            let sim = SimulateArgs {
                store: Arc::clone(&store),
                device: device.clone(),
                interval: DEMO_INTERVAL,
                count: 0,
                pattern: Pattern::Wave,
                quiet: true,
                no_color: opts.no_color,
            };
            let task = tokio::spawn(run_simulator(sim, cancel.clone()));
            (store, Some(task))
        }
    };

    if !quiet {
        eprintln!(
            "Watching {}{} | keys: e=sound s=stop t=test q=quit (then Enter) | Ctrl+C to exit",
            device,
            if simulator.is_some() { " (demo)" } else { "" }
        );
    }

    let (key_tx, key_rx) = mpsc::channel(8);
    let key_reader = spawn_key_reader(key_tx);
    let mut renderer = Renderer::new(format, *opts);

    let result = run_dashboard(
        store,
        device,
        Arc::new(TerminalBell::new()),
        sound,
        key_rx,
        &mut renderer,
        |text| append_output(output, text),
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )
    .await;

    key_reader.abort();
    cancel.cancel();
    if let Some(task) = simulator {
        match task.await {
            Ok(Ok(written)) => debug!("Demo simulator wrote {} readings", written),
            Ok(Err(e)) => warn!("Demo simulator failed: {}", e),
            Err(e) => warn!("Demo simulator task ended abnormally: {}", e),
        }
    }

    result.map(|_| ())
}
