//! Alarm runtime: audio output, beep loop and the alarm controller task.
//!
//! [`AlarmController`] owns an [`AlarmMachine`] on a single task and
//! executes its effects: it runs at most one [`BeepLoop`] and one test
//! countdown. Callers talk to it through a cloneable [`AlarmHandle`]; every
//! command answers with the resulting [`AlarmState`].
//!
//! The controller has an explicit lifecycle. [`AlarmController::start`]
//! spawns the task; [`AlarmController::shutdown`] stops the loop, cancels the
//! countdown and waits for the task to exit. Dropping the controller cancels
//! it as well.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gasmon_types::Status;

use crate::alarm::{AlarmEffect, AlarmMachine, AlarmState};
use crate::error::{Error, Result};

/// Time between two beeps.
pub const BEEP_INTERVAL: Duration = Duration::from_millis(550);
/// Length of a single beep.
pub const BEEP_DURATION: Duration = Duration::from_millis(180);
/// Pitch of the alarm beep.
pub const BEEP_FREQUENCY_HZ: f32 = 950.0;

/// A single tone to play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Pitch in hertz.
    pub frequency_hz: f32,
    /// How long the tone lasts.
    pub duration: Duration,
}

impl Tone {
    /// The alarm beep.
    pub const ALARM: Tone = Tone {
        frequency_hz: BEEP_FREQUENCY_HZ,
        duration: BEEP_DURATION,
    };
}

/// Audio sink used by the alarm.
///
/// Platforms that block autoplay require [`resume`](Self::resume) to be
/// called from an explicit operator action before any tone is heard.
#[async_trait]
pub trait AudioOutput: Send + Sync + 'static {
    /// Unlock the output.
    async fn resume(&self) -> Result<()>;

    /// Play one tone without blocking.
    fn beep(&self, tone: Tone);
}

/// Audio output that plays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

#[async_trait]
impl AudioOutput for SilentAudio {
    async fn resume(&self) -> Result<()> {
        Ok(())
    }

    fn beep(&self, _tone: Tone) {}
}

/// A repeating beep on a fixed cadence.
///
/// At most one loop task runs per `BeepLoop`; [`start`](Self::start) is a
/// no-op while running and [`stop`](Self::stop) is idempotent.
pub struct BeepLoop {
    audio: Arc<dyn AudioOutput>,
    cadence: Duration,
    tone: Tone,
    running: Option<CancellationToken>,
}

impl std::fmt::Debug for BeepLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeepLoop")
            .field("cadence", &self.cadence)
            .field("tone", &self.tone)
            .field("running", &self.running.is_some())
            .finish()
    }
}

impl BeepLoop {
    /// Create a loop with the standard alarm cadence and tone.
    pub fn new(audio: Arc<dyn AudioOutput>) -> Self {
        Self::with_cadence(audio, BEEP_INTERVAL, Tone::ALARM)
    }

    /// Create a loop with a custom cadence and tone.
    pub fn with_cadence(audio: Arc<dyn AudioOutput>, cadence: Duration, tone: Tone) -> Self {
        Self {
            audio,
            cadence,
            tone,
            running: None,
        }
    }

    /// Whether the loop task is running.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start beeping. Returns `false` if a loop was already running.
    ///
    /// The first beep plays one cadence after the start.
    pub fn start(&mut self) -> bool {
        if self.running.is_some() {
            return false;
        }
        let token = CancellationToken::new();
        let task_token = token.clone();
        let audio = Arc::clone(&self.audio);
        let tone = self.tone;
        let cadence = self.cadence;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + cadence, cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => audio.beep(tone),
                }
            }
            debug!("Beep loop stopped");
        });

        self.running = Some(token);
        true
    }

    /// Stop beeping. Returns `false` if nothing was running.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for BeepLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

enum AlarmCommand {
    Status(Status),
    StopAlarm,
    StartTest,
    EnableSound,
}

type Request = (AlarmCommand, oneshot::Sender<Result<AlarmState>>);

/// Cloneable handle for sending operator actions and statuses to the alarm.
#[derive(Clone)]
pub struct AlarmHandle {
    commands: mpsc::Sender<Request>,
    state: watch::Receiver<AlarmState>,
}

impl std::fmt::Debug for AlarmHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmHandle")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl AlarmHandle {
    async fn request(&self, command: AlarmCommand) -> Result<AlarmState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send((command, reply_tx))
            .await
            .map_err(|_| Error::Cancelled)?;
        reply_rx.await.map_err(|_| Error::Cancelled)?
    }

    /// Feed the latest derived status.
    pub async fn update_status(&self, status: Status) -> Result<AlarmState> {
        self.request(AlarmCommand::Status(status)).await
    }

    /// "Stop alarm": mute a real alert or end a test. Safe when idle.
    pub async fn stop_alarm(&self) -> Result<AlarmState> {
        self.request(AlarmCommand::StopAlarm).await
    }

    /// Start a 10 second test alarm.
    pub async fn start_test(&self) -> Result<AlarmState> {
        self.request(AlarmCommand::StartTest).await
    }

    /// Unlock audio. On failure sound stays disabled and the error is returned.
    pub async fn enable_sound(&self) -> Result<AlarmState> {
        self.request(AlarmCommand::EnableSound).await
    }

    /// Latest published state.
    pub fn state(&self) -> AlarmState {
        *self.state.borrow()
    }

    /// Watch state changes, including test expiry.
    pub fn subscribe(&self) -> watch::Receiver<AlarmState> {
        self.state.clone()
    }
}

/// Owner of the alarm task.
pub struct AlarmController {
    handle: AlarmHandle,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AlarmController {
    /// Spawn the alarm task with the given audio output.
    pub fn start(audio: Arc<dyn AudioOutput>) -> Self {
        Self::start_with_loop(Arc::clone(&audio), BeepLoop::new(audio))
    }

    /// Spawn the alarm task with a custom beep loop.
    pub fn start_with_loop(audio: Arc<dyn AudioOutput>, beeper: BeepLoop) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(AlarmState::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_alarm(
            audio,
            beeper,
            commands_rx,
            state_tx,
            cancel.clone(),
        ));

        Self {
            handle: AlarmHandle {
                commands: commands_tx,
                state: state_rx,
            },
            cancel,
            task: Some(task),
        }
    }

    /// A handle for sending commands.
    pub fn handle(&self) -> AlarmHandle {
        self.handle.clone()
    }

    /// Stop sound, cancel the countdown and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("Alarm task ended abnormally: {}", e);
        }
    }
}

impl Drop for AlarmController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Runtime {
    machine: AlarmMachine,
    beeper: BeepLoop,
    test_deadline: Option<Instant>,
}

impl Runtime {
    fn apply(&mut self, effects: Vec<AlarmEffect>) {
        for effect in effects {
            match effect {
                AlarmEffect::StartBeeping => {
                    if self.beeper.start() {
                        debug!("Beep loop started");
                    }
                }
                AlarmEffect::StopBeeping => {
                    self.beeper.stop();
                }
                AlarmEffect::ScheduleTestEnd(after) => {
                    self.test_deadline = Some(Instant::now() + after);
                }
                AlarmEffect::CancelTestEnd => {
                    self.test_deadline = None;
                }
            }
        }
    }
}

async fn run_alarm(
    audio: Arc<dyn AudioOutput>,
    beeper: BeepLoop,
    mut commands: mpsc::Receiver<Request>,
    state_tx: watch::Sender<AlarmState>,
    cancel: CancellationToken,
) {
    let mut rt = Runtime {
        machine: AlarmMachine::new(),
        beeper,
        test_deadline: None,
    };

    loop {
        let deadline = rt.test_deadline;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                rt.test_deadline = None;
                info!("Test alarm finished");
                let effects = rt.machine.test_elapsed();
                rt.apply(effects);
            }
            request = commands.recv() => {
                let Some((command, reply)) = request else { break };
                let outcome = match command {
                    AlarmCommand::Status(status) => {
                        let effects = rt.machine.on_status(status);
                        rt.apply(effects);
                        Ok(())
                    }
                    AlarmCommand::StopAlarm => {
                        let effects = rt.machine.stop_alarm();
                        rt.apply(effects);
                        Ok(())
                    }
                    AlarmCommand::StartTest => {
                        info!("Test alarm started");
                        let effects = rt.machine.start_test();
                        rt.apply(effects);
                        Ok(())
                    }
                    AlarmCommand::EnableSound => {
                        let resumed = audio.resume().await;
                        if let Err(e) = &resumed {
                            warn!("Could not enable sound: {}", e);
                        }
                        let effects = rt.machine.set_sound_enabled(resumed.is_ok());
                        rt.apply(effects);
                        resumed
                    }
                };
                let state = rt.machine.state();
                state_tx.send_replace(state);
                let _ = reply.send(outcome.map(|()| state));
                continue;
            }
        }
        state_tx.send_replace(rt.machine.state());
    }

    let effects = rt.machine.shutdown();
    rt.apply(effects);
    rt.beeper.stop();
    state_tx.send_replace(rt.machine.state());
    debug!("Alarm task stopped");
}
