//! Audible alarm state machine.
//!
//! The machine is pure: every input returns the [`AlarmEffect`]s the caller
//! must perform (start or stop the beep loop, arm or cancel the test
//! countdown). [`crate::siren::AlarmController`] executes them against real
//! timers and audio; tests drive the machine directly.
//!
//! # State Machine
//!
//! ```text
//!            status ALERT                     stop_alarm
//!   Idle ───────────────────► Alerting(false) ──────────► Alerting(true)
//!    ▲                              │                          │
//!    │      status leaves ALERT     │                          │
//!    └──────────────────────────────┴──────────────────────────┘
//!
//!   Idle | Alerting(*) ── start_test ──► TestAlerting
//!   TestAlerting ── elapsed ──► Alerting(false) if real ALERT, else Idle
//!   TestAlerting ── stop_alarm ──► Alerting(true) if real ALERT, else Idle
//! ```
//!
//! The loop sounds in `Alerting(false)` and `TestAlerting`, and only while
//! sound is enabled. Real status changes during a test are tracked but never
//! start the loop; the test owns the sound until it ends.

use std::time::Duration;

use gasmon_types::Status;
use serde::Serialize;

/// Length of a manual test alarm.
pub const TEST_ALARM_DURATION: Duration = Duration::from_millis(10_000);

/// Current mode of the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmMode {
    /// No alert.
    #[default]
    Idle,
    /// The live status is ALERT.
    Alerting {
        /// Silenced by the operator until the status clears.
        muted: bool,
    },
    /// A manual test alarm is running.
    TestAlerting,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEffect {
    /// Start the repeating beep loop.
    StartBeeping,
    /// Stop the repeating beep loop.
    StopBeeping,
    /// Arm (or re-arm) the test countdown.
    ScheduleTestEnd(Duration),
    /// Cancel a pending test countdown.
    CancelTestEnd,
}

/// Observable alarm flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AlarmState {
    /// An alert (real or test) is active.
    pub is_alerting: bool,
    /// Audio has been unlocked by the operator.
    pub sound_enabled: bool,
    /// The real alert has been silenced.
    pub is_muted: bool,
    /// A test alarm is running.
    pub is_test_mode: bool,
    /// The beep loop is running.
    pub is_sounding: bool,
}

/// The alarm state machine.
#[derive(Debug, Default)]
pub struct AlarmMachine {
    mode: AlarmMode,
    real_alert: bool,
    sound_enabled: bool,
    sounding: bool,
}

impl AlarmMachine {
    /// Create a machine in the idle state with sound disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode.
    pub fn mode(&self) -> AlarmMode {
        self.mode
    }

    /// Whether the last observed live status was ALERT.
    pub fn real_alert(&self) -> bool {
        self.real_alert
    }

    /// Snapshot of the observable flags.
    pub fn state(&self) -> AlarmState {
        AlarmState {
            is_alerting: self.mode != AlarmMode::Idle,
            sound_enabled: self.sound_enabled,
            is_muted: matches!(self.mode, AlarmMode::Alerting { muted: true }),
            is_test_mode: self.mode == AlarmMode::TestAlerting,
            is_sounding: self.sounding,
        }
    }

    /// Feed a freshly derived status.
    pub fn on_status(&mut self, status: Status) -> Vec<AlarmEffect> {
        self.real_alert = status.is_alert();
        match self.mode {
            AlarmMode::TestAlerting => return Vec::new(),
            AlarmMode::Idle if self.real_alert => {
                self.mode = AlarmMode::Alerting { muted: false };
            }
            AlarmMode::Alerting { .. } if !self.real_alert => {
                // Leaving ALERT re-arms the mute.
                self.mode = AlarmMode::Idle;
            }
            _ => {}
        }
        self.sync_sound(Vec::new())
    }

    /// Operator pressed "stop alarm".
    ///
    /// Mutes a real alert, or ends a running test. A no-op when idle.
    pub fn stop_alarm(&mut self) -> Vec<AlarmEffect> {
        let mut effects = Vec::new();
        match self.mode {
            AlarmMode::Idle => return effects,
            AlarmMode::Alerting { .. } => {
                self.mode = AlarmMode::Alerting { muted: true };
            }
            AlarmMode::TestAlerting => {
                effects.push(AlarmEffect::CancelTestEnd);
                self.mode = self.after_test(true);
            }
        }
        self.sync_sound(effects)
    }

    /// Operator pressed "test"; runs regardless of the live status.
    pub fn start_test(&mut self) -> Vec<AlarmEffect> {
        self.mode = AlarmMode::TestAlerting;
        self.sync_sound(vec![AlarmEffect::ScheduleTestEnd(TEST_ALARM_DURATION)])
    }

    /// The test countdown elapsed.
    pub fn test_elapsed(&mut self) -> Vec<AlarmEffect> {
        if self.mode != AlarmMode::TestAlerting {
            return Vec::new();
        }
        self.mode = self.after_test(false);
        self.sync_sound(Vec::new())
    }

    /// Result of the asynchronous audio unlock.
    ///
    /// On success the loop starts at once if the current mode is audible.
    pub fn set_sound_enabled(&mut self, enabled: bool) -> Vec<AlarmEffect> {
        self.sound_enabled = enabled;
        self.sync_sound(Vec::new())
    }

    /// Tear down: stop sound, drop any pending countdown, return to idle.
    pub fn shutdown(&mut self) -> Vec<AlarmEffect> {
        let mut effects = Vec::new();
        if self.mode == AlarmMode::TestAlerting {
            effects.push(AlarmEffect::CancelTestEnd);
        }
        self.mode = AlarmMode::Idle;
        self.real_alert = false;
        self.sound_enabled = false;
        self.sync_sound(effects)
    }

    fn after_test(&self, muted: bool) -> AlarmMode {
        if self.real_alert {
            AlarmMode::Alerting { muted }
        } else {
            AlarmMode::Idle
        }
    }

    fn wants_sound(&self) -> bool {
        self.sound_enabled
            && matches!(
                self.mode,
                AlarmMode::Alerting { muted: false } | AlarmMode::TestAlerting
            )
    }

    fn sync_sound(&mut self, mut effects: Vec<AlarmEffect>) -> Vec<AlarmEffect> {
        let wants = self.wants_sound();
        if wants && !self.sounding {
            effects.push(AlarmEffect::StartBeeping);
        } else if !wants && self.sounding {
            effects.push(AlarmEffect::StopBeeping);
        }
        self.sounding = wants;
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AlarmEffect::*;

    fn enabled() -> AlarmMachine {
        let mut m = AlarmMachine::new();
        assert!(m.set_sound_enabled(true).is_empty());
        m
    }

    #[test]
    fn test_initial_state() {
        let m = AlarmMachine::new();
        assert_eq!(m.mode(), AlarmMode::Idle);
        assert_eq!(m.state(), AlarmState::default());
    }

    #[test]
    fn test_alert_starts_loop() {
        let mut m = enabled();
        assert_eq!(m.on_status(Status::Alert), vec![StartBeeping]);
        assert_eq!(m.mode(), AlarmMode::Alerting { muted: false });
        // Repeated ALERT does not start a second loop.
        assert!(m.on_status(Status::Alert).is_empty());
        assert!(m.state().is_sounding);
    }

    #[test]
    fn test_alert_without_sound_is_silent() {
        let mut m = AlarmMachine::new();
        assert!(m.on_status(Status::Alert).is_empty());
        assert!(m.state().is_alerting);
        assert!(!m.state().is_sounding);
    }

    #[test]
    fn test_enable_sound_resumes_current_alert() {
        let mut m = AlarmMachine::new();
        m.on_status(Status::Alert);
        assert_eq!(m.set_sound_enabled(true), vec![StartBeeping]);
    }

    #[test]
    fn test_failed_enable_starts_nothing() {
        let mut m = AlarmMachine::new();
        m.on_status(Status::Alert);
        assert!(m.set_sound_enabled(false).is_empty());
        assert!(!m.state().sound_enabled);
    }

    #[test]
    fn test_mute_then_clear_rearms() {
        let mut m = enabled();
        m.on_status(Status::Alert);
        assert_eq!(m.stop_alarm(), vec![StopBeeping]);
        assert!(m.state().is_muted);
        assert!(m.state().is_alerting);
        // Still ALERT: stays muted.
        assert!(m.on_status(Status::Alert).is_empty());

        assert!(m.on_status(Status::Warn).is_empty());
        assert_eq!(m.mode(), AlarmMode::Idle);
        assert!(!m.state().is_muted);

        // Next alert is audible again.
        assert_eq!(m.on_status(Status::Alert), vec![StartBeeping]);
    }

    #[test]
    fn test_clear_stops_loop() {
        let mut m = enabled();
        m.on_status(Status::Alert);
        assert_eq!(m.on_status(Status::Ok), vec![StopBeeping]);
        assert_eq!(m.state(), AlarmState {
            sound_enabled: true,
            ..AlarmState::default()
        });
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut m = enabled();
        let before = m.state();
        assert!(m.stop_alarm().is_empty());
        assert!(m.stop_alarm().is_empty());
        assert_eq!(m.state(), before);
    }

    #[test]
    fn test_test_alarm_from_idle() {
        let mut m = enabled();
        assert_eq!(
            m.start_test(),
            vec![ScheduleTestEnd(TEST_ALARM_DURATION), StartBeeping]
        );
        assert!(m.state().is_test_mode);
        assert!(m.state().is_alerting);
        assert_eq!(m.test_elapsed(), vec![StopBeeping]);
        assert_eq!(m.mode(), AlarmMode::Idle);
    }

    #[test]
    fn test_stop_cancels_test_countdown() {
        let mut m = enabled();
        m.start_test();
        assert_eq!(m.stop_alarm(), vec![CancelTestEnd, StopBeeping]);
        assert_eq!(m.mode(), AlarmMode::Idle);
        // A late countdown tick is ignored.
        assert!(m.test_elapsed().is_empty());
    }

    #[test]
    fn test_test_takes_over_real_alert() {
        let mut m = enabled();
        m.on_status(Status::Alert);
        // Loop keeps running, owned by the test now.
        assert_eq!(m.start_test(), vec![ScheduleTestEnd(TEST_ALARM_DURATION)]);
        assert!(m.state().is_sounding);

        // Real transitions are tracked, not acted on.
        assert!(m.on_status(Status::Ok).is_empty());
        assert!(m.on_status(Status::Alert).is_empty());
        assert!(m.real_alert());

        // Test ends while still ALERT: real alarm keeps sounding.
        assert!(m.test_elapsed().is_empty());
        assert_eq!(m.mode(), AlarmMode::Alerting { muted: false });
        assert!(m.state().is_sounding);
    }

    #[test]
    fn test_real_alert_mid_test_adds_no_loop() {
        let mut m = enabled();
        m.start_test();
        m.stop_alarm();
        m.start_test();
        // Alert arrives mid-test: no extra loop start.
        assert!(m.on_status(Status::Alert).is_empty());
        assert_eq!(m.mode(), AlarmMode::TestAlerting);
        assert!(m.test_elapsed().is_empty());
        assert_eq!(m.mode(), AlarmMode::Alerting { muted: false });
    }

    #[test]
    fn test_stop_during_test_mutes_real_alert() {
        let mut m = enabled();
        m.on_status(Status::Alert);
        m.start_test();
        assert_eq!(m.stop_alarm(), vec![CancelTestEnd, StopBeeping]);
        assert_eq!(m.mode(), AlarmMode::Alerting { muted: true });
    }

    #[test]
    fn test_test_clears_mute() {
        let mut m = enabled();
        m.on_status(Status::Alert);
        m.stop_alarm();
        assert_eq!(
            m.start_test(),
            vec![ScheduleTestEnd(TEST_ALARM_DURATION), StartBeeping]
        );
        assert!(m.test_elapsed().is_empty());
        assert_eq!(m.mode(), AlarmMode::Alerting { muted: false });
    }

    #[test]
    fn test_restarting_test_rearms_countdown() {
        let mut m = enabled();
        m.start_test();
        assert_eq!(m.start_test(), vec![ScheduleTestEnd(TEST_ALARM_DURATION)]);
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut m = enabled();
        m.on_status(Status::Alert);
        m.start_test();
        assert_eq!(m.shutdown(), vec![CancelTestEnd, StopBeeping]);
        assert_eq!(m.state(), AlarmState::default());
        assert!(m.shutdown().is_empty());
    }
}
