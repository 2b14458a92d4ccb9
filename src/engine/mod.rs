//! Demo state engine.
//!
//! Holds a small vector of productivity metrics, perturbs it on timers and on
//! app visibility changes, and raises a rate-limited mindfulness reminder when
//! the metrics look overloaded.
//!
//! [`StateEngine`] is synchronous and owns no timers. It returns the effects to
//! perform ([`Reminder`]) instead of performing them; [`EngineRunner`] drives
//! it from tokio timers and dispatches those effects.

pub mod random;
pub mod runner;
pub mod state;

pub use random::{std_rng, RandomSource, SequenceSource};
pub use runner::{EngineCommand, EngineRunner, BURST_DELAY, DRIFT_INTERVAL, DRIFT_KICKOFF};
pub use state::{
    Bounds, DemoState, Envelope, Phase, ProductivityBand, BAND_SCORE, DRIFT_ENVELOPE,
    SPIKE_ENVELOPE, STATE_ENVELOPE,
};

use crate::clock::Clock;
use crate::effects::{LogEntry, LogKind, Notification};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum gap between two automatic reminders.
pub const REMINDER_COOLDOWN: Duration = Duration::from_secs(60);

/// How long a toast stays on screen.
pub const TOAST_DURATION: Duration = Duration::from_millis(6500);

/// Absences shorter than this count as a fast app switch.
pub const FAST_SWITCH_WINDOW: Duration = Duration::from_secs(12);

/// Absences shorter than this get the full fast-switch perturbation.
pub const QUICK_SWITCH_WINDOW: Duration = Duration::from_secs(5);

pub const REMINDER_TITLE: &str = "SenseShift Mindfulness Nudge";
pub const REMINDER_BODY: &str = "Hey! It looks like you are a little overwhelmed. \
                                 How about a short break for some breathing exercises?";

const MONITORING_COPY: &str = "Metrics are updating with live mouse and keyboard pace.";
const MULTITASKING_COPY: &str = "Rapid tab hopping increased your cognitive load.";
const RETURNED_COPY: &str = "Welcome back! Metrics returned to monitoring mode.";
const DRIFT_REASON: &str = "Adaptive monitor spotted a spike in focus load.";
const SWITCH_REASON: &str = "Rapid tab switching triggered a mindfulness reminder.";

const RELAX_TITLE: &str = "Sense-Shift";
const RELAX_BODY: &str = "You might be getting overwhelmed, breathe...";
const RELAX_TOAST: &str = "You are doing great. Keep breathing.";
const RELAX_LOG_MESSAGE: &str = "Mindfulness prompt triggered";

/// Effects to dispatch after a reminder: one notification and one audit-log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub notification: Notification,
    pub entry: LogEntry,
}

/// Outcome of the app becoming visible again.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// Back quickly: metrics were perturbed, scaled by `multiplier`.
    FastSwitch {
        away: Duration,
        multiplier: f64,
        reminder: Option<Reminder>,
    },
    /// Back after a long absence. Metrics untouched.
    Returned { away: Duration },
    /// Visible without a preceding hide.
    Ignored,
}

/// Perturbation scale for an absence of `away`, or `None` when the absence
/// is too long to count as a fast switch.
pub fn fast_switch_multiplier(away: Duration) -> Option<f64> {
    if away < QUICK_SWITCH_WINDOW {
        Some(1.0)
    } else if away < FAST_SWITCH_WINDOW {
        Some(0.4)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
struct Toast {
    message: String,
    until: Instant,
}

/// The demo engine.
pub struct StateEngine<R> {
    state: DemoState,
    rng: R,
    clock: Arc<dyn Clock>,
    last_reminder: Option<Instant>,
    hidden_at: Option<Instant>,
    toast: Option<Toast>,
}

impl<R: RandomSource> StateEngine<R> {
    pub fn new(rng: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: DemoState::baseline(),
            rng,
            clock,
            last_reminder: None,
            hidden_at: None,
            toast: None,
        }
    }

    pub fn state(&self) -> &DemoState {
        &self.state
    }

    /// Message currently on screen, if any.
    pub fn toast(&self) -> Option<&str> {
        let now = self.clock.now();
        self.toast
            .as_ref()
            .filter(|toast| now < toast.until)
            .map(|toast| toast.message.as_str())
    }

    /// When the toast on screen goes away, if one is showing.
    pub fn toast_until(&self) -> Option<Instant> {
        let now = self.clock.now();
        self.toast
            .as_ref()
            .map(|toast| toast.until)
            .filter(|until| now < *until)
    }

    /// Whether the app is currently hidden.
    pub fn is_hidden(&self) -> bool {
        self.hidden_at.is_some()
    }

    /// Small random walk of every metric.
    pub fn drift(&mut self) -> Option<Reminder> {
        let state = &mut self.state;
        let rng = &mut self.rng;

        state.click_rate += (rng.next_unit() * 0.6 - 0.3) * 0.6;
        state.tab_speed += rng.next_unit() * 0.8 - 0.4;
        state.focus += rng.next_unit() * 0.02 - 0.008;
        for (index, band) in state.productivity.iter_mut().enumerate() {
            let weight = if (3..=5).contains(&index) { 0.7 } else { 0.4 };
            band.score += (rng.next_unit() * 0.03 - 0.012) * weight;
        }
        state.clamp_to(&DRIFT_ENVELOPE);
        state.set_status(Phase::Monitoring, MONITORING_COPY);

        self.maybe_remind(DRIFT_REASON)
    }

    /// Simulated burst of rapid tab switching.
    pub fn burst(&mut self) -> Option<Reminder> {
        let state = &mut self.state;
        state.tab_speed += 6.5;
        state.click_rate += 2.2;
        state.focus -= 0.2;
        for (index, band) in state.productivity.iter_mut().enumerate() {
            match index {
                3 => band.score -= 0.09,
                4 | 5 => band.score -= 0.06,
                _ => {}
            }
        }
        state.clamp_to(&SPIKE_ENVELOPE);
        state.set_status(Phase::MultitaskingDetected, MULTITASKING_COPY);

        let reminder = self.maybe_remind(SWITCH_REASON);
        if reminder.is_none() {
            self.show_toast(REMINDER_BODY);
        }
        reminder
    }

    /// The app lost the foreground.
    pub fn on_hidden(&mut self) {
        self.hidden_at = Some(self.clock.now());
    }

    /// The app regained the foreground.
    pub fn on_visible(&mut self) -> Recovery {
        let Some(hidden_at) = self.hidden_at.take() else {
            return Recovery::Ignored;
        };
        let away = self.clock.now().saturating_duration_since(hidden_at);

        match fast_switch_multiplier(away) {
            Some(multiplier) => {
                let reminder = self.fast_switch(multiplier);
                Recovery::FastSwitch {
                    away,
                    multiplier,
                    reminder,
                }
            }
            None => {
                self.state.set_status(Phase::ReturnedToApp, RETURNED_COPY);
                Recovery::Returned { away }
            }
        }
    }

    fn fast_switch(&mut self, multiplier: f64) -> Option<Reminder> {
        let state = &mut self.state;
        let rng = &mut self.rng;

        state.tab_speed += (3.0 + rng.next_unit() * 4.0) * multiplier;
        state.click_rate += (0.7 + rng.next_unit() * 1.8) * multiplier;
        state.focus -= (0.05 + rng.next_unit() * 0.08) * multiplier;
        for (index, band) in state.productivity.iter_mut().enumerate() {
            match index {
                1 => band.score -= 0.08 * multiplier,
                2 | 3 => band.score -= 0.05 * multiplier,
                _ => {}
            }
        }
        state.clamp_to(&SPIKE_ENVELOPE);
        state.set_status(Phase::MultitaskingDetected, MULTITASKING_COPY);

        self.maybe_remind(SWITCH_REASON)
    }

    /// User asked for a break. Not subject to the reminder cooldown.
    pub fn relax(&mut self) -> Reminder {
        self.show_toast(RELAX_TOAST);
        Reminder {
            notification: Notification::new(RELAX_TITLE, RELAX_BODY),
            entry: LogEntry {
                kind: LogKind::ManualTrigger,
                message: RELAX_LOG_MESSAGE.to_string(),
                risk_score: None,
                timestamp: self.clock.utc(),
            },
        }
    }

    /// Back to baseline with the cooldown, hidden marker and toast cleared.
    pub fn reset(&mut self) {
        self.state = DemoState::baseline();
        self.last_reminder = None;
        self.hidden_at = None;
        self.toast = None;
        self.state.set_status(Phase::Monitoring, MONITORING_COPY);
    }

    fn maybe_remind(&mut self, reason: &str) -> Option<Reminder> {
        let now = self.clock.now();
        let cooling_down = self
            .last_reminder
            .is_some_and(|last| now.saturating_duration_since(last) < REMINDER_COOLDOWN);
        if cooling_down || !self.state.is_overloaded() {
            return None;
        }

        self.last_reminder = Some(now);
        self.state.set_status(Phase::MindfulnessReminder, reason);
        self.show_toast(REMINDER_BODY);
        tracing::debug!(
            reason,
            tab_speed = self.state.tab_speed,
            focus = self.state.focus,
            "reminder fired"
        );

        Some(Reminder {
            notification: Notification::new(REMINDER_TITLE, REMINDER_BODY),
            entry: LogEntry {
                kind: LogKind::AiPrompt,
                message: REMINDER_BODY.to_string(),
                risk_score: Some(self.state.risk_score()),
                timestamp: self.clock.utc(),
            },
        })
    }

    fn show_toast(&mut self, message: &str) {
        self.toast = Some(Toast {
            message: message.to_string(),
            until: self.clock.now() + TOAST_DURATION,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn engine(u: f64) -> (StateEngine<SequenceSource>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let engine = StateEngine::new(SequenceSource::constant(u), clock.clone());
        (engine, clock)
    }

    #[test]
    fn test_drift_at_midpoint() {
        let (mut engine, _clock) = engine(0.5);
        engine.drift();

        let state = engine.state();
        assert!((state.click_rate - 6.2).abs() < 1e-9);
        assert!((state.tab_speed - 5.6).abs() < 1e-9);
        assert!((state.focus - 0.832).abs() < 1e-9);
        assert!((state.productivity[4].score - (0.74 + 0.003 * 0.7)).abs() < 1e-9);
        assert!((state.productivity[0].score - (0.35 + 0.003 * 0.4)).abs() < 1e-9);
        assert_eq!(state.phase, Phase::Monitoring);
    }

    #[test]
    fn test_burst_from_baseline_fires_reminder() {
        let (mut engine, _clock) = engine(0.5);

        let reminder = engine.burst().expect("burst should breach the tab threshold");

        let state = engine.state();
        assert!((state.tab_speed - 12.1).abs() < 1e-9);
        assert!((state.click_rate - 8.4).abs() < 1e-9);
        assert!((state.focus - 0.63).abs() < 1e-9);
        assert_eq!(state.phase, Phase::MindfulnessReminder);
        assert_eq!(state.copy, SWITCH_REASON);
        assert_eq!(reminder.notification.title, REMINDER_TITLE);
        assert_eq!(reminder.entry.kind, LogKind::AiPrompt);
        assert_eq!(reminder.entry.risk_score, Some(0.67));
        assert_eq!(engine.toast(), Some(REMINDER_BODY));
    }

    #[test]
    fn test_burst_during_cooldown_still_shows_toast() {
        let (mut engine, clock) = engine(0.5);
        engine.burst();
        clock.advance(Duration::from_secs(10));
        engine.toast = None;

        assert!(engine.burst().is_none());
        assert_eq!(engine.state().phase, Phase::MultitaskingDetected);
        assert_eq!(engine.toast(), Some(REMINDER_BODY));
    }

    #[test]
    fn test_toast_expires_and_restarts() {
        let (mut engine, clock) = engine(0.5);
        engine.burst();

        clock.advance(Duration::from_millis(6000));
        engine.relax();
        let until = clock.now() + TOAST_DURATION;
        clock.advance(Duration::from_millis(6000));
        assert_eq!(engine.toast(), Some(RELAX_TOAST));
        assert_eq!(engine.toast_until(), Some(until));

        clock.advance(Duration::from_millis(500));
        assert_eq!(engine.toast(), None);
        assert_eq!(engine.toast_until(), None);
    }

    #[test]
    fn test_fast_switch_multiplier_steps() {
        assert_eq!(fast_switch_multiplier(Duration::from_millis(4999)), Some(1.0));
        assert_eq!(fast_switch_multiplier(Duration::from_millis(5000)), Some(0.4));
        assert_eq!(fast_switch_multiplier(Duration::from_millis(11_999)), Some(0.4));
        assert_eq!(fast_switch_multiplier(Duration::from_millis(12_000)), None);
    }

    #[test]
    fn test_visible_without_hide_is_ignored() {
        let (mut engine, _clock) = engine(0.5);
        let before = engine.state().clone();

        assert_eq!(engine.on_visible(), Recovery::Ignored);
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn test_long_absence_returns_without_perturbation() {
        let (mut engine, clock) = engine(0.5);
        engine.on_hidden();
        clock.advance(Duration::from_secs(15));

        let before = engine.state().clone();
        let recovery = engine.on_visible();

        assert!(matches!(recovery, Recovery::Returned { .. }));
        assert_eq!(engine.state().tab_speed, before.tab_speed);
        assert_eq!(engine.state().phase, Phase::ReturnedToApp);
        assert!(!engine.is_hidden());
    }

    #[test]
    fn test_quick_switch_applies_full_multiplier() {
        let (mut engine, clock) = engine(0.0);
        engine.on_hidden();
        clock.advance(Duration::from_secs(2));

        let recovery = engine.on_visible();

        let Recovery::FastSwitch { multiplier, .. } = recovery else {
            panic!("expected a fast switch, got {recovery:?}");
        };
        assert_eq!(multiplier, 1.0);
        let state = engine.state();
        assert!((state.tab_speed - 8.6).abs() < 1e-9);
        assert!((state.click_rate - 6.9).abs() < 1e-9);
        assert!((state.focus - 0.78).abs() < 1e-9);
        assert!((state.productivity[1].score - 0.34).abs() < 1e-9);
        assert!((state.productivity[2].score - 0.43).abs() < 1e-9);
    }

    #[test]
    fn test_relax_ignores_cooldown() {
        let (mut engine, _clock) = engine(0.5);
        engine.burst();

        let reminder = engine.relax();
        assert_eq!(reminder.entry.kind, LogKind::ManualTrigger);
        assert_eq!(reminder.entry.message, RELAX_LOG_MESSAGE);
        assert_eq!(reminder.notification.title, RELAX_TITLE);
    }

    #[test]
    fn test_reset_clears_cooldown_and_restores_baseline() {
        let (mut engine, _clock) = engine(0.5);
        assert!(engine.burst().is_some());
        engine.on_hidden();

        engine.reset();

        let baseline = DemoState::baseline();
        assert_eq!(engine.state().tab_speed, baseline.tab_speed);
        assert_eq!(engine.state().productivity, baseline.productivity);
        assert_eq!(engine.state().phase, Phase::Monitoring);
        assert!(!engine.is_hidden());
        assert_eq!(engine.toast(), None);
        assert!(engine.burst().is_some());
    }
}
