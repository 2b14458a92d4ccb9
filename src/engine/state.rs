//! Demo state vector and its clamp envelopes.

use serde::{Deserialize, Serialize};

/// Closed numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Bounds for the three headline metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub click_rate: Bounds,
    pub tab_speed: Bounds,
    pub focus: Bounds,
}

/// Bounds applied after a drift tick.
pub const DRIFT_ENVELOPE: Envelope = Envelope {
    click_rate: Bounds::new(4.8, 9.8),
    tab_speed: Bounds::new(4.3, 12.5),
    focus: Bounds::new(0.45, 0.92),
};

/// Bounds applied after a burst or fast switch.
pub const SPIKE_ENVELOPE: Envelope = Envelope {
    click_rate: Bounds::new(5.0, 15.0),
    tab_speed: Bounds::new(5.0, 18.0),
    focus: Bounds::new(0.35, 0.95),
};

/// Union of every envelope above. State never leaves it.
pub const STATE_ENVELOPE: Envelope = Envelope {
    click_rate: Bounds::new(4.8, 15.0),
    tab_speed: Bounds::new(4.3, 18.0),
    focus: Bounds::new(0.35, 0.95),
};

/// Bounds for every productivity band score.
pub const BAND_SCORE: Bounds = Bounds::new(0.3, 0.9);

/// Tab speed that counts as overloaded.
pub const TAB_SPEED_ALERT: f64 = 9.5;

/// Focus at or below which the user counts as overloaded.
pub const FOCUS_ALERT: f64 = 0.6;

/// Tab speed mapped to a risk score of 1.0.
pub const TAB_SPEED_CEILING: f64 = 18.0;

const BASELINE_BANDS: [(&str, f64); 9] = [
    ("12 AM", 0.35),
    ("3 AM", 0.42),
    ("6 AM", 0.48),
    ("9 AM", 0.68),
    ("12 PM", 0.74),
    ("3 PM", 0.61),
    ("6 PM", 0.57),
    ("9 PM", 0.49),
    ("12 AM", 0.38),
];

const BASELINE_COPY: &str = "Baseline metrics loaded from your recent study sessions.";

/// Where the engine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Freshly loaded baseline, before any timer fired
    Calm,
    Monitoring,
    MultitaskingDetected,
    MindfulnessReminder,
    ReturnedToApp,
}

impl Phase {
    /// Status line shown to the user.
    pub fn status(&self) -> &'static str {
        match self {
            Phase::Calm => "Calm focus",
            Phase::Monitoring => "Monitoring",
            Phase::MultitaskingDetected => "Sharp multitasking detected",
            Phase::MindfulnessReminder => "Mindfulness reminder",
            Phase::ReturnedToApp => "Back in app",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.status())
    }
}

/// One hour-of-day productivity bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductivityBand {
    pub label: String,
    pub score: f64,
}

/// The demo's numeric state plus its user-facing status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoState {
    pub click_rate: f64,
    pub tab_speed: f64,
    pub focus: f64,
    pub productivity: Vec<ProductivityBand>,
    pub phase: Phase,
    pub copy: String,
}

impl DemoState {
    /// State loaded from recent study sessions.
    pub fn baseline() -> Self {
        Self {
            click_rate: 6.2,
            tab_speed: 5.6,
            focus: 0.83,
            productivity: BASELINE_BANDS
                .iter()
                .map(|(label, score)| ProductivityBand {
                    label: (*label).to_string(),
                    score: *score,
                })
                .collect(),
            phase: Phase::Calm,
            copy: BASELINE_COPY.to_string(),
        }
    }

    pub fn status(&self) -> &'static str {
        self.phase.status()
    }

    pub fn set_status(&mut self, phase: Phase, copy: impl Into<String>) {
        self.phase = phase;
        self.copy = copy.into();
    }

    /// Clamp the headline metrics to `envelope` and every band score to
    /// [`BAND_SCORE`].
    pub fn clamp_to(&mut self, envelope: &Envelope) {
        self.click_rate = envelope.click_rate.clamp(self.click_rate);
        self.tab_speed = envelope.tab_speed.clamp(self.tab_speed);
        self.focus = envelope.focus.clamp(self.focus);
        for band in &mut self.productivity {
            band.score = BAND_SCORE.clamp(band.score);
        }
    }

    /// True when every field lies inside `envelope` and band scores inside
    /// [`BAND_SCORE`].
    pub fn is_within(&self, envelope: &Envelope) -> bool {
        envelope.click_rate.contains(self.click_rate)
            && envelope.tab_speed.contains(self.tab_speed)
            && envelope.focus.contains(self.focus)
            && self
                .productivity
                .iter()
                .all(|band| BAND_SCORE.contains(band.score))
    }

    /// Alert threshold breached, ignoring the cooldown.
    pub fn is_overloaded(&self) -> bool {
        self.tab_speed >= TAB_SPEED_ALERT || self.focus <= FOCUS_ALERT
    }

    /// Tab speed relative to its ceiling, rounded to two decimals.
    pub fn risk_score(&self) -> f64 {
        (self.tab_speed / TAB_SPEED_CEILING * 100.0).round() / 100.0
    }

    /// One-line rendering for the terminal.
    pub fn summary(&self) -> String {
        format!(
            "clicks {:.1}/min | tabs {:.1}/min | focus {:.0}% | {}: {}",
            self.click_rate,
            self.tab_speed,
            self.focus * 100.0,
            self.status(),
            self.copy
        )
    }
}

impl Default for DemoState {
    fn default() -> Self {
        Self::baseline()
    }
}
