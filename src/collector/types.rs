//! Keyboard event classification for the tap collector.
//!
//! Only the kind of event is ever inspected - never key codes or characters.

use serde::{Deserialize, Serialize};

/// The keyboard event kinds the event tap subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
    /// Modifier key change (shift, command, ...)
    FlagsChanged,
}

impl KeyEventKind {
    /// All kinds the tap listens for.
    pub const SUBSCRIBED: [KeyEventKind; 3] = [
        KeyEventKind::KeyDown,
        KeyEventKind::KeyUp,
        KeyEventKind::FlagsChanged,
    ];

    /// Whether this event counts as one keyboard tap.
    ///
    /// Releases and modifier changes are observed but only presses are counted.
    pub fn counts_as_tap(self) -> bool {
        matches!(self, KeyEventKind::KeyDown)
    }
}
