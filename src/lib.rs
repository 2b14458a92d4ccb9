//! SenseShift - digital-wellbeing sampler and mindfulness reminder demo.
//!
//! Two independent producers share this crate:
//!
//! - The **sampler** prints a JSON snapshot every ten seconds combining
//!   display brightness, system uptime, a keyboard tap count and recent
//!   biometrics from a health-data provider.
//! - The **state engine** simulates productivity metrics, reacts to the app
//!   losing and regaining focus, and raises a rate-limited mindfulness
//!   reminder with an audit-log entry.
//!
//! # Privacy Guarantees
//!
//! - **No key content**: only the number of key presses is counted
//! - **No retention**: snapshots are printed and exported, never uploaded
//! - **Transparency**: all collection is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         SenseShift                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌─────────────┐   ┌──────────────┐          │
//! │  │ Collector │──▶│ Tap window  │──▶│              │          │
//! │  │ (key tap) │   │ (10s bins)  │   │   Snapshot   │──▶ stdout│
//! │  └───────────┘   └─────────────┘   │   sampler    │          │
//! │  ┌───────────┐   ┌─────────────┐   │              │          │
//! │  │  System   │   │ Biometrics  │──▶│              │          │
//! │  │  probe    │──▶│  provider   │   └──────────────┘          │
//! │  └───────────┘   └─────────────┘                             │
//! │                                                              │
//! │  ┌───────────┐   ┌─────────────┐   ┌──────────────┐          │
//! │  │ Commands  │──▶│   State     │──▶│   Effects    │          │
//! │  │ + timers  │   │   engine    │   │ notify + log │          │
//! │  └───────────┘   └─────────────┘   └──────────────┘          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sense_shift::{collector, core, transparency};
//! use sense_shift::clock::SystemClock;
//! use std::sync::Arc;
//!
//! let taps = Arc::new(core::TapAccumulator::new(Arc::new(SystemClock)));
//!
//! // Requires Input Monitoring permission on macOS
//! let mut collector = collector::Collector::new(taps.clone());
//! collector.start().expect("Failed to start collector");
//!
//! // Some(count) once ten seconds have passed
//! let _ = taps.check_and_reset();
//! ```

pub mod biometrics;
pub mod clock;
pub mod collector;
pub mod config;
pub mod core;
pub mod effects;
pub mod engine;
pub mod system;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use biometrics::{BiometricsError, BiometricsProvider, EmptyBiometrics, FileBiometrics};
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use collector::{Collector, CollectorError};
pub use config::{Config, ConfigError};
pub use core::{Snapshot, SnapshotSampler, TapAccumulator};
pub use effects::{LogEntry, LogKind, LogStore, LogStoreError, Notification, Notifier, NotifyError};
pub use engine::{DemoState, EngineCommand, EngineRunner, StateEngine};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║               SENSESHIFT - PRIVACY DECLARATION                   ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  SenseShift samples wellbeing signals on this machine.           ║
║                                                                  ║
║  ✓ WHAT WE READ:                                                 ║
║    • How many keys were pressed every 10 seconds (count only)    ║
║    • Display brightness and system uptime                        ║
║    • Heart rate, SpO2, respiration, energy, steps and sleep      ║
║      from your health-data export                                ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • Which keys you press (no passwords, messages, etc.)         ║
║    • Where your cursor is                                        ║
║    • What applications you use                                   ║
║    • Any screen content                                          ║
║                                                                  ║
║  Snapshots are printed locally and never uploaded. Reminder      ║
║  history is kept in your own audit log.                          ║
║                                                                  ║
║  You can view collection statistics anytime with:                ║
║    senseshift status                                             ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
