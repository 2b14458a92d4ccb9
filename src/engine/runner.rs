//! Drives a [`StateEngine`] from tokio timers and a command channel.
//!
//! The engine is owned by the run loop; timer ticks and commands are
//! serialized through one `select!`, so no locking is needed. Notifications
//! and audit-log appends are spawned and never awaited by the loop.

use super::{Recovery, Reminder, StateEngine};
use crate::effects::{LogStore, Notifier};
use crate::engine::RandomSource;
use crate::transparency::SharedTransparencyLog;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

/// Delay before the first drift tick after a reset.
pub const DRIFT_KICKOFF: Duration = Duration::from_millis(1500);

/// Period between drift ticks.
pub const DRIFT_INTERVAL: Duration = Duration::from_millis(4500);

/// Delay before the one-shot simulated burst after a reset.
pub const BURST_DELAY: Duration = Duration::from_secs(5);

/// Events from the hosting shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Hidden,
    Visible,
    Relax,
    Reset,
}

impl std::str::FromStr for EngineCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hide" | "hidden" => Ok(EngineCommand::Hidden),
            "show" | "visible" => Ok(EngineCommand::Visible),
            "relax" => Ok(EngineCommand::Relax),
            "reset" => Ok(EngineCommand::Reset),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

/// Runs the engine and dispatches its effects.
pub struct EngineRunner<R> {
    engine: StateEngine<R>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn LogStore>,
    user_id: String,
    transparency: SharedTransparencyLog,
    effects: JoinSet<()>,
}

impl<R: RandomSource> EngineRunner<R> {
    pub fn new(
        engine: StateEngine<R>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn LogStore>,
        user_id: impl Into<String>,
        transparency: SharedTransparencyLog,
    ) -> Self {
        Self {
            engine,
            notifier,
            store,
            user_id: user_id.into(),
            transparency,
            effects: JoinSet::new(),
        }
    }

    /// Reset the engine, then run until `commands` closes or `shutdown`
    /// flips to true. State lines are written to `out` after every change.
    ///
    /// Effects still in flight are awaited before returning.
    pub async fn run<W: Write>(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut shutdown: watch::Receiver<bool>,
        out: &mut W,
    ) -> StateEngine<R> {
        self.engine.reset();
        self.render(out);

        let mut drift = drift_timer();
        let burst = sleep_until(Instant::now() + BURST_DELAY);
        tokio::pin!(burst);
        let mut burst_pending = true;
        let toast_expiry = sleep_until(Instant::now());
        tokio::pin!(toast_expiry);
        let mut toast_pending = false;

        loop {
            tokio::select! {
                _ = drift.tick() => {
                    let reminder = self.engine.drift();
                    self.dispatch(reminder);
                    self.render(out);
                }
                _ = &mut burst, if burst_pending => {
                    burst_pending = false;
                    let reminder = self.engine.burst();
                    self.dispatch(reminder);
                    self.render(out);
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("command channel closed");
                        break;
                    };
                    if command == EngineCommand::Reset {
                        drift = drift_timer();
                        burst.as_mut().reset(Instant::now() + BURST_DELAY);
                        burst_pending = true;
                    }
                    self.handle(command);
                    self.render(out);
                }
                Some(result) = self.effects.join_next(), if !self.effects.is_empty() => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "effect task failed");
                    }
                }
                _ = &mut toast_expiry, if toast_pending => {
                    toast_pending = false;
                    self.render(out);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }

            // Redraw once more when the toast on screen times out.
            if let Some(until) = self.engine.toast_until() {
                toast_expiry.as_mut().reset(Instant::from_std(until));
                toast_pending = true;
            }
        }

        while let Some(result) = self.effects.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "effect task failed");
            }
        }

        self.engine
    }

    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Hidden => self.engine.on_hidden(),
            EngineCommand::Visible => match self.engine.on_visible() {
                Recovery::FastSwitch {
                    away,
                    multiplier,
                    reminder,
                } => {
                    tracing::info!(
                        away_ms = away.as_millis() as u64,
                        multiplier,
                        "fast app switch"
                    );
                    self.dispatch(reminder);
                }
                Recovery::Returned { away } => {
                    tracing::info!(away_secs = away.as_secs(), "returned to app");
                }
                Recovery::Ignored => {
                    tracing::debug!("visible without a preceding hide; ignoring");
                }
            },
            EngineCommand::Relax => {
                let reminder = self.engine.relax();
                self.spawn_effects(reminder);
            }
            EngineCommand::Reset => {
                self.engine.reset();
                tracing::info!("state reset to baseline");
            }
        }
    }

    fn dispatch(&mut self, reminder: Option<Reminder>) {
        if let Some(reminder) = reminder {
            self.transparency.record_reminder_fired();
            self.spawn_effects(reminder);
        }
    }

    fn spawn_effects(&mut self, reminder: Reminder) {
        let notifier = Arc::clone(&self.notifier);
        let store = Arc::clone(&self.store);
        let transparency = Arc::clone(&self.transparency);
        let user_id = self.user_id.clone();

        self.effects.spawn(async move {
            if let Err(e) = notifier.notify(&reminder.notification).await {
                tracing::warn!(error = %e, "could not show notification");
            }
            if let Err(e) = store.append(&user_id, &reminder.entry).await {
                tracing::error!(error = %e, user = %user_id, "could not append audit log entry");
                transparency.record_log_append_failed();
            }
        });
    }

    fn render<W: Write>(&self, out: &mut W) {
        let mut line = self.engine.state().summary();
        if let Some(toast) = self.engine.toast() {
            line.push_str(&format!(" | toast: {toast}"));
        }
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::debug!(error = %e, "could not render state");
        }
    }
}

fn drift_timer() -> Interval {
    let mut timer = interval_at(Instant::now() + DRIFT_KICKOFF, DRIFT_INTERVAL);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}
