//! Periodic snapshot sampling.
//!
//! Each tick reads the system probe and the tap window, then issues all
//! biometrics queries concurrently and joins them. The join is all-or-nothing:
//! one failed query drops the whole snapshot for that tick.

use crate::biometrics::{BiometricsError, BiometricsProvider, Metric, TimeRange, Unit};
use crate::core::export::SessionExport;
use crate::core::snapshot::{BiometricsReadings, Snapshot};
use crate::core::windowing::SharedTapAccumulator;
use crate::system::SystemProbe;
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Default tick period.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

/// Trailing window for point samples and the step sum.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(60 * 60);

/// Builds one [`Snapshot`] per tick.
pub struct SnapshotSampler {
    probe: Arc<dyn SystemProbe>,
    taps: SharedTapAccumulator,
    biometrics: Arc<dyn BiometricsProvider>,
    transparency: SharedTransparencyLog,
    lookback: chrono::Duration,
    timezone: Option<Tz>,
    export: Option<Mutex<SessionExport>>,
}

impl SnapshotSampler {
    pub fn new(
        probe: Arc<dyn SystemProbe>,
        taps: SharedTapAccumulator,
        biometrics: Arc<dyn BiometricsProvider>,
        transparency: SharedTransparencyLog,
    ) -> Self {
        Self {
            probe,
            taps,
            biometrics,
            transparency,
            lookback: chrono::Duration::seconds(DEFAULT_LOOKBACK.as_secs() as i64),
            timezone: None,
            export: None,
        }
    }

    /// Use `lookback` instead of the default trailing hour.
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = chrono::Duration::seconds(lookback.as_secs() as i64);
        self
    }

    /// Compute "today" in `timezone` instead of the system local zone.
    pub fn with_timezone(mut self, timezone: Option<Tz>) -> Self {
        self.timezone = timezone;
        self
    }

    /// Append every emitted snapshot to `export`.
    pub fn with_export(mut self, export: SessionExport) -> Self {
        self.export = Some(Mutex::new(export));
        self
    }

    /// Take back the session export, if one was attached.
    pub fn into_export(self) -> Option<SessionExport> {
        self.export
            .map(|export| export.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    /// The calendar day containing `now` in the configured zone.
    pub fn today(&self, now: DateTime<Utc>) -> TimeRange {
        match self.timezone {
            Some(tz) => TimeRange::day_of(&now.with_timezone(&tz)),
            None => TimeRange::day_of(&now.with_timezone(&Local)),
        }
    }

    /// Take one snapshot at `now`.
    ///
    /// The tap window is drained before the biometrics join, so taps read on
    /// a failed tick are not carried into the next one.
    pub async fn sample(&self, now: DateTime<Utc>) -> Result<Snapshot, BiometricsError> {
        let tap_count = self.taps.check_and_reset();
        self.sample_with_taps(now, tap_count).await
    }

    async fn sample_with_taps(
        &self,
        now: DateTime<Utc>,
        tap_count: Option<u64>,
    ) -> Result<Snapshot, BiometricsError> {
        if let Some(count) = tap_count {
            self.transparency.record_taps(count);
        }
        let brightness = self.probe.brightness();
        let uptime_seconds = self.probe.uptime_seconds();

        let biometrics = self.fetch_biometrics(now).await?;

        Ok(Snapshot::assemble(
            now,
            brightness,
            tap_count,
            uptime_seconds,
            biometrics,
        ))
    }

    async fn fetch_biometrics(
        &self,
        now: DateTime<Utc>,
    ) -> Result<BiometricsReadings, BiometricsError> {
        let recent = TimeRange::trailing(now, self.lookback);
        let today = self.today(now);
        let provider = self.biometrics.as_ref();

        let (heart_rate, oxygen_saturation, respiratory_rate, active_energy, step_count, sleep_hours) =
            tokio::try_join!(
                provider.samples(Metric::HeartRate, Unit::CountPerMinute, recent),
                provider.samples(Metric::OxygenSaturation, Unit::Percent, recent),
                provider.samples(Metric::RespiratoryRate, Unit::CountPerMinute, recent),
                provider.samples(Metric::ActiveEnergyBurned, Unit::Kilocalorie, recent),
                provider.sum(Metric::StepCount, Unit::Count, recent),
                provider.sleep_hours(today),
            )?;

        Ok(BiometricsReadings {
            heart_rate,
            oxygen_saturation,
            respiratory_rate,
            active_energy,
            step_count,
            sleep_hours,
        })
    }

    /// Run one tick: sample, and on failure log and drop.
    pub async fn tick(&self, now: DateTime<Utc>) -> Option<Snapshot> {
        let tap_count = self.taps.check_and_reset();
        self.tick_with_taps(now, tap_count).await
    }

    async fn tick_with_taps(
        &self,
        now: DateTime<Utc>,
        tap_count: Option<u64>,
    ) -> Option<Snapshot> {
        self.transparency.record_tick();

        match self.sample_with_taps(now, tap_count).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::error!(error = %e, "error fetching biometrics; dropping snapshot");
                self.transparency.record_snapshot_dropped();
                None
            }
        }
    }

    /// Tick every `period` until `shutdown` flips to true, writing each
    /// snapshot to `out` as sorted JSON.
    ///
    /// Ticks are skipped while `is_paused` returns true, and taps typed while
    /// paused are discarded. Returns the number of snapshots emitted.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub async fn run<W, P>(
        &self,
        period: Duration,
        out: &mut W,
        mut shutdown: watch::Receiver<bool>,
        is_paused: P,
    ) -> u64
    where
        W: Write,
        P: Fn() -> bool,
    {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut emitted = 0;

        loop {
            tokio::select! {
                scheduled = ticker.tick() => {
                    // The window closes at the scheduled instant, not whenever
                    // this task got to run.
                    let tap_count = self.taps.check_and_reset_at(scheduled.into_std());

                    if is_paused() {
                        tracing::debug!("sampling paused; skipping tick");
                        continue;
                    }

                    if let Some(snapshot) = self.tick_with_taps(Utc::now(), tap_count).await {
                        if self.emit(&snapshot, out) {
                            tracing::info!("{}", snapshot.summary());
                            emitted += 1;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        emitted
    }

    fn emit<W: Write>(&self, snapshot: &Snapshot, out: &mut W) -> bool {
        let json = match snapshot.to_sorted_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "could not serialize snapshot");
                return false;
            }
        };

        if let Err(e) = writeln!(out, "{json}").and_then(|_| out.flush()) {
            tracing::error!(error = %e, "could not write snapshot");
            return false;
        }

        self.transparency.record_snapshot_emitted();

        if let Some(export) = &self.export {
            let mut export = export.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = export.append(snapshot) {
                tracing::warn!(
                    error = %e,
                    path = ?export.path(),
                    "could not append to session export"
                );
            }
        }
        true
    }
}
