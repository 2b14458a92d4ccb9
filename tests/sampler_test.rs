//! Integration tests for the snapshot sampler.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sense_shift::biometrics::{
    BiometricsError, BiometricsExport, BiometricsProvider, Metric, QuantitySample, SleepCategory,
    SleepSample, TimeRange, Unit,
};
use sense_shift::clock::{ManualClock, SystemClock, TokioClock};
use sense_shift::core::{SessionExport, Snapshot, SnapshotSampler, TapAccumulator};
use sense_shift::system::StaticProbe;
use sense_shift::transparency::create_shared_log;
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap()
}

/// Wraps an export and fails every query for one metric (or sleep).
struct FailingProvider {
    inner: BiometricsExport,
    fail_metric: Option<Metric>,
    fail_sleep: bool,
}

#[async_trait]
impl BiometricsProvider for FailingProvider {
    async fn authorize(&self) -> Result<(), BiometricsError> {
        Ok(())
    }

    async fn samples(
        &self,
        metric: Metric,
        unit: Unit,
        range: TimeRange,
    ) -> Result<Vec<f64>, BiometricsError> {
        if self.fail_metric == Some(metric) {
            return Err(BiometricsError::Query(format!("{metric} unavailable")));
        }
        self.inner.samples(metric, unit, range).await
    }

    async fn sum(
        &self,
        metric: Metric,
        unit: Unit,
        range: TimeRange,
    ) -> Result<f64, BiometricsError> {
        if self.fail_metric == Some(metric) {
            return Err(BiometricsError::Query(format!("{metric} unavailable")));
        }
        self.inner.sum(metric, unit, range).await
    }

    async fn sleep_hours(&self, range: TimeRange) -> Result<f64, BiometricsError> {
        if self.fail_sleep {
            return Err(BiometricsError::AuthorizationDenied("sleep".to_string()));
        }
        self.inner.sleep_hours(range).await
    }
}

fn export() -> BiometricsExport {
    let quantity = |metric, unit, value, start| QuantitySample {
        metric,
        unit,
        value,
        start,
        end: start,
    };
    BiometricsExport {
        quantities: vec![
            quantity(Metric::HeartRate, Unit::CountPerMinute, 72.0, at(8, 40)),
            quantity(Metric::HeartRate, Unit::CountPerMinute, 75.0, at(8, 50)),
            quantity(Metric::OxygenSaturation, Unit::Percent, 0.96, at(8, 45)),
            quantity(Metric::RespiratoryRate, Unit::CountPerMinute, 14.0, at(8, 45)),
            quantity(Metric::ActiveEnergyBurned, Unit::Kilocalorie, 12.5, at(8, 30)),
            quantity(Metric::StepCount, Unit::Count, 300.0, at(8, 10)),
            quantity(Metric::StepCount, Unit::Count, 120.0, at(8, 55)),
            // Outside the trailing hour
            quantity(Metric::StepCount, Unit::Count, 999.0, at(7, 30)),
            quantity(Metric::HeartRate, Unit::CountPerMinute, 50.0, at(7, 0)),
        ],
        sleep: vec![
            SleepSample::new(SleepCategory::AsleepCore, at(0, 0), at(2, 0)),
            SleepSample::new(SleepCategory::Awake, at(2, 0), at(2, 30)),
            SleepSample::new(SleepCategory::AsleepRem, at(2, 30), at(3, 0)),
            SleepSample::new(SleepCategory::InBed, at(3, 0), at(7, 0)),
        ],
    }
}

fn sampler_with(provider: Arc<dyn BiometricsProvider>) -> (SnapshotSampler, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let taps = Arc::new(TapAccumulator::new(clock.clone()));
    let probe = StaticProbe {
        brightness: None,
        uptime_seconds: Some(1234.0),
    };
    let sampler = SnapshotSampler::new(Arc::new(probe), taps, provider, create_shared_log())
        .with_timezone(Some(chrono_tz::UTC));
    (sampler, clock)
}

#[tokio::test]
async fn test_full_snapshot_from_export() {
    let (sampler, _clock) = sampler_with(Arc::new(export()));

    let snapshot = sampler.sample(now()).await.unwrap();

    let mut heart_rate = snapshot.heart_rate_samples.clone();
    heart_rate.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(heart_rate, vec![72.0, 75.0]);
    assert_eq!(snapshot.step_count, Some(420.0));
    assert_eq!(snapshot.sleep_hours, Some(2.5));
    assert_eq!(snapshot.respiratory_rate_samples, vec![14.0]);
    assert_eq!(snapshot.calories_samples, vec![12.5]);
    assert!((snapshot.spo2_samples[0] - 96.0).abs() < 1e-9);
    assert_eq!(snapshot.brightness, None);
    assert_eq!(snapshot.uptime_seconds, Some(1234.0));
}

#[tokio::test]
async fn test_any_failed_query_drops_the_snapshot() {
    for (fail_metric, fail_sleep) in [
        (Some(Metric::HeartRate), false),
        (Some(Metric::OxygenSaturation), false),
        (Some(Metric::RespiratoryRate), false),
        (Some(Metric::ActiveEnergyBurned), false),
        (Some(Metric::StepCount), false),
        (None, true),
    ] {
        let provider = FailingProvider {
            inner: export(),
            fail_metric,
            fail_sleep,
        };
        let clock = Arc::new(ManualClock::new());
        let log = create_shared_log();
        let sampler = SnapshotSampler::new(
            Arc::new(StaticProbe::default()),
            Arc::new(TapAccumulator::new(clock)),
            Arc::new(provider),
            log.clone(),
        );

        assert!(sampler.tick(now()).await.is_none());

        let stats = log.stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.snapshots_dropped, 1);
        assert_eq!(stats.snapshots_emitted, 0);
    }
}

#[tokio::test]
async fn test_missing_export_file_drops_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let provider = sense_shift::FileBiometrics::new(dir.path().join("absent.json"));
    let (sampler, _clock) = sampler_with(Arc::new(provider));

    assert!(sampler.tick(now()).await.is_none());
}

/// Counts ERROR events raised by the crate.
#[derive(Clone, Default)]
struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() == tracing::Level::ERROR && metadata.target().starts_with("sense_shift")
        {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Fails the sleep query on one chosen call and is empty otherwise.
struct FlakyProvider {
    calls: AtomicUsize,
    fail_on_call: usize,
}

#[async_trait]
impl BiometricsProvider for FlakyProvider {
    async fn authorize(&self) -> Result<(), BiometricsError> {
        Ok(())
    }

    async fn samples(
        &self,
        _metric: Metric,
        _unit: Unit,
        _range: TimeRange,
    ) -> Result<Vec<f64>, BiometricsError> {
        Ok(Vec::new())
    }

    async fn sum(
        &self,
        _metric: Metric,
        _unit: Unit,
        _range: TimeRange,
    ) -> Result<f64, BiometricsError> {
        Ok(0.0)
    }

    async fn sleep_hours(&self, _range: TimeRange) -> Result<f64, BiometricsError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_call {
            return Err(BiometricsError::Query("sleep store busy".to_string()));
        }
        Ok(0.0)
    }
}

fn empty_sampler(log: sense_shift::SharedTransparencyLog) -> SnapshotSampler {
    SnapshotSampler::new(
        Arc::new(StaticProbe::default()),
        Arc::new(TapAccumulator::new(Arc::new(TokioClock))),
        Arc::new(BiometricsExport::default()),
        log,
    )
}

fn parse_snapshots(out: &[u8]) -> Vec<Snapshot> {
    serde_json::Deserializer::from_slice(out)
        .into_iter::<Snapshot>()
        .map(|snapshot| snapshot.unwrap())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_run_emits_one_snapshot_per_period() {
    let log = create_shared_log();
    let sampler = empty_sampler(log.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut out = Vec::new();

    let stop = async {
        tokio::time::sleep(Duration::from_secs(35)).await;
        shutdown_tx.send(true).unwrap();
    };
    let (emitted, ()) = tokio::join!(
        sampler.run(Duration::from_secs(10), &mut out, shutdown_rx, || false),
        stop
    );

    assert_eq!(emitted, 3);
    assert_eq!(log.stats().snapshots_emitted, 3);

    let snapshots = parse_snapshots(&out);
    assert_eq!(snapshots.len(), 3);
    assert_eq!(snapshots[0].step_count, Some(0.0));
    assert!(snapshots.iter().all(|s| s.tap_count == Some(0)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_is_dropped_and_sampling_continues() {
    let errors = ErrorCounter::default();
    let subscriber = tracing_subscriber::registry().with(errors.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let log = create_shared_log();
    let sampler = SnapshotSampler::new(
        Arc::new(StaticProbe::default()),
        Arc::new(TapAccumulator::new(Arc::new(TokioClock))),
        Arc::new(FlakyProvider {
            calls: AtomicUsize::new(0),
            fail_on_call: 2,
        }),
        log.clone(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut out = Vec::new();

    let stop = async {
        tokio::time::sleep(Duration::from_secs(35)).await;
        shutdown_tx.send(true).unwrap();
    };
    let (emitted, ()) = tokio::join!(
        sampler.run(Duration::from_secs(10), &mut out, shutdown_rx, || false),
        stop
    );

    assert_eq!(emitted, 2);
    assert_eq!(parse_snapshots(&out).len(), 2);

    let stats = log.stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.snapshots_emitted, 2);
    assert_eq!(stats.snapshots_dropped, 1);
    assert_eq!(errors.count(), 1);
}

#[tokio::test]
async fn test_tap_window_matching_period_survives_slow_ticks() {
    let period = Duration::from_millis(200);
    let taps = Arc::new(TapAccumulator::with_window(Arc::new(SystemClock), period));
    let sampler = SnapshotSampler::new(
        Arc::new(StaticProbe::default()),
        taps.clone(),
        Arc::new(BiometricsExport::default()),
        create_shared_log(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut out = Vec::new();

    // A pause check that blocks for a different time on every tick, like a
    // config read from disk.
    let delays_ms = [35u64, 0, 20, 5, 40, 10];
    let calls = Cell::new(0usize);
    let is_paused = || {
        let call = calls.get();
        calls.set(call + 1);
        std::thread::sleep(Duration::from_millis(delays_ms[call % delays_ms.len()]));
        taps.register_tap();
        false
    };

    let stop = async {
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        shutdown_tx.send(true).unwrap();
    };
    let (emitted, ()) = tokio::join!(sampler.run(period, &mut out, shutdown_rx, is_paused), stop);

    let snapshots = parse_snapshots(&out);
    assert!(emitted >= 5, "only {emitted} ticks ran");
    assert_eq!(snapshots.len() as u64, emitted);
    for (i, snapshot) in snapshots.iter().enumerate() {
        assert!(snapshot.tap_count.is_some(), "tick {i} read a short window");
    }
}

#[tokio::test(start_paused = true)]
async fn test_run_appends_each_snapshot_to_the_session_export() {
    let dir = tempfile::tempdir().unwrap();
    let export = SessionExport::new(dir.path(), uuid::Uuid::new_v4(), Utc::now());
    let path = export.path().to_path_buf();
    let sampler = empty_sampler(create_shared_log()).with_export(export);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut out = Vec::new();

    let stop = async {
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown_tx.send(true).unwrap();
    };
    let (emitted, ()) = tokio::join!(
        sampler.run(Duration::from_secs(10), &mut out, shutdown_rx, || false),
        stop
    );
    assert_eq!(emitted, 2);

    let lines = std::fs::read_to_string(&path).unwrap();
    let exported: Vec<Snapshot> = lines
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(exported, parse_snapshots(&out));
    assert_eq!(sampler.into_export().unwrap().written(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_skips_ticks_while_paused() {
    let log = create_shared_log();
    let sampler = empty_sampler(log.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut out = Vec::new();

    let stop = async {
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown_tx.send(true).unwrap();
    };
    let (emitted, ()) = tokio::join!(
        sampler.run(Duration::from_secs(10), &mut out, shutdown_rx, || true),
        stop
    );

    assert_eq!(emitted, 0);
    assert!(out.is_empty());
    assert_eq!(log.stats().ticks, 0);
}
