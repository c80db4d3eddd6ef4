/// Integration tests for the measurement pipeline and its lifecycle
///
/// These tests exercise the full path a reading takes through the service:
/// 1. Sensor sampling with outlier rejection
/// 2. Depth conversion and validity gating
/// 3. Transactional persistence through per-worker connections
/// 4. Range retrieval via the query service
/// 5. Clean startup/shutdown of the measurement worker
///
/// Everything runs against throwaway SQLite files and scripted sensors;
/// no hardware or external services are required.

use pitmon_service::db::{ConnectionManager, WorkerId};
use pitmon_service::endpoint::QueryService;
use pitmon_service::model::Reading;
use pitmon_service::monitor::{LiveGauge, MonitorConfig, PitMonitor, Sampler, to_depth};
use pitmon_service::sensor::DistanceSensor;
use pitmon_service::store::WaterLevelStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn temp_db(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "pitmon_it_{}_{}.db",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

fn setup_store(path: &PathBuf) -> (Arc<ConnectionManager>, Arc<WaterLevelStore>, WorkerId) {
    let worker = WorkerId::new("test");
    let manager = Arc::new(ConnectionManager::new(path));
    let store = Arc::new(
        WaterLevelStore::new(Arc::clone(&manager), &worker).expect("schema creation should succeed"),
    );
    (manager, store, worker)
}

/// Replays a fixed sequence of distances on repeat and counts cleanups.
struct ScriptedSensor {
    values: Vec<f64>,
    cursor: usize,
    cleanups: Arc<AtomicUsize>,
}

impl ScriptedSensor {
    fn new(values: &[f64], cleanups: Arc<AtomicUsize>) -> Self {
        Self {
            values: values.to_vec(),
            cursor: 0,
            cleanups,
        }
    }
}

impl DistanceSensor for ScriptedSensor {
    fn measure_distance(&mut self) -> f64 {
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v
    }

    fn cleanup(&mut self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_config(num_samples: usize, drop_extremes: bool) -> MonitorConfig {
    MonitorConfig {
        num_samples,
        drop_extremes,
        sample_delay: Duration::ZERO,
        measurement_frequency: Duration::from_millis(10),
        distance_to_bottom: 100.0,
        persist_readings: true,
    }
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

// ---------------------------------------------------------------------------
// 1. Pipeline Scenario
// ---------------------------------------------------------------------------

#[test]
fn test_full_pipeline_scenario() {
    // Sensor sequence [10,12,11,50,9] with drop_extremes: 9 and 50 are
    // discarded, mean of [10,12,11] is 11, depth = 100 - 11 = 89
    let path = temp_db("scenario");
    let (manager, store, worker) = setup_store(&path);

    let cleanups = Arc::new(AtomicUsize::new(0));
    let sensor = ScriptedSensor::new(&[10.0, 12.0, 11.0, 50.0, 9.0], Arc::clone(&cleanups));

    let mut monitor = PitMonitor::new(
        fast_config(5, true),
        Box::new(sensor),
        Arc::clone(&store),
        LiveGauge::new(),
    );
    monitor.start();

    assert!(
        wait_until(Duration::from_secs(5), || store.count(&worker) >= 1),
        "at least one cycle should persist a reading"
    );
    monitor.stop();

    let readings = store.get_by_range(&worker, None, None);
    assert!(!readings.is_empty());
    for reading in &readings {
        assert_eq!(reading.value, 89.0, "every cycle sees the same scripted window");
        assert!(reading.timestamp > 0);
    }

    manager.close_all();
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_depth_gate_discards_negative_depths() {
    // Distances beyond the pit floor convert to negative depths; those
    // cycles are discarded silently and nothing is persisted
    let path = temp_db("gate");
    let (manager, store, worker) = setup_store(&path);

    let cleanups = Arc::new(AtomicUsize::new(0));
    let sensor = ScriptedSensor::new(&[150.0, 150.0, 150.0], Arc::clone(&cleanups));

    let gauge = LiveGauge::new();
    let mut monitor = PitMonitor::new(
        fast_config(3, true),
        Box::new(sensor),
        Arc::clone(&store),
        gauge.clone(),
    );
    monitor.start();
    thread::sleep(Duration::from_millis(100));
    monitor.stop();

    assert_eq!(store.count(&worker), 0, "negative depths must never be stored");
    assert_eq!(gauge.latest(), None, "the gauge only sees valid depths");

    manager.close_all();
    let _ = std::fs::remove_file(&path);
}

// ---------------------------------------------------------------------------
// 2. Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_stop_releases_sensor_exactly_once() {
    let path = temp_db("cleanup");
    let (manager, store, _worker) = setup_store(&path);

    let cleanups = Arc::new(AtomicUsize::new(0));
    let sensor = ScriptedSensor::new(&[40.0, 41.0, 42.0, 43.0, 44.0], Arc::clone(&cleanups));

    let mut monitor = PitMonitor::new(
        fast_config(5, true),
        Box::new(sensor),
        store,
        LiveGauge::new(),
    );

    monitor.start();
    assert!(monitor.is_running());
    thread::sleep(Duration::from_millis(50));

    monitor.stop();
    assert!(!monitor.is_running());
    assert_eq!(cleanups.load(Ordering::SeqCst), 1, "cleanup must run exactly once");

    // stop() again is harmless
    monitor.stop();
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);

    manager.close_all();
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_start_while_running_is_a_no_op() {
    let path = temp_db("reentrant");
    let (manager, store, _worker) = setup_store(&path);

    let cleanups = Arc::new(AtomicUsize::new(0));
    let sensor = ScriptedSensor::new(&[40.0, 41.0, 42.0], Arc::clone(&cleanups));

    let mut monitor = PitMonitor::new(
        fast_config(3, true),
        Box::new(sensor),
        store,
        LiveGauge::new(),
    );

    monitor.start();
    monitor.start(); // must not spawn a second worker or panic
    thread::sleep(Duration::from_millis(50));
    monitor.stop();

    assert_eq!(cleanups.load(Ordering::SeqCst), 1, "only one worker ever ran");

    manager.close_all();
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_failed_sampling_cycles_do_not_stop_the_loop() {
    // A two-sample window with drop_extremes collapses to empty, so every
    // cycle fails with InsufficientSamples. The loop must keep running
    // and still shut down cleanly.
    let path = temp_db("resilience");
    let (manager, store, worker) = setup_store(&path);

    let cleanups = Arc::new(AtomicUsize::new(0));
    let sensor = ScriptedSensor::new(&[40.0, 41.0], Arc::clone(&cleanups));

    let mut monitor = PitMonitor::new(
        fast_config(2, true),
        Box::new(sensor),
        Arc::clone(&store),
        LiveGauge::new(),
    );
    monitor.start();
    thread::sleep(Duration::from_millis(100));

    assert!(monitor.is_running(), "failed cycles are skipped, not fatal");
    monitor.stop();

    assert_eq!(store.count(&worker), 0);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);

    manager.close_all();
    let _ = std::fs::remove_file(&path);
}

// ---------------------------------------------------------------------------
// 3. Connection Management Across Workers
// ---------------------------------------------------------------------------

#[test]
fn test_concurrent_workers_get_isolated_connections() {
    let path = temp_db("concurrent");
    let manager = Arc::new(ConnectionManager::new(&path));

    let handles: Vec<_> = ["monitor", "endpoint"]
        .into_iter()
        .map(|name| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let worker = WorkerId::new(name);
                manager.get_connection(&worker).expect("connection should open")
            })
        })
        .collect();

    let connections: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(
        !Arc::ptr_eq(&connections[0], &connections[1]),
        "distinct worker identities must never share a connection"
    );
    assert_eq!(manager.open_connections(), 2);

    manager.close_all();
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_both_workers_see_the_same_table() {
    let path = temp_db("shared_file");
    let (manager, store, _) = setup_store(&path);

    let writer = WorkerId::new("monitor");
    let reader = WorkerId::new("endpoint");

    assert!(store.save(&writer, &Reading::new(1000, 12.5)).unwrap());

    let readings = store.get_by_range(&reader, Some(0), Some(2000));
    assert_eq!(readings, vec![Reading::new(1000, 12.5)],
        "a reading saved by one worker is visible to another");

    manager.close_all();
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_save_after_close_all_lazily_reopens() {
    // Shutdown order says close connections after stopping the loop, but a
    // racing save must degrade or recover, never crash. With lazy
    // re-creation the manager simply opens a fresh connection.
    let path = temp_db("reopen");
    let (manager, store, worker) = setup_store(&path);

    assert!(store.save(&worker, &Reading::new(1000, 1.0)).unwrap());
    manager.close_all();

    assert!(store.save(&worker, &Reading::new(2000, 2.0)).unwrap());
    assert_eq!(store.count(&worker), 2);

    manager.close_all();
    let _ = std::fs::remove_file(&path);
}

// ---------------------------------------------------------------------------
// 4. Query Service Contract
// ---------------------------------------------------------------------------

#[test]
fn test_query_service_delegates_range_and_defaults() {
    let path = temp_db("query");
    let (manager, store, worker) = setup_store(&path);

    store.save(&worker, &Reading::new(1000, 10.0)).unwrap();
    store.save(&worker, &Reading::new(2000, 11.0)).unwrap();
    store.save(&worker, &Reading::new(3000, 12.0)).unwrap();

    let gauge = LiveGauge::new();
    let service = QueryService::new(Arc::clone(&store), gauge.clone());

    let bounded = service.get_by_date_range(Some(1500), Some(2500));
    assert_eq!(bounded, vec![Reading::new(2000, 11.0)]);

    let everything = service.get_by_date_range(None, None);
    assert_eq!(everything.len(), 3, "defaults span epoch to now");

    assert_eq!(service.current_depth(), None);
    gauge.set(12.0);
    assert_eq!(service.current_depth(), Some(12.0));

    manager.close_all();
    let _ = std::fs::remove_file(&path);
}

// ---------------------------------------------------------------------------
// 5. Sampling + Conversion Without the Loop
// ---------------------------------------------------------------------------

#[test]
fn test_sampler_and_conversion_compose() {
    let cleanups = Arc::new(AtomicUsize::new(0));
    let mut sensor = ScriptedSensor::new(&[10.0, 12.0, 11.0, 50.0, 9.0], cleanups);

    let sampler = Sampler::new(5, Duration::ZERO, true);
    let distance = sampler.sample(&mut sensor).expect("five samples should average");

    assert_eq!(distance, 11.0);
    assert_eq!(to_depth(distance, 100.0), 89.0);
}
