/// Continuous pit measurement loop
///
/// Orchestrates one cycle per period: sample the sensor through the
/// outlier-rejecting `Sampler`, convert the averaged distance to a water
/// depth, gate on validity, then hand the reading to persistence and the
/// live gauge. Sensor noise is expected, so a failed cycle is logged and
/// skipped - the loop itself only ever exits through `stop()`.

pub mod sampler;

pub use sampler::Sampler;

use crate::config::MonitorSection;
use crate::db::WorkerId;
use crate::model::Reading;
use crate::sensor::DistanceSensor;
use crate::store::WaterLevelStore;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Depth conversion
// ---------------------------------------------------------------------------

/// Converts a sensor-to-surface distance into a water depth.
///
/// `distance_to_bottom` is the fixed distance from the sensor to the pit
/// floor, so the water column is whatever the echo did not travel. Pure
/// arithmetic with no validation: the measurement loop applies the
/// non-negativity gate, which keeps this testable in isolation.
pub fn to_depth(distance: f64, distance_to_bottom: f64) -> f64 {
    distance_to_bottom - distance
}

// ---------------------------------------------------------------------------
// Live gauge
// ---------------------------------------------------------------------------

/// Last valid depth, shared between the measurement loop and the endpoint.
///
/// `None` until the first valid cycle completes.
#[derive(Clone, Default)]
pub struct LiveGauge {
    latest: Arc<Mutex<Option<f64>>>,
}

impl LiveGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, depth_cm: f64) {
        *self.latest.lock().expect("gauge poisoned") = Some(depth_cm);
    }

    pub fn latest(&self) -> Option<f64> {
        *self.latest.lock().expect("gauge poisoned")
    }
}

// ---------------------------------------------------------------------------
// Measurement loop
// ---------------------------------------------------------------------------

/// Immutable configuration snapshot for the measurement loop.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub num_samples: usize,
    pub drop_extremes: bool,
    pub sample_delay: Duration,
    pub measurement_frequency: Duration,
    pub distance_to_bottom: f64,
    pub persist_readings: bool,
}

impl From<&MonitorSection> for MonitorConfig {
    fn from(section: &MonitorSection) -> Self {
        Self {
            num_samples: section.num_samples as usize,
            drop_extremes: section.drop_extremes,
            sample_delay: section.sample_delay(),
            measurement_frequency: section.measurement_frequency(),
            distance_to_bottom: section.distance_to_bottom,
            persist_readings: section.persist_readings,
        }
    }
}

/// Everything the measurement worker takes with it when it starts.
struct MonitorWorker {
    config: MonitorConfig,
    sensor: Box<dyn DistanceSensor>,
    store: Arc<WaterLevelStore>,
    db_worker: WorkerId,
    gauge: LiveGauge,
}

/// The continuous measurement loop and its lifecycle.
///
/// States: Stopped -> Running -> Stopped. `start()` spawns a dedicated
/// worker thread and returns immediately; calling it again while running
/// is a no-op. `stop()` is cooperative: the stop token is observed at the
/// top of each cycle and during the inter-cycle sleep, but an in-flight
/// sample window is never interrupted, so shutdown latency is bounded by
/// one sample window (`num_samples * sample_delay` plus sensor latency).
pub struct PitMonitor {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    worker: Option<MonitorWorker>,
}

impl PitMonitor {
    pub fn new(
        config: MonitorConfig,
        sensor: Box<dyn DistanceSensor>,
        store: Arc<WaterLevelStore>,
        gauge: LiveGauge,
    ) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            worker: Some(MonitorWorker {
                config,
                sensor,
                store,
                db_worker: WorkerId::new("monitor"),
                gauge,
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the measurement worker. No-op if already running.
    pub fn start(&mut self) {
        let Some(worker) = self.worker.take() else {
            return; // already started once
        };

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        self.handle = Some(thread::spawn(move || {
            run_loop(worker, &running);
        }));
    }

    /// Signals the worker to stop and waits for it to exit.
    ///
    /// Blocks for at most one in-flight sample window; the sensor's
    /// resources are released by the worker on its way out.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                eprintln!("[monitor] measurement worker panicked");
            }
        }
    }
}

fn run_loop(mut worker: MonitorWorker, running: &AtomicBool) {
    let config = worker.config.clone();
    let sampler = Sampler::new(config.num_samples, config.sample_delay, config.drop_extremes);

    println!(
        "[monitor] measuring every {:?} ({} samples per cycle, drop_extremes={})",
        config.measurement_frequency, config.num_samples, config.drop_extremes
    );

    while running.load(Ordering::SeqCst) {
        match sampler.sample(worker.sensor.as_mut()) {
            Ok(distance) => {
                let depth = to_depth(distance, config.distance_to_bottom);
                if depth >= 0.0 {
                    record_depth(&worker, depth, config.persist_readings);
                }
                // depth < 0 usually means overflow or sensor-surface
                // interference: one anomalous cycle, discarded silently
            }
            Err(e) => {
                // Noise is expected; skip the cycle and retry next period
                eprintln!("[monitor] sampling failed, skipping cycle: {}", e);
            }
        }

        sleep_unless_stopped(running, config.measurement_frequency);
    }

    worker.sensor.cleanup();
    println!("[monitor] measurement loop stopped, sensor released");
}

fn record_depth(worker: &MonitorWorker, depth_cm: f64, persist: bool) {
    let reading = Reading::new(Utc::now().timestamp_millis(), depth_cm);

    if persist {
        match worker.store.save(&worker.db_worker, &reading) {
            Ok(true) => {}
            Ok(false) => {
                // Transaction failure already logged by the db layer;
                // this cycle's reading is lost, the loop carries on
                eprintln!("[monitor] reading not persisted this cycle");
            }
            Err(e) => eprintln!("[monitor] reading rejected: {}", e),
        }
    }

    worker.gauge.set(depth_cm);
}

/// Sleeps for `period`, waking early if the stop token flips.
///
/// Sliced so a stop request during an idle period is observed within
/// ~250 ms instead of waiting out the whole measurement frequency.
fn sleep_unless_stopped(running: &AtomicBool, period: Duration) {
    const SLICE: Duration = Duration::from_millis(250);
    let deadline = Instant::now() + period;

    while running.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(SLICE));
    }
}
