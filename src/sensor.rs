/// Distance sensor boundary
///
/// The actual pulse-timing hardware driver (HC-SR04 style trigger/echo
/// timing against GPIO pins) lives behind the `DistanceSensor` trait; the
/// rest of the service only sees "one blocking call, one noisy distance".
/// That keeps the sampling and conversion logic testable with scripted
/// sensors and lets deployments without hardware run on the simulator.

/// One time-of-flight distance sensor pointed at the water surface.
///
/// `measure_distance` blocks for a sensor-dependent, unbounded duration and
/// may return a negative or otherwise implausible value: a single echo can
/// be corrupted by surface ripple or reflections. Callers are responsible
/// for sanity-checking the result; this trait makes no promises beyond
/// "here is one raw sample".
pub trait DistanceSensor: Send {
    /// Takes one raw distance measurement, in centimeters.
    fn measure_distance(&mut self) -> f64;

    /// Releases any hardware resources. Idempotent: safe to call more
    /// than once, and safe to call on a sensor that holds no hardware.
    fn cleanup(&mut self);
}

// ---------------------------------------------------------------------------
// Simulated sensor
// ---------------------------------------------------------------------------

/// Software stand-in for the hardware sensor.
///
/// Produces a slowly oscillating distance around a configured baseline with
/// small deterministic jitter, so a development machine exercises the whole
/// pipeline (sampling, outlier rejection, persistence, endpoint) without a
/// pit or a sensor attached. No external entropy: the sequence is a pure
/// function of the call counter.
pub struct SimulatedSensor {
    baseline_cm: f64,
    swing_cm: f64,
    tick: u64,
}

impl SimulatedSensor {
    /// `baseline_cm` is the nominal sensor-to-surface distance; `swing_cm`
    /// bounds how far the simulated surface drifts from it.
    pub fn new(baseline_cm: f64, swing_cm: f64) -> Self {
        Self {
            baseline_cm,
            swing_cm,
            tick: 0,
        }
    }
}

impl DistanceSensor for SimulatedSensor {
    fn measure_distance(&mut self) -> f64 {
        self.tick += 1;

        // Slow sinusoidal drift of the water surface plus per-sample jitter
        let drift = (self.tick as f64 / 50.0).sin() * self.swing_cm;
        let jitter = ((self.tick.wrapping_mul(2654435761) >> 16) % 100) as f64 / 100.0 - 0.5;

        self.baseline_cm + drift + jitter
    }

    fn cleanup(&mut self) {
        // No hardware resources to release
    }
}
