/// Noise-resistant distance sampling with outlier rejection.
///
/// Raw time-of-flight samples are noisy: a single stray echo can land far
/// from the true surface distance. The sampler takes a window of
/// `num_samples` readings with a fixed delay between them and averages the
/// window, optionally dropping the single minimum and maximum first so one
/// aberrant reading cannot skew the mean.

use crate::model::SampleError;
use crate::sensor::DistanceSensor;
use std::thread;
use std::time::Duration;

/// Sampling policy for one measurement cycle.
#[derive(Debug, Clone)]
pub struct Sampler {
    num_samples: usize,
    sample_delay: Duration,
    drop_extremes: bool,
}

impl Sampler {
    pub fn new(num_samples: usize, sample_delay: Duration, drop_extremes: bool) -> Self {
        Self {
            num_samples,
            sample_delay,
            drop_extremes,
        }
    }

    /// Collects one sample window and returns its average distance.
    ///
    /// Blocks for roughly `num_samples * sample_delay` plus the sensor's
    /// own latency; this is the dominant latency source of a measurement
    /// cycle. With `drop_extremes`, the single lowest and single highest
    /// readings are discarded before averaging; a window of two or fewer
    /// samples then has nothing left to average and fails with
    /// `InsufficientSamples`.
    ///
    /// Without `drop_extremes`, all collected samples are averaged.
    pub fn sample(&self, sensor: &mut dyn DistanceSensor) -> Result<f64, SampleError> {
        let mut window = Vec::with_capacity(self.num_samples);

        for i in 0..self.num_samples {
            window.push(sensor.measure_distance());
            // No trailing sleep after the last reading
            if i + 1 < self.num_samples && !self.sample_delay.is_zero() {
                thread::sleep(self.sample_delay);
            }
        }

        if self.drop_extremes {
            window.sort_by(|a, b| a.total_cmp(b));
            if window.len() <= 2 {
                return Err(SampleError::InsufficientSamples {
                    collected: window.len(),
                });
            }
            window = window[1..window.len() - 1].to_vec();
        } else if window.is_empty() {
            return Err(SampleError::InsufficientSamples { collected: 0 });
        }

        Ok(window.iter().sum::<f64>() / window.len() as f64)
    }
}
