//! [`DebounceSampler`] – minimum spacing between recorded samples.
//!
//! Sensor events may arrive at any rate. The sampler accepts the first call
//! and afterwards only calls made at least `interval` after the last accepted
//! one, which bounds memory growth of the recorded trajectory.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use harvest_scoring::sampler::DebounceSampler;
//!
//! let mut sampler = DebounceSampler::new(Duration::from_millis(250));
//! let t0 = Instant::now();
//! assert!(sampler.should_sample(t0));
//! assert!(!sampler.should_sample(t0 + Duration::from_millis(100)));
//! assert!(sampler.should_sample(t0 + Duration::from_millis(250)));
//! ```

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct DebounceSampler {
    interval: Duration,
    last_sample: Option<Instant>,
}

impl DebounceSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sample: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time of the last accepted sample, if any.
    pub fn last_sample(&self) -> Option<Instant> {
        self.last_sample
    }

    /// Return `true` and remember `now` when a sample is due.
    ///
    /// Timestamps earlier than the last accepted sample are rejected.
    pub fn should_sample(&mut self, now: Instant) -> bool {
        match self.last_sample {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            Some(last) if now < last => false,
            _ => {
                self.last_sample = Some(now);
                true
            }
        }
    }

    /// Forget the last sample so the next call is accepted immediately.
    pub fn reset(&mut self) {
        self.last_sample = None;
    }
}
