//! Per-app frame callback profiler

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
struct AppTiming {
    total: Duration,
    worst: Duration,
    frames: u64,
}

pub struct FrameProfiler {
    timings: HashMap<String, AppTiming>,
}

impl FrameProfiler {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
        }
    }

    pub fn time_app<F, R>(&mut self, app: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        let timing = self.timings.entry(app.to_string()).or_default();
        timing.total += elapsed;
        timing.worst = timing.worst.max(elapsed);
        timing.frames += 1;
        result
    }

    pub fn total(&self, app: &str) -> Duration {
        self.timings.get(app).map(|t| t.total).unwrap_or(Duration::ZERO)
    }

    pub fn worst(&self, app: &str) -> Duration {
        self.timings.get(app).map(|t| t.worst).unwrap_or(Duration::ZERO)
    }

    pub fn frames(&self, app: &str) -> u64 {
        self.timings.get(app).map(|t| t.frames).unwrap_or(0)
    }

    pub fn average_ms(&self, app: &str) -> f64 {
        match self.timings.get(app) {
            Some(t) if t.frames > 0 => t.total.as_secs_f64() * 1000.0 / t.frames as f64,
            _ => 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.timings.clear();
    }
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_app_accumulates() {
        let mut profiler = FrameProfiler::new();
        let value = profiler.time_app("hello-world", || 7);
        profiler.time_app("hello-world", || ());

        assert_eq!(value, 7);
        assert_eq!(profiler.frames("hello-world"), 2);
        assert!(profiler.worst("hello-world") <= profiler.total("hello-world"));
        assert_eq!(profiler.frames("missing"), 0);
        assert_eq!(profiler.average_ms("missing"), 0.0);
    }
}
