//! SkyScript Metrics - bridge call and frame statistics
//!
//! Provides zero-cost abstractions for statistics collection that completely
//! vanish in production builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable statistics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use skyscript_metrics::{CallCounter, FrameProfiler};
//!
//! let mut calls = CallCounter::new();
//! calls.record("dataref.getInt", true);
//!
//! let mut profiler = FrameProfiler::new();
//! profiler.time_app("hello-world", || run_frame());
//! println!("avg: {:.3} ms", profiler.average_ms("hello-world"));
//! ```
//!
//! Without the `metrics` feature every type below is an empty stub.

#[cfg(feature = "metrics")]
mod call_counter;
#[cfg(feature = "metrics")]
mod frame_profiler;

#[cfg(feature = "metrics")]
pub use call_counter::{CallCounter, CallTally};
#[cfg(feature = "metrics")]
pub use frame_profiler::FrameProfiler;

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallTally {
    pub ok: u64,
    pub failed: u64,
}

#[cfg(not(feature = "metrics"))]
impl CallTally {
    pub fn total(&self) -> u64 { self.ok + self.failed }
}

#[cfg(not(feature = "metrics"))]
#[derive(Default)]
pub struct CallCounter;

#[cfg(not(feature = "metrics"))]
impl CallCounter {
    pub fn new() -> Self { Self }
    pub fn record(&mut self, _op: &'static str, _ok: bool) {}
    pub fn get(&self, _op: &str) -> CallTally { CallTally::default() }
    pub fn total_failed(&self) -> u64 { 0 }
    pub fn reset(&mut self) {}
    pub fn sorted(&self) -> Vec<(&'static str, CallTally)> { Vec::new() }
}

#[cfg(not(feature = "metrics"))]
#[derive(Default)]
pub struct FrameProfiler;

#[cfg(not(feature = "metrics"))]
impl FrameProfiler {
    pub fn new() -> Self { Self }
    pub fn time_app<F, R>(&mut self, _app: &str, f: F) -> R where F: FnOnce() -> R { f() }
    pub fn total(&self, _app: &str) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn worst(&self, _app: &str) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn frames(&self, _app: &str) -> u64 { 0 }
    pub fn average_ms(&self, _app: &str) -> f64 { 0.0 }
    pub fn reset(&mut self) {}
}
