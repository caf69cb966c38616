//! Scheduler tuning knobs, loaded from TOML. Mirrors the handful of package
//! level constants `loopy/schedule.go` hard-codes (`Tp`, `Tl`, decay interval,
//! `alpha`, the re-scheduling period) as a `serde`-deserializable struct, the
//! way `keithbugeja-liminal`'s own runtime config is loaded.

use serde::Deserialize;

/// Re-evaluation and fusion tuning for the branch scheduler (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period threshold (decayed total per-message service time, in ms)
    /// above which a branch becomes a fusion candidate.
    pub tp: usize,
    /// Latency threshold (decayed end-to-end transit time, in ms) above
    /// which a branch becomes a fusion candidate.
    pub tl: usize,
    /// Milliseconds between decayed-statistics folds at a ground.
    pub decay_interval_ms: f64,
    /// Decay rate used by `SStats::decay`.
    pub alpha: f64,
    /// Milliseconds between scheduler re-evaluation passes.
    pub schedule_interval_ms: f64,
    /// Worker budget for CCP partitioning; defaults to the visible CPU count.
    pub num_cpu: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tp: 60,
            tl: 100,
            decay_interval_ms: 5000.0,
            alpha: 0.2,
            schedule_interval_ms: 10_000.0,
            num_cpu: num_cpus(),
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl SchedulerConfig {
    /// Loads overrides from a TOML document; unset fields keep their default.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
