//! Summary metrics for a finished run.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::result::{BatchResult, ExecutionStatus};

/// Metrics derived from a [`BatchResult`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionMetrics {
    /// Number of packages in the run, started or not.
    pub packages_total: usize,
    pub packages_succeeded: usize,
    pub packages_failed: usize,
    pub packages_skipped: usize,
    pub packages_cancelled: usize,
    /// Wall-clock time of the whole run.
    pub total_duration: Duration,
    /// Duration per package that actually ran.
    pub package_durations: BTreeMap<String, Duration>,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_batch(batch: &BatchResult) -> Self {
        let mut metrics = Self::new();
        for result in &batch.results {
            metrics.packages_total += 1;
            match result.status {
                ExecutionStatus::Success => metrics.packages_succeeded += 1,
                ExecutionStatus::Failure => metrics.packages_failed += 1,
                ExecutionStatus::Skipped => metrics.packages_skipped += 1,
                ExecutionStatus::Cancelled => metrics.packages_cancelled += 1,
            }
            if matches!(result.status, ExecutionStatus::Success | ExecutionStatus::Failure) {
                metrics
                    .package_durations
                    .insert(result.package.clone(), result.duration);
            }
        }
        metrics.total_duration = batch.duration;
        metrics
    }

    /// Returns the average duration of the packages that ran.
    pub fn average_package_duration(&self) -> Duration {
        if self.package_durations.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.package_durations.values().sum();
        total / self.package_durations.len() as u32
    }

    /// The package that took longest, if any ran.
    pub fn slowest_package(&self) -> Option<(&str, Duration)> {
        self.package_durations
            .iter()
            .max_by_key(|(_, d)| **d)
            .map(|(name, d)| (name.as_str(), *d))
    }

    /// Returns the success rate (0.0 to 1.0) over all packages.
    pub fn success_rate(&self) -> f64 {
        if self.packages_total == 0 {
            return 0.0;
        }
        self.packages_succeeded as f64 / self.packages_total as f64
    }
}
