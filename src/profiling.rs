//! Per-dispatch timing samples

use std::collections::BTreeMap;
use std::fmt;

use crate::schedule::Stage;

/// Start and end timestamps of one dispatch, in nanoseconds.
///
/// Both stamps come from the same clock (device timestamps, or a host clock
/// when the device cannot record them), so only their difference is
/// meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfilingSample {
    /// When execution began
    pub start_ns: u64,
    /// When execution ended
    pub end_ns: u64,
}

impl ProfilingSample {
    /// Build a sample from two stamps
    pub fn new(start_ns: u64, end_ns: u64) -> Self {
        Self { start_ns, end_ns }
    }

    /// Elapsed nanoseconds, saturating at zero for out-of-order stamps
    pub fn elapsed_ns(&self) -> u64 {
        self.end_ns.saturating_sub(self.start_ns)
    }

    /// Elapsed seconds (nanoseconds ÷ 1e9)
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ns() as f64 / 1e9
    }
}

/// Samples of one pipeline run, keyed by stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilingReport {
    samples: BTreeMap<Stage, ProfilingSample>,
    host_clock: bool,
}

impl ProfilingReport {
    /// Empty report (profiling disabled)
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the samples as host-clock stamps taken around each submission
    pub fn set_host_clock(&mut self, host_clock: bool) {
        self.host_clock = host_clock;
    }

    /// True when the device could not record its own timestamps
    pub fn is_host_clock(&self) -> bool {
        self.host_clock
    }

    /// Record the sample for `stage`, replacing any earlier one
    pub fn insert(&mut self, stage: Stage, sample: ProfilingSample) {
        self.samples.insert(stage, sample);
    }

    /// Sample for `stage`
    pub fn get(&self, stage: Stage) -> Option<&ProfilingSample> {
        self.samples.get(&stage)
    }

    /// True if no stage was sampled
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in stage order
    pub fn iter(&self) -> impl Iterator<Item = (Stage, &ProfilingSample)> {
        self.samples.iter().map(|(s, p)| (*s, p))
    }

    /// Time spent deriving variance and deviation: the variance kernel plus
    /// the variance sum, without the host gap between them.
    pub fn variance_and_deviation_ns(&self) -> Option<u64> {
        let var = self.get(Stage::Variance)?;
        let sum = self.get(Stage::VarianceSum)?;
        Some(var.elapsed_ns() + sum.elapsed_ns())
    }

    /// Sum of all per-stage elapsed times
    pub fn total_ns(&self) -> u64 {
        self.samples.values().map(ProfilingSample::elapsed_ns).sum()
    }
}

impl fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host_clock {
            writeln!(f, "Profiling (host clock)")?;
        } else {
            writeln!(f, "Profiling")?;
        }
        if self.is_empty() {
            return writeln!(f, "  (disabled)");
        }
        fn line(f: &mut fmt::Formatter<'_>, label: &str, ns: u64) -> fmt::Result {
            writeln!(f, "  {:<22} {:>12} ns  {:>10.6} s", label, ns, ns as f64 / 1e9)
        }
        for (stage, sample) in self.iter() {
            line(f, stage.label(), sample.elapsed_ns())?;
        }
        if let Some(ns) = self.variance_and_deviation_ns() {
            line(f, "Variance + deviation", ns)?;
        }
        line(f, "Total", self.total_ns())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_conversion() {
        let s = ProfilingSample::new(1_000, 2_501_000);
        assert_eq!(s.elapsed_ns(), 2_500_000);
        assert!((s.elapsed_secs() - 0.0025).abs() < 1e-12);
        assert_eq!(ProfilingSample::new(10, 5).elapsed_ns(), 0);
    }

    #[test]
    fn test_variance_and_deviation_skips_the_gap() {
        let mut report = ProfilingReport::new();
        assert_eq!(report.variance_and_deviation_ns(), None);
        report.insert(Stage::Variance, ProfilingSample::new(100, 200));
        report.insert(Stage::VarianceSum, ProfilingSample::new(250, 400));
        assert_eq!(report.variance_and_deviation_ns(), Some(250));

        report.insert(Stage::Sum, ProfilingSample::new(0, 50));
        assert_eq!(report.total_ns(), 300);
        assert!(report.to_string().contains("Total"));
    }

    #[test]
    fn test_display_lists_stages() {
        let mut report = ProfilingReport::new();
        report.insert(Stage::Sort, ProfilingSample::new(0, 1_500_000_000));
        let text = report.to_string();
        assert!(text.contains("Sort"));
        assert!(text.contains("1500000000 ns"));
        assert!(text.contains("1.500000 s"));
        assert!(ProfilingReport::new().to_string().contains("disabled"));

        report.set_host_clock(true);
        assert!(report.is_host_clock());
        assert!(report.to_string().starts_with("Profiling (host clock)"));
    }
}
