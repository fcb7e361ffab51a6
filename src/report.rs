//! Results in original units
//!
//! Kernels see scaled integers. [`Summary`] divides the scaled quantities by
//! the [`Scale`] the dataset was produced with and renders them as text.

use std::fmt;

use crate::dataset::Scale;
use crate::kernel::SortKernel;
use crate::pipeline::PipelineResult;

const RULE: &str = "-----------------------";

/// Printable summary of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Work items per group
    pub work_items: usize,
    /// Number of work-groups
    pub work_groups: usize,
    /// Samples without padding
    pub data_len: usize,
    /// Samples including padding
    pub padded_len: usize,
    /// Sort strategy used
    pub sort: SortKernel,
    /// Minimum
    pub min: f64,
    /// Maximum
    pub max: f64,
    /// Mean
    pub mean: f64,
    /// Variance as produced by the kernels
    pub variance: f64,
    /// Standard deviation as produced by the kernels
    pub std_dev: f64,
    /// First quartile
    pub q1: f64,
    /// Median
    pub median: f64,
    /// Third quartile
    pub q3: f64,
}

impl Summary {
    /// Convert a run's result to original units.
    ///
    /// Variance and deviation are already unscaled by the variance-sum kernel
    /// and are taken as-is.
    pub fn from_result(result: &PipelineResult, scale: Scale) -> Self {
        let unscale = |v: i32| scale.unscale(v as f64);
        let p = &result.positional;
        Self {
            work_items: result.geometry.group_size,
            work_groups: result.geometry.group_count,
            data_len: result.geometry.original_len,
            padded_len: result.geometry.padded_len,
            sort: result.sort,
            min: unscale(result.min),
            max: unscale(result.max),
            mean: scale.unscale(result.mean),
            variance: result.variance,
            std_dev: result.std_dev,
            q1: unscale(p.q1),
            median: unscale(p.median),
            q3: unscale(p.q3),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE} Results {RULE}")?;
        writeln!(f)?;
        writeln!(f, "Work items: {}", self.work_items)?;
        writeln!(f, "Work groups: {}", self.work_groups)?;
        writeln!(f, "Data executed: {}", self.data_len)?;
        writeln!(f, "Data executed w/padding: {}", self.padded_len)?;
        writeln!(f, "Sort: {}", self.sort)?;
        writeln!(f)?;
        writeln!(f, "Minimum: {:.2}", self.min)?;
        writeln!(f, "Maximum: {:.2}", self.max)?;
        writeln!(f, "Mean/Avg: {:.2}", self.mean)?;
        writeln!(f, "Variance: {:.2}", self.variance)?;
        writeln!(f, "Standard Deviation: {:.2}", self.std_dev)?;
        writeln!(f, "1QT: {:.2}", self.q1)?;
        writeln!(f, "3QT: {:.2}", self.q3)?;
        writeln!(f, "Median value: {:.2}", self.median)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PaddingPolicy, WorkGroupGeometry};
    use crate::pipeline::PositionalStats;
    use crate::profiling::ProfilingReport;

    fn result() -> PipelineResult {
        let sorted = vec![1, 4, 7, 9, 16, 18, 22, 45, 63, 100];
        PipelineResult {
            geometry: WorkGroupGeometry::new(10, 5).unwrap(),
            padding: PaddingPolicy::PerReduction,
            sort: SortKernel::Selection,
            min: 1,
            max: 100,
            sum: 285,
            mean: 28.5,
            truncated_mean: 28,
            variance_sum: 90,
            variance: 9.0,
            std_dev: 3.0,
            positional: PositionalStats::from_sorted(&sorted).unwrap(),
            sorted,
            profiling: ProfilingReport::new(),
        }
    }

    #[test]
    fn test_summary_unscales_positional_values() {
        let s = Summary::from_result(&result(), Scale::DEFAULT);
        assert_eq!(s.min, 0.1);
        assert_eq!(s.max, 10.0);
        assert_eq!(s.mean, 2.85);
        assert_eq!(s.median, 1.8);
        assert_eq!(s.q1, 0.7);
        assert_eq!(s.q3, 4.5);
        assert_eq!(s.variance, 9.0);
        assert_eq!(s.std_dev, 3.0);
    }

    #[test]
    fn test_summary_text() {
        let text = Summary::from_result(&result(), Scale::DEFAULT).to_string();
        assert!(text.contains("Results"));
        assert!(text.contains("Work groups: 2"));
        assert!(text.contains("Data executed w/padding: 10"));
        assert!(text.contains("Mean/Avg: 2.85"));
        assert!(text.contains("Standard Deviation: 3.00"));
        assert!(text.contains("Median value: 1.80"));
    }
}
