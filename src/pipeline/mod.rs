//! The statistics pipeline
//!
//! [`Pipeline::run`] sizes the work-groups, pads the dataset, allocates
//! device buffers and walks the [`ExecutionPlan`] wave by wave. Within a wave
//! every stage is dispatched back to back without waiting. Between waves the
//! host synchronises once and reads back the scalars the next wave takes as
//! kernel arguments (the sum, from which the mean is derived).

mod buffers;
mod positional;

pub use buffers::DeviceBuffers;
pub use positional::PositionalStats;

use std::collections::BTreeMap;

use crate::dataset::{Dataset, Scale};
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::{MAX_GROUP_SIZE, PaddedInputs, PaddingPolicy, ReductionKind, WorkGroupGeometry};
use crate::kernel::{KernelInvocation, SortKernel};
use crate::profiling::ProfilingReport;
use crate::runtime::{Runtime, RuntimeClient};
use crate::schedule::{ExecutionPlan, Stage};

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline configuration.
///
/// ```
/// use ordstat::pipeline::PipelineConfig;
/// use ordstat::kernel::SortKernel;
///
/// let config = PipelineConfig::default()
///     .with_group_size(128)
///     .with_sort(SortKernel::SelectionTiled);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Work items per group
    pub group_size: usize,
    /// Sort strategy
    pub sort: SortKernel,
    /// How padding values are chosen
    pub padding: PaddingPolicy,
    /// Fixed-point multiplier of the dataset
    pub scale: Scale,
    /// Collect per-stage timing
    pub profiling: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            group_size: 64,
            sort: SortKernel::default(),
            padding: PaddingPolicy::default(),
            scale: Scale::DEFAULT,
            profiling: true,
        }
    }
}

impl PipelineConfig {
    /// Set the group size
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    /// Set the sort strategy
    pub fn with_sort(mut self, sort: SortKernel) -> Self {
        self.sort = sort;
        self
    }

    /// Set the padding policy
    pub fn with_padding(mut self, padding: PaddingPolicy) -> Self {
        self.padding = padding;
        self
    }

    /// Set the scale
    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    /// Enable or disable profiling
    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    /// Reject configurations no device could run.
    pub fn validate(&self) -> Result<()> {
        if self.group_size == 0 {
            return Err(Error::config("group_size", "must be at least 1"));
        }
        if self.group_size > MAX_GROUP_SIZE {
            return Err(Error::config(
                "group_size",
                format!(
                    "{} exceeds the kernel scratch capacity of {MAX_GROUP_SIZE}",
                    self.group_size
                ),
            ));
        }
        let m = self.scale.multiplier();
        if m < 1 {
            return Err(Error::config("scale", format!("multiplier must be at least 1, got {m}")));
        }
        if m.checked_mul(m).is_none() {
            return Err(Error::config(
                "scale",
                format!("multiplier {m} squared does not fit the kernel's 32-bit divisor"),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Result
// ============================================================================

/// Everything one run produces. Values are in scaled units except where
/// noted.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// Launch geometry of the run
    pub geometry: WorkGroupGeometry,
    /// Padding policy the run used
    pub padding: PaddingPolicy,
    /// Sort strategy the run used
    pub sort: SortKernel,
    /// Minimum
    pub min: i32,
    /// Maximum
    pub max: i32,
    /// Wrapping sum of the samples
    pub sum: i32,
    /// `sum / original_len`
    pub mean: f64,
    /// Mean truncated toward zero, as passed to the variance kernel
    pub truncated_mean: i32,
    /// Sum of squared deviations, already divided by scale² (original units²)
    pub variance_sum: i32,
    /// `variance_sum / padded_len` (original units²)
    pub variance: f64,
    /// `sqrt(variance)` (original units)
    pub std_dev: f64,
    /// Ascending samples the positional statistics index into
    pub sorted: Vec<i32>,
    /// Median and quartiles
    pub positional: PositionalStats,
    /// Per-stage timing (empty when profiling is disabled)
    pub profiling: ProfilingReport,
}

/// Arithmetic mean over the unpadded count, and its truncation.
pub fn mean_of(sum: i32, count: usize) -> (f64, i32) {
    let mean = sum as f64 / count as f64;
    (mean, mean as i32)
}

// ============================================================================
// Pipeline
// ============================================================================

/// Orchestrates one statistics run on a backend client.
pub struct Pipeline<'c, R: Runtime> {
    client: &'c R::Client,
    config: PipelineConfig,
}

impl<'c, R: Runtime> Pipeline<'c, R> {
    /// Validate `config` against itself and the client's device.
    pub fn new(client: &'c R::Client, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let max = client.max_group_size();
        if config.group_size > max {
            return Err(Error::execution(
                "configure",
                ErrorCode::InvalidWorkGroupSize,
                format!("group size {} exceeds device maximum {max}", config.group_size),
            ));
        }
        Ok(Self { client, config })
    }

    /// Active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `dataset`.
    ///
    /// Any device error aborts the run; no partial result is returned.
    pub fn run(&self, dataset: &Dataset) -> Result<PipelineResult> {
        let geometry = WorkGroupGeometry::new(dataset.len(), self.config.group_size)?;
        log::info!(
            "{} samples, group size {}, {} groups, {} padding element(s), {} backend",
            geometry.original_len,
            geometry.group_size,
            geometry.group_count,
            geometry.padding(),
            R::name()
        );
        if !dataset.is_scaled() {
            log::warn!(
                "Dataset was not multiplied by the scale factor {}; reported values are divided by it anyway",
                self.config.scale.multiplier()
            );
        }

        let inputs = PaddedInputs::prepare(dataset.values(), &geometry, self.config.padding);
        self.client.build_program(geometry.group_size)?;
        let buffers = DeviceBuffers::<R>::allocate(self.client, &geometry, &inputs)?;

        let mut scalars: BTreeMap<Stage, i32> = BTreeMap::new();
        let mut events: Vec<(Stage, R::Event)> = Vec::with_capacity(Stage::ALL.len());

        for wave in ExecutionPlan::statistics().waves() {
            if !wave.host_inputs.is_empty() {
                self.client.synchronize()?;
                for &stage in &wave.host_inputs {
                    let value = buffers.read_scalar(self.client, stage)?;
                    log::debug!("Read back {stage} = {value}");
                    scalars.insert(stage, value);
                }
            }
            log::debug!("Wave {}: {:?}", wave.index, wave.stages);
            for &stage in &wave.stages {
                let invocation = self
                    .invocation(stage, &buffers, &geometry, &scalars)?
                    .with_timing(self.config.profiling);
                events.push((stage, self.client.dispatch(&invocation)?));
            }
        }
        self.client.synchronize()?;

        let sum = match scalars.get(&Stage::Sum) {
            Some(&sum) => sum,
            None => buffers.read_scalar(self.client, Stage::Sum)?,
        };
        let min = buffers.read_scalar(self.client, Stage::Min)?;
        let max = buffers.read_scalar(self.client, Stage::Max)?;
        let variance_sum = buffers.read_scalar(self.client, Stage::VarianceSum)?;

        let mut sorted = vec![0i32; geometry.padded_len];
        self.client.download(buffers.output(Stage::Sort), &mut sorted)?;
        if self.config.padding == PaddingPolicy::PerReduction {
            // Padding sorted to the tail.
            sorted.truncate(geometry.original_len);
        }
        let positional = PositionalStats::from_sorted(&sorted)
            .ok_or_else(|| Error::config("dataset", "dataset is empty"))?;

        let (mean, truncated_mean) = mean_of(sum, geometry.original_len);
        let variance = variance_sum as f64 / geometry.padded_len as f64;

        let mut profiling = ProfilingReport::new();
        if self.config.profiling {
            profiling.set_host_clock(!self.client.supports_timestamps());
            for (stage, event) in &events {
                profiling.insert(*stage, self.client.profile(event)?);
            }
        }

        Ok(PipelineResult {
            geometry,
            padding: self.config.padding,
            sort: self.config.sort,
            min,
            max,
            sum,
            mean,
            truncated_mean,
            variance_sum,
            variance,
            std_dev: variance.sqrt(),
            sorted,
            positional,
            profiling,
        })
    }

    fn reduce<'b>(
        &self,
        kind: ReductionKind,
        buffers: &'b DeviceBuffers<R>,
        geometry: &WorkGroupGeometry,
    ) -> KernelInvocation<'b, R::Buffer> {
        let stage = match kind {
            ReductionKind::Min => Stage::Min,
            ReductionKind::Max => Stage::Max,
            ReductionKind::Sum => Stage::Sum,
        };
        KernelInvocation::reduce(kind, buffers.input(kind), buffers.output(stage), geometry)
    }

    fn invocation<'b>(
        &self,
        stage: Stage,
        buffers: &'b DeviceBuffers<R>,
        geometry: &WorkGroupGeometry,
        scalars: &BTreeMap<Stage, i32>,
    ) -> Result<KernelInvocation<'b, R::Buffer>> {
        let output = buffers.output(stage);
        Ok(match stage {
            Stage::Min => self.reduce(ReductionKind::Min, buffers, geometry),
            Stage::Max => self.reduce(ReductionKind::Max, buffers, geometry),
            Stage::Sum => self.reduce(ReductionKind::Sum, buffers, geometry),
            Stage::Sort => KernelInvocation::sort(
                self.config.sort,
                buffers.input(ReductionKind::Min),
                output,
                geometry,
            ),
            Stage::Variance => {
                let sum = scalars.get(&Stage::Sum).copied().ok_or_else(|| {
                    Error::execution(
                        "dispatch",
                        ErrorCode::InvalidOperation,
                        "variance dispatched before the sum was read back",
                    )
                })?;
                let (_, truncated) = mean_of(sum, geometry.original_len);
                KernelInvocation::variance(
                    buffers.input(ReductionKind::Sum),
                    output,
                    geometry,
                    truncated,
                )
            }
            Stage::VarianceSum => KernelInvocation::variance_sum(
                buffers.output(Stage::Variance),
                output,
                geometry,
                self.config.scale,
            ),
        })
    }
}
