//! Kernel identities and dispatch records
//!
//! A [`KernelInvocation`] is the fully-resolved description of one dispatch:
//! which kernel, which buffers, which scalar parameters, and the launch
//! geometry. Backends consume it without further decisions.

use std::fmt;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};

use crate::dataset::Scale;
use crate::error::{Error, Result};
use crate::geometry::{ReductionKind, WorkGroupGeometry};

/// Access mode of a device buffer as seen by kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Kernels may only read the buffer
    ReadOnly,
    /// Kernels may read and write the buffer
    ReadWrite,
}

// ============================================================================
// Sort strategies
// ============================================================================

/// Interchangeable sort kernels.
///
/// All variants share one contract: an ascending copy of the input is written
/// to the output buffer. They differ only in device-side algorithm and launch
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum SortKernel {
    /// Odd-even transposition inside a single work-group (slow)
    Bubble,
    /// Rank placement, one work item per element
    #[default]
    Selection,
    /// Rank placement reading the comparison set through local scratch tiles
    SelectionTiled,
}

impl SortKernel {
    /// Every strategy, in menu order
    pub const ALL: [SortKernel; 3] = [
        SortKernel::Bubble,
        SortKernel::Selection,
        SortKernel::SelectionTiled,
    ];

    /// Shader entry point
    pub fn entry_point(self) -> &'static str {
        match self {
            SortKernel::Bubble => "sort_bubble",
            SortKernel::Selection => "sort_selection",
            SortKernel::SelectionTiled => "sort_selection_tiled",
        }
    }

    /// True for strategies that run in one work-group regardless of length
    pub fn single_group(self) -> bool {
        matches!(self, SortKernel::Bubble)
    }
}

impl fmt::Display for SortKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortKernel::Bubble => "bubble",
            SortKernel::Selection => "selection",
            SortKernel::SelectionTiled => "selection-tiled",
        };
        f.write_str(s)
    }
}

impl FromStr for SortKernel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SortKernel::ALL
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| {
                Error::config(
                    "sort",
                    format!("unknown sort '{s}', expected bubble, selection or selection-tiled"),
                )
            })
    }
}

// ============================================================================
// Kernel identity
// ============================================================================

/// Every kernel the statistics program contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelId {
    /// Minimum reduction into `output[0]`
    ReduceMin,
    /// Maximum reduction into `output[0]`
    ReduceMax,
    /// Wrapping sum reduction into `output[0]`
    ReduceSum,
    /// Per-element squared deviation from a scalar mean
    Variance,
    /// Sum of squared deviations, divided once by scale²
    VarianceSum,
    /// One of the sort strategies
    Sort(SortKernel),
}

impl KernelId {
    /// Reduction kernel for `kind`
    pub fn reduce(kind: ReductionKind) -> Self {
        match kind {
            ReductionKind::Min => KernelId::ReduceMin,
            ReductionKind::Max => KernelId::ReduceMax,
            ReductionKind::Sum => KernelId::ReduceSum,
        }
    }

    /// Entry point of the first (or only) pass
    pub fn entry_point(self) -> &'static str {
        match self {
            KernelId::ReduceMin => "reduce_min",
            KernelId::ReduceMax => "reduce_max",
            KernelId::ReduceSum => "reduce_sum",
            KernelId::Variance => "variance",
            KernelId::VarianceSum => "variance_sum",
            KernelId::Sort(kind) => kind.entry_point(),
        }
    }

    /// Entry point of the single-group pass that folds per-group partials into
    /// `output[0]`, for kernels that have one.
    pub fn collapse_entry_point(self) -> Option<&'static str> {
        match self {
            KernelId::ReduceMin => Some("collapse_min"),
            KernelId::ReduceMax => Some("collapse_max"),
            KernelId::ReduceSum => Some("collapse_sum"),
            KernelId::VarianceSum => Some("collapse_variance_sum"),
            KernelId::Variance | KernelId::Sort(_) => None,
        }
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Uniform block bound to every kernel. Layout matches the WGSL `Params`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct KernelParams {
    /// Elements visible to the kernel (padded length, or group count for a
    /// collapse pass)
    pub len: u32,
    /// Unpadded element count
    pub count: u32,
    /// Truncated mean (variance only)
    pub mean: i32,
    /// Fixed-point multiplier (variance sum only)
    pub scale: i32,
}

// ============================================================================
// Invocation record
// ============================================================================

/// One fully-determined dispatch.
#[derive(Debug)]
pub struct KernelInvocation<'a, B> {
    /// Kernel to run
    pub kernel: KernelId,
    /// Bound input buffer (binding 0)
    pub input: &'a B,
    /// Bound output buffer (binding 1)
    pub output: &'a B,
    /// Bound scalar arguments (binding 2)
    pub params: KernelParams,
    /// Local scratch bytes per work-group
    pub local_bytes: usize,
    /// Total work items
    pub global_size: usize,
    /// Work items per group
    pub local_size: usize,
    /// Record a profiling sample for this dispatch
    pub timed: bool,
}

// Manual impls: `B` itself need not be `Clone`.
impl<B> Clone for KernelInvocation<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for KernelInvocation<'_, B> {}

impl<'a, B> KernelInvocation<'a, B> {
    fn over_geometry(
        kernel: KernelId,
        input: &'a B,
        output: &'a B,
        geometry: &WorkGroupGeometry,
        params: KernelParams,
    ) -> Self {
        Self {
            kernel,
            input,
            output,
            params,
            local_bytes: geometry.local_bytes(),
            global_size: geometry.padded_len,
            local_size: geometry.group_size,
            timed: true,
        }
    }

    /// Enable or disable the profiling sample. Untimed dispatches skip
    /// timestamp queries and their events cannot be profiled.
    pub fn with_timing(mut self, timed: bool) -> Self {
        self.timed = timed;
        self
    }

    fn base_params(geometry: &WorkGroupGeometry) -> KernelParams {
        KernelParams {
            len: geometry.padded_len as u32,
            count: geometry.original_len as u32,
            ..KernelParams::default()
        }
    }

    /// Min, max or sum reduction over the padded input.
    pub fn reduce(
        kind: ReductionKind,
        input: &'a B,
        output: &'a B,
        geometry: &WorkGroupGeometry,
    ) -> Self {
        Self::over_geometry(
            KernelId::reduce(kind),
            input,
            output,
            geometry,
            Self::base_params(geometry),
        )
    }

    /// Squared deviation of every element from `mean`.
    pub fn variance(input: &'a B, output: &'a B, geometry: &WorkGroupGeometry, mean: i32) -> Self {
        let params = KernelParams {
            mean,
            ..Self::base_params(geometry)
        };
        Self::over_geometry(KernelId::Variance, input, output, geometry, params)
    }

    /// Sum of the squared deviations produced by [`KernelInvocation::variance`].
    pub fn variance_sum(
        input: &'a B,
        output: &'a B,
        geometry: &WorkGroupGeometry,
        scale: Scale,
    ) -> Self {
        let params = KernelParams {
            scale: scale.multiplier(),
            ..Self::base_params(geometry)
        };
        Self::over_geometry(KernelId::VarianceSum, input, output, geometry, params)
    }

    /// Ascending copy of the padded input.
    pub fn sort(
        kind: SortKernel,
        input: &'a B,
        output: &'a B,
        geometry: &WorkGroupGeometry,
    ) -> Self {
        let mut inv = Self::over_geometry(
            KernelId::Sort(kind),
            input,
            output,
            geometry,
            Self::base_params(geometry),
        );
        if kind.single_group() {
            inv.global_size = geometry.group_size;
        }
        inv
    }

    /// Number of work-groups launched by the first pass
    pub fn group_count(&self) -> usize {
        self.global_size / self.local_size.max(1)
    }

    /// Parameters of the collapse pass, if the kernel has one
    pub fn collapse_params(&self) -> Option<KernelParams> {
        self.kernel.collapse_entry_point().map(|_| KernelParams {
            len: self.group_count() as u32,
            ..self.params
        })
    }

    /// Check the launch shape is self-consistent.
    pub fn validate(&self) -> Result<()> {
        if self.local_size == 0 || self.global_size % self.local_size != 0 {
            return Err(Error::execution(
                "dispatch",
                crate::error::ErrorCode::InvalidWorkGroupSize,
                format!(
                    "{}: global size {} is not a multiple of local size {}",
                    self.kernel, self.global_size, self.local_size
                ),
            ));
        }
        Ok(())
    }
}
