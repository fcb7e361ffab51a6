//! # ordstat
//!
//! **Order statistics over integer samples on a compute device.**
//!
//! ordstat computes minimum, maximum, mean, variance, standard deviation,
//! median and quartiles of a sample set. The heavy work (three reductions,
//! the variance chain and a sort) runs as compute kernels; the host sizes
//! work-groups, pads the dataset, sequences dispatches by their data
//! dependencies and collects per-kernel timing.
//!
//! ## Quick Start
//!
//! ```rust
//! use ordstat::prelude::*;
//!
//! # fn main() -> ordstat::error::Result<()> {
//! let device = CpuDevice::new();
//! let client = CpuRuntime::client(&device)?;
//! let config = PipelineConfig::default().with_group_size(5);
//! let pipeline = Pipeline::<CpuRuntime>::new(&client, config)?;
//!
//! let dataset = DatasetSource::TestVector.load(config.scale)?;
//! let result = pipeline.run(&dataset)?;
//! assert_eq!(result.sum, 285);
//! assert_eq!(result.positional.median, 18);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `wgpu` (default): WebGPU backend (Vulkan, Metal, DX12, GL)
//! - `rayon` (default): per-group partials computed in parallel on the CPU backend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dataset;
pub mod error;
pub mod geometry;
pub mod kernel;
pub mod pipeline;
pub mod profiling;
pub mod report;
pub mod runtime;
pub mod schedule;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dataset::{Dataset, DatasetSource, Scale};
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::geometry::{PaddingPolicy, WorkGroupGeometry};
    pub use crate::kernel::SortKernel;
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineResult};
    pub use crate::profiling::{ProfilingReport, ProfilingSample};
    pub use crate::report::Summary;
    pub use crate::runtime::cpu::{CpuDevice, CpuRuntime};
    pub use crate::runtime::{Device, Runtime, RuntimeClient};

    #[cfg(feature = "wgpu")]
    pub use crate::runtime::wgpu::WgpuRuntime;
}

/// Default runtime based on enabled features
///
/// - With `wgpu` feature: `WgpuRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "wgpu")]
pub type DefaultRuntime = runtime::wgpu::WgpuRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "wgpu"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
