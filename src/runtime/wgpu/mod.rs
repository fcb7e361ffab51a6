//! WebGPU runtime implementation
//!
//! Kernels are WGSL generated per group size and compiled once per client.
//! Each dispatch is one submission containing one compute pass; reductions
//! record their collapse pass inside the same compute pass, so one profiling
//! sample covers the whole reduction.

mod client;
mod device;
mod faults;
pub mod shaders;
mod runtime;
mod timing;

pub use client::{WgpuBuffer, WgpuClient};
pub use device::{AdapterSummary, PlatformInfo, WgpuDevice, list_platforms};
pub use runtime::{WgpuRuntime, is_wgpu_available};
pub use timing::WgpuEvent;
