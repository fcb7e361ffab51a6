//! CPU runtime implementation
//!
//! The CPU runtime keeps buffers in host memory and executes the reference
//! version of every kernel. It is the backend used by tests and the fallback
//! when no adapter is available.

mod client;
mod device;
pub(crate) mod kernels;
mod runtime;

pub use client::{CpuBuffer, CpuClient, CpuEvent};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
