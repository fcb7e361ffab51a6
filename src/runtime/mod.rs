//! Accelerator backends
//!
//! This module defines the `Runtime` trait family and provides a host
//! reference backend plus a WebGPU backend.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (identifies an adapter / the host)
//! ├── Client (owns the queue, buffers and compiled kernels)
//! ├── Buffer (device memory tagged read-only or read-write)
//! └── Event (completion handle of one dispatch)
//! ```

pub mod cpu;
pub mod traits;

#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use traits::{Device, Runtime, RuntimeClient};
