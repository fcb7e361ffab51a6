//! Common test utilities
#![allow(dead_code)]

use ordstat::dataset::Dataset;
use ordstat::error::Result;
use ordstat::pipeline::{Pipeline, PipelineConfig, PipelineResult};
use ordstat::runtime::Runtime;
use ordstat::runtime::cpu::{CpuClient, CpuRuntime};
#[cfg(feature = "wgpu")]
use ordstat::runtime::wgpu::{WgpuClient, WgpuDevice, WgpuRuntime};

/// The literal sample sequence, sorted
pub const TEST_VECTOR_SORTED: [i32; 10] = [1, 4, 7, 9, 16, 18, 22, 45, 63, 100];

/// Create a host reference client for testing
pub fn create_cpu_client() -> CpuClient {
    CpuRuntime::client(&CpuRuntime::default_device()).expect("cpu client")
}

/// Create a WebGPU client, returning None if no adapter is available
#[cfg(feature = "wgpu")]
pub fn create_wgpu_client() -> Option<WgpuClient> {
    if !ordstat::runtime::wgpu::is_wgpu_available() {
        return None;
    }
    WgpuRuntime::client(&WgpuDevice::new(0, 0)).ok()
}

/// Run the pipeline on `values` with `config` on the given client
pub fn run_values<R: Runtime>(
    client: &R::Client,
    config: PipelineConfig,
    values: &[i32],
) -> Result<PipelineResult> {
    let dataset = Dataset::from_values(values.to_vec());
    Pipeline::<R>::new(client, config)?.run(&dataset)
}

/// Assert two f64 values are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_close_f64(a: f64, b: f64, rtol: f64, atol: f64, msg: &str) {
    let diff = (a - b).abs();
    let tol = atol + rtol * b.abs();
    assert!(
        diff <= tol,
        "{}: {} vs {} (diff={}, tol={})",
        msg,
        a,
        b,
        diff,
        tol
    );
}
