//! WebGPU runtime implementation

use super::client::{WgpuBuffer, WgpuClient};
use super::device::{WgpuDevice, query_adapter_info_blocking};
use super::timing::WgpuEvent;
use crate::error::Result;
use crate::runtime::Runtime;

/// WebGPU Runtime adapter
///
/// Implements the generic Runtime trait for the WebGPU backend.
/// Provides cross-platform GPU acceleration.
#[derive(Clone, Debug, Default)]
pub struct WgpuRuntime;

impl Runtime for WgpuRuntime {
    type Device = WgpuDevice;
    type Client = WgpuClient;
    type Buffer = WgpuBuffer;
    type Event = WgpuEvent;

    fn name() -> &'static str {
        "wgpu"
    }

    fn default_device() -> Self::Device {
        WgpuDevice::new(0, 0)
    }

    fn client(device: &Self::Device) -> Result<Self::Client> {
        WgpuClient::new(device.clone())
    }
}

/// Check whether any WebGPU adapter is present.
pub fn is_wgpu_available() -> bool {
    query_adapter_info_blocking(0, 0).is_ok()
}
