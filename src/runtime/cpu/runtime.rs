//! CPU runtime implementation

use super::client::{CpuBuffer, CpuClient, CpuEvent};
use super::device::CpuDevice;
use crate::error::Result;
use crate::runtime::Runtime;

/// Host reference runtime
///
/// Works on any platform. Kernels run synchronously on the calling thread
/// (work-groups fan out over rayon), so every dispatch is complete by the
/// time `dispatch` returns.
#[derive(Clone, Debug, Default)]
pub struct CpuRuntime;

impl Runtime for CpuRuntime {
    type Device = CpuDevice;
    type Client = CpuClient;
    type Buffer = CpuBuffer;
    type Event = CpuEvent;

    fn name() -> &'static str {
        "cpu"
    }

    fn default_device() -> Self::Device {
        CpuDevice::new()
    }

    fn client(device: &Self::Device) -> Result<Self::Client> {
        Ok(CpuClient::new(device.clone()))
    }
}
