//! Core trait for accelerator backends

use crate::error::Result;

/// Core trait for accelerator backends
///
/// `Runtime` names a backend and its handle types. Everything that touches
/// the device goes through the backend's [`RuntimeClient`](super::RuntimeClient);
/// the pipeline is generic over `R: Runtime` and uses static dispatch.
///
/// # Associated Types
///
/// - `Device`: Identifies a specific compute unit (e.g., adapter 0 of Vulkan)
/// - `Client`: Owns the queue and dispatches kernels
/// - `Buffer`: Device-resident memory tagged with its access mode
/// - `Event`: Completion handle of one dispatch, used for profiling
///
/// # Example
///
/// ```ignore
/// use ordstat::runtime::{Runtime, cpu::CpuRuntime};
///
/// let device = CpuRuntime::default_device();
/// let client = CpuRuntime::client(&device)?;
/// ```
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: super::Device;

    /// Client for dispatching kernels
    type Client: super::RuntimeClient<Self>;

    /// Device buffer handle
    type Buffer: Send + Sync;

    /// Dispatch completion handle
    type Event: Send + Sync;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Create a client (device context plus command queue) for a device
    fn client(device: &Self::Device) -> Result<Self::Client>;
}
