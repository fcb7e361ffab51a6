//! Trait for runtime clients that own a queue and dispatch kernels

use bytemuck::Pod;

use super::Runtime;
use crate::error::Result;
use crate::kernel::{Access, KernelInvocation};
use crate::profiling::ProfilingSample;

/// Trait for runtime clients that handle buffer management and dispatch
///
/// Transfers are blocking. [`dispatch`](RuntimeClient::dispatch) only enqueues;
/// ordering between dispatches on the same client is queue order, and
/// [`synchronize`](RuntimeClient::synchronize) waits for everything enqueued.
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Largest work-group size the device accepts
    fn max_group_size(&self) -> usize;

    /// Whether dispatch events carry device-clock timestamps
    fn supports_timestamps(&self) -> bool;

    /// Compile every kernel for `group_size`.
    ///
    /// Failures carry build status, options and the full diagnostic log.
    fn build_program(&self, group_size: usize) -> Result<()>;

    /// Allocate `size_bytes` of device memory
    fn allocate(&self, access: Access, size_bytes: usize, label: &str) -> Result<R::Buffer>;

    /// Copy host data into a buffer, blocking until the copy is complete
    fn upload<T: Pod>(&self, buffer: &R::Buffer, data: &[T]) -> Result<()>;

    /// Copy buffer contents into host memory, blocking until data is available
    fn download<T: Pod>(&self, buffer: &R::Buffer, out: &mut [T]) -> Result<()>;

    /// Zero the first `size_bytes` of a buffer
    fn zero_fill(&self, buffer: &R::Buffer, size_bytes: usize) -> Result<()>;

    /// Enqueue one kernel invocation without waiting for it
    fn dispatch(&self, invocation: &KernelInvocation<'_, R::Buffer>) -> Result<R::Event>;

    /// Synchronize: wait for all pending operations to complete
    fn synchronize(&self) -> Result<()>;

    /// Timing of a completed dispatch
    fn profile(&self, event: &R::Event) -> Result<ProfilingSample>;
}
