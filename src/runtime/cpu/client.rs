//! CPU client and buffer implementation

use std::sync::Arc;
use std::time::Instant;

use bytemuck::Pod;
use parking_lot::Mutex;

use super::device::CpuDevice;
use super::kernels;
use super::runtime::CpuRuntime;
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::{ELEMENT_SIZE, MAX_GROUP_SIZE};
use crate::kernel::{Access, KernelId, KernelInvocation};
use crate::profiling::ProfilingSample;
use crate::runtime::RuntimeClient;

/// Host buffer tagged with its kernel access mode.
///
/// Storage is word-aligned; the requested size is rounded up to whole
/// elements the way device buffers are.
#[derive(Clone, Debug)]
pub struct CpuBuffer {
    access: Access,
    size_bytes: usize,
    label: Arc<str>,
    data: Arc<Mutex<Vec<i32>>>,
}

impl CpuBuffer {
    /// Kernel access mode
    pub fn access(&self) -> Access {
        self.access
    }

    /// Requested size in bytes
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    fn capacity_bytes(&self) -> usize {
        self.size_bytes.div_ceil(ELEMENT_SIZE) * ELEMENT_SIZE
    }
}

/// Completion record of a host dispatch
#[derive(Clone, Copy, Debug)]
pub struct CpuEvent {
    kernel: KernelId,
    sample: Option<ProfilingSample>,
}

/// CPU client for kernel dispatch
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    epoch: Instant,
    group_size: Arc<Mutex<Option<usize>>>,
}

impl CpuClient {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            epoch: Instant::now(),
            group_size: Arc::new(Mutex::new(None)),
        }
    }

    fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn check_size(&self, buffer: &CpuBuffer, bytes: usize, op: &'static str) -> Result<()> {
        if bytes > buffer.capacity_bytes() {
            return Err(Error::memory(
                op,
                ErrorCode::InvalidValue,
                format!(
                    "{} bytes exceeds buffer '{}' of {} bytes",
                    bytes,
                    buffer.label(),
                    buffer.size_bytes()
                ),
            ));
        }
        Ok(())
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn max_group_size(&self) -> usize {
        MAX_GROUP_SIZE
    }

    fn supports_timestamps(&self) -> bool {
        true
    }

    fn build_program(&self, group_size: usize) -> Result<()> {
        if group_size == 0 || group_size > MAX_GROUP_SIZE {
            return Err(Error::execution(
                "build",
                ErrorCode::InvalidWorkGroupSize,
                format!("group size {group_size} outside 1..={MAX_GROUP_SIZE}"),
            ));
        }
        *self.group_size.lock() = Some(group_size);
        log::debug!("cpu: kernels ready for group size {group_size}");
        Ok(())
    }

    fn allocate(&self, access: Access, size_bytes: usize, label: &str) -> Result<CpuBuffer> {
        if size_bytes == 0 {
            return Err(Error::memory(
                "allocate",
                ErrorCode::InvalidValue,
                format!("buffer '{label}' has zero size"),
            ));
        }
        let words = size_bytes.div_ceil(ELEMENT_SIZE);
        Ok(CpuBuffer {
            access,
            size_bytes,
            label: label.into(),
            data: Arc::new(Mutex::new(vec![0; words])),
        })
    }

    fn upload<T: Pod>(&self, buffer: &CpuBuffer, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.check_size(buffer, bytes.len(), "upload")?;
        let mut guard = buffer.data.lock();
        let dst: &mut [u8] = bytemuck::cast_slice_mut(guard.as_mut_slice());
        dst[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn download<T: Pod>(&self, buffer: &CpuBuffer, out: &mut [T]) -> Result<()> {
        let dst: &mut [u8] = bytemuck::cast_slice_mut(out);
        self.check_size(buffer, dst.len(), "download")?;
        let guard = buffer.data.lock();
        let src: &[u8] = bytemuck::cast_slice(guard.as_slice());
        dst.copy_from_slice(&src[..dst.len()]);
        Ok(())
    }

    fn zero_fill(&self, buffer: &CpuBuffer, size_bytes: usize) -> Result<()> {
        self.check_size(buffer, size_bytes, "zero_fill")?;
        let mut guard = buffer.data.lock();
        let dst: &mut [u8] = bytemuck::cast_slice_mut(guard.as_mut_slice());
        dst[..size_bytes].fill(0);
        Ok(())
    }

    fn dispatch(&self, inv: &KernelInvocation<'_, CpuBuffer>) -> Result<CpuEvent> {
        inv.validate()?;
        if inv.output.access != Access::ReadWrite {
            return Err(Error::execution(
                "dispatch",
                ErrorCode::InvalidOperation,
                format!("{} cannot write read-only buffer '{}'", inv.kernel, inv.output.label()),
            ));
        }
        if Arc::ptr_eq(&inv.input.data, &inv.output.data) {
            return Err(Error::execution(
                "dispatch",
                ErrorCode::InvalidValue,
                format!("{} binds '{}' as both input and output", inv.kernel, inv.input.label()),
            ));
        }
        match *self.group_size.lock() {
            Some(g) if g == inv.local_size => {}
            built => {
                return Err(Error::execution(
                    "dispatch",
                    ErrorCode::InvalidOperation,
                    format!(
                        "{} launched with group size {} but program was built for {:?}",
                        inv.kernel, inv.local_size, built
                    ),
                ));
            }
        }

        let len_bytes = inv.params.len as usize * ELEMENT_SIZE;
        for buffer in [inv.input, inv.output] {
            if len_bytes > buffer.capacity_bytes() {
                return Err(Error::execution(
                    "dispatch",
                    ErrorCode::InvalidValue,
                    format!(
                        "{} reads {} elements past the end of '{}'",
                        inv.kernel,
                        inv.params.len,
                        buffer.label()
                    ),
                ));
            }
        }

        log::debug!(
            "cpu: {} global={} local={} groups={}",
            inv.kernel,
            inv.global_size,
            inv.local_size,
            inv.group_count()
        );

        let start_ns = self.now_ns();
        {
            let input = inv.input.data.lock();
            let mut output = inv.output.data.lock();
            kernels::execute(inv.kernel, &input, &mut output, inv.params, inv.local_size);
        }
        let sample = inv.timed.then(|| ProfilingSample::new(start_ns, self.now_ns()));

        Ok(CpuEvent {
            kernel: inv.kernel,
            sample,
        })
    }

    fn synchronize(&self) -> Result<()> {
        // CPU operations are synchronous, nothing to do
        Ok(())
    }

    fn profile(&self, event: &CpuEvent) -> Result<ProfilingSample> {
        event.sample.ok_or_else(|| {
            Error::execution(
                "profile",
                ErrorCode::ProfilingUnavailable,
                format!("{} was dispatched without timing", event.kernel),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ReductionKind, WorkGroupGeometry};

    fn client() -> CpuClient {
        CpuClient::new(CpuDevice::new())
    }

    #[test]
    fn test_upload_download_round_trip() {
        let c = client();
        let buf = c.allocate(Access::ReadWrite, 16, "rt").unwrap();
        c.upload(&buf, &[1i32, -2, 3, -4]).unwrap();
        let mut out = [0i32; 4];
        c.download(&buf, &mut out).unwrap();
        assert_eq!(out, [1, -2, 3, -4]);

        c.zero_fill(&buf, 8).unwrap();
        c.download(&buf, &mut out).unwrap();
        assert_eq!(out, [0, 0, 3, -4]);
    }

    #[test]
    fn test_oversized_transfer_is_memory_error() {
        let c = client();
        let buf = c.allocate(Access::ReadWrite, 8, "small").unwrap();
        let err = c.upload(&buf, &[0i32; 3]).unwrap_err();
        assert!(matches!(err, Error::DeviceMemory { op: "upload", .. }));
        assert!(c.allocate(Access::ReadOnly, 0, "empty").is_err());
    }

    #[test]
    fn test_kernel_cannot_write_read_only_buffer() {
        let c = client();
        let g = WorkGroupGeometry::new(4, 2).unwrap();
        c.build_program(2).unwrap();
        let a = c.allocate(Access::ReadOnly, 16, "in").unwrap();
        let b = c.allocate(Access::ReadOnly, 16, "out").unwrap();
        let inv = KernelInvocation::reduce(ReductionKind::Sum, &a, &b, &g);
        let err = c.dispatch(&inv).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidOperation));
    }

    #[test]
    fn test_dispatch_requires_matching_build() {
        let c = client();
        let g = WorkGroupGeometry::new(4, 2).unwrap();
        let a = c.allocate(Access::ReadOnly, 16, "in").unwrap();
        let b = c.allocate(Access::ReadWrite, 16, "out").unwrap();
        let inv = KernelInvocation::reduce(ReductionKind::Sum, &a, &b, &g);
        assert!(c.dispatch(&inv).is_err());

        assert!(c.build_program(0).is_err());
        assert!(c.build_program(MAX_GROUP_SIZE + 1).is_err());
        c.build_program(2).unwrap();
        c.upload(&a, &[1i32, 2, 3, 4]).unwrap();
        let event = c.dispatch(&inv).unwrap();
        let mut out = [0i32; 1];
        c.download(&b, &mut out).unwrap();
        assert_eq!(out[0], 10);

        let sample = c.profile(&event).unwrap();
        assert!(sample.end_ns >= sample.start_ns);
    }

    #[test]
    fn test_untimed_dispatch_has_no_sample() {
        let c = client();
        let g = WorkGroupGeometry::new(4, 2).unwrap();
        let a = c.allocate(Access::ReadOnly, 16, "in").unwrap();
        let b = c.allocate(Access::ReadWrite, 16, "out").unwrap();
        c.build_program(2).unwrap();
        let inv = KernelInvocation::reduce(ReductionKind::Max, &a, &b, &g).with_timing(false);
        let event = c.dispatch(&inv).unwrap();
        let err = c.profile(&event).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ProfilingUnavailable));
    }
}
