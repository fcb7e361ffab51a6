//! WebGPU Client implementation.
//!
//! `WgpuClient` owns the WebGPU device and queue for kernel dispatch.
//!
//! # Thread Safety
//!
//! `WgpuClient` is `Clone` and the underlying wgpu::Device and wgpu::Queue
//! are already `Send + Sync` by design.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytemuck::Pod;
use parking_lot::Mutex;
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Queue};

use super::WgpuRuntime;
use super::device::{WgpuDevice, query_adapter_info_blocking};
use super::faults::FaultSlot;
use super::shaders::{self, ProgramCache};
use super::timing::{EventTiming, TimestampQuery, WgpuEvent};
use crate::error::{Error, ErrorCode, Result};
use crate::geometry::MAX_GROUP_SIZE;
use crate::kernel::{Access, KernelInvocation, KernelParams};
use crate::profiling::ProfilingSample;
use crate::runtime::RuntimeClient;

const POLL_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// WgpuBuffer
// ============================================================================

/// Storage buffer tagged with its kernel access mode.
#[derive(Clone, Debug)]
pub struct WgpuBuffer {
    buffer: Arc<Buffer>,
    access: Access,
    size: u64,
    label: Arc<str>,
}

impl WgpuBuffer {
    /// Kernel access mode
    pub fn access(&self) -> Access {
        self.access
    }

    /// Allocated size in bytes (4-byte aligned)
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Underlying wgpu buffer
    pub fn raw(&self) -> &Buffer {
        &self.buffer
    }
}

fn align4(bytes: u64) -> u64 {
    bytes.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

// ============================================================================
// WgpuClient
// ============================================================================

/// WebGPU Runtime Client.
///
/// Owns WebGPU device and queue. Dispatches are submitted immediately and
/// never waited on; transfers wait.
#[derive(Clone)]
pub struct WgpuClient {
    /// GPU device identifier
    pub(crate) device_id: WgpuDevice,

    /// WebGPU device handle
    pub(crate) wgpu_device: Arc<Device>,

    /// WebGPU queue for command submission
    pub(crate) queue: Arc<Queue>,

    /// Compiled statistics programs
    pub(crate) programs: Arc<ProgramCache>,

    /// Uncaptured device errors and loss, drained after each call
    faults: FaultSlot,

    /// Whether passes record device timestamps
    timestamps: bool,

    /// Nanoseconds per timestamp tick
    timestamp_period: f32,

    /// Origin of host-clock profiling samples
    epoch: Instant,
}

impl std::fmt::Debug for WgpuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuClient")
            .field("device", &self.device_id)
            .field("timestamps", &self.timestamps)
            .finish_non_exhaustive()
    }
}

impl WgpuClient {
    /// Create a new WebGPU client for a device.
    ///
    /// # Errors
    ///
    /// Returns `DeviceSelection` if:
    /// - The platform/device pair does not exist
    /// - Device creation fails
    pub fn new(device: WgpuDevice) -> Result<Self> {
        let (adapter, info) = query_adapter_info_blocking(device.platform, device.index)?;
        let device_with_info = WgpuDevice::with_info(device.platform, device.index, info);
        let timestamps = device_with_info.timestamps_supported();
        let (wgpu_device, queue) = pollster::block_on(async {
            let required_features = if timestamps {
                wgpu::Features::TIMESTAMP_QUERY
            } else {
                wgpu::Features::empty()
            };

            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("ordstat WebGPU Device"),
                    required_features,
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                    experimental_features: wgpu::ExperimentalFeatures::default(),
                })
                .await
        })
        .map_err(|e| Error::DeviceSelection {
            platform: device.platform,
            device: device.index,
            reason: format!("{e:?}"),
        })?;

        if !timestamps {
            log::warn!("Adapter has no timestamp queries; profiling falls back to host timestamps");
        }

        let wgpu_device = Arc::new(wgpu_device);
        let queue = Arc::new(queue);
        let faults = FaultSlot::install(&wgpu_device);
        let programs = Arc::new(ProgramCache::new(wgpu_device.clone(), faults.clone()));
        let timestamp_period = queue.get_timestamp_period();

        log::info!(
            "Using {} ({:?}) on platform {}",
            device_with_info.adapter_name(),
            device_with_info.backend(),
            device.platform
        );

        Ok(Self {
            device_id: device_with_info,
            wgpu_device,
            queue,
            programs,
            faults,
            timestamps,
            timestamp_period,
            epoch: Instant::now(),
        })
    }

    /// Programs compiled on this device
    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    /// Create a staging buffer for CPU readback.
    fn create_staging_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a uniform buffer holding kernel parameters.
    fn create_params_buffer(&self, label: &str, params: KernelParams) -> Buffer {
        let buffer = self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<KernelParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&buffer, 0, bytemuck::bytes_of(&params));
        buffer
    }

    /// Wait for `submission` (or everything, if `None`) to complete.
    /// Wait for `submission` (or everything), then surface any fault the
    /// device reported meanwhile.
    fn wait(&self, op: &'static str, submission: Option<wgpu::SubmissionIndex>) -> Result<()> {
        let polled = self.wgpu_device.poll(wgpu::PollType::Wait {
            submission_index: submission,
            timeout: Some(POLL_TIMEOUT),
        });
        self.faults.check(op)?;
        polled.map(|_| ()).map_err(|e| {
            Error::execution(op, ErrorCode::OutOfResources, format!("GPU poll failed: {e}"))
        })
    }

    fn check_transfer(&self, buffer: &WgpuBuffer, bytes: u64, op: &'static str) -> Result<()> {
        if bytes > buffer.size {
            return Err(Error::memory(
                op,
                ErrorCode::InvalidValue,
                format!(
                    "{} bytes exceeds buffer '{}' of {} bytes",
                    bytes,
                    buffer.label(),
                    buffer.size
                ),
            ));
        }
        Ok(())
    }

    fn check_launch(&self, inv: &KernelInvocation<'_, WgpuBuffer>) -> Result<()> {
        inv.validate()?;
        if inv.output.access != Access::ReadWrite {
            return Err(Error::execution(
                "dispatch",
                ErrorCode::InvalidOperation,
                format!(
                    "{} cannot write read-only buffer '{}'",
                    inv.kernel,
                    inv.output.label()
                ),
            ));
        }
        if Arc::ptr_eq(&inv.input.buffer, &inv.output.buffer) {
            return Err(Error::execution(
                "dispatch",
                ErrorCode::InvalidValue,
                format!(
                    "{} binds '{}' as both input and output",
                    inv.kernel,
                    inv.input.label()
                ),
            ));
        }
        let max_groups = self.device_id.max_group_count() as usize;
        if inv.group_count() > max_groups {
            return Err(Error::execution(
                "dispatch",
                ErrorCode::InvalidWorkGroupSize,
                format!(
                    "{} needs {} work-groups, device allows {}",
                    inv.kernel,
                    inv.group_count(),
                    max_groups
                ),
            ));
        }
        Ok(())
    }
}

/// Map a `MAP_READ` buffer and copy its leading bytes into `out` (blocking).
pub(crate) fn read_mapped(device: &Device, staging: &Buffer, out: &mut [u8]) -> Result<()> {
    let slice = staging.slice(..);

    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(POLL_TIMEOUT),
        })
        .map_err(|e| {
            Error::memory(
                "download",
                ErrorCode::MapFailure,
                format!("GPU poll failed during buffer read: {e}"),
            )
        })?;

    let map_result = receiver.recv().map_err(|_| {
        Error::memory(
            "download",
            ErrorCode::MapFailure,
            "map_async callback was not invoked during buffer read",
        )
    })?;
    map_result.map_err(|e| {
        Error::memory(
            "download",
            ErrorCode::MapFailure,
            format!("map_async failed during buffer read: {e}"),
        )
    })?;

    {
        let data = slice.get_mapped_range();
        out.copy_from_slice(&data[..out.len()]);
    }

    staging.unmap();
    Ok(())
}

impl RuntimeClient<WgpuRuntime> for WgpuClient {
    fn device(&self) -> &WgpuDevice {
        &self.device_id
    }

    fn max_group_size(&self) -> usize {
        (self.device_id.max_group_size() as usize).min(MAX_GROUP_SIZE)
    }

    fn supports_timestamps(&self) -> bool {
        self.timestamps
    }

    fn build_program(&self, group_size: usize) -> Result<()> {
        let max = self.max_group_size();
        if group_size == 0 || group_size > max {
            return Err(Error::execution(
                "build",
                ErrorCode::InvalidWorkGroupSize,
                format!("group size {group_size} outside 1..={max} for this device"),
            ));
        }
        shaders::build(&self.programs, group_size)
    }

    fn allocate(&self, access: Access, size_bytes: usize, label: &str) -> Result<WgpuBuffer> {
        if size_bytes == 0 {
            return Err(Error::memory(
                "allocate",
                ErrorCode::InvalidValue,
                format!("buffer '{label}' has zero size"),
            ));
        }

        let size = align4(size_bytes as u64);
        let limits = self.wgpu_device.limits();
        let max = limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64);
        if size > max {
            return Err(Error::memory(
                "allocate",
                ErrorCode::AllocationFailure,
                format!("buffer '{label}' of {size} bytes exceeds device limit of {max} bytes"),
            ));
        }

        let buffer = self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        if let Some(fault) = self.faults.take() {
            return Err(Error::memory(
                "allocate",
                ErrorCode::AllocationFailure,
                format!("buffer '{label}' of {size} bytes: {fault}"),
            ));
        }
        log::debug!("wgpu: allocated '{label}' ({size} bytes, {access:?})");

        Ok(WgpuBuffer {
            buffer: Arc::new(buffer),
            access,
            size,
            label: label.into(),
        })
    }

    fn upload<T: Pod>(&self, buffer: &WgpuBuffer, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.check_transfer(buffer, align4(bytes.len() as u64), "upload")?;
        if bytes.is_empty() {
            return Ok(());
        }

        if bytes.len() % 4 == 0 {
            self.queue.write_buffer(&buffer.buffer, 0, bytes);
        } else {
            let mut padded = bytes.to_vec();
            padded.resize(align4(bytes.len() as u64) as usize, 0);
            self.queue.write_buffer(&buffer.buffer, 0, &padded);
        }

        let submission = self.queue.submit(std::iter::empty());
        self.wait("upload", Some(submission))
    }

    fn download<T: Pod>(&self, buffer: &WgpuBuffer, out: &mut [T]) -> Result<()> {
        let out: &mut [u8] = bytemuck::cast_slice_mut(out);
        let size = align4(out.len() as u64);
        self.check_transfer(buffer, size, "download")?;
        if out.is_empty() {
            return Ok(());
        }

        let staging = self.create_staging_buffer("download_staging", size);
        let mut encoder = self
            .wgpu_device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("download"),
            });
        encoder.copy_buffer_to_buffer(&buffer.buffer, 0, &staging, 0, size);
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wait("download", Some(submission))?;

        read_mapped(&self.wgpu_device, &staging, out)
    }

    fn zero_fill(&self, buffer: &WgpuBuffer, size_bytes: usize) -> Result<()> {
        let size = align4(size_bytes as u64);
        self.check_transfer(buffer, size, "zero_fill")?;

        let mut encoder = self
            .wgpu_device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("zero_fill"),
            });
        encoder.clear_buffer(&buffer.buffer, 0, Some(size));
        self.queue.submit(std::iter::once(encoder.finish()));
        self.faults.check("zero_fill")
    }

    fn dispatch(&self, inv: &KernelInvocation<'_, WgpuBuffer>) -> Result<WgpuEvent> {
        self.check_launch(inv)?;

        let entry = inv.kernel.entry_point();
        let program = self.programs.program(inv.local_size).ok_or_else(|| {
            Error::execution(
                "dispatch",
                ErrorCode::InvalidOperation,
                format!(
                    "{} launched before the group size {} program was built",
                    inv.kernel, inv.local_size
                ),
            )
        })?;
        let pipeline_of = |entry: &str| {
            program.pipeline(entry).ok_or_else(|| {
                Error::execution(
                    "dispatch",
                    ErrorCode::InvalidOperation,
                    format!("{} has no entry point {entry}", program.name()),
                )
            })
        };

        let pipeline = pipeline_of(entry)?;
        let params = self.create_params_buffer(entry, inv.params);
        let bind_group = self
            .programs
            .bind(inv.input.raw(), inv.output.raw(), &params);

        // Collapse pass: same pass, same timestamps, separate params.
        let collapse = match (inv.kernel.collapse_entry_point(), inv.collapse_params()) {
            (Some(collapse_entry), Some(collapse_params)) => {
                let pipeline = pipeline_of(collapse_entry)?;
                let params = self.create_params_buffer(collapse_entry, collapse_params);
                let bind_group = self
                    .programs
                    .bind(inv.input.raw(), inv.output.raw(), &params);
                Some((pipeline, bind_group))
            }
            _ => None,
        };

        let query = (inv.timed && self.timestamps)
            .then(|| TimestampQuery::new(&self.wgpu_device, entry));

        let mut encoder = self
            .wgpu_device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(entry) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(entry),
                timestamp_writes: query.as_ref().map(TimestampQuery::pass_writes),
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, Some(&bind_group), &[]);
            pass.dispatch_workgroups(inv.group_count() as u32, 1, 1);

            if let Some((pipeline, bind_group)) = &collapse {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, Some(bind_group), &[]);
                pass.dispatch_workgroups(1, 1, 1);
            }
        }
        if let Some(query) = &query {
            query.resolve(&mut encoder);
        }

        log::debug!(
            "wgpu: {} global={} local={} groups={}{}",
            inv.kernel,
            inv.global_size,
            inv.local_size,
            inv.group_count(),
            if collapse.is_some() { " +collapse" } else { "" }
        );

        let start = Instant::now();
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.faults.check("dispatch")?;

        let timing = match query {
            Some(query) => EventTiming::Device(query),
            None if !inv.timed => EventTiming::Untimed,
            None => {
                let end = Arc::new(Mutex::new(None));
                let signal = end.clone();
                self.queue.on_submitted_work_done(move || {
                    *signal.lock() = Some(Instant::now());
                });
                EventTiming::Host { start, end }
            }
        };

        Ok(WgpuEvent {
            kernel: inv.kernel,
            submission,
            timing,
        })
    }

    fn synchronize(&self) -> Result<()> {
        self.wait("synchronize", None)
    }

    fn profile(&self, event: &WgpuEvent) -> Result<ProfilingSample> {
        self.wait("profile", Some(event.submission.clone()))?;
        event.sample(&self.wgpu_device, self.timestamp_period, self.epoch)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ReductionKind, WorkGroupGeometry};
    use crate::runtime::Device;

    fn client() -> Option<WgpuClient> {
        match WgpuClient::new(WgpuDevice::new(0, 0)) {
            Ok(c) => Some(c),
            Err(e) => {
                println!("No GPU available, skipping test: {}", e);
                None
            }
        }
    }

    #[test]
    fn test_wgpu_client_creation() {
        let Some(client) = client() else { return };
        println!("Client created for: {}", client.device().name());
        assert_eq!(client.device().index(), 0);
        assert!(client.max_group_size() >= 1);
        assert!(client.max_group_size() <= MAX_GROUP_SIZE);
    }

    #[test]
    fn test_upload_download_unaligned() {
        let Some(client) = client() else { return };
        let buf = client.allocate(Access::ReadWrite, 6, "bytes").unwrap();
        assert_eq!(buf.size(), 8);
        client.upload(&buf, &[1u8, 2, 3, 4, 5, 6]).unwrap();
        let mut out = [0u8; 6];
        client.download(&buf, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_dispatch_before_build_fails() {
        let Some(client) = client() else { return };
        let g = WorkGroupGeometry::new(8, 4).unwrap();
        let a = client.allocate(Access::ReadOnly, 32, "in").unwrap();
        let b = client.allocate(Access::ReadWrite, 32, "out").unwrap();
        let inv = KernelInvocation::reduce(ReductionKind::Sum, &a, &b, &g);
        let err = client.dispatch(&inv).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidOperation));
    }

    #[test]
    fn test_reduce_sum_on_device() {
        let Some(client) = client() else { return };
        let g = WorkGroupGeometry::new(10, 5).unwrap();
        client.build_program(5).unwrap();
        let a = client.allocate(Access::ReadOnly, 40, "in").unwrap();
        let b = client.allocate(Access::ReadWrite, 40, "out").unwrap();
        client
            .upload(&a, &[9i32, 63, 16, 22, 45, 18, 100, 1, 4, 7])
            .unwrap();
        client.zero_fill(&b, 40).unwrap();

        let event = client
            .dispatch(&KernelInvocation::reduce(ReductionKind::Sum, &a, &b, &g))
            .unwrap();
        client.synchronize().unwrap();
        let mut out = [0i32; 1];
        client.download(&b, &mut out).unwrap();
        assert_eq!(out[0], 285);

        let sample = client.profile(&event).unwrap();
        assert!(sample.end_ns >= sample.start_ns);
    }

    #[test]
    fn test_validation_fault_becomes_error() {
        let Some(client) = client() else { return };
        // No STORAGE usage: binding it as a storage buffer fails validation.
        let unusable = client.create_staging_buffer("unusable", 16);
        let params = client.create_params_buffer("params", KernelParams::default());
        let _ = client.programs.bind(&unusable, &unusable, &params);

        let err = client.synchronize().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidOperation));
        client.synchronize().unwrap();
    }

    #[test]
    fn test_missing_entry_point_is_build_error() {
        let Some(client) = client() else { return };
        let source = shaders::generate_statistics_shader(4);
        let err = client
            .programs
            .compile("statistics_g4_broken", 4, &source, &["no_such_entry"])
            .unwrap_err();
        match err {
            Error::DeviceBuild { status, log, .. } => {
                assert_eq!(status, crate::error::BuildStatus::CompileError);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(client.programs.program(4).is_none());
        client.build_program(4).unwrap();
    }

    #[test]
    fn test_untimed_dispatch_skips_queries() {
        let Some(client) = client() else { return };
        let g = WorkGroupGeometry::new(8, 4).unwrap();
        client.build_program(4).unwrap();
        let a = client.allocate(Access::ReadOnly, 32, "in").unwrap();
        let b = client.allocate(Access::ReadWrite, 32, "out").unwrap();
        client.upload(&a, &[1i32, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let inv = KernelInvocation::reduce(ReductionKind::Sum, &a, &b, &g).with_timing(false);

        let event = client.dispatch(&inv).unwrap();
        assert!(format!("{event:?}").contains("none"));
        let err = client.profile(&event).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ProfilingUnavailable));

        let mut out = [0i32; 1];
        client.download(&b, &mut out).unwrap();
        assert_eq!(out[0], 36);
    }
}
