//! Dispatch timing
//!
//! With `TIMESTAMP_QUERY` the compute pass writes device timestamps at its
//! beginning and end; they are resolved into a buffer in the same submission
//! and read back when the sample is requested. Without it, the host clock is
//! read at submission and again in the queue's work-done callback. Untimed
//! dispatches create neither.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use wgpu::{
    Buffer, BufferDescriptor, BufferUsages, CommandEncoder, ComputePassTimestampWrites, Device,
    QuerySet, QuerySetDescriptor, QueryType, SubmissionIndex,
};

use super::client::read_mapped;
use crate::error::{Error, ErrorCode, Result};
use crate::kernel::KernelId;
use crate::profiling::ProfilingSample;

const QUERY_COUNT: u32 = 2;
const QUERY_BYTES: u64 = QUERY_COUNT as u64 * std::mem::size_of::<u64>() as u64;

/// Begin/end timestamp pair of one compute pass
pub(crate) struct TimestampQuery {
    query_set: QuerySet,
    resolve: Buffer,
    staging: Buffer,
}

impl TimestampQuery {
    pub(crate) fn new(device: &Device, label: &str) -> Self {
        let query_set = device.create_query_set(&QuerySetDescriptor {
            label: Some(label),
            ty: QueryType::Timestamp,
            count: QUERY_COUNT,
        });
        let resolve = device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: QUERY_BYTES,
            usage: BufferUsages::QUERY_RESOLVE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: QUERY_BYTES,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            query_set,
            resolve,
            staging,
        }
    }

    /// Timestamp writes for the pass being recorded
    pub(crate) fn pass_writes(&self) -> ComputePassTimestampWrites<'_> {
        ComputePassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(0),
            end_of_pass_write_index: Some(1),
        }
    }

    /// Record the resolve and the copy to the mappable buffer
    pub(crate) fn resolve(&self, encoder: &mut CommandEncoder) {
        encoder.resolve_query_set(&self.query_set, 0..QUERY_COUNT, &self.resolve, 0);
        encoder.copy_buffer_to_buffer(&self.resolve, 0, &self.staging, 0, QUERY_BYTES);
    }

    fn read(&self, device: &Device, period_ns: f32) -> Result<ProfilingSample> {
        let mut ticks = [0u64; QUERY_COUNT as usize];
        read_mapped(device, &self.staging, bytemuck::cast_slice_mut(&mut ticks))?;
        let to_ns = |t: u64| (t as f64 * period_ns as f64) as u64;
        Ok(ProfilingSample::new(to_ns(ticks[0]), to_ns(ticks[1])))
    }
}

/// How a dispatch is timed
pub(crate) enum EventTiming {
    /// Device timestamps written by the compute pass
    Device(TimestampQuery),
    /// Host clock at submission and at the work-done callback
    Host {
        start: Instant,
        end: Arc<Mutex<Option<Instant>>>,
    },
    /// Dispatched with profiling off
    Untimed,
}

/// Completion handle of one WebGPU dispatch
pub struct WgpuEvent {
    pub(crate) kernel: KernelId,
    pub(crate) submission: SubmissionIndex,
    pub(crate) timing: EventTiming,
}

impl std::fmt::Debug for WgpuEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let timing = match self.timing {
            EventTiming::Device(_) => "device",
            EventTiming::Host { .. } => "host",
            EventTiming::Untimed => "none",
        };
        f.debug_struct("WgpuEvent")
            .field("kernel", &self.kernel)
            .field("timing", &timing)
            .finish_non_exhaustive()
    }
}

impl WgpuEvent {
    /// Kernel the event belongs to
    pub fn kernel(&self) -> KernelId {
        self.kernel
    }

    /// Sample for a completed dispatch.
    ///
    /// Host timestamps are relative to `epoch`; device timestamps are in the
    /// device's own clock.
    pub(crate) fn sample(
        &self,
        device: &Device,
        period_ns: f32,
        epoch: Instant,
    ) -> Result<ProfilingSample> {
        match &self.timing {
            EventTiming::Device(query) => query.read(device, period_ns),
            EventTiming::Host { start, end } => {
                let end = (*end.lock()).ok_or_else(|| {
                    Error::execution(
                        "profile",
                        ErrorCode::ProfilingUnavailable,
                        format!("{} has not signalled completion", self.kernel),
                    )
                })?;
                let ns = |t: Instant| t.saturating_duration_since(epoch).as_nanos() as u64;
                Ok(ProfilingSample::new(ns(*start), ns(end)))
            }
            EventTiming::Untimed => Err(Error::execution(
                "profile",
                ErrorCode::ProfilingUnavailable,
                format!("{} was dispatched without timing", self.kernel),
            )),
        }
    }
}
