//! Device errors reported outside a call's return value
//!
//! wgpu reports validation, out-of-memory and internal errors through the
//! device's uncaptured-error handler, and device loss through a callback.
//! Both record into a [`FaultSlot`] that the client drains right after the
//! call that may have caused them. On native backends the handler runs
//! synchronously inside the offending call, so a fault is always seen by the
//! operation that raised it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, ErrorCode};

/// One recorded device fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fault {
    /// A call was rejected by device validation
    Validation(String),
    /// The device could not satisfy an allocation
    OutOfMemory(String),
    /// The implementation failed internally
    Internal(String),
    /// The device is gone; every later call fails
    Lost(String),
}

impl Fault {
    fn from_wgpu(error: &wgpu::Error) -> Self {
        match error {
            wgpu::Error::OutOfMemory { .. } => Fault::OutOfMemory(error.to_string()),
            wgpu::Error::Validation { description, .. } => Fault::Validation(description.clone()),
            wgpu::Error::Internal { description, .. } => Fault::Internal(description.clone()),
            #[allow(unreachable_patterns)]
            _ => Fault::Internal(error.to_string()),
        }
    }

    /// Message reported by the device layer
    pub(crate) fn message(&self) -> &str {
        match self {
            Fault::Validation(m) | Fault::OutOfMemory(m) | Fault::Internal(m) | Fault::Lost(m) => m,
        }
    }

    /// Error code for a fault raised while executing `op`
    pub(crate) fn code(&self) -> ErrorCode {
        match self {
            Fault::Validation(_) => ErrorCode::InvalidOperation,
            Fault::OutOfMemory(_) => ErrorCode::AllocationFailure,
            Fault::Internal(_) | Fault::Lost(_) => ErrorCode::OutOfResources,
        }
    }

    /// `DeviceExecution` error for a fault raised during `op`
    pub(crate) fn into_execution(self, op: &'static str) -> Error {
        Error::execution(op, self.code(), self.to_string())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Validation(m) => write!(f, "validation failed: {m}"),
            Fault::OutOfMemory(m) => write!(f, "out of memory: {m}"),
            Fault::Internal(m) => write!(f, "internal device error: {m}"),
            Fault::Lost(m) => write!(f, "device lost: {m}"),
        }
    }
}

/// Faults recorded since the last [`take`](FaultSlot::take).
///
/// Loss is sticky: once the device is lost, `take` keeps returning it.
#[derive(Clone, Default)]
pub(crate) struct FaultSlot {
    pending: Arc<Mutex<Vec<Fault>>>,
    lost: Arc<Mutex<Option<Fault>>>,
}

impl FaultSlot {
    /// Route `device`'s uncaptured errors and loss notification into a new slot
    pub(crate) fn install(device: &wgpu::Device) -> Self {
        let slot = Self::default();

        let pending = slot.pending.clone();
        device.on_uncaptured_error(Arc::new(move |error: wgpu::Error| {
            let fault = Fault::from_wgpu(&error);
            log::error!("wgpu: {fault}");
            pending.lock().push(fault);
        }));

        let lost = slot.lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("wgpu device lost ({reason:?}): {message}");
            *lost.lock() = Some(Fault::Lost(format!("{reason:?}: {message}")));
        });

        slot
    }

    #[cfg(test)]
    fn record(&self, fault: Fault) {
        self.pending.lock().push(fault);
    }

    /// First fault recorded since the last call, or the loss of the device.
    ///
    /// Later faults of the same batch are logged and dropped.
    pub(crate) fn take(&self) -> Option<Fault> {
        if let Some(lost) = self.lost.lock().clone() {
            self.pending.lock().clear();
            return Some(lost);
        }
        let mut pending = self.pending.lock();
        let mut drained = pending.drain(..);
        let first = drained.next();
        for rest in drained {
            log::debug!("Dropping follow-on fault: {rest}");
        }
        first
    }

    /// `Err` for the first pending fault of `op`
    pub(crate) fn check(&self, op: &'static str) -> crate::error::Result<()> {
        match self.take() {
            Some(fault) => Err(fault.into_execution(op)),
            None => Ok(()),
        }
    }
}
