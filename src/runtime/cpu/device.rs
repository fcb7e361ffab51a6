//! The host processor

use crate::runtime::Device;

/// The host processor: platform 0, device 0.
///
/// Work-groups run on the rayon pool when the `rayon` feature is enabled,
/// otherwise one after another on the calling thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuDevice;

impl CpuDevice {
    /// The host device
    pub fn new() -> Self {
        Self
    }

    /// Threads work-groups are spread over
    pub fn threads(&self) -> usize {
        #[cfg(feature = "rayon")]
        {
            rayon::current_num_threads()
        }
        #[cfg(not(feature = "rayon"))]
        {
            1
        }
    }
}

impl Device for CpuDevice {
    fn platform(&self) -> usize {
        0
    }

    fn index(&self) -> usize {
        0
    }

    fn name(&self) -> String {
        format!("host ({} threads)", self.threads())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_device_identity() {
        let device = CpuDevice::new();
        assert_eq!(device.selector(), "0.0");
        assert!(device.threads() >= 1);
        assert!(device.name().starts_with("host ("));
    }
}
