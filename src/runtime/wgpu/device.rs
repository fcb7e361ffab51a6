//! WebGPU adapters addressed as platform/device pairs
//!
//! Adapters are grouped into *platforms* by backend (Vulkan, Metal, DX12,
//! GL) in enumeration order. A `WgpuDevice` names one adapter by
//! `(platform, index)` and, once a client has opened it, carries what the
//! pipeline needs to know about it.

use std::fmt;
use std::sync::Arc;
use wgpu::{Adapter, Backend, DeviceType};

use crate::error::{Error, Result};

/// What an opened adapter reported about itself
#[derive(Clone, Debug)]
pub(crate) struct AdapterInfo {
    name: String,
    backend: Backend,
    device_type: DeviceType,
    /// Largest one-dimensional work-group
    max_group_size: u32,
    /// Largest group count of one dispatch
    max_group_count: u32,
    timestamps: bool,
}

impl AdapterInfo {
    fn from_adapter(adapter: &Adapter) -> Self {
        let info = adapter.get_info();
        let limits = adapter.limits();
        Self {
            name: info.name,
            backend: info.backend,
            device_type: info.device_type,
            max_group_size: limits
                .max_compute_workgroup_size_x
                .min(limits.max_compute_invocations_per_workgroup),
            max_group_count: limits.max_compute_workgroups_per_dimension,
            timestamps: adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY),
        }
    }
}

/// One adapter, selected by platform and index.
///
/// Constructing it touches no GPU state; [`WgpuClient::new`](super::WgpuClient::new)
/// opens the adapter and returns a device with its info filled in.
///
/// ```ignore
/// use ordstat::runtime::Device;
///
/// let client = WgpuRuntime::client(&WgpuDevice::new(0, 0))?;
/// println!("{} on {:?}", client.device().adapter_name(), client.device().backend());
/// ```
#[derive(Clone)]
pub struct WgpuDevice {
    pub(crate) platform: usize,
    pub(crate) index: usize,
    info: Option<Arc<AdapterInfo>>,
}

impl WgpuDevice {
    /// Adapter `index` of `platform`
    pub fn new(platform: usize, index: usize) -> Self {
        Self {
            platform,
            index,
            info: None,
        }
    }

    pub(crate) fn with_info(platform: usize, index: usize, info: Arc<AdapterInfo>) -> Self {
        Self {
            platform,
            index,
            info: Some(info),
        }
    }

    /// Adapter name, or "unknown" before the adapter is opened
    pub fn adapter_name(&self) -> String {
        match &self.info {
            Some(info) => info.name.clone(),
            None => "unknown".into(),
        }
    }

    /// Backend of the adapter's platform
    pub fn backend(&self) -> Option<Backend> {
        self.info.as_ref().map(|i| i.backend)
    }

    /// Integrated, discrete, software, ...
    pub fn device_type(&self) -> Option<DeviceType> {
        self.info.as_ref().map(|i| i.device_type)
    }

    /// Largest work-group the adapter accepts, 0 before it is opened
    pub fn max_group_size(&self) -> u32 {
        self.info.as_ref().map_or(0, |i| i.max_group_size)
    }

    /// Largest number of work-groups in one dispatch, 0 before it is opened
    pub fn max_group_count(&self) -> u32 {
        self.info.as_ref().map_or(0, |i| i.max_group_count)
    }

    /// Whether compute passes can record timestamps
    pub fn timestamps_supported(&self) -> bool {
        self.info.as_ref().is_some_and(|i| i.timestamps)
    }
}

impl super::super::Device for WgpuDevice {
    fn platform(&self) -> usize {
        self.platform
    }

    fn index(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("wgpu:{}.{}", self.platform, self.index)
    }
}

impl fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WgpuDevice({}.{}", self.platform, self.index)?;
        if let Some(info) = &self.info {
            write!(f, ", {} {:?}", info.name, info.backend)?;
        }
        write!(f, ")")
    }
}

// ============================================================================
// Platform Listing
// ============================================================================

/// One adapter as listed under its platform
#[derive(Clone, Debug)]
pub struct AdapterSummary {
    /// Index within the platform
    pub index: usize,
    /// Adapter name
    pub name: String,
    /// Adapter type
    pub device_type: DeviceType,
    /// Driver name and version, when reported
    pub driver: String,
}

/// Adapters sharing one backend
#[derive(Clone, Debug)]
pub struct PlatformInfo {
    /// Platform index
    pub index: usize,
    /// Backend shared by all adapters of the platform
    pub backend: Backend,
    /// Adapters in enumeration order
    pub devices: Vec<AdapterSummary>,
}

impl fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Platform {}: {:?}", self.index, self.backend)?;
        for d in &self.devices {
            write!(f, "  Device {}: {} ({:?})", d.index, d.name, d.device_type)?;
            if !d.driver.is_empty() {
                write!(f, " [{}]", d.driver)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Group adapters by backend, platforms ordered by first appearance.
fn group_by_backend(adapters: Vec<Adapter>) -> Vec<(Backend, Vec<Adapter>)> {
    let mut platforms: Vec<(Backend, Vec<Adapter>)> = Vec::new();
    for adapter in adapters {
        let backend = adapter.get_info().backend;
        match platforms.iter_mut().find(|(b, _)| *b == backend) {
            Some((_, list)) => list.push(adapter),
            None => platforms.push((backend, vec![adapter])),
        }
    }
    platforms
}

async fn enumerate_platforms() -> Vec<(Backend, Vec<Adapter>)> {
    let instance = wgpu::Instance::default();
    let adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all()).await;
    group_by_backend(adapters)
}

/// List every platform and its adapters.
pub fn list_platforms() -> Vec<PlatformInfo> {
    pollster::block_on(enumerate_platforms())
        .into_iter()
        .enumerate()
        .map(|(index, (backend, adapters))| PlatformInfo {
            index,
            backend,
            devices: adapters
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    let info = a.get_info();
                    let driver = format!("{} {}", info.driver, info.driver_info)
                        .trim()
                        .to_string();
                    AdapterSummary {
                        index: i,
                        name: info.name,
                        device_type: info.device_type,
                        driver,
                    }
                })
                .collect(),
        })
        .collect()
}

/// Select adapter `index` of `platform`.
///
/// An out-of-range pair is a `DeviceSelection` error; there is no fallback
/// adapter.
pub(crate) async fn query_adapter_info(
    platform: usize,
    index: usize,
) -> Result<(Adapter, Arc<AdapterInfo>)> {
    let select_err = |reason: String| Error::DeviceSelection {
        platform,
        device: index,
        reason,
    };

    let mut platforms = enumerate_platforms().await;
    if platforms.is_empty() {
        return Err(select_err("no WebGPU adapter found".into()));
    }
    if platform >= platforms.len() {
        return Err(select_err(format!(
            "only {} platform(s) available",
            platforms.len()
        )));
    }

    let (_, mut adapters) = platforms.swap_remove(platform);
    if index >= adapters.len() {
        return Err(select_err(format!(
            "platform has {} device(s)",
            adapters.len()
        )));
    }
    let adapter = adapters.swap_remove(index);

    let info = Arc::new(AdapterInfo::from_adapter(&adapter));
    Ok((adapter, info))
}

/// Blocking [`query_adapter_info`]
pub(crate) fn query_adapter_info_blocking(
    platform: usize,
    index: usize,
) -> Result<(Adapter, Arc<AdapterInfo>)> {
    pollster::block_on(query_adapter_info(platform, index))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Device;

    #[test]
    fn test_wgpu_device_creation() {
        let device = WgpuDevice::new(1, 0);
        assert_eq!(device.index(), 0);
        assert_eq!(device.selector(), "1.0");
        assert_eq!(device.platform(), 1);
        assert_eq!(device.name(), "wgpu:1.0");
        assert_eq!(device.adapter_name(), "unknown");
        assert_eq!(device.max_group_size(), 0);
        assert!(!device.timestamps_supported());
        assert_eq!(format!("{device:?}"), "WgpuDevice(1.0)");
    }

    #[test]
    fn test_wgpu_device_with_adapter() {
        match query_adapter_info_blocking(0, 0) {
            Ok((_, info)) => {
                let device = WgpuDevice::with_info(0, 0, info);
                assert!(device.backend().is_some());
                assert!(device.max_group_size() >= 1);
                assert!(device.max_group_count() >= 1);
                assert!(format!("{device:?}").starts_with("WgpuDevice(0.0, "));
            }
            Err(e) => println!("Skipping: {e}"),
        }
    }

    #[test]
    fn test_out_of_range_selection_is_error() {
        let err = query_adapter_info_blocking(usize::MAX, 0).unwrap_err();
        assert!(matches!(err, Error::DeviceSelection { .. }));
    }

    #[test]
    fn test_platform_listing_is_indexed() {
        for (i, p) in list_platforms().iter().enumerate() {
            assert_eq!(p.index, i);
            assert!(p.to_string().starts_with(&format!("Platform {i}")));
        }
    }
}
