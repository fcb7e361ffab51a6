//! Device identity

/// A compute device, addressed the way users select one: a platform index
/// and a device index within that platform.
pub trait Device: Clone + Send + Sync + 'static {
    /// Platform the device belongs to
    fn platform(&self) -> usize;

    /// Device index within its platform
    fn index(&self) -> usize;

    /// Human-readable name
    fn name(&self) -> String;

    /// `platform.index`, as accepted by `-p`/`-d`
    fn selector(&self) -> String {
        format!("{}.{}", self.platform(), self.index())
    }
}
