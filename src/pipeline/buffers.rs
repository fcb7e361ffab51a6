//! Device buffers owned by one pipeline run

use crate::error::Result;
use crate::geometry::{PaddedInputs, ReductionKind, WorkGroupGeometry};
use crate::kernel::Access;
use crate::runtime::{Runtime, RuntimeClient};
use crate::schedule::Stage;

/// Input and output buffers of one run.
///
/// Inputs are read-only and uploaded once. Each stage writes exactly one
/// output buffer, zero-filled before any dispatch. Everything is released
/// when this value is dropped.
pub struct DeviceBuffers<R: Runtime> {
    input_sum: R::Buffer,
    input_min: Option<R::Buffer>,
    input_max: Option<R::Buffer>,
    min: R::Buffer,
    max: R::Buffer,
    sum: R::Buffer,
    variance: R::Buffer,
    variance_sum: R::Buffer,
    sorted: R::Buffer,
}

impl<R: Runtime> DeviceBuffers<R> {
    /// Allocate, upload and zero-fill everything the run needs.
    pub fn allocate(
        client: &R::Client,
        geometry: &WorkGroupGeometry,
        inputs: &PaddedInputs,
    ) -> Result<Self> {
        let input = |data: &[i32], label: &str| -> Result<R::Buffer> {
            let buffer = client.allocate(Access::ReadOnly, geometry.input_bytes(), label)?;
            client.upload(&buffer, data)?;
            Ok(buffer)
        };
        let output = |label: &str| -> Result<R::Buffer> {
            let buffer = client.allocate(Access::ReadWrite, geometry.output_bytes, label)?;
            client.zero_fill(&buffer, geometry.output_bytes)?;
            Ok(buffer)
        };

        let buffers = Self {
            input_sum: input(inputs.sum.as_slice(), "input")?,
            input_min: inputs
                .min
                .as_deref()
                .map(|d| input(d, "input_min"))
                .transpose()?,
            input_max: inputs
                .max
                .as_deref()
                .map(|d| input(d, "input_max"))
                .transpose()?,
            min: output("min")?,
            max: output("max")?,
            sum: output("sum")?,
            variance: output("variance")?,
            variance_sum: output("variance_sum")?,
            sorted: output("sorted")?,
        };

        log::debug!(
            "Allocated {} input and 6 output buffers of {} bytes",
            buffers.input_count(),
            geometry.output_bytes
        );
        Ok(buffers)
    }

    /// Number of distinct input buffers
    pub fn input_count(&self) -> usize {
        1 + usize::from(self.input_min.is_some()) + usize::from(self.input_max.is_some())
    }

    /// Input buffer consumed by reductions of `kind`
    pub fn input(&self, kind: ReductionKind) -> &R::Buffer {
        match kind {
            ReductionKind::Min => self.input_min.as_ref().unwrap_or(&self.input_sum),
            ReductionKind::Max => self.input_max.as_ref().unwrap_or(&self.input_sum),
            ReductionKind::Sum => &self.input_sum,
        }
    }

    /// Output buffer written by `stage`
    pub fn output(&self, stage: Stage) -> &R::Buffer {
        match stage {
            Stage::Min => &self.min,
            Stage::Max => &self.max,
            Stage::Sum => &self.sum,
            Stage::Sort => &self.sorted,
            Stage::Variance => &self.variance,
            Stage::VarianceSum => &self.variance_sum,
        }
    }

    /// Read back `output(stage)[0]`
    pub fn read_scalar(&self, client: &R::Client, stage: Stage) -> Result<i32> {
        let mut value = [0i32; 1];
        client.download(self.output(stage), &mut value)?;
        Ok(value[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PaddingPolicy;
    use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    #[test]
    fn test_padding_copies_only_when_needed() {
        let client = CpuClient::new(CpuDevice::new());
        let even = WorkGroupGeometry::new(4, 2).unwrap();
        let inputs = PaddedInputs::prepare(&[4, 3, 2, 1], &even, PaddingPolicy::PerReduction);
        let buffers = DeviceBuffers::<CpuRuntime>::allocate(&client, &even, &inputs).unwrap();
        assert_eq!(buffers.input_count(), 1);

        let odd = WorkGroupGeometry::new(3, 2).unwrap();
        let inputs = PaddedInputs::prepare(&[3, 2, 1], &odd, PaddingPolicy::PerReduction);
        let buffers = DeviceBuffers::<CpuRuntime>::allocate(&client, &odd, &inputs).unwrap();
        assert_eq!(buffers.input_count(), 3);

        let mut min_input = [0i32; 4];
        client
            .download(buffers.input(ReductionKind::Min), &mut min_input)
            .unwrap();
        assert_eq!(min_input, [3, 2, 1, i32::MAX]);
    }

    #[test]
    fn test_outputs_start_zeroed() {
        let client = CpuClient::new(CpuDevice::new());
        let g = WorkGroupGeometry::new(4, 4).unwrap();
        let inputs = PaddedInputs::prepare(&[1, 2, 3, 4], &g, PaddingPolicy::SharedZero);
        let buffers = DeviceBuffers::<CpuRuntime>::allocate(&client, &g, &inputs).unwrap();
        for stage in Stage::ALL {
            assert_eq!(buffers.read_scalar(&client, stage).unwrap(), 0, "{stage}");
        }
    }
}
