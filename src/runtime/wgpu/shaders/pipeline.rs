//! Compiled statistics programs
//!
//! Every kernel binds the same three resources, so one bind group layout and
//! one pipeline layout are created with the cache. Programs are keyed by the
//! group size they were generated for; each holds one compute pipeline per
//! entry point.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, ComputePipeline,
    ComputePipelineDescriptor, Device, PipelineLayout, PipelineLayoutDescriptor,
    ShaderModuleDescriptor, ShaderSource, ShaderStages,
};

use super::program::build_options;
use crate::error::{BuildStatus, Error, Result};
use crate::runtime::wgpu::faults::FaultSlot;

/// Binding of the read-only input storage buffer
pub const INPUT_BINDING: u32 = 0;
/// Binding of the read-write output storage buffer
pub const OUTPUT_BINDING: u32 = 1;
/// Binding of the `Params` uniform
pub const PARAMS_BINDING: u32 = 2;

/// One generated module and its pipelines
pub struct Program {
    name: String,
    group_size: usize,
    pipelines: HashMap<&'static str, ComputePipeline>,
}

impl Program {
    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group size baked into the module
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Pipeline of `entry_point`, if the program has it
    pub fn pipeline(&self, entry_point: &str) -> Option<&ComputePipeline> {
        self.pipelines.get(entry_point)
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("name", &self.name)
            .field("group_size", &self.group_size)
            .field("entry_points", &self.pipelines.len())
            .finish()
    }
}

/// Programs compiled on one device, keyed by group size
pub struct ProgramCache {
    device: Arc<Device>,
    faults: FaultSlot,
    bind_layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
    programs: Mutex<HashMap<usize, Arc<Program>>>,
}

fn buffer_entry(binding: u32, ty: BufferBindingType) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl ProgramCache {
    /// Create the shared layouts on `device`
    pub(crate) fn new(device: Arc<Device>, faults: FaultSlot) -> Self {
        let bind_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("statistics_bind_layout"),
            entries: &[
                buffer_entry(INPUT_BINDING, BufferBindingType::Storage { read_only: true }),
                buffer_entry(OUTPUT_BINDING, BufferBindingType::Storage { read_only: false }),
                buffer_entry(PARAMS_BINDING, BufferBindingType::Uniform),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("statistics_pipeline_layout"),
            bind_group_layouts: &[&bind_layout],
            immediate_size: 0,
        });
        Self {
            device,
            faults,
            bind_layout,
            pipeline_layout,
            programs: Mutex::new(HashMap::new()),
        }
    }

    /// Program built for `group_size`
    pub fn program(&self, group_size: usize) -> Option<Arc<Program>> {
        self.programs.lock().get(&group_size).cloned()
    }

    /// Compile `source` and a pipeline for every entry point.
    ///
    /// `source` must already have passed front-end validation. An existing
    /// program for the same group size is returned unchanged. A device-side
    /// compile failure is a `DeviceBuild` error whose log holds the
    /// compiler's messages; nothing is cached for it.
    pub fn compile(
        &self,
        name: &str,
        group_size: usize,
        source: &str,
        entry_points: &[&'static str],
    ) -> Result<Arc<Program>> {
        let mut programs = self.programs.lock();
        if let Some(program) = programs.get(&group_size) {
            return Ok(program.clone());
        }

        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        });
        let pipelines = entry_points
            .iter()
            .map(|&entry| {
                let pipeline = self
                    .device
                    .create_compute_pipeline(&ComputePipelineDescriptor {
                        label: Some(&format!("{name}_{entry}")),
                        layout: Some(&self.pipeline_layout),
                        module: &module,
                        entry_point: Some(entry),
                        compilation_options: Default::default(),
                        cache: None,
                    });
                (entry, pipeline)
            })
            .collect();

        if let Some(fault) = self.faults.take() {
            let info = pollster::block_on(module.get_compilation_info());
            let mut log: Vec<String> = info
                .messages
                .iter()
                .map(|m| format!("{:?}: {}", m.message_type, m.message))
                .collect();
            log.push(fault.message().to_string());
            return Err(Error::DeviceBuild {
                program: name.to_string(),
                status: BuildStatus::CompileError,
                options: build_options(group_size),
                log: log.join("\n"),
            });
        }

        let program = Arc::new(Program {
            name: name.to_string(),
            group_size,
            pipelines,
        });
        programs.insert(group_size, program.clone());
        Ok(program)
    }

    /// Bind `input`, `output` and `params` for one pass
    pub fn bind(&self, input: &Buffer, output: &Buffer, params: &Buffer) -> BindGroup {
        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("statistics_bind_group"),
            layout: &self.bind_layout,
            entries: &[
                BindGroupEntry {
                    binding: INPUT_BINDING,
                    resource: input.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: OUTPUT_BINDING,
                    resource: output.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: PARAMS_BINDING,
                    resource: params.as_entire_binding(),
                },
            ],
        })
    }
}
