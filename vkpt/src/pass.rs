use std::marker::PhantomData;
use std::mem;
use std::ops::Range;

use bytemuck::Pod;
use glam::UVec2;
use log::debug;

use crate::gpu;
use crate::{BindGroup, BindGroupBuilder, DoubleBufferedBindable};

/// Bind group of [`gpu::DESC_SET_EXTERNAL`], provided by the caller: the
/// top-level acceleration structure, the bindless textures and so on.
#[derive(Debug)]
pub struct ExternalBindings {
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

/// Bind groups shared by all passes of a frame.
#[derive(Clone, Copy, Debug)]
pub struct SharedBindGroups<'a> {
    pub global: &'a BindGroup,
    pub geometry: &'a BindGroup,
    pub external: Option<&'a ExternalBindings>,
}

#[derive(Debug)]
pub struct ComputePass<P = gpu::PassParams> {
    label: String,
    images: BindGroup,
    pipeline: wgpu::ComputePipeline,
    _params: PhantomData<P>,
}

impl<P> ComputePass<P>
where
    P: Pod,
{
    pub fn builder<'a>(label: impl ToString) -> ComputePassBuilder<'a, P> {
        let label = label.to_string();

        ComputePassBuilder {
            images: BindGroup::builder(format!("{label}_images")),
            label,
            _params: Default::default(),
        }
    }

    pub fn run(
        &self,
        shared: SharedBindGroups<'_>,
        encoder: &mut wgpu::CommandEncoder,
        alternate: bool,
        workgroups: UVec2,
        params: P,
    ) {
        let label = format!("vkpt_{}_pass", self.label);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(&label),
        });

        pass.set_pipeline(&self.pipeline);

        if mem::size_of::<P>() > 0 {
            pass.set_push_constants(0, bytemuck::bytes_of(&params));
        }

        pass.set_bind_group(gpu::DESC_SET_GLOBAL, shared.global.get(alternate), &[]);
        pass.set_bind_group(gpu::DESC_SET_GEOMETRY, shared.geometry.get(alternate), &[]);
        pass.set_bind_group(gpu::DESC_SET_IMAGES, self.images.get(alternate), &[]);

        if let Some(external) = shared.external {
            pass.set_bind_group(gpu::DESC_SET_EXTERNAL, &external.bind_group, &[]);
        }

        pass.dispatch_workgroups(workgroups.x, workgroups.y, 1);
    }
}

pub struct ComputePassBuilder<'a, P> {
    label: String,
    images: BindGroupBuilder<'a>,
    _params: PhantomData<P>,
}

impl<'a, P> ComputePassBuilder<'a, P>
where
    P: Pod,
{
    /// Binds an item into the pass' own set, [`gpu::DESC_SET_IMAGES`].
    pub fn bind_at(mut self, binding: u32, item: &'a dyn DoubleBufferedBindable) -> Self {
        self.images = self.images.add_at(binding, item);
        self
    }

    pub fn build(
        self,
        device: &wgpu::Device,
        shared: SharedBindGroups<'_>,
        (module, entry_point): &(wgpu::ShaderModule, &'static str),
    ) -> ComputePass<P> {
        debug!("Initializing pass: {}:{}", self.label, entry_point);

        let images = self.images.build(device);

        // Order follows the DESC_SET_* indices
        let mut bind_group_layouts = vec![
            shared.global.layout(),
            shared.geometry.layout(),
            images.layout(),
        ];

        if let Some(external) = shared.external {
            bind_group_layouts.push(&external.layout);
        }

        let push_constant_ranges = if mem::size_of::<P>() > 0 {
            vec![wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::COMPUTE,
                range: Range {
                    start: 0,
                    end: mem::size_of::<P>() as u32,
                },
            }]
        } else {
            vec![]
        };

        let pipeline_layout_label = format!("vkpt_{}_pipeline_layout", self.label);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&pipeline_layout_label),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &push_constant_ranges,
        });

        let pipeline_label = format!("vkpt_{}_pipeline", self.label);

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&pipeline_label),
            layout: Some(&pipeline_layout),
            module,
            entry_point,
        });

        ComputePass {
            label: self.label,
            images,
            pipeline,
            _params: PhantomData,
        }
    }
}
