use std::sync::Arc;

use log::info;

use super::{pad_size, Bindable};

/// Storage buffer that exists only in VRAM.
///
/// Used for data produced and consumed by the shaders themselves, such as the
/// light statistics or the eye-adaptation state.
#[derive(Clone, Debug)]
pub struct UnmappedStorageBuffer {
    buffer: Arc<wgpu::Buffer>,
}

impl UnmappedStorageBuffer {
    pub fn new(device: &wgpu::Device, label: impl AsRef<str>, size: usize) -> Self {
        let label = label.as_ref();
        let size = pad_size(size);

        info!("Allocating unmapped storage buffer `{label}`; size={size}");

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            size: size as _,
            mapped_at_creation: false,
        });

        Self {
            buffer: Arc::new(buffer),
        }
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    /// Zeroes the buffer as a part of given command stream.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.buffer, 0, None);
    }

    pub fn bind_readable(&self) -> impl Bindable + '_ {
        UnmappedStorageBufferBinder {
            parent: self,
            read_only: true,
        }
    }

    pub fn bind_writable(&self) -> impl Bindable + '_ {
        UnmappedStorageBufferBinder {
            parent: self,
            read_only: false,
        }
    }
}

pub struct UnmappedStorageBufferBinder<'a> {
    parent: &'a UnmappedStorageBuffer,
    read_only: bool,
}

impl Bindable for UnmappedStorageBufferBinder<'_> {
    fn bind(&self, binding: u32) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let layout = wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage {
                    read_only: self.read_only,
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let resource = self.parent.buffer.as_entire_binding();

        vec![(layout, resource)]
    }
}
