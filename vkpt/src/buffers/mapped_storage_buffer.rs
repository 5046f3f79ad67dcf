use std::ops::{Deref, DerefMut};
use std::{any, mem};

use bytemuck::Pod;
use log::{debug, info};

use super::{pad_size, Bindable};

/// Storage buffer that exists both on the host machine and the GPU.
///
/// Host-side data is the source of truth; [`DerefMut`] marks the buffer as
/// dirty and [`Self::flush()`] uploads it, growing the GPU buffer when the
/// data doesn't fit anymore.
#[derive(Debug)]
pub struct MappedStorageBuffer<T> {
    label: String,
    buffer: wgpu::Buffer,
    data: Vec<T>,
    dirty: bool,
}

/// What happened during [`MappedStorageBuffer::flush()`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferFlushOutcome {
    /// The GPU buffer got replaced, so bind groups referring to it have to be
    /// rebuilt
    pub reallocated: bool,
}

impl BufferFlushOutcome {
    pub fn merge(self, other: Self) -> Self {
        Self {
            reallocated: self.reallocated || other.reallocated,
        }
    }
}

impl<T> MappedStorageBuffer<T>
where
    T: Pod,
{
    pub fn new(device: &wgpu::Device, label: impl AsRef<str>, data: Vec<T>) -> Self {
        let label = label.as_ref().to_string();
        let buffer = Self::allocate(device, &label, mem::size_of_val(data.as_slice()));

        Self {
            label,
            buffer,
            data,
            dirty: true,
        }
    }

    pub fn new_default(device: &wgpu::Device, label: impl AsRef<str>) -> Self {
        Self::new(device, label, Vec::new())
    }

    fn allocate(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
        let size = pad_size(size);

        info!(
            "Allocating storage buffer `{label}`; ty={}, size={size}",
            any::type_name::<T>(),
        );

        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::STORAGE,
            size: size as _,
            mapped_at_creation: false,
        })
    }

    /// Uploads the data, if it's been modified since the last flush.
    pub fn flush(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> BufferFlushOutcome {
        if !mem::take(&mut self.dirty) {
            return Default::default();
        }

        let bytes: &[u8] = bytemuck::cast_slice(&self.data);
        let mut outcome = BufferFlushOutcome::default();

        if bytes.len() as u64 > self.buffer.size() {
            debug!(
                "Growing storage buffer `{}`; size={} -> {}",
                self.label,
                self.buffer.size(),
                bytes.len()
            );

            let size = bytes.len().max(2 * self.buffer.size() as usize);

            self.buffer = Self::allocate(device, &self.label, size);
            outcome.reallocated = true;
        }

        if !bytes.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytes);
        }

        outcome
    }

    /// Replaces the data, marking the buffer as dirty only when something
    /// actually changed.
    pub fn replace(&mut self, data: &[T])
    where
        T: PartialEq,
    {
        if self.data != data {
            self.data.clear();
            self.data.extend_from_slice(data);
            self.dirty = true;
        }
    }
}

impl<T> Deref for MappedStorageBuffer<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for MappedStorageBuffer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dirty = true;

        &mut self.data
    }
}

impl<T> Bindable for MappedStorageBuffer<T> {
    fn bind(&self, binding: u32) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let layout = wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        vec![(layout, self.buffer.as_entire_binding())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_outcomes_merge() {
        let none = BufferFlushOutcome::default();
        let some = BufferFlushOutcome { reallocated: true };

        assert_eq!(none, none.merge(none));
        assert_eq!(some, none.merge(some));
        assert_eq!(some, some.merge(none));
    }
}
