use glam::UVec2;

use crate::gpu::{self, Role};
use crate::{Bindable, DoubleBufferedBindable, Texture, UnmappedStorageBuffer};

/// Resource that exists in two copies, `A` and `B`, whose roles (current
/// frame / history) flip every frame.
///
/// During even frames `A` is the current copy, during odd frames it's `B`;
/// this matches [`gpu::Slot::current()`].
#[derive(Debug)]
pub struct DoubleBuffered<T> {
    a: T,
    b: T,
}

impl DoubleBuffered<Texture> {
    /// Creates textures of an A/B image.
    pub fn new(device: &wgpu::Device, label: impl AsRef<str>, size: UVec2, format: gpu::ImageFormat) -> Self {
        let label = label.as_ref();

        Self {
            a: Texture::for_image(device, format!("{label}_a"), size, format),
            b: Texture::for_image(device, format!("{label}_b"), size, format),
        }
    }
}

impl<'t> DoubleBuffered<&'t Texture> {
    /// See: [`Texture::readable()`].
    pub fn bind_readable(&self) -> impl DoubleBufferedBindable + 't {
        DoubleBufferedBinder {
            a: self.a.readable(),
            b: self.b.readable(),
        }
    }

    /// See: [`Texture::writable()`].
    pub fn bind_writable(&self) -> impl DoubleBufferedBindable + 't {
        DoubleBufferedBinder {
            a: self.a.writable(),
            b: self.b.writable(),
        }
    }
}

impl DoubleBuffered<UnmappedStorageBuffer> {
    pub fn new(device: &wgpu::Device, label: impl AsRef<str>, size: usize) -> Self {
        let label = label.as_ref();

        Self {
            a: UnmappedStorageBuffer::new(device, format!("{label}_a"), size),
            b: UnmappedStorageBuffer::new(device, format!("{label}_b"), size),
        }
    }
}

impl<'t> DoubleBuffered<&'t UnmappedStorageBuffer> {
    /// See: [`UnmappedStorageBuffer::bind_readable()`].
    pub fn bind_readable(&self) -> impl DoubleBufferedBindable + 't {
        DoubleBufferedBinder {
            a: self.a.bind_readable(),
            b: self.b.bind_readable(),
        }
    }

    /// See: [`UnmappedStorageBuffer::bind_writable()`].
    pub fn bind_writable(&self) -> impl DoubleBufferedBindable + 't {
        DoubleBufferedBinder {
            a: self.a.bind_writable(),
            b: self.b.bind_writable(),
        }
    }
}

impl<T> DoubleBuffered<T> {
    pub fn get(&self, alternate: bool) -> &T {
        if alternate {
            &self.b
        } else {
            &self.a
        }
    }

    pub fn slot(&self, slot: gpu::Slot) -> &T {
        match slot {
            gpu::Slot::A => &self.a,
            gpu::Slot::B => &self.b,
        }
    }

    /// Copy playing given role, as seen by both bind groups.
    pub fn role(&self, role: Role) -> DoubleBuffered<&T> {
        match role {
            Role::Current => self.curr(),
            Role::History => self.past(),
        }
    }

    pub fn curr(&self) -> DoubleBuffered<&T> {
        DoubleBuffered {
            a: &self.a,
            b: &self.b,
        }
    }

    pub fn past(&self) -> DoubleBuffered<&T> {
        DoubleBuffered {
            a: &self.b,
            b: &self.a,
        }
    }
}

pub struct DoubleBufferedBinder<T> {
    a: T,
    b: T,
}

impl<T> DoubleBufferedBindable for DoubleBufferedBinder<T>
where
    T: Bindable,
{
    fn bind(&self, binding: u32) -> Vec<(wgpu::BindGroupLayoutEntry, [wgpu::BindingResource; 2])> {
        let entries_a = self.a.bind(binding);
        let entries_b = self.b.bind(binding);

        assert_eq!(entries_a.len(), entries_b.len());

        entries_a
            .into_iter()
            .zip(entries_b)
            .map(|((layout_a, resource_a), (layout_b, resource_b))| {
                assert_eq!(layout_a, layout_b);

                (layout_a, [resource_a, resource_b])
            })
            .collect()
    }
}
