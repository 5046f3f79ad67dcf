use glam::UVec2;
use log::info;

use super::Bindable;
use crate::gpu;

/// Storage image living in VRAM.
///
/// Images are bound either as storage images (writable) or as plain textures
/// (readable); shaders read them with `texelFetch()`, so no sampler is bound.
#[derive(Debug)]
pub struct Texture {
    tex: wgpu::Texture,
    tex_view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: UVec2,
}

impl Texture {
    pub fn new(
        device: &wgpu::Device,
        label: impl AsRef<str>,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Self {
        let label = label.as_ref();

        info!("Allocating texture `{label}`; size={size:?}, format={format:?}");

        assert!(size.x > 0);
        assert!(size.y > 0);

        let tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{label}_tex")),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let tex_view = tex.create_view(&Default::default());

        Self {
            tex,
            tex_view,
            format,
            size,
        }
    }

    /// Creates texture backing given frame image.
    pub fn for_image(
        device: &wgpu::Device,
        label: impl AsRef<str>,
        size: UVec2,
        format: gpu::ImageFormat,
    ) -> Self {
        Self::new(device, label, size, texture_format(format))
    }

    pub fn tex(&self) -> &wgpu::Texture {
        &self.tex
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.tex_view
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn readable(&self) -> ReadableTexture {
        ReadableTexture { parent: self }
    }

    pub fn writable(&self) -> WritableTexture {
        WritableTexture { parent: self }
    }
}

pub fn texture_format(format: gpu::ImageFormat) -> wgpu::TextureFormat {
    match format {
        gpu::ImageFormat::R32Uint => wgpu::TextureFormat::R32Uint,
        gpu::ImageFormat::R32Sint => wgpu::TextureFormat::R32Sint,
        gpu::ImageFormat::R32Float => wgpu::TextureFormat::R32Float,
        gpu::ImageFormat::Rg32Uint => wgpu::TextureFormat::Rg32Uint,
        gpu::ImageFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
        gpu::ImageFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        gpu::ImageFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        gpu::ImageFormat::Rgba32Uint => wgpu::TextureFormat::Rgba32Uint,
    }
}

fn sample_type(format: wgpu::TextureFormat) -> wgpu::TextureSampleType {
    match format {
        wgpu::TextureFormat::R32Uint
        | wgpu::TextureFormat::Rg32Uint
        | wgpu::TextureFormat::Rgba32Uint => wgpu::TextureSampleType::Uint,

        wgpu::TextureFormat::R32Sint => wgpu::TextureSampleType::Sint,

        _ => wgpu::TextureSampleType::Float { filterable: false },
    }
}

pub struct ReadableTexture<'a> {
    parent: &'a Texture,
}

impl Bindable for ReadableTexture<'_> {
    fn bind(&self, binding: u32) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let layout = wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: sample_type(self.parent.format),
            },
            count: None,
        };

        let resource = wgpu::BindingResource::TextureView(&self.parent.tex_view);

        vec![(layout, resource)]
    }
}

pub struct WritableTexture<'a> {
    parent: &'a Texture,
}

impl Bindable for WritableTexture<'_> {
    fn bind(&self, binding: u32) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let layout = wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::ReadWrite,
                format: self.parent.format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        };

        let resource = wgpu::BindingResource::TextureView(&self.parent.tex_view);

        vec![(layout, resource)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats() {
        assert_eq!(
            wgpu::TextureSampleType::Uint,
            sample_type(texture_format(gpu::ImageFormat::Rg32Uint))
        );

        assert_eq!(
            wgpu::TextureSampleType::Sint,
            sample_type(texture_format(gpu::ImageFormat::R32Sint))
        );

        assert_eq!(
            wgpu::TextureSampleType::Float { filterable: false },
            sample_type(texture_format(gpu::ImageFormat::Rgba16Float))
        );
    }
}
