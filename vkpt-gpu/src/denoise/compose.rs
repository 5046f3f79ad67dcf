use glam::{UVec2, Vec3, Vec4, Vec4Swizzles};

use crate::{
    antilag_alpha, gradient_output, gradient_stratum, traced_field, AbImageId,
    AtrousChannel, AtrousIterations, ImageId, Normal, NoisySample, PassContext,
    Role, Sh, Vec3Ext,
};

/// Output of the compose pass at a pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ComposeOutput {
    pub color: Vec4,

    /// Filtered specular with its history length, i.e. next frame's
    /// specular history
    pub filtered_spec: Vec4,
}

/// Combines the filtered (or, with the denoiser disabled, the raw) lighting
/// channels with the surface's albedo, then blends the transparent layer
/// over it.
pub fn compose(ctx: &PassContext, iterations: AtrousIterations, pixel: UVec2) -> ComposeOutput {
    let images = ctx.images;
    let cvars = &ctx.ubo.cvars;

    let (lf, hf, spec) = if cvars.flt_enable != 0.0 {
        let lf = Sh::unpack(
            images.read(AtrousChannel::LfSh.output(iterations), pixel),
            images.read(AtrousChannel::LfCocg.output(iterations), pixel),
        );

        (
            lf,
            images.read(AtrousChannel::Hf.output(iterations), pixel).xyz(),
            images.read(AtrousChannel::Spec.output(iterations), pixel),
        )
    } else {
        let sample = NoisySample::reconstruct(images, pixel, traced_field(ctx.ubo));

        (sample.lf, sample.hf, sample.spec.extend(1.0))
    };

    let base_color = images.read_ab(AbImageId::BaseColor, Role::Current, pixel).xyz();
    let metallic = images.read_ab(AbImageId::MetallicRoughness, Role::Current, pixel).x;
    let normal = Normal::decode_u32(images.read_ab(AbImageId::Normal, Role::Current, pixel).x.to_bits());

    let albedo = if cvars.flt_fixed_albedo > 0.0 {
        Vec3::splat(cvars.flt_fixed_albedo)
    } else {
        base_color * (1.0 - metallic)
    };

    let transparent = images.read(ImageId::PtTransparent, pixel);

    let opaque = albedo * (lf.project(normal) * cvars.flt_scale_lf + hf * cvars.flt_scale_hf)
        + spec.xyz() * cvars.flt_scale_spec;

    let mut color = opaque * (1.0 - transparent.w) + transparent.xyz() * cvars.flt_scale_transparent;

    if cvars.flt_show_gradients != 0.0 {
        let stratum = gradient_stratum(pixel);
        let lf = images.read(gradient_output(true), stratum);
        let hf_spec = images.read(gradient_output(false), stratum);

        let gradient = Vec3::new(
            antilag_alpha(lf.x, lf.y, 1.0),
            antilag_alpha(hf_spec.x, hf_spec.y, 1.0),
            antilag_alpha(hf_spec.z, hf_spec.w, 1.0),
        );

        color = color * 0.25 + gradient * cvars.flt_grad_scale;
    }

    ComposeOutput {
        color: color.sanitize().extend(1.0),
        filtered_spec: spec.xyz().sanitize().extend(spec.w),
    }
}
