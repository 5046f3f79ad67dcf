use glam::{UVec2, Vec3, Vec4, Vec4Swizzles};

use crate::{
    traced_field, AbImageId, ImageId, Normal, NoisySample, PassContext, Role,
    VKPT_EPSILON,
};

/// Image shown on screen instead of the final one, for inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderMode {
    Final = 0,
    Color = 1,
    TaaOutput = 2,
    BaseColor = 3,
    Normal = 4,
    GeoNormal = 5,
    MetallicRoughness = 6,
    ViewDepth = 7,
    Motion = 8,
    NoisyLf = 9,
    NoisyHf = 10,
    NoisySpec = 11,
    Transparent = 12,
    FilteredSpec = 13,
    HistoryLength = 14,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderModeDesc {
    pub label: &'static str,
    pub mode: RenderMode,

    /// Whether the image holds a single checkerboard field per frame and so
    /// needs resolving before it's shown
    pub is_interleaved: bool,
}

impl RenderModeDesc {
    pub fn index(&self) -> u32 {
        self.mode as u32
    }
}

macro_rules! render_modes {
    ($( $label:literal => $mode:ident $(, $interleaved:ident)?; )*) => {
        /// All render modes, ordered by their index.
        pub const LIST_RTX_RENDER_MODES: &[RenderModeDesc] = &[
            $(
                RenderModeDesc {
                    label: $label,
                    mode: RenderMode::$mode,
                    is_interleaved: render_modes!(@interleaved $($interleaved)?),
                },
            )*
        ];
    };

    (@interleaved interleaved) => { true };
    (@interleaved) => { false };
}

render_modes! {
    "Final" => Final;
    "Composed color" => Color;
    "TAA output" => TaaOutput;
    "Base color" => BaseColor;
    "Shading normal" => Normal;
    "Geometric normal" => GeoNormal;
    "Metallic / roughness" => MetallicRoughness;
    "View depth" => ViewDepth;
    "Motion vectors" => Motion;
    "Noisy LF" => NoisyLf, interleaved;
    "Noisy HF" => NoisyHf, interleaved;
    "Noisy specular" => NoisySpec, interleaved;
    "Transparent" => Transparent;
    "Filtered specular" => FilteredSpec;
    "History length" => HistoryLength;
}

impl RenderMode {
    pub fn from_index(index: u32) -> Option<Self> {
        LIST_RTX_RENDER_MODES
            .get(index as usize)
            .map(|desc| desc.mode)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        LIST_RTX_RENDER_MODES
            .iter()
            .find(|desc| desc.label.eq_ignore_ascii_case(label))
            .map(|desc| desc.mode)
    }

    pub fn desc(self) -> &'static RenderModeDesc {
        &LIST_RTX_RENDER_MODES[self as usize]
    }

    pub fn is_interleaved(self) -> bool {
        self.desc().is_interleaved
    }
}

/// Returns what given render mode shows at a pixel of the output image.
///
/// Render-resolution images are sampled at the corresponding (nearest)
/// pixel; interleaved ones get their untraced field reconstructed from the
/// traced neighbours.
pub fn debug_view(ctx: &PassContext, mode: RenderMode, pixel: UVec2) -> Vec4 {
    let images = ctx.images;
    let sizes = images.sizes();

    let render_pixel = (pixel.as_vec2() * sizes.render.as_vec2() / sizes.output.as_vec2())
        .as_uvec2()
        .min(sizes.render.max(UVec2::ONE) - UVec2::ONE);

    let current = |id| images.read_ab(id, Role::Current, render_pixel);
    let normal = |id: AbImageId| Normal::decode_u32(current(id).x.to_bits());

    // Normals in <-1, 1> are shown in <0, 1>
    let show_normal = |n: Vec3| (n * 0.5 + 0.5).extend(1.0);

    let noisy = || NoisySample::reconstruct(images, render_pixel, traced_field(ctx.ubo));

    let color = match mode {
        RenderMode::Final => images.read(ImageId::Final, pixel),
        RenderMode::TaaOutput => images.read(ImageId::TaaOutput, pixel),
        RenderMode::Color => images.read(ImageId::Color, render_pixel),
        RenderMode::BaseColor => current(AbImageId::BaseColor).xyz().extend(1.0),
        RenderMode::Normal => show_normal(normal(AbImageId::Normal)),
        RenderMode::GeoNormal => show_normal(normal(AbImageId::GeoNormal)),

        RenderMode::MetallicRoughness => {
            let mr = current(AbImageId::MetallicRoughness);

            Vec4::new(mr.x, mr.y, 0.0, 1.0)
        }

        RenderMode::ViewDepth => {
            let depth = current(AbImageId::ViewDepth).x;

            // Distance mapped so that 1 unit is mid-gray
            let shade = if depth > 0.0 { 1.0 / (1.0 + depth) } else { 0.0 };

            Vec3::splat(shade).extend(1.0)
        }

        RenderMode::Motion => {
            let motion = images.read(ImageId::PtMotion, render_pixel).xy();

            Vec4::new(motion.x.abs(), motion.y.abs(), 0.0, 1.0)
        }

        RenderMode::NoisyLf => noisy()
            .lf
            .project(normal(AbImageId::Normal))
            .extend(1.0),

        RenderMode::NoisyHf => noisy().hf.extend(1.0),
        RenderMode::NoisySpec => noisy().spec.extend(1.0),
        RenderMode::Transparent => images.read(ImageId::PtTransparent, render_pixel),

        RenderMode::FilteredSpec => current(AbImageId::FilteredSpec).xyz().extend(1.0),

        RenderMode::HistoryLength => {
            let len = current(AbImageId::HistMomentsHf).z;
            let max = ctx.ubo.cvars.flt_history_length_max.max(VKPT_EPSILON);

            Vec3::splat((len / max).clamp(0.0, 1.0)).extend(1.0)
        }
    };

    if color.is_finite() {
        color
    } else {
        Vec4::ZERO
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec4};

    use super::*;
    use crate::{flat_pos, unflat_pos, FrameImages, FrameSizes, GlobalUbo, Image};

    #[test]
    fn indices_follow_the_list() {
        for (idx, desc) in LIST_RTX_RENDER_MODES.iter().enumerate() {
            assert_eq!(idx as u32, desc.index());
            assert_eq!(Some(desc.mode), RenderMode::from_index(idx as u32));
        }

        assert_eq!(None, RenderMode::from_index(LIST_RTX_RENDER_MODES.len() as u32));
    }

    #[test]
    fn labels() {
        assert_eq!(Some(RenderMode::NoisyHf), RenderMode::from_label("noisy hf"));
        assert_eq!(None, RenderMode::from_label("nope"));
    }

    #[test]
    fn only_path_tracer_outputs_are_interleaved() {
        let interleaved: Vec<_> = LIST_RTX_RENDER_MODES
            .iter()
            .filter(|desc| desc.is_interleaved)
            .map(|desc| desc.mode)
            .collect();

        assert_eq!(
            vec![RenderMode::NoisyLf, RenderMode::NoisyHf, RenderMode::NoisySpec],
            interleaved
        );
    }

    #[test]
    fn interleaved_modes_are_resolved() {
        let size = uvec2(4, 2);
        let mut images = FrameImages::new(FrameSizes::new(size, size));

        // Traced field holds the pixel's x coordinate
        images.store(
            ImageId::PtColorHf,
            Image::from_fn(size, |pos| Vec4::splat(unflat_pos(pos, size.x).x as f32)),
        );

        let ubo = GlobalUbo {
            width: size.x,
            height: size.y,
            ..Default::default()
        };

        let ctx = PassContext::new(&ubo, &images);

        // (2, 0) is traced, (1, 0) sits between traced (0, 0) and (2, 0)
        assert_eq!(uvec2(1, 0), flat_pos(uvec2(2, 0), size.x));
        assert_relative_eq!(2.0, debug_view(&ctx, RenderMode::NoisyHf, uvec2(2, 0)).x);
        assert_relative_eq!(1.0, debug_view(&ctx, RenderMode::NoisyHf, uvec2(1, 0)).x);
    }

    #[test]
    fn gbuffer_modes() {
        let size = uvec2(2, 2);
        let mut images = FrameImages::new(FrameSizes::new(size, size));

        images.store_ab(
            AbImageId::Normal,
            Image::from_fn(size, |_| vec4(f32::from_bits(Normal::encode_u32(Vec3::Z)), 0.0, 0.0, 0.0)),
        );

        images.store_ab(
            AbImageId::ViewDepth,
            Image::from_fn(size, |pos| Vec4::splat(pos.x as f32)),
        );

        let ubo = GlobalUbo::default();
        let ctx = PassContext::new(&ubo, &images);
        let normal = debug_view(&ctx, RenderMode::Normal, uvec2(1, 1));

        assert_relative_eq!(0.5, normal.x, epsilon = 1e-3);
        assert_relative_eq!(1.0, normal.z, epsilon = 1e-3);

        assert_eq!(0.0, debug_view(&ctx, RenderMode::ViewDepth, uvec2(0, 0)).x);
        assert_relative_eq!(0.5, debug_view(&ctx, RenderMode::ViewDepth, uvec2(1, 0)).x);
    }

    #[test]
    fn non_finite_values_are_hidden() {
        let size = uvec2(2, 2);
        let mut images = FrameImages::new(FrameSizes::new(size, size));

        images.store(ImageId::Color, Image::from_fn(size, |_| Vec4::splat(f32::NAN)));

        let ubo = GlobalUbo::default();
        let ctx = PassContext::new(&ubo, &images);

        assert_eq!(Vec4::ZERO, debug_view(&ctx, RenderMode::Color, uvec2(1, 1)));
    }
}
