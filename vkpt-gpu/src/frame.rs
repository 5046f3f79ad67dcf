use glam::{uvec2, UVec2, Vec4};

use crate::{Image, GRAD_DWN};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    R32Uint,
    R32Sint,
    R32Float,
    Rg32Uint,
    Rg32Float,
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Uint,
}

/// Which of the frame's sizes an image follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageExtent {
    /// Render resolution
    Render,

    /// Render resolution divided by [`GRAD_DWN`]
    Gradient,

    /// Resolution after the upscaling TAA
    Output,
}

macro_rules! images {
    (
        $(#[$meta:meta])*
        pub enum $enum:ident {
            $( $variant:ident = $name:literal, $format:ident, $extent:ident; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $enum {
            $( $variant, )*
        }

        impl $enum {
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )* ];
            pub const COUNT: u32 = Self::ALL.len() as u32;

            pub fn index(self) -> u32 {
                self as u32
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }

            pub fn format(self) -> ImageFormat {
                match self {
                    $( Self::$variant => ImageFormat::$format, )*
                }
            }

            pub fn extent(self) -> ImageExtent {
                match self {
                    $( Self::$variant => ImageExtent::$extent, )*
                }
            }
        }
    };
}

images! {
    /// Images that exist in a single copy.
    pub enum ImageId {
        PtMotion = "PT_MOTION", Rgba16Float, Render;
        PtColorLfSh = "PT_COLOR_LF_SH", Rgba16Float, Render;
        PtColorLfCocg = "PT_COLOR_LF_COCG", Rgba16Float, Render;
        PtColorHf = "PT_COLOR_HF", Rgba16Float, Render;
        PtColorSpec = "PT_COLOR_SPEC", Rgba16Float, Render;
        PtTransparent = "PT_TRANSPARENT", Rgba16Float, Render;
        AtrousPingLfSh = "ASVGF_ATROUS_PING_LF_SH", Rgba16Float, Render;
        AtrousPingLfCocg = "ASVGF_ATROUS_PING_LF_COCG", Rgba16Float, Render;
        AtrousPingHf = "ASVGF_ATROUS_PING_HF", Rgba16Float, Render;
        AtrousPingSpec = "ASVGF_ATROUS_PING_SPEC", Rgba16Float, Render;
        AtrousPingMoments = "ASVGF_ATROUS_PING_MOMENTS", Rgba16Float, Render;
        AtrousPongLfSh = "ASVGF_ATROUS_PONG_LF_SH", Rgba16Float, Render;
        AtrousPongLfCocg = "ASVGF_ATROUS_PONG_LF_COCG", Rgba16Float, Render;
        AtrousPongHf = "ASVGF_ATROUS_PONG_HF", Rgba16Float, Render;
        AtrousPongSpec = "ASVGF_ATROUS_PONG_SPEC", Rgba16Float, Render;
        AtrousPongMoments = "ASVGF_ATROUS_PONG_MOMENTS", Rgba16Float, Render;
        GradLfPing = "ASVGF_GRAD_LF_PING", Rgba16Float, Gradient;
        GradLfPong = "ASVGF_GRAD_LF_PONG", Rgba16Float, Gradient;
        GradHfSpecPing = "ASVGF_GRAD_HF_SPEC_PING", Rgba16Float, Gradient;
        GradHfSpecPong = "ASVGF_GRAD_HF_SPEC_PONG", Rgba16Float, Gradient;
        HistColorHf = "ASVGF_HIST_COLOR_HF", Rgba16Float, Render;
        Color = "ASVGF_COLOR", Rgba16Float, Render;
        TaaOutput = "ASVGF_TAA_OUTPUT", Rgba16Float, Output;
        Final = "FINAL", Rgba16Float, Output;
    }
}

images! {
    /// Images that exist in two physical copies, `A` and `B`, whose roles
    /// (current frame / history) flip every frame.
    pub enum AbImageId {
        VisbufPrim = "PT_VISBUF_PRIM", Rg32Uint, Render;
        VisbufBary = "PT_VISBUF_BARY", Rg32Float, Render;
        Cluster = "PT_CLUSTER", R32Sint, Render;
        BaseColor = "PT_BASE_COLOR", Rgba8Unorm, Render;
        MetallicRoughness = "PT_METALLIC", Rgba8Unorm, Render;
        ViewDepth = "PT_VIEW_DEPTH", R32Float, Render;
        Normal = "PT_NORMAL", R32Uint, Render;
        GeoNormal = "PT_GEO_NORMAL", R32Uint, Render;
        FilteredSpec = "ASVGF_FILTERED_SPEC", Rgba16Float, Render;
        HistMomentsHf = "ASVGF_HIST_MOMENTS_HF", Rgba16Float, Render;
        TaaHistory = "ASVGF_TAA", Rgba16Float, Output;
        RngSeed = "ASVGF_RNG_SEED", R32Uint, Render;
        HistColorLfSh = "ASVGF_HIST_COLOR_LF_SH", Rgba16Float, Render;
        HistColorLfCocg = "ASVGF_HIST_COLOR_LF_COCG", Rgba16Float, Render;
        GradSmplPos = "ASVGF_GRAD_SMPL_POS", Rgba32Uint, Gradient;
        Tangent = "PT_TANGENT", R32Uint, Render;
    }
}

/// Physical copy of an [`AbImageId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    /// Returns the copy holding the previous frame's data: `A` on odd frames,
    /// `B` on even ones.
    pub fn history(frame: u32) -> Self {
        if frame & 1 == 1 {
            Slot::A
        } else {
            Slot::B
        }
    }

    /// Returns the copy written during given frame.
    pub fn current(frame: u32) -> Self {
        Self::history(frame).other()
    }

    pub fn for_role(role: Role, frame: u32) -> Self {
        match role {
            Role::Current => Self::current(frame),
            Role::History => Self::history(frame),
        }
    }
}

/// Role an [`AbImageId`] plays within a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Current,
    History,
}

impl Role {
    pub fn index(self) -> u32 {
        match self {
            Role::Current => 0,
            Role::History => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSizes {
    pub render: UVec2,
    pub output: UVec2,
}

impl FrameSizes {
    pub fn new(render: UVec2, output: UVec2) -> Self {
        Self { render, output }
    }

    pub fn gradient(&self) -> UVec2 {
        uvec2(
            crate::div_ceil(self.render.x, GRAD_DWN),
            crate::div_ceil(self.render.y, GRAD_DWN),
        )
    }

    pub fn get(&self, extent: ImageExtent) -> UVec2 {
        match extent {
            ImageExtent::Render => self.render,
            ImageExtent::Gradient => self.gradient(),
            ImageExtent::Output => self.output,
        }
    }
}

/// Host-memory counterpart of the frame's images, used by the reference
/// executor.
///
/// Every image is stored as `Vec4`s; integer formats keep their words as
/// bit-casted floats.
#[derive(Clone, Debug)]
pub struct FrameImages {
    sizes: FrameSizes,
    frame: u32,
    base: Vec<Image>,
    ab: [Vec<Image>; 2],
}

impl FrameImages {
    pub fn new(sizes: FrameSizes) -> Self {
        let base = ImageId::ALL
            .iter()
            .map(|id| Image::new(sizes.get(id.extent())))
            .collect();

        let ab = || {
            AbImageId::ALL
                .iter()
                .map(|id| Image::new(sizes.get(id.extent())))
                .collect::<Vec<_>>()
        };

        Self {
            sizes,
            frame: 0,
            base,
            ab: [ab(), ab()],
        }
    }

    pub fn sizes(&self) -> FrameSizes {
        self.sizes
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Selects the frame whose roles the `Role`-based accessors resolve to.
    pub fn set_frame(&mut self, frame: u32) {
        self.frame = frame;
    }

    pub fn image(&self, id: ImageId) -> &Image {
        &self.base[id.index() as usize]
    }

    pub fn ab(&self, id: AbImageId, role: Role) -> &Image {
        self.slot(id, Slot::for_role(role, self.frame))
    }

    pub fn slot(&self, id: AbImageId, slot: Slot) -> &Image {
        &self.ab[slot.index()][id.index() as usize]
    }

    /// Reads given pixel of an image.
    pub fn read(&self, id: ImageId, pos: UVec2) -> Vec4 {
        self.image(id).read(pos)
    }

    /// Reads given pixel of an A/B image.
    pub fn read_ab(&self, id: AbImageId, role: Role, pos: UVec2) -> Vec4 {
        self.ab(id, role).read(pos)
    }

    pub fn store(&mut self, id: ImageId, image: Image) {
        assert_eq!(image.size(), self.image(id).size(), "{}", id.name());

        self.base[id.index() as usize] = image;
    }

    /// Replaces contents of an A/B image; only the current copy can be
    /// written.
    pub fn store_ab(&mut self, id: AbImageId, image: Image) {
        let slot = Slot::current(self.frame);

        assert_eq!(image.size(), self.slot(id, slot).size(), "{}", id.name());

        self.ab[slot.index()][id.index() as usize] = image;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_alternate_every_frame() {
        for frame in 0..10 {
            let current = Slot::current(frame);
            let history = Slot::history(frame);

            assert_ne!(current, history);
            assert_eq!(current, Slot::history(frame + 1));
            assert_eq!(history, Slot::current(frame + 1));
        }

        assert_eq!(Slot::A, Slot::current(0));
        assert_eq!(Slot::B, Slot::history(0));
        assert_eq!(Slot::B, Slot::current(1));
        assert_eq!(Slot::A, Slot::history(1));
    }

    #[test]
    fn data_written_as_current_is_read_as_history() {
        let sizes = FrameSizes::new(uvec2(4, 4), uvec2(4, 4));
        let mut images = FrameImages::new(sizes);

        images.set_frame(6);
        images.store_ab(
            AbImageId::ViewDepth,
            Image::from_fn(uvec2(4, 4), |_| Vec4::splat(12.0)),
        );

        images.set_frame(7);

        assert_eq!(
            12.0,
            images.read_ab(AbImageId::ViewDepth, Role::History, uvec2(1, 1)).x
        );

        assert_eq!(
            0.0,
            images.read_ab(AbImageId::ViewDepth, Role::Current, uvec2(1, 1)).x
        );
    }

    #[test]
    fn image_lists() {
        assert_eq!(16, AbImageId::COUNT);
        assert_eq!(ImageExtent::Gradient, AbImageId::GradSmplPos.extent());
        assert_eq!("PT_VISBUF_PRIM", AbImageId::VisbufPrim.name());

        for (idx, id) in ImageId::ALL.iter().enumerate() {
            assert_eq!(idx as u32, id.index());
        }
    }

    #[test]
    fn gradient_size_rounds_up() {
        let sizes = FrameSizes::new(uvec2(10, 9), uvec2(20, 18));

        assert_eq!(uvec2(4, 3), sizes.gradient());
    }
}
