//! Declarative description of the frame's pass graph: which resources every
//! pass reads and writes, in the order passes are submitted.

use crate::{AbImageId, Cvars, ImageId, Role, GBUFFER_IMAGES, GRAD_ITERATIONS};

/// A resource a pass can touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Image(ImageId),
    AbImage(AbImageId, Role),

    /// Light-statistics buffer read by this frame (`(frame + 1) % 3`)
    LightStatsRead,

    /// Light-statistics buffer accumulated by this frame (`frame % 3`)
    LightStatsWrite,

    ToneMappingHistogram,
    ToneMappingState(Role),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pass {
    GradientReproject,
    SeedRng,
    PrimaryRays,
    PathTracing,
    GradientImage,
    GradientAtrous(u32),
    Temporal,
    Atrous(u32),
    Compose,
    Taa,
    ToneMappingHistogram,
    ToneMappingCurve,
    ToneMappingApply,
}

/// Per-channel a-trous iteration counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtrousIterations {
    pub lf: u32,
    pub hf: u32,
    pub spec: u32,
}

impl AtrousIterations {
    pub const MAX: u32 = 8;

    pub fn new(cvars: &Cvars) -> Self {
        let get = |value: f32| (value.max(0.0) as u32).min(Self::MAX);

        Self {
            lf: get(cvars.flt_atrous_lf),
            hf: get(cvars.flt_atrous_hf),
            spec: get(cvars.flt_atrous_spec),
        }
    }

    /// Number of a-trous passes submitted; there's always at least one, as
    /// the first iteration also stores the HF history.
    pub fn passes(&self) -> u32 {
        self.lf.max(self.hf).max(self.spec).max(1)
    }
}

/// Which of the two ping-pong images holds data after `iterations` filter
/// iterations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PingPong {
    Ping,
    Pong,
}

impl PingPong {
    pub fn after(iterations: u32) -> Self {
        if iterations % 2 == 0 {
            PingPong::Ping
        } else {
            PingPong::Pong
        }
    }

    pub fn other(self) -> Self {
        match self {
            PingPong::Ping => PingPong::Pong,
            PingPong::Pong => PingPong::Ping,
        }
    }
}

/// The a-trous image set of a single channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtrousChannel {
    LfSh,
    LfCocg,
    Hf,
    Spec,
    Moments,
}

impl AtrousChannel {
    pub fn image(self, pp: PingPong) -> ImageId {
        match (self, pp) {
            (AtrousChannel::LfSh, PingPong::Ping) => ImageId::AtrousPingLfSh,
            (AtrousChannel::LfSh, PingPong::Pong) => ImageId::AtrousPongLfSh,
            (AtrousChannel::LfCocg, PingPong::Ping) => ImageId::AtrousPingLfCocg,
            (AtrousChannel::LfCocg, PingPong::Pong) => ImageId::AtrousPongLfCocg,
            (AtrousChannel::Hf, PingPong::Ping) => ImageId::AtrousPingHf,
            (AtrousChannel::Hf, PingPong::Pong) => ImageId::AtrousPongHf,
            (AtrousChannel::Spec, PingPong::Ping) => ImageId::AtrousPingSpec,
            (AtrousChannel::Spec, PingPong::Pong) => ImageId::AtrousPongSpec,
            (AtrousChannel::Moments, PingPong::Ping) => ImageId::AtrousPingMoments,
            (AtrousChannel::Moments, PingPong::Pong) => ImageId::AtrousPongMoments,
        }
    }

    /// Channels filtered during given iteration.
    pub fn filtered_at(iterations: AtrousIterations, iteration: u32) -> Vec<Self> {
        let mut channels = Vec::new();

        if iteration < iterations.lf {
            channels.extend([AtrousChannel::LfSh, AtrousChannel::LfCocg]);
        }

        if iteration < iterations.hf {
            channels.extend([AtrousChannel::Hf, AtrousChannel::Moments]);
        }

        if iteration < iterations.spec {
            channels.push(AtrousChannel::Spec);
        }

        channels
    }

    /// All ping-pong images of all channels.
    pub fn image_ids() -> Vec<ImageId> {
        [
            AtrousChannel::LfSh,
            AtrousChannel::LfCocg,
            AtrousChannel::Hf,
            AtrousChannel::Spec,
            AtrousChannel::Moments,
        ]
        .into_iter()
        .flat_map(|channel| [channel.image(PingPong::Ping), channel.image(PingPong::Pong)])
        .collect()
    }

    pub fn iterations(self, iterations: AtrousIterations) -> u32 {
        match self {
            AtrousChannel::LfSh | AtrousChannel::LfCocg => iterations.lf,
            AtrousChannel::Hf | AtrousChannel::Moments => iterations.hf,
            AtrousChannel::Spec => iterations.spec,
        }
    }

    /// Image holding this channel's fully filtered data.
    pub fn output(self, iterations: AtrousIterations) -> ImageId {
        self.image(PingPong::after(self.iterations(iterations)))
    }
}

/// Image holding gradients after all [`GRAD_ITERATIONS`].
pub fn gradient_output(lf: bool) -> ImageId {
    match (lf, PingPong::after(GRAD_ITERATIONS)) {
        (true, PingPong::Ping) => ImageId::GradLfPing,
        (true, PingPong::Pong) => ImageId::GradLfPong,
        (false, PingPong::Ping) => ImageId::GradHfSpecPing,
        (false, PingPong::Pong) => ImageId::GradHfSpecPong,
    }
}

/// Push constants of a compute pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PassParams {
    /// Filter iteration, for passes that run more than once per frame
    pub iteration: u32,
    pub _pad: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassDesc {
    pub pass: Pass,
    pub reads: Vec<Resource>,
    pub writes: Vec<Resource>,
}

impl Pass {
    pub fn name(self) -> String {
        match self {
            Pass::GradientReproject => "gradient_reproject".into(),
            Pass::SeedRng => "seed_rng".into(),
            Pass::PrimaryRays => "primary_rays".into(),
            Pass::PathTracing => "path_tracing".into(),
            Pass::GradientImage => "gradient_image".into(),
            Pass::GradientAtrous(iter) => format!("gradient_atrous_{iter}"),
            Pass::Temporal => "temporal".into(),
            Pass::Atrous(iter) => format!("atrous_{iter}"),
            Pass::Compose => "compose".into(),
            Pass::Taa => "taa".into(),
            Pass::ToneMappingHistogram => "tone_mapping_histogram".into(),
            Pass::ToneMappingCurve => "tone_mapping_curve".into(),
            Pass::ToneMappingApply => "tone_mapping_apply".into(),
        }
    }

    /// Name of the shader the pass runs; iterations of a filter share a single
    /// shader and tell themselves apart through [`PassParams::iteration`].
    pub fn shader(self) -> &'static str {
        match self {
            Pass::GradientReproject => "gradient_reproject",
            Pass::SeedRng => "seed_rng",
            Pass::PrimaryRays => "primary_rays",
            Pass::PathTracing => "path_tracing",
            Pass::GradientImage => "gradient_image",
            Pass::GradientAtrous(_) => "gradient_atrous",
            Pass::Temporal => "temporal",
            Pass::Atrous(_) => "atrous",
            Pass::Compose => "compose",
            Pass::Taa => "taa",
            Pass::ToneMappingHistogram => "tone_mapping_histogram",
            Pass::ToneMappingCurve => "tone_mapping_curve",
            Pass::ToneMappingApply => "tone_mapping_apply",
        }
    }

    pub fn params(self) -> PassParams {
        let iteration = match self {
            Pass::GradientAtrous(iter) | Pass::Atrous(iter) => iter,
            _ => 0,
        };

        PassParams {
            iteration,
            _pad: 0,
        }
    }

    /// Returns passes of a frame, in submission order.
    pub fn sequence(iterations: AtrousIterations) -> Vec<Self> {
        let mut passes = vec![
            Pass::GradientReproject,
            Pass::SeedRng,
            Pass::PrimaryRays,
            Pass::PathTracing,
            Pass::GradientImage,
        ];

        passes.extend((0..GRAD_ITERATIONS).map(Pass::GradientAtrous));
        passes.push(Pass::Temporal);
        passes.extend((0..iterations.passes()).map(Pass::Atrous));

        passes.extend([
            Pass::Compose,
            Pass::Taa,
            Pass::ToneMappingHistogram,
            Pass::ToneMappingCurve,
            Pass::ToneMappingApply,
        ]);

        passes
    }

    pub fn describe(self, iterations: AtrousIterations) -> PassDesc {
        use Resource::*;

        let curr = |id| AbImage(id, Role::Current);
        let hist = |id| AbImage(id, Role::History);
        let gbuffer = |role| GBUFFER_IMAGES.iter().map(move |id| AbImage(*id, role));

        let (reads, writes): (Vec<_>, Vec<_>) = match self {
            Pass::GradientReproject => (
                vec![
                    hist(AbImageId::GradSmplPos),
                    hist(AbImageId::VisbufPrim),
                    hist(AbImageId::VisbufBary),
                    Image(ImageId::PtColorLfSh),
                    Image(ImageId::PtColorHf),
                    Image(ImageId::PtColorSpec),
                ],
                vec![curr(AbImageId::GradSmplPos)],
            ),

            Pass::SeedRng => (
                vec![curr(AbImageId::GradSmplPos), hist(AbImageId::RngSeed)],
                vec![curr(AbImageId::RngSeed)],
            ),

            Pass::PrimaryRays => (
                vec![
                    curr(AbImageId::GradSmplPos),
                    hist(AbImageId::VisbufPrim),
                    hist(AbImageId::VisbufBary),
                ],
                gbuffer(Role::Current)
                    .chain([Image(ImageId::PtMotion), Image(ImageId::PtTransparent)])
                    .collect(),
            ),

            Pass::PathTracing => (
                gbuffer(Role::Current)
                    .chain([
                        curr(AbImageId::RngSeed),
                        curr(AbImageId::GradSmplPos),
                        LightStatsRead,
                    ])
                    .collect(),
                vec![
                    Image(ImageId::PtColorLfSh),
                    Image(ImageId::PtColorLfCocg),
                    Image(ImageId::PtColorHf),
                    Image(ImageId::PtColorSpec),
                    LightStatsWrite,
                ],
            ),

            Pass::GradientImage => (
                vec![
                    curr(AbImageId::GradSmplPos),
                    Image(ImageId::PtColorLfSh),
                    Image(ImageId::PtColorHf),
                    Image(ImageId::PtColorSpec),
                ],
                vec![Image(ImageId::GradLfPing), Image(ImageId::GradHfSpecPing)],
            ),

            Pass::GradientAtrous(iter) => {
                let src = PingPong::after(iter);
                let (src_lf, src_hf) = gradient_images(src);
                let (dst_lf, dst_hf) = gradient_images(src.other());

                (
                    vec![Image(src_lf), Image(src_hf)],
                    vec![Image(dst_lf), Image(dst_hf)],
                )
            }

            Pass::Temporal => (
                vec![
                    Image(ImageId::PtColorLfSh),
                    Image(ImageId::PtColorLfCocg),
                    Image(ImageId::PtColorHf),
                    Image(ImageId::PtColorSpec),
                    Image(ImageId::PtMotion),
                    Image(ImageId::HistColorHf),
                    Image(gradient_output(true)),
                    Image(gradient_output(false)),
                    hist(AbImageId::HistColorLfSh),
                    hist(AbImageId::HistColorLfCocg),
                    hist(AbImageId::HistMomentsHf),
                    hist(AbImageId::FilteredSpec),
                    hist(AbImageId::ViewDepth),
                    hist(AbImageId::Normal),
                    curr(AbImageId::ViewDepth),
                    curr(AbImageId::Normal),
                    curr(AbImageId::GradSmplPos),
                ],
                vec![
                    Image(ImageId::AtrousPingLfSh),
                    Image(ImageId::AtrousPingLfCocg),
                    Image(ImageId::AtrousPingHf),
                    Image(ImageId::AtrousPingSpec),
                    Image(ImageId::AtrousPingMoments),
                    curr(AbImageId::HistColorLfSh),
                    curr(AbImageId::HistColorLfCocg),
                    curr(AbImageId::HistMomentsHf),
                ],
            ),

            Pass::Atrous(iter) => {
                let src = PingPong::after(iter);
                let channels = AtrousChannel::filtered_at(iterations, iter);

                let mut reads: Vec<_> = channels
                    .iter()
                    .map(|channel| Image(channel.image(src)))
                    .chain([
                        curr(AbImageId::ViewDepth),
                        curr(AbImageId::Normal),
                        curr(AbImageId::MetallicRoughness),
                    ])
                    .collect();

                let mut writes: Vec<_> = channels
                    .iter()
                    .map(|channel| Image(channel.image(src.other())))
                    .collect();

                if iter == 0 {
                    if !channels.contains(&AtrousChannel::Hf) {
                        reads.push(Image(ImageId::AtrousPingHf));
                    }

                    writes.push(Image(ImageId::HistColorHf));
                }

                (reads, writes)
            }

            Pass::Compose => (
                vec![
                    Image(AtrousChannel::LfSh.output(iterations)),
                    Image(AtrousChannel::LfCocg.output(iterations)),
                    Image(AtrousChannel::Hf.output(iterations)),
                    Image(AtrousChannel::Spec.output(iterations)),
                    Image(ImageId::PtColorLfSh),
                    Image(ImageId::PtColorLfCocg),
                    Image(ImageId::PtColorHf),
                    Image(ImageId::PtColorSpec),
                    Image(ImageId::PtTransparent),
                    Image(gradient_output(true)),
                    Image(gradient_output(false)),
                    curr(AbImageId::BaseColor),
                    curr(AbImageId::MetallicRoughness),
                    curr(AbImageId::Normal),
                ],
                vec![Image(ImageId::Color), curr(AbImageId::FilteredSpec)],
            ),

            Pass::Taa => (
                vec![
                    Image(ImageId::Color),
                    Image(ImageId::PtMotion),
                    hist(AbImageId::TaaHistory),
                ],
                vec![Image(ImageId::TaaOutput), curr(AbImageId::TaaHistory)],
            ),

            Pass::ToneMappingHistogram => (
                vec![Image(ImageId::TaaOutput)],
                vec![ToneMappingHistogram],
            ),

            Pass::ToneMappingCurve => (
                vec![ToneMappingHistogram, ToneMappingState(Role::History)],
                vec![ToneMappingState(Role::Current)],
            ),

            Pass::ToneMappingApply => (
                vec![
                    Image(ImageId::TaaOutput),
                    ToneMappingHistogram,
                    ToneMappingState(Role::Current),
                ],
                vec![Image(ImageId::Final)],
            ),
        };

        PassDesc {
            pass: self,
            reads,
            writes,
        }
    }
}

/// Returns the `(lf, hf_spec)` gradient images of given ping-pong side.
pub fn gradient_images(pp: PingPong) -> (ImageId, ImageId) {
    match pp {
        PingPong::Ping => (ImageId::GradLfPing, ImageId::GradHfSpecPing),
        PingPong::Pong => (ImageId::GradLfPong, ImageId::GradHfSpecPong),
    }
}

/// Describes all passes of a frame.
pub fn frame_passes(cvars: &Cvars) -> Vec<PassDesc> {
    let iterations = AtrousIterations::new(cvars);

    Pass::sequence(iterations)
        .into_iter()
        .map(|pass| pass.describe(iterations))
        .collect()
}

/// Checks the pass graph's resource discipline:
///
/// - no pass reads a resource it writes,
/// - history copies are never written,
/// - the previous frame's tone-mapping state is never written.
pub fn validate_passes(passes: &[PassDesc]) -> Result<(), String> {
    for desc in passes {
        for write in &desc.writes {
            if desc.reads.contains(write) {
                return Err(format!(
                    "{} both reads and writes {write:?}",
                    desc.pass.name()
                ));
            }

            if matches!(
                write,
                Resource::AbImage(_, Role::History)
                    | Resource::ToneMappingState(Role::History)
                    | Resource::LightStatsRead
            ) {
                return Err(format!(
                    "{} writes history resource {write:?}",
                    desc.pass.name()
                ));
            }
        }
    }

    Ok(())
}
