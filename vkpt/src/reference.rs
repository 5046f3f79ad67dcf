use std::hash::Hash;

use derivative::Derivative;
use glam::{UVec2, Vec4};
use log::{debug, info};

use crate::gpu::{self, AbImageId, AtrousChannel, ImageId, PingPong, Slot};
use crate::{
    par_image, par_map, Bvh, CvarRegistry, Entity, Error, FrameParams, FrameState,
    Geometry, LightStatsRing, Lights, Materials, Models, Result, Scene,
};

/// Renders frames on the CPU, running the same kernels as the shaders do.
///
/// Every pass is evaluated for all of its pixels (in parallel) before its
/// outputs get stored, which mirrors the barrier between two compute
/// dispatches.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ReferenceRenderer<H = u32>
where
    H: Hash + Eq,
{
    cvars: CvarRegistry,
    state: FrameState,
    scene: Scene<H>,
    stats: LightStatsRing,
    #[derivative(Debug = "ignore")]
    textures: Box<dyn gpu::Textures>,
    images: Option<gpu::FrameImages>,
    tone_mapping: [gpu::ToneMappingState; 2],
    histogram: gpu::LuminanceHistogram,
    bvh: Bvh,
    render_mode: gpu::RenderMode,
}

impl<H> ReferenceRenderer<H>
where
    H: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_state(FrameState::new())
    }

    /// Creates a renderer whose random decisions are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_state(FrameState::with_seed(seed))
    }

    fn with_state(state: FrameState) -> Self {
        Self {
            cvars: CvarRegistry::new(),
            state,
            scene: Scene::new(),
            stats: LightStatsRing::new(),
            textures: Box::new(gpu::NoTextures),
            images: None,
            tone_mapping: Default::default(),
            histogram: Default::default(),
            bvh: Bvh::default(),
            render_mode: gpu::RenderMode::Final,
        }
    }

    pub fn cvars(&self) -> &CvarRegistry {
        &self.cvars
    }

    pub fn cvars_mut(&mut self) -> &mut CvarRegistry {
        &mut self.cvars
    }

    pub fn scene(&self) -> &Scene<H> {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene<H> {
        &mut self.scene
    }

    pub fn geometry_mut(&mut self) -> &mut Geometry {
        self.scene.geometry_mut()
    }

    pub fn models_mut(&mut self) -> &mut Models {
        self.scene.models_mut()
    }

    pub fn materials_mut(&mut self) -> &mut Materials<H> {
        self.scene.materials_mut()
    }

    /// See: [`Scene::lights_mut()`].
    pub fn lights_mut(&mut self) -> &mut Lights {
        self.scene.lights_mut()
    }

    pub fn set_textures(&mut self, textures: impl gpu::Textures + 'static) {
        self.textures = Box::new(textures);
    }

    pub fn set_num_clusters(&mut self, num_clusters: u32) {
        self.scene.set_num_clusters(num_clusters);
    }

    pub fn set_render_mode(&mut self, mode: gpu::RenderMode) {
        self.render_mode = mode;
    }

    pub fn ubo(&self) -> &gpu::GlobalUbo {
        self.state.ubo()
    }

    /// Images of the most recent frame; `None` before the first one.
    pub fn images(&self) -> Option<&gpu::FrameImages> {
        self.images.as_ref()
    }

    /// Luminance histogram of the most recent frame.
    pub fn histogram(&self) -> &gpu::LuminanceHistogram {
        &self.histogram
    }

    pub fn tone_mapping_state(&self) -> Option<&gpu::ToneMappingState> {
        let frame = self.images.as_ref()?.frame();

        Some(&self.tone_mapping[Slot::current(frame).index()])
    }

    /// Renders a frame; returns the image selected by the render mode, at
    /// the output resolution.
    pub fn render(&mut self, params: &FrameParams, entities: &[Entity]) -> Result<gpu::Image> {
        let passes = gpu::frame_passes(self.cvars.cvars());

        gpu::validate_passes(&passes).map_err(Error::InvalidPassGraph)?;

        let frame = self.state.begin(params, &self.cvars)?;
        let sizes = self.state.sizes();

        if self.images.as_ref().map(|images| images.sizes()) != Some(sizes) {
            info!(
                "Allocating frame images; render={:?}, output={:?}",
                sizes.render, sizes.output
            );

            self.images = None;
            self.tone_mapping = Default::default();
        }

        let Self {
            state,
            scene,
            stats,
            textures,
            images,
            tone_mapping,
            histogram,
            bvh,
            render_mode,
            ..
        } = self;

        let images = images.get_or_insert_with(|| gpu::FrameImages::new(sizes));
        let mode = *render_mode;

        images.set_frame(frame);

        scene.prepare(frame, entities, state.ubo_mut());
        stats.begin_frame(frame, scene.lights.list_entries());

        *bvh = Bvh::from_scene(&scene.geometry_view(), scene.instances.current());

        let ubo = state.ubo();
        let materials = scene.materials.serialize();
        let materials = gpu::MaterialsView::new(&materials);
        let instances = gpu::InstancesView::new(scene.instances.current());
        let stats = stats.view();

        let view = gpu::SceneView {
            geometry: scene.geometry_view(),
            instances: &instances,
            materials: &materials,
            textures: textures.as_ref(),
            tracer: &*bvh,
        };

        let pipeline = Pipeline {
            ubo,
            scene: view,
            lights: scene.lights.view(),
            stats: stats.as_ref(),
        };

        pipeline.gradient_reproject(images);
        pipeline.seed_rng(images);
        pipeline.primary_rays(images);
        pipeline.path_tracing(images);
        pipeline.gradients(images);
        pipeline.temporal(images);
        pipeline.atrous(images);
        pipeline.compose(images);
        pipeline.taa(images);

        *histogram = pipeline.tone_mapping(images, tone_mapping, frame);

        let output = if mode == gpu::RenderMode::Final {
            images.image(ImageId::Final).clone()
        } else {
            let ctx = gpu::PassContext::new(ubo, images);

            par_image(sizes.output, |pixel| gpu::debug_view(&ctx, mode, pixel))
        };

        scene.geometry.settle();

        debug!(
            "Frame rendered; frame={frame}, instances={}, triangles={}",
            scene.instances.len(),
            bvh.len()
        );

        Ok(output)
    }
}

impl<H> Default for ReferenceRenderer<H>
where
    H: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the passes of a single frame share.
struct Pipeline<'a> {
    ubo: &'a gpu::GlobalUbo,
    scene: gpu::SceneView<'a>,
    lights: gpu::LightsView<'a>,
    stats: Option<&'a gpu::LightStatsView<'a>>,
}

impl<'a> Pipeline<'a> {
    fn render_size(&self) -> UVec2 {
        self.ubo.size()
    }

    fn trace<'b>(&self, images: &'b gpu::FrameImages) -> gpu::TraceContext<'b>
    where
        'a: 'b,
    {
        gpu::TraceContext::new(self.ubo, self.scene, self.lights, self.stats, images)
    }

    fn gradient_reproject(&self, images: &mut gpu::FrameImages) {
        let ctx = gpu::PassContext::new(self.ubo, images);
        let out = gpu::reproject_gradients(&ctx, &self.scene);

        images.store_ab(AbImageId::GradSmplPos, out);
    }

    fn seed_rng(&self, images: &mut gpu::FrameImages) {
        let ctx = gpu::PassContext::new(self.ubo, images);
        let out = par_image(self.render_size(), |pixel| gpu::seed_rng(&ctx, pixel));

        images.store_ab(AbImageId::RngSeed, out);
    }

    fn primary_rays(&self, images: &mut gpu::FrameImages) {
        let size = self.render_size();
        let ctx = self.trace(images);

        let out = par_map(size, |pixel| {
            let out = gpu::primary_rays(&ctx, pixel);

            (out.gbuffer.pack(), out.motion, out.transparent)
        });

        for (idx, id) in gpu::GBUFFER_IMAGES.iter().enumerate() {
            let data = out.iter().map(|(gbuffer, _, _)| gbuffer[idx]).collect();

            images.store_ab(*id, gpu::Image::from_data(size, data));
        }

        let motion = out.iter().map(|(_, motion, _)| *motion).collect();
        let transparent = out.iter().map(|(_, _, transparent)| *transparent).collect();

        images.store(ImageId::PtMotion, gpu::Image::from_data(size, motion));
        images.store(ImageId::PtTransparent, gpu::Image::from_data(size, transparent));
    }

    /// Traces the checkerboard field of this frame; the other half of the
    /// (flattened) noisy images keeps the previous frame's samples.
    fn path_tracing(&self, images: &mut gpu::FrameImages) {
        let size = self.render_size();
        let field = gpu::traced_field(self.ubo);
        let ctx = self.trace(images);

        let out = par_map(gpu::launch_size(size), |launch| {
            let pixel = gpu::launch_to_pixel(launch, field);

            (pixel.x < size.x).then(|| (pixel, gpu::path_tracing(&ctx, pixel).pack()))
        });

        let mut targets = gpu::PATH_TRACER_IMAGES.map(|id| images.image(id).clone());

        for (pixel, texels) in out.into_iter().flatten() {
            let pos = gpu::flat_pos(pixel, size.x);

            for (target, texel) in targets.iter_mut().zip(texels) {
                target.write(pos, texel);
            }
        }

        for (id, image) in gpu::PATH_TRACER_IMAGES.into_iter().zip(targets) {
            images.store(id, image);
        }
    }

    fn gradients(&self, images: &mut gpu::FrameImages) {
        let size = images.sizes().gradient();
        let ctx = gpu::PassContext::new(self.ubo, images);
        let (lf, hf_spec) = unzip(size, par_map(size, |stratum| gpu::gradient_image(&ctx, stratum)));

        images.store(ImageId::GradLfPing, lf);
        images.store(ImageId::GradHfSpecPing, hf_spec);

        for iter in 0..gpu::GRAD_ITERATIONS {
            let src = PingPong::after(iter);
            let (src_lf, src_hf_spec) = gpu::gradient_images(src);
            let (dst_lf, dst_hf_spec) = gpu::gradient_images(src.other());
            let lf = images.image(src_lf);
            let hf_spec = images.image(src_hf_spec);

            let (lf, hf_spec) = unzip(
                size,
                par_map(size, |stratum| gpu::gradient_atrous(lf, hf_spec, stratum, iter)),
            );

            images.store(dst_lf, lf);
            images.store(dst_hf_spec, hf_spec);
        }
    }

    fn temporal(&self, images: &mut gpu::FrameImages) {
        let size = self.render_size();
        let ctx = gpu::PassContext::new(self.ubo, images);
        let out = par_map(size, |pixel| gpu::temporal(&ctx, pixel));

        let image = |f: fn(&gpu::TemporalOutput) -> Vec4| {
            gpu::Image::from_data(size, out.iter().map(f).collect())
        };

        images.store(ImageId::AtrousPingLfSh, image(|out| out.lf_sh));
        images.store(ImageId::AtrousPingLfCocg, image(|out| out.lf_cocg));
        images.store(ImageId::AtrousPingHf, image(|out| out.hf));
        images.store(ImageId::AtrousPingSpec, image(|out| out.spec));
        images.store(ImageId::AtrousPingMoments, image(|out| out.moments));
        images.store_ab(AbImageId::HistColorLfSh, image(|out| out.hist_lf_sh));
        images.store_ab(AbImageId::HistColorLfCocg, image(|out| out.hist_lf_cocg));
        images.store_ab(AbImageId::HistMomentsHf, image(|out| out.hist_moments_hf));
    }

    /// Runs the a-trous iterations; channels that are done filtering keep
    /// their output where it is.
    fn atrous(&self, images: &mut gpu::FrameImages) {
        let size = self.render_size();
        let iterations = gpu::AtrousIterations::new(&self.ubo.cvars);

        for iter in 0..iterations.passes() {
            let src = PingPong::after(iter);
            let dst = src.other();
            let channels = AtrousChannel::filtered_at(iterations, iter);
            let ctx = gpu::PassContext::new(self.ubo, images);
            let mut outputs = Vec::new();

            if channels.contains(&AtrousChannel::LfSh) {
                let (sh, cocg) =
                    unzip(size, par_map(size, |pixel| gpu::atrous_lf(&ctx, src, iter, pixel)));

                outputs.push((AtrousChannel::LfSh.image(dst), sh));
                outputs.push((AtrousChannel::LfCocg.image(dst), cocg));
            }

            let hf = if channels.contains(&AtrousChannel::Hf) {
                let (color, moments) =
                    unzip(size, par_map(size, |pixel| gpu::atrous_hf(&ctx, src, iter, pixel)));

                outputs.push((AtrousChannel::Moments.image(dst), moments));

                Some(color)
            } else {
                None
            };

            if channels.contains(&AtrousChannel::Spec) {
                let spec = par_image(size, |pixel| gpu::atrous_spec(&ctx, src, iter, pixel));

                outputs.push((AtrousChannel::Spec.image(dst), spec));
            }

            if iter == 0 {
                let history = match &hf {
                    Some(hf) => hf.clone(),
                    None => images.image(ImageId::AtrousPingHf).clone(),
                };

                outputs.push((ImageId::HistColorHf, history));
            }

            if let Some(hf) = hf {
                outputs.push((AtrousChannel::Hf.image(dst), hf));
            }

            for (id, image) in outputs {
                images.store(id, image);
            }
        }
    }

    fn compose(&self, images: &mut gpu::FrameImages) {
        let size = self.render_size();
        let iterations = gpu::AtrousIterations::new(&self.ubo.cvars);
        let ctx = gpu::PassContext::new(self.ubo, images);

        let (color, filtered_spec) = unzip(
            size,
            par_map(size, |pixel| {
                let out = gpu::compose(&ctx, iterations, pixel);

                (out.color, out.filtered_spec)
            }),
        );

        images.store(ImageId::Color, color);
        images.store_ab(AbImageId::FilteredSpec, filtered_spec);
    }

    fn taa(&self, images: &mut gpu::FrameImages) {
        let size = images.sizes().output;
        let ctx = gpu::PassContext::new(self.ubo, images);
        let out = par_image(size, |pixel| gpu::taa(&ctx, pixel));

        images.store(ImageId::TaaOutput, out.clone());
        images.store_ab(AbImageId::TaaHistory, out);
    }

    /// Meters the TAA output, advances the eye adaptation (whose state is
    /// double-buffered just like the A/B images) and writes the final image;
    /// returns the histogram.
    fn tone_mapping(
        &self,
        images: &mut gpu::FrameImages,
        states: &mut [gpu::ToneMappingState; 2],
        frame: u32,
    ) -> gpu::LuminanceHistogram {
        let size = images.sizes().output;
        let histogram = gpu::LuminanceHistogram::from_image(images.image(ImageId::TaaOutput));

        let prev = states[Slot::history(frame).index()];
        let state = gpu::tone_mapping_curve(self.ubo, &histogram, &prev);

        states[Slot::current(frame).index()] = state;

        let taa_output = images.image(ImageId::TaaOutput);

        let out = par_image(size, |pixel| {
            gpu::tone_mapping_apply(
                self.ubo,
                &histogram,
                &state,
                taa_output.read(pixel),
                pixel,
                size,
            )
        });

        images.store(ImageId::Final, out);

        histogram
    }
}

fn unzip(size: UVec2, texels: Vec<(Vec4, Vec4)>) -> (gpu::Image, gpu::Image) {
    let (a, b) = texels.into_iter().unzip();

    (gpu::Image::from_data(size, a), gpu::Image::from_data(size, b))
}
