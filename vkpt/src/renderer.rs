use std::hash::Hash;

use derivative::Derivative;
use glam::UVec2;
use log::{debug, info};

use crate::gpu::{self, ImageId, Pass};
use crate::{
    BindGroup, ComputePass, CvarRegistry, Entity, Error, ExternalBindings, FrameParams,
    FrameResources, FrameState, Result, Scene, SharedBindGroups, Shaders, Texture,
};

/// Number of pixels processed by a single workgroup, along each axis.
pub const WORKGROUP_SIZE: u32 = 16;

/// Renders frames on the GPU.
///
/// Each frame goes through [`Self::prepare()`], which updates and uploads the
/// scene, and [`Self::render()`], which records the passes.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Renderer<H = u32>
where
    H: Hash + Eq,
{
    cvars: CvarRegistry,
    state: FrameState,
    scene: Scene<H>,
    #[derivative(Debug = "ignore")]
    shaders: Shaders,
    external: Option<ExternalBindings>,
    resources: Option<FrameResources>,
    passes: Option<Passes>,
    frame: Option<u32>,
}

impl<H> Renderer<H>
where
    H: Hash + Eq,
{
    pub fn new(shaders: Shaders) -> Self {
        Self::with_state(shaders, FrameState::new())
    }

    pub fn with_seed(shaders: Shaders, seed: u64) -> Self {
        Self::with_state(shaders, FrameState::with_seed(seed))
    }

    fn with_state(shaders: Shaders, state: FrameState) -> Self {
        info!("Creating renderer");

        Self {
            cvars: CvarRegistry::new(),
            state,
            scene: Scene::new(),
            shaders,
            external: None,
            resources: None,
            passes: None,
            frame: None,
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

    pub fn ubo(&self) -> &gpu::GlobalUbo {
        self.state.ubo()
    }

    /// Sets bind group of [`gpu::DESC_SET_EXTERNAL`]; the passes get rebuilt
    /// during the next [`Self::prepare()`].
    pub fn set_external(&mut self, external: Option<ExternalBindings>) {
        self.external = external;
        self.passes = None;
    }

    /// Resources of the most recent frame; `None` before the first one.
    pub fn resources(&self) -> Option<&FrameResources> {
        self.resources.as_ref()
    }

    /// Tone-mapped image of the most recent frame, at the output resolution.
    pub fn output(&self) -> Option<&Texture> {
        Some(self.resources.as_ref()?.images.image(ImageId::Final))
    }

    /// Starts a new frame: classifies entities, builds the light lists and
    /// uploads everything that has changed; returns the frame's index.
    ///
    /// Passes are rebuilt whenever a resource they bind gets reallocated or
    /// the number of a-trous iterations changes.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        params: &FrameParams,
        entities: &[Entity],
    ) -> Result<u32> {
        let iterations = gpu::AtrousIterations::new(self.cvars.cvars());

        gpu::validate_passes(&gpu::frame_passes(self.cvars.cvars()))
            .map_err(Error::InvalidPassGraph)?;

        let frame = self.state.begin(params, &self.cvars)?;
        let sizes = self.state.sizes();

        self.scene.prepare(frame, entities, self.state.ubo_mut());

        if self.resources.is_none() {
            self.passes = None;
        }

        let resources = self
            .resources
            .get_or_insert_with(|| FrameResources::new(device, sizes));

        if resources.resize(device, sizes) {
            self.passes = None;
        }

        let outcome = resources
            .scene
            .write(device, queue, self.state.ubo(), &mut self.scene);

        self.scene.geometry.settle();

        if outcome.reallocated {
            self.passes = None;
        }

        if self.passes.as_ref().map(|passes| passes.iterations) != Some(iterations) {
            debug!("Rebuilding passes; frame={frame}, iterations={iterations:?}");

            self.passes = Some(Passes::new(
                device,
                &self.shaders,
                resources,
                self.external.as_ref(),
                iterations,
            )?);
        }

        self.frame = Some(frame);

        Ok(frame)
    }

    /// Records passes of the frame started by the last [`Self::prepare()`].
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder) {
        let (Some(frame), Some(resources), Some(passes)) =
            (self.frame, &self.resources, &self.passes)
        else {
            return;
        };

        resources.scene.clear(encoder, frame);
        passes.run(resources, self.external.as_ref(), encoder, frame);
    }
}

impl<H> Drop for Renderer<H>
where
    H: Hash + Eq,
{
    fn drop(&mut self) {
        info!("Deleting renderer");
    }
}

#[derive(Debug)]
struct Passes {
    global: BindGroup,
    geometry: BindGroup,
    passes: Vec<(Pass, ComputePass)>,
    iterations: gpu::AtrousIterations,
}

impl Passes {
    fn new(
        device: &wgpu::Device,
        shaders: &Shaders,
        resources: &FrameResources,
        external: Option<&ExternalBindings>,
        iterations: gpu::AtrousIterations,
    ) -> Result<Self> {
        debug!("Initializing passes");

        let global = resources.global_bind_group(device);
        let geometry = resources.geometry_bind_group(device);

        let shared = SharedBindGroups {
            global: &global,
            geometry: &geometry,
            external,
        };

        let passes = Pass::sequence(iterations)
            .into_iter()
            .map(|pass| -> Result<_> {
                let shader = shaders.get(pass)?;
                let desc = pass.describe(iterations);
                let bindings = resources.image_bindings(&desc);

                let compute = bindings
                    .iter()
                    .fold(
                        ComputePass::<gpu::PassParams>::builder(pass.name()),
                        |builder, (binding, item)| builder.bind_at(*binding, &**item),
                    )
                    .build(device, shared, shader);

                Ok((pass, compute))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            global,
            geometry,
            passes,
            iterations,
        })
    }

    fn run(
        &self,
        resources: &FrameResources,
        external: Option<&ExternalBindings>,
        encoder: &mut wgpu::CommandEncoder,
        frame: u32,
    ) {
        let alternate = gpu::Slot::current(frame) == gpu::Slot::B;
        let sizes = resources.sizes();

        let shared = SharedBindGroups {
            global: &self.global,
            geometry: &self.geometry,
            external,
        };

        for (pass, compute) in &self.passes {
            compute.run(shared, encoder, alternate, workgroups(*pass, sizes), pass.params());
        }
    }
}

/// Returns number of workgroups dispatched by given pass.
pub fn workgroups(pass: Pass, sizes: gpu::FrameSizes) -> UVec2 {
    let pixels = match pass {
        Pass::GradientReproject | Pass::GradientImage | Pass::GradientAtrous(_) => {
            sizes.gradient()
        }

        Pass::PathTracing => gpu::launch_size(sizes.render),

        Pass::Taa | Pass::ToneMappingHistogram | Pass::ToneMappingApply => sizes.output,

        Pass::ToneMappingCurve => return UVec2::ONE,

        Pass::SeedRng
        | Pass::PrimaryRays
        | Pass::Temporal
        | Pass::Atrous(_)
        | Pass::Compose => sizes.render,
    };

    UVec2::new(
        gpu::div_ceil(pixels.x, WORKGROUP_SIZE),
        gpu::div_ceil(pixels.y, WORKGROUP_SIZE),
    )
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;

    #[test]
    fn workgroups() {
        let sizes = gpu::FrameSizes::new(uvec2(1920, 1080), uvec2(3840, 2160));

        assert_eq!(uvec2(120, 68), super::workgroups(Pass::Compose, sizes));
        assert_eq!(uvec2(60, 68), super::workgroups(Pass::PathTracing, sizes));
        assert_eq!(uvec2(240, 135), super::workgroups(Pass::Taa, sizes));
        assert_eq!(UVec2::ONE, super::workgroups(Pass::ToneMappingCurve, sizes));
        assert_eq!(
            UVec2::new(
                gpu::div_ceil(sizes.gradient().x, WORKGROUP_SIZE),
                gpu::div_ceil(sizes.gradient().y, WORKGROUP_SIZE),
            ),
            super::workgroups(Pass::GradientAtrous(2), sizes)
        );
    }

    #[test]
    fn unprepared_renderer_has_no_output() {
        let target = Renderer::<u32>::new(Shaders::new());

        assert!(target.output().is_none());
        assert!(target.resources().is_none());
    }
}
