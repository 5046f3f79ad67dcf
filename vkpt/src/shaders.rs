use fxhash::FxHashMap;

use crate::gpu;
use crate::{Error, Result};

/// Compiled compute shaders, keyed by [`gpu::Pass::shader()`].
///
/// Compiling them is up to the caller; the renderer only looks them up when
/// building its passes.
#[derive(Debug, Default)]
pub struct Shaders {
    shaders: FxHashMap<&'static str, (wgpu::ShaderModule, &'static str)>,
}

impl Shaders {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers shader for given pass-shader name; the shader's entry point
    /// is `entry_point`.
    pub fn insert(
        &mut self,
        name: &'static str,
        module: wgpu::ShaderModule,
        entry_point: &'static str,
    ) -> &mut Self {
        self.shaders.insert(name, (module, entry_point));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shaders.contains_key(name)
    }

    pub fn get(&self, pass: gpu::Pass) -> Result<&(wgpu::ShaderModule, &'static str)> {
        self.shaders
            .get(pass.shader())
            .ok_or_else(|| Error::MissingShader(pass.shader().into()))
    }

    /// Returns names of shaders required by given passes that haven't been
    /// registered.
    pub fn missing(&self, passes: &[gpu::Pass]) -> Vec<&'static str> {
        let mut missing: Vec<_> = passes
            .iter()
            .map(|pass| pass.shader())
            .filter(|name| !self.contains(name))
            .collect();

        missing.dedup();
        missing
    }
}
