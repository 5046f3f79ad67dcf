use crate::layout::schema;

/// Description of a single console variable uploaded within the global UBO.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CvarDesc {
    pub name: &'static str,
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub doc: &'static str,
}

impl CvarDesc {
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

macro_rules! cvars {
    (
        $( $name:ident: $default:expr, [$min:expr, $max:expr], $doc:literal; )*
    ) => {
        schema! {
            /// Values of all console variables, in upload order.
            #[derive(Debug, PartialEq)]
            pub struct Cvars {
                $(
                    #[doc = $doc]
                    pub $name: f32,
                )*
            }
        }

        impl Default for Cvars {
            fn default() -> Self {
                Self {
                    $( $name: $default, )*
                }
            }
        }

        impl Cvars {
            pub fn get(&self, name: &str) -> Option<f32> {
                match name {
                    $( stringify!($name) => Some(self.$name), )*
                    _ => None,
                }
            }

            pub fn get_mut(&mut self, name: &str) -> Option<&mut f32> {
                match name {
                    $( stringify!($name) => Some(&mut self.$name), )*
                    _ => None,
                }
            }
        }

        /// All console variables, in the order they are laid out in
        /// [`Cvars`].
        pub const UBO_CVAR_LIST: &[CvarDesc] = &[
            $(
                CvarDesc {
                    name: stringify!($name),
                    default: $default,
                    min: $min,
                    max: $max,
                    doc: $doc,
                },
            )*
        ];
    };
}

const INF: f32 = f32::INFINITY;

cvars! {
    // Path tracer
    pt_caustics: 1.0, [0.0, 1.0], "Strength of caustics cast by water and glass";
    pt_direct_polygon_lights: 1.0, [0.0, 1.0], "Sample polygonal lights at primary surfaces";
    pt_direct_dyn_lights: 1.0, [0.0, 1.0], "Sample dynamic lights at primary surfaces";
    pt_direct_sun_light: 1.0, [0.0, 1.0], "Sample the sun disk at primary surfaces";
    pt_direct_roughness_threshold: 0.18, [0.0, 1.0], "Roughness below which direct specular is combined with BRDF sampling through MIS";
    pt_indirect_polygon_lights: 1.0, [0.0, 1.0], "Sample polygonal lights at bounce surfaces";
    pt_indirect_dyn_lights: 1.0, [0.0, 1.0], "Sample dynamic lights at bounce surfaces";
    pt_indirect_sun_light: 1.0, [0.0, 1.0], "Sample the sun disk at bounce surfaces";
    pt_num_bounce_rays: 1.0, [0.0, 1.0], "Bounce rays per pixel; fractions bounce a random subset of pixels";
    pt_light_stats: 1.0, [0.0, 1.0], "Bias light selection by visibility statistics of previous frames";
    pt_specular_mis: 1.0, [0.0, 1.0], "Combine light sampling and BRDF sampling of specular reflections";
    pt_specular_anti_flicker: 2.0, [0.0, 64.0], "Clamp of specular bounce radiance relative to its roughness";
    pt_diffuse_anti_firefly: 16.0, [0.0, INF], "Upper bound of indirect diffuse luminance";
    pt_fake_roughness_threshold: 0.2, [0.0, 1.0], "Roughness above which specular bounces skip emissive surfaces";
    pt_roughness_override: -1.0, [-1.0, 1.0], "Replaces roughness of all surfaces when non-negative";
    pt_metallic_override: -1.0, [-1.0, 1.0], "Replaces metalness of all surfaces when non-negative";
    pt_min_roughness: 0.02, [0.0, 1.0], "Lower bound of surface roughness";
    pt_ndf_trim: 0.9, [0.0, 1.0], "Trims the tail of the GGX distribution when sampling bounces";
    pt_toksvig: 1.0, [0.0, 1.0], "Strength of Toksvig roughness correction of filtered normal maps";
    pt_bump_scale: 1.0, [0.0, 2.0], "Global strength of normal maps";
    pt_texture_lod_bias: 0.0, [-8.0, 8.0], "Bias added to texture level-of-detail";
    pt_emissive_scale: 1.0, [0.0, 100.0], "Multiplier of emissive surfaces";
    pt_light_intensity: 1.0, [0.0, 100.0], "Multiplier of polygonal and dynamic lights";
    pt_sun_intensity: 1.0, [0.0, 100.0], "Multiplier of direct sunlight";
    pt_sun_disk_suppression: 1.0, [0.0, 1.0], "Hides the sun disk from primary rays of the dynamic sky";
    pt_envmap_brightness: 1.0, [0.0, 100.0], "Multiplier of the environment";
    pt_envmap_saturation: 0.9, [0.0, 1.0], "Saturation of the static environment cubemap";
    pt_water_density: 0.5, [0.0, 16.0], "Extinction coefficient of water for rays passing through it";
    pt_glass_tint: 1.0, [0.0, 1.0], "How much glass tints light that passes through it";
    pt_caustic_contrast: 1.0, [0.0, 4.0], "Contrast of the caustic focus pattern";
    pt_dyn_light_radius_min: 1.0, [0.0, 64.0], "Lower bound of dynamic lights' radius";
    pt_shadow_bias: 0.01, [0.0, 1.0], "Offset of secondary ray origins along the geometric normal";
    pt_max_ray_distance: 10000.0, [1.0, INF], "Length of primary and bounce rays";
    pt_sky_lights: 1.0, [0.0, 1.0], "Sample sky portals as polygonal lights";
    pt_show_light_stats: 0.0, [0.0, 1.0], "Visualizes light-statistics factors instead of lighting";

    // Filters
    flt_enable: 1.0, [0.0, 1.0], "Enables the denoiser";
    flt_fixed_albedo: 0.0, [0.0, 1.0], "Replaces albedo with a constant when non-zero";
    flt_show_gradients: 0.0, [0.0, 1.0], "Overlays temporal gradients";
    flt_grad_scale: 4.0, [0.0, 64.0], "Brightness of the gradient overlay";
    flt_temporal_lf: 1.0, [0.0, 1.0], "Enables temporal accumulation of the LF channel";
    flt_temporal_hf: 1.0, [0.0, 1.0], "Enables temporal accumulation of the HF channel";
    flt_temporal_spec: 1.0, [0.0, 1.0], "Enables temporal accumulation of the specular channel";
    flt_antilag_lf: 0.2, [0.0, 64.0], "Anti-lag strength of the LF channel";
    flt_antilag_hf: 2.0, [0.0, 64.0], "Anti-lag strength of the HF channel";
    flt_antilag_spec: 2.0, [0.0, 64.0], "Anti-lag strength of the specular channel";
    flt_min_alpha_color_lf: 0.01, [0.0, 1.0], "Minimum blend factor of new LF samples";
    flt_min_alpha_color_hf: 0.02, [0.0, 1.0], "Minimum blend factor of new HF samples";
    flt_min_alpha_color_spec: 0.01, [0.0, 1.0], "Minimum blend factor of new specular samples";
    flt_min_alpha_moments_hf: 0.01, [0.0, 1.0], "Minimum blend factor of HF moments";
    flt_history_length_max: 256.0, [1.0, 1024.0], "Upper bound of temporal history length";
    flt_reproject_depth: 0.1, [0.0, 1.0], "Relative depth difference above which history is rejected";
    flt_reproject_normal: 0.9, [0.0, 1.0], "Normal similarity below which history is rejected";
    flt_atrous_lf: 4.0, [0.0, 8.0], "Number of a-trous iterations of the LF channel";
    flt_atrous_hf: 4.0, [0.0, 8.0], "Number of a-trous iterations of the HF channel";
    flt_atrous_spec: 3.0, [0.0, 8.0], "Number of a-trous iterations of the specular channel";
    flt_atrous_depth: 0.5, [0.0, 20.0], "Depth edge-stopping sensitivity";
    flt_atrous_normal_lf: 8.0, [0.0, 256.0], "Normal edge-stopping exponent of the LF channel";
    flt_atrous_normal_hf: 32.0, [0.0, 256.0], "Normal edge-stopping exponent of the HF channel";
    flt_atrous_normal_spec: 1.0, [0.0, 256.0], "Normal edge-stopping exponent of the specular channel";
    flt_atrous_lum_hf: 16.0, [0.0, 256.0], "Luminance edge-stopping width of the HF channel, in standard deviations";
    flt_atrous_lum_spec: 16.0, [0.0, 256.0], "Luminance edge-stopping width of the specular channel";
    flt_atrous_roughness_spec: 4.0, [0.0, 64.0], "Roughness edge-stopping sensitivity of the specular channel";
    flt_atrous_deflicker_lf: 2.0, [0.0, 16.0], "Limits LF taps brighter than the center by this factor";
    flt_scale_lf: 1.0, [0.0, 16.0], "Multiplier of the LF channel in the composed image";
    flt_scale_hf: 1.0, [0.0, 16.0], "Multiplier of the HF channel in the composed image";
    flt_scale_spec: 1.0, [0.0, 16.0], "Multiplier of the specular channel in the composed image";
    flt_scale_transparent: 1.0, [0.0, 16.0], "Multiplier of emissive and transparent surfaces in the composed image";
    flt_taa: 1.0, [0.0, 2.0], "Temporal anti-aliasing: 0 off, 1 regular, 2 upscaling";
    flt_taa_variance: 1.0, [0.0, 8.0], "Width of the history clipping box, in standard deviations";
    flt_taa_anti_sparkle: 0.25, [0.0, 1.0], "Suppression of isolated bright pixels";
    flt_taa_history_weight: 0.95, [0.0, 0.999], "Blend factor of the clipped history";

    // Tone mapping
    tm_enable: 1.0, [0.0, 1.0], "Enables the tone curve";
    tm_exposure_bias: 0.0, [-16.0, 16.0], "Exposure compensation, in stops";
    tm_exposure_speed_up: 2.0, [0.0, 50.0], "Adaptation speed when the scene gets brighter";
    tm_exposure_speed_down: 1.0, [0.0, 50.0], "Adaptation speed when the scene gets darker";
    tm_low_percentile: 70.0, [0.0, 100.0], "Lower bound of the metered histogram window, in percent";
    tm_high_percentile: 90.0, [0.0, 100.0], "Upper bound of the metered histogram window, in percent";
    tm_min_luminance: 0.0002, [0.0, INF], "Lowest luminance the exposure adapts to";
    tm_max_luminance: 1.0, [0.0, INF], "Highest luminance the exposure adapts to";
    tm_key_value: 0.18, [0.001, 1.0], "Luminance the metered window is exposed to";
    tm_knee_start: 0.6, [0.0, 1.0], "Output value above which the tone curve starts to compress";
    tm_hdr_peak_nits: 800.0, [80.0, 10000.0], "Peak brightness of the HDR display";
    tm_hdr_paper_white_nits: 200.0, [80.0, 1000.0], "Brightness of diffuse white on the HDR display";
    tm_debug: 0.0, [0.0, 1.0], "Overlays the luminance histogram";
}
