use glam::{uvec2, Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::layout::schema;
use crate::Cvars;

/// Kind of environment visible where rays miss the geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvironmentType {
    None = 0,

    /// Static cubemap
    Static = 1,

    /// Dynamic (physical) sky with a sun
    Dynamic = 2,
}

impl EnvironmentType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Static,
            2 => Self::Dynamic,
            _ => Self::None,
        }
    }
}

schema! {
    /// Per-frame constants, followed by the console variables.
    #[derive(Debug)]
    pub struct GlobalUbo {
        pub view_proj: Mat4,
        pub inv_view_proj: Mat4,
        pub prev_view_proj: Mat4,
        pub prev_inv_view_proj: Mat4,

        /// xyz: camera position
        pub cam_pos: Vec4,

        /// xyz: previous frame's camera position
        pub prev_cam_pos: Vec4,

        /// xyz: direction towards the sun, w: cosine of the sun's angular
        /// radius
        pub sun_direction: Vec4,

        /// rgb: sun color, w: 1 when the sun is visible
        pub sun_color: Vec4,

        /// Sub-pixel offset of primary rays, in pixels
        pub sub_pixel_jitter: Vec2,

        pub width: u32,
        pub height: u32,
        pub taa_output_width: u32,
        pub taa_output_height: u32,
        pub current_frame_idx: u32,

        /// Which checkerboard field is traced this frame
        pub pt_swap_checkerboard: u32,

        pub environment_type: u32,
        pub rng_salt: u32,
        pub num_instances: u32,
        pub num_light_polygons: u32,
        pub num_dyn_lights: u32,
        pub num_clusters: u32,

        /// Seconds since the previous frame
        pub frame_time: f32,

        pub hdr_enabled: u32,

        pub cvars: Cvars,
    }
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY,
            inv_view_proj: Mat4::IDENTITY,
            prev_view_proj: Mat4::IDENTITY,
            prev_inv_view_proj: Mat4::IDENTITY,
            cam_pos: Vec4::ZERO,
            prev_cam_pos: Vec4::ZERO,
            sun_direction: Vec4::new(0.0, 0.0, 1.0, 1.0),
            sun_color: Vec4::ZERO,
            sub_pixel_jitter: Vec2::ZERO,
            width: 0,
            height: 0,
            taa_output_width: 0,
            taa_output_height: 0,
            current_frame_idx: 0,
            pt_swap_checkerboard: 0,
            environment_type: 0,
            rng_salt: 0,
            num_instances: 0,
            num_light_polygons: 0,
            num_dyn_lights: 0,
            num_clusters: 0,
            frame_time: 0.0,
            hdr_enabled: 0,
            cvars: Default::default(),
        }
    }
}

impl GlobalUbo {
    pub fn size(&self) -> UVec2 {
        uvec2(self.width, self.height)
    }

    pub fn output_size(&self) -> UVec2 {
        uvec2(self.taa_output_width, self.taa_output_height)
    }

    pub fn environment(&self) -> EnvironmentType {
        EnvironmentType::from_u32(self.environment_type)
    }

    pub fn camera_position(&self) -> Vec3 {
        self.cam_pos.xyz()
    }

    pub fn prev_camera_position(&self) -> Vec3 {
        self.prev_cam_pos.xyz()
    }

    pub fn sun_dir(&self) -> Vec3 {
        self.sun_direction.xyz()
    }

    pub fn sun_cos_radius(&self) -> f32 {
        self.sun_direction.w
    }

    pub fn is_sun_visible(&self) -> bool {
        self.sun_color.w > 0.0
    }

    /// Index of the light-count snapshot uploaded for this frame.
    pub fn light_counts_slot(&self) -> u32 {
        self.current_frame_idx % crate::LIGHT_COUNT_HISTORY
    }

    /// Index of the light-count snapshot used by the previous frame.
    pub fn prev_light_counts_slot(&self) -> u32 {
        (self.current_frame_idx + crate::LIGHT_COUNT_HISTORY - 1)
            % crate::LIGHT_COUNT_HISTORY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HasSchema;

    #[test]
    fn layout() {
        let schema = GlobalUbo::SCHEMA;

        assert_eq!(Ok(()), schema.validate());
        assert_eq!(core::mem::size_of::<GlobalUbo>(), schema.size());
        assert_eq!(0, schema.size() % 16);
    }

    #[test]
    fn cvars_come_last() {
        let schema = GlobalUbo::SCHEMA;
        let last = schema.fields.last().unwrap();

        assert_eq!("cvars", last.name);

        assert_eq!(
            Some(schema.size() - core::mem::size_of::<Cvars>()),
            schema.offset_of("cvars")
        );
    }

    #[test]
    fn glsl_declares_cvars_first() {
        let glsl = GlobalUbo::SCHEMA.glsl();
        let cvars = glsl.find("struct Cvars").unwrap();
        let ubo = glsl.find("struct GlobalUbo").unwrap();

        assert!(cvars < ubo);
        assert!(glsl.contains("    float pt_caustics;\n"));
        assert!(glsl.contains("    Cvars cvars;\n};\n"));
    }

    #[test]
    fn light_count_slots() {
        let mut ubo = GlobalUbo::default();

        ubo.current_frame_idx = 0;
        assert_eq!(0, ubo.light_counts_slot());
        assert_eq!(2, ubo.prev_light_counts_slot());

        ubo.current_frame_idx = 4;
        assert_eq!(1, ubo.light_counts_slot());
        assert_eq!(0, ubo.prev_light_counts_slot());
    }
}
