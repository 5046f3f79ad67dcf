//! Auto-exposure and the tone curve: a luminance histogram of the TAA output
//! gets metered within a percentile window, the eye adapts towards it over
//! time and the exposed image is compressed above a knee.

use glam::{UVec2, Vec3, Vec4, Vec4Swizzles};

use crate::layout::schema;
use crate::{GlobalUbo, Image, Vec3Ext};

pub const HISTOGRAM_BINS: usize = 128;

/// Range of the histogram, in log2 of luminance.
pub const HISTOGRAM_MIN_LOG_LUM: f32 = -10.0;
pub const HISTOGRAM_MAX_LOG_LUM: f32 = 10.0;

/// Size (in pixels) of a single histogram bar of the debug overlay.
const DEBUG_BAR_WIDTH: u32 = 2;
const DEBUG_HEIGHT: u32 = 64;

schema! {
    /// Histogram of log2 luminance.
    #[derive(Debug, PartialEq, Eq)]
    pub struct LuminanceHistogram {
        pub bins: [u32; HISTOGRAM_BINS],
    }
}

impl Default for LuminanceHistogram {
    fn default() -> Self {
        Self {
            bins: [0; HISTOGRAM_BINS],
        }
    }
}

impl LuminanceHistogram {
    /// Returns bin of given luminance; black pixels aren't counted.
    pub fn bin(luminance: f32) -> Option<usize> {
        if luminance <= 0.0 || !luminance.is_finite() {
            return None;
        }

        let t = (luminance.log2() - HISTOGRAM_MIN_LOG_LUM)
            / (HISTOGRAM_MAX_LOG_LUM - HISTOGRAM_MIN_LOG_LUM);

        Some(((t * HISTOGRAM_BINS as f32).max(0.0) as usize).min(HISTOGRAM_BINS - 1))
    }

    /// Returns log2 of the luminance at the center of given bin.
    pub fn bin_log_luminance(bin: usize) -> f32 {
        HISTOGRAM_MIN_LOG_LUM
            + (bin as f32 + 0.5) / HISTOGRAM_BINS as f32
                * (HISTOGRAM_MAX_LOG_LUM - HISTOGRAM_MIN_LOG_LUM)
    }

    pub fn add(&mut self, color: Vec3) {
        if let Some(bin) = Self::bin(color.luma()) {
            self.bins[bin] += 1;
        }
    }

    pub fn from_image(image: &Image) -> Self {
        let mut this = Self::default();

        for color in image.data() {
            this.add(color.xyz());
        }

        this
    }

    pub fn total(&self) -> u32 {
        self.bins.iter().sum()
    }

    /// Returns the average luminance of pixels between given percentiles
    /// (`0..=100`); `None` if the histogram is empty.
    pub fn average(&self, low: f32, high: f32) -> Option<f32> {
        let total = self.total() as f32;

        if total == 0.0 {
            return None;
        }

        let low = total * low.clamp(0.0, 100.0) / 100.0;
        let high = (total * high.clamp(0.0, 100.0) / 100.0).max(low);
        let mut cum = 0.0;
        let mut sum = 0.0;
        let mut weight = 0.0;
        let mut fallback = None;

        for (bin, &count) in self.bins.iter().enumerate() {
            let count = count as f32;
            let overlap = (cum + count).clamp(low, high) - cum.clamp(low, high);

            if fallback.is_none() && count > 0.0 && cum + count >= low {
                fallback = Some(bin);
            }

            sum += overlap * Self::bin_log_luminance(bin);
            weight += overlap;
            cum += count;
        }

        if weight > 0.0 {
            Some((sum / weight).exp2())
        } else {
            fallback.map(|bin| Self::bin_log_luminance(bin).exp2())
        }
    }
}

schema! {
    /// Eye-adaptation state, carried from frame to frame.
    #[derive(Debug, Default, PartialEq)]
    pub struct ToneMappingState {
        /// Luminance the eye is currently adapted to; zero before the first
        /// frame
        pub adapted_luminance: f32,

        /// Luminance metered this frame
        pub target_luminance: f32,

        pub exposure: f32,
        pub _pad: f32,
    }
}

/// Meters the histogram and moves the adaptation towards the result.
pub fn tone_mapping_curve(
    ubo: &GlobalUbo,
    histogram: &LuminanceHistogram,
    prev: &ToneMappingState,
) -> ToneMappingState {
    let cvars = &ubo.cvars;

    let target = histogram
        .average(cvars.tm_low_percentile, cvars.tm_high_percentile)
        .or((prev.adapted_luminance > 0.0).then_some(prev.adapted_luminance))
        .unwrap_or(cvars.tm_key_value)
        .clamp(cvars.tm_min_luminance, cvars.tm_max_luminance.max(cvars.tm_min_luminance));

    let adapted = if prev.adapted_luminance > 0.0 {
        let speed = if target > prev.adapted_luminance {
            cvars.tm_exposure_speed_up
        } else {
            cvars.tm_exposure_speed_down
        };

        let t = 1.0 - (-ubo.frame_time.max(0.0) * speed).exp();

        prev.adapted_luminance + (target - prev.adapted_luminance) * t
    } else {
        target
    };

    let adapted = adapted.max(1e-6);

    ToneMappingState {
        adapted_luminance: adapted,
        target_luminance: target,
        exposure: cvars.tm_key_value / adapted * cvars.tm_exposure_bias.exp2(),
        _pad: 0.0,
    }
}

/// Identity below `knee`, exponential shoulder approaching `1.0` above it.
pub fn knee_curve(x: f32, knee: f32) -> f32 {
    if x <= knee {
        return x;
    }

    if knee >= 1.0 {
        return x.min(1.0);
    }

    knee + (1.0 - knee) * (1.0 - (-(x - knee) / (1.0 - knee)).exp())
}

/// Exposes and tone-maps a color; with HDR output the curve is stretched up
/// to the display's peak brightness (relative to paper white).
pub fn tone_map(ubo: &GlobalUbo, state: &ToneMappingState, color: Vec3) -> Vec3 {
    let cvars = &ubo.cvars;
    let color = (color.max(Vec3::ZERO) * state.exposure).sanitize();

    if cvars.tm_enable == 0.0 {
        return color;
    }

    let lum = color.luma();

    if lum <= 0.0 {
        return Vec3::ZERO;
    }

    if ubo.hdr_enabled != 0 {
        let peak = cvars.tm_hdr_peak_nits / cvars.tm_hdr_paper_white_nits;
        let mapped = peak * knee_curve(lum / peak, cvars.tm_knee_start);

        (color * (mapped / lum)).min(Vec3::splat(peak))
    } else {
        let mapped = knee_curve(lum, cvars.tm_knee_start);

        (color * (mapped / lum)).min(Vec3::ONE)
    }
}

/// Histogram overlay drawn in the bottom-left corner of the final image;
/// bins within the metered window are drawn in yellow.
pub fn tone_mapping_debug(
    ubo: &GlobalUbo,
    histogram: &LuminanceHistogram,
    pixel: UVec2,
    size: UVec2,
) -> Option<Vec3> {
    let bin = (pixel.x / DEBUG_BAR_WIDTH) as usize;

    if bin >= HISTOGRAM_BINS || pixel.y >= size.y || size.y - pixel.y > DEBUG_HEIGHT {
        return None;
    }

    let max = histogram.bins.iter().copied().max().unwrap_or(0).max(1) as f32;
    let height = histogram.bins[bin] as f32 / max * DEBUG_HEIGHT as f32;
    let y = (size.y - pixel.y) as f32;

    if y > height {
        return Some(Vec3::splat(0.1));
    }

    let total = histogram.total() as f32;
    let before: u32 = histogram.bins[..bin].iter().sum();
    let pct = before as f32 / total.max(1.0) * 100.0;
    let cvars = &ubo.cvars;

    if pct >= cvars.tm_low_percentile && pct <= cvars.tm_high_percentile {
        Some(Vec3::new(1.0, 1.0, 0.0))
    } else {
        Some(Vec3::splat(0.6))
    }
}

/// Produces the final pixel.
pub fn tone_mapping_apply(
    ubo: &GlobalUbo,
    histogram: &LuminanceHistogram,
    state: &ToneMappingState,
    color: Vec4,
    pixel: UVec2,
    size: UVec2,
) -> Vec4 {
    if ubo.cvars.tm_debug != 0.0 {
        if let Some(overlay) = tone_mapping_debug(ubo, histogram, pixel, size) {
            return overlay.extend(1.0);
        }
    }

    tone_map(ubo, state, color.xyz()).extend(1.0)
}
