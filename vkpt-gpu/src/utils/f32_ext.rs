pub trait F32Ext
where
    Self: Sized,
{
    fn sqr(self) -> Self;
    fn saturate(self) -> Self;
    fn inverse_sqrt(self) -> Self;

    /// Replaces NaNs and infinities with zero.
    fn sanitize(self) -> Self;
}

impl F32Ext for f32 {
    fn sqr(self) -> Self {
        self * self
    }

    fn saturate(self) -> Self {
        self.clamp(0.0, 1.0)
    }

    fn inverse_sqrt(self) -> Self {
        1.0 / self.max(crate::VKPT_EPSILON).sqrt()
    }

    fn sanitize(self) -> Self {
        if self.is_finite() {
            self
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize() {
        assert_eq!(0.0, f32::NAN.sanitize());
        assert_eq!(0.0, f32::INFINITY.sanitize());
        assert_eq!(0.0, f32::NEG_INFINITY.sanitize());
        assert_eq!(1.5, 1.5.sanitize());
    }

    #[test]
    fn inverse_sqrt_of_zero_is_finite() {
        assert!(0.0f32.inverse_sqrt().is_finite());
    }
}
