//! Pose smoothing between tracker responses.
//!
//! The tracker reports poses at round-trip cadence with detection jitter;
//! the render loop runs at display cadence. The interpolator bridges the
//! two with a per-component exponential low-pass filter and a freeze-on-loss
//! policy: a momentary dropout hides the object but never snaps it away.

use crate::geometry::TransformMatrix;

/// Default convergence divisor. Larger values converge slower and smoother.
pub const DEFAULT_INTERPOLATION_FACTOR: f64 = 24.0;

/// Smoothed pose state, owned by the render side and updated once per tick.
///
/// Each tick moves every matrix component a fixed fraction of the way to the
/// latest target:
///
/// ```text
/// current[i] += (target[i] - current[i]) / factor
/// ```
///
/// The step is per tick, not per elapsed second, so effective smoothing
/// speed follows the display refresh rate.
#[derive(Debug, Clone)]
pub struct PoseInterpolator {
    current: TransformMatrix,
    visible: bool,
    factor: f64,
}

impl PoseInterpolator {
    /// Creates an interpolator starting hidden at the zero transform, so the
    /// first detected pose eases in from the origin instead of snapping.
    pub fn new(factor: f64) -> Self {
        Self {
            current: TransformMatrix::ZERO,
            visible: false,
            factor: if factor >= 1.0 { factor } else { 1.0 },
        }
    }

    /// Advances the smoothed state one tick toward `target`.
    ///
    /// `None` means the marker was not detected: visibility drops and the
    /// smoothed transform stays frozen at its last value.
    pub fn update(&mut self, target: Option<&TransformMatrix>) {
        match target {
            None => {
                self.visible = false;
            }
            Some(target) => {
                self.visible = true;
                for i in 0..16 {
                    let delta = target[i] - self.current[i];
                    self.current[i] += delta / self.factor;
                }
            }
        }
    }

    /// The smoothed transform. Meaningful for rendering only while visible.
    pub fn current(&self) -> &TransformMatrix {
        &self.current
    }

    /// Whether the tracked object should be rendered this tick.
    pub fn visible(&self) -> bool {
        self.visible
    }
}

impl Default for PoseInterpolator {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPOLATION_FACTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pose_with(slot: usize, value: f64) -> TransformMatrix {
        let mut m = TransformMatrix::ZERO;
        m[slot] = value;
        m
    }

    #[test]
    fn test_first_tick_moves_one_twenty_fourth() {
        let mut interp = PoseInterpolator::new(24.0);
        let target = pose_with(0, 240.0);

        interp.update(Some(&target));
        assert!(interp.visible());
        assert_relative_eq!(interp.current()[0], 10.0);
    }

    #[test]
    fn test_error_strictly_decreases_toward_target() {
        let mut interp = PoseInterpolator::new(24.0);
        let target = pose_with(5, -100.0);

        let mut prev_error = f64::INFINITY;
        for _ in 0..200 {
            interp.update(Some(&target));
            let error = (interp.current()[5] - target[5]).abs();
            assert!(error < prev_error, "error did not decrease: {error}");
            prev_error = error;
        }
        assert!(prev_error < 0.05);
    }

    #[test]
    fn test_every_component_converges_independently() {
        let mut values = [0.0; 16];
        for (i, v) in values.iter_mut().enumerate() {
            *v = (i as f64 - 8.0) * 3.5;
        }
        let target = TransformMatrix::from_array(values);

        let mut interp = PoseInterpolator::new(24.0);
        for _ in 0..500 {
            interp.update(Some(&target));
        }
        for i in 0..16 {
            assert_relative_eq!(interp.current()[i], target[i], epsilon = 1e-3);
        }
    }

    #[test]
    fn test_zero_target_from_zero_state_is_a_no_op() {
        let mut interp = PoseInterpolator::new(24.0);
        interp.update(Some(&TransformMatrix::ZERO));

        assert!(interp.visible());
        assert_eq!(*interp.current(), TransformMatrix::ZERO);
    }

    #[test]
    fn test_dropout_hides_and_freezes() {
        let mut interp = PoseInterpolator::new(24.0);
        let target = pose_with(12, 48.0);
        interp.update(Some(&target));
        interp.update(Some(&target));
        let before = *interp.current();

        interp.update(None);
        assert!(!interp.visible());
        assert_eq!(*interp.current(), before);

        // Repeated dropouts stay frozen at the same value.
        interp.update(None);
        assert_eq!(*interp.current(), before);
    }

    #[test]
    fn test_smoothing_resumes_from_frozen_state_after_dropout() {
        let mut interp = PoseInterpolator::new(24.0);
        let target = pose_with(0, 240.0);
        interp.update(Some(&target));
        interp.update(None);
        let frozen = interp.current()[0];

        interp.update(Some(&target));
        assert!(interp.visible());
        assert_relative_eq!(
            interp.current()[0],
            frozen + (240.0 - frozen) / 24.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_factor_below_one_is_clamped() {
        let mut interp = PoseInterpolator::new(0.0);
        let target = pose_with(3, 7.0);
        interp.update(Some(&target));
        assert_relative_eq!(interp.current()[3], 7.0);
    }
}
