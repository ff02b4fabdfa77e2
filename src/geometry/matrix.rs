//! Flat 4x4 transforms as exchanged with the tracker and the renderer.
//!
//! Poses and projections travel as 16 `f64` values in OpenGL column-major
//! order (translation in slots 12..14). Pose smoothing and the projection
//! correction below operate on the flat slots directly, so nothing in the
//! pipeline ever transposes a matrix.

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

/// A 4x4 transform as a flat array of 16 values, column-major.
///
/// Serializes as a bare 16-element array, which is the wire layout the
/// tracker uses for both pose and projection payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformMatrix(pub [f64; 16]);

impl TransformMatrix {
    /// The all-zero matrix. Interpolation state starts here so the first
    /// detected pose eases in instead of snapping.
    pub const ZERO: Self = Self([0.0; 16]);

    /// The identity transform.
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn from_array(values: [f64; 16]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64; 16] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64; 16] {
        &mut self.0
    }

    /// Translation components (slots 12..14).
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.0[12], self.0[13], self.0[14])
    }

    /// View as an `nalgebra` matrix for hosts that compose transforms.
    pub fn to_matrix4(&self) -> Matrix4<f64> {
        Matrix4::from_column_slice(&self.0)
    }

    pub fn from_matrix4(matrix: &Matrix4<f64>) -> Self {
        let mut values = [0.0; 16];
        values.copy_from_slice(matrix.as_slice());
        Self(values)
    }
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::ops::Index<usize> for TransformMatrix {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl std::ops::IndexMut<usize> for TransformMatrix {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

/// Corrects a projection matrix for letterbox padding.
///
/// The tracker derives its projection from the full processed buffer, but
/// the camera image only occupies the scaled region inside it. Scaling the
/// x row by `ratio_w = processed_width / scaled_width` and the y row by
/// `ratio_h = processed_height / scaled_height` makes the projection match
/// the visible image again:
///
/// ```text
/// slots {0, 4, 8, 12} *= ratio_w
/// slots {1, 5, 9, 13} *= ratio_h
/// ```
///
/// No other entries change.
pub fn correct_projection(projection: &mut TransformMatrix, ratio_w: f64, ratio_h: f64) {
    for i in [0, 4, 8, 12] {
        projection[i] *= ratio_w;
    }
    for i in [1, 5, 9, 13] {
        projection[i] *= ratio_h;
    }
}
