//! Chart-to-image homography
//!
//! Estimation uses the Direct Linear Transform with Hartley normalization:
//! the solution is the eigenvector of AᵀA with the smallest eigenvalue.

use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};

use crate::error::{JudgeError, Result};

const EPS: f64 = 1e-12;

/// Projective mapping from normalized chart coordinates to image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Wrap a raw matrix, rejecting singular or non-finite ones
    pub fn from_matrix(matrix: Matrix3<f64>) -> Result<Self> {
        if !matrix.iter().all(|v| v.is_finite()) {
            return Err(JudgeError::internal("homography has non-finite entries"));
        }
        let scale = matrix[(2, 2)];
        let matrix = if scale.abs() > EPS { matrix / scale } else { matrix };
        if matrix.determinant().abs() < EPS {
            return Err(JudgeError::internal("homography is singular"));
        }
        Ok(Self { matrix })
    }

    /// Fit H such that `dst ≈ project(H, src)` from four or more pairs
    ///
    /// # Errors
    ///
    /// Returns `JudgeError::Internal` when there are fewer than four pairs,
    /// the slices differ in length, or the fitted matrix is singular.
    pub fn from_correspondences(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self> {
        let n = src.len();
        if n != dst.len() {
            return Err(JudgeError::internal(format!(
                "homography fit needs matching point sets, got {} and {}",
                n,
                dst.len()
            )));
        }
        if n < 4 {
            return Err(JudgeError::internal(format!(
                "homography fit needs at least 4 points, got {}",
                n
            )));
        }

        let (t_src, src_n) = normalize_points(src);
        let (t_dst, dst_n) = normalize_points(dst);

        let mut a = DMatrix::zeros(2 * n, 9);
        for i in 0..n {
            let [sx, sy] = src_n[i];
            let [dx, dy] = dst_n[i];

            a[(2 * i, 3)] = -sx;
            a[(2 * i, 4)] = -sy;
            a[(2 * i, 5)] = -1.0;
            a[(2 * i, 6)] = dy * sx;
            a[(2 * i, 7)] = dy * sy;
            a[(2 * i, 8)] = dy;

            a[(2 * i + 1, 0)] = sx;
            a[(2 * i + 1, 1)] = sy;
            a[(2 * i + 1, 2)] = 1.0;
            a[(2 * i + 1, 6)] = -dx * sx;
            a[(2 * i + 1, 7)] = -dx * sy;
            a[(2 * i + 1, 8)] = -dx;
        }

        let ata = a.transpose() * &a;
        let eig = SymmetricEigen::new(ata);
        let min_idx = eig
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let h = eig.eigenvectors.column(min_idx);
        let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

        let t_dst_inv = t_dst
            .try_inverse()
            .ok_or_else(|| JudgeError::internal("point normalization not invertible"))?;
        Self::from_matrix(t_dst_inv * h_norm * t_src)
    }

    /// Least-squares affine fit from three or more pairs
    ///
    /// Better conditioned than a projective fit when the points cover a small
    /// part of the plane they are extrapolated over.
    ///
    /// # Errors
    ///
    /// Returns `JudgeError::Internal` when there are fewer than three pairs,
    /// the slices differ in length, or the source points are collinear.
    pub fn affine_from_correspondences(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self> {
        let n = src.len();
        if n != dst.len() {
            return Err(JudgeError::internal(format!(
                "affine fit needs matching point sets, got {} and {}",
                n,
                dst.len()
            )));
        }
        if n < 3 {
            return Err(JudgeError::internal(format!(
                "affine fit needs at least 3 points, got {}",
                n
            )));
        }

        let cx = src.iter().map(|p| p[0]).sum::<f64>() / n as f64;
        let cy = src.iter().map(|p| p[1]).sum::<f64>() / n as f64;

        let mut xtx = Matrix3::zeros();
        let mut xtu = Vector3::zeros();
        let mut xtv = Vector3::zeros();
        for (s, d) in src.iter().zip(dst) {
            let row = Vector3::new(s[0] - cx, s[1] - cy, 1.0);
            xtx += row * row.transpose();
            xtu += row * d[0];
            xtv += row * d[1];
        }
        let inv = xtx
            .try_inverse()
            .ok_or_else(|| JudgeError::internal("affine fit points are collinear"))?;
        let u = inv * xtu;
        let v = inv * xtv;

        let fitted = Matrix3::new(u[0], u[1], u[2], v[0], v[1], v[2], 0.0, 0.0, 1.0);
        let center = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);
        Self::from_matrix(fitted * center)
    }

    /// Map a chart point to image pixels; `None` at the line at infinity
    pub fn project(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if !p[2].is_finite() || p[2].abs() < EPS {
            return None;
        }
        let out = [p[0] / p[2], p[1] / p[2]];
        out.iter().all(|v| v.is_finite()).then_some(out)
    }

    /// Project a list of points, failing if any lands at infinity
    pub fn project_all(&self, points: &[[f64; 2]]) -> Option<Vec<[f64; 2]>> {
        points.iter().map(|p| self.project(p[0], p[1])).collect()
    }

    pub fn inverse(&self) -> Result<Homography> {
        let inv = self
            .matrix
            .try_inverse()
            .ok_or_else(|| JudgeError::internal("homography is not invertible"))?;
        Self::from_matrix(inv)
    }

    /// Re-express the mapping for an image scaled by (`sx`, `sy`)
    pub fn rescaled(&self, sx: f64, sy: f64) -> Homography {
        let scale = Matrix3::new(sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0);
        Homography {
            matrix: scale * self.matrix,
        }
    }

    /// Compose: apply `self` first, then `after`
    pub fn then(&self, after: &Homography) -> Homography {
        Homography {
            matrix: after.matrix * self.matrix,
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Row-major matrix entries
    pub fn to_array(&self) -> [[f64; 3]; 3] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }
}

/// Translate centroid to origin and scale mean distance to √2
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > EPS {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();
    (t, normalized)
}

/// Signed-area magnitude of a simple polygon (shoelace)
pub fn polygon_area(points: &[[f64; 2]]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..points.len() {
        let [x0, y0] = points[i];
        let [x1, y1] = points[(i + 1) % points.len()];
        twice += x0 * y1 - x1 * y0;
    }
    (twice * 0.5).abs()
}
