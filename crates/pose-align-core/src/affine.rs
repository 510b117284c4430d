use nalgebra::{DMatrix, Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Errors produced when interpreting a dynamically sized matrix as an affine transform.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffineError {
    #[error("affine matrix must be 2x3 or 3x3 (got {rows}x{cols})")]
    Shape { rows: usize, cols: usize },
}

/// 2D affine transform in homogeneous form: `dst = M * [x, y, 1]^T`.
///
/// The bottom row is always `[0, 0, 1]`. Serialized as the top two rows,
/// `[[m00, m01, m02], [m10, m11, m12]]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 2]", into = "[[f64; 3]; 2]")]
pub struct AffineTransform {
    m: Matrix3<f64>,
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Build from the top two rows; the bottom row is fixed to `[0, 0, 1]`.
    pub fn from_rows(rows: [[f64; 3]; 2]) -> Self {
        Self {
            m: Matrix3::new(
                rows[0][0], rows[0][1], rows[0][2], //
                rows[1][0], rows[1][1], rows[1][2], //
                0.0, 0.0, 1.0,
            ),
        }
    }

    pub fn to_rows(&self) -> [[f64; 3]; 2] {
        [
            [self.m[(0, 0)], self.m[(0, 1)], self.m[(0, 2)]],
            [self.m[(1, 0)], self.m[(1, 1)], self.m[(1, 2)]],
        ]
    }

    /// Pure translation by `(tx, ty)`.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::from_rows([[1.0, 0.0, tx], [0.0, 1.0, ty]])
    }

    /// Interpret a 2x3 or 3x3 matrix as an affine transform.
    ///
    /// Only the top two rows are read; a 3x3 input's bottom row is replaced
    /// by `[0, 0, 1]`.
    pub fn try_from_dmatrix(m: &DMatrix<f64>) -> Result<Self, AffineError> {
        check_shape(m)?;
        Ok(Self::from_rows([
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        ]))
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// `self * other`: `other` is applied first.
    pub fn compose(&self, other: &AffineTransform) -> Self {
        let mut m = self.m * other.m;
        m[(2, 0)] = 0.0;
        m[(2, 1)] = 0.0;
        m[(2, 2)] = 1.0;
        Self { m }
    }

    pub fn inverse(&self) -> Option<Self> {
        let inv = self.m.try_inverse()?;
        let r = |i: usize, j: usize| inv[(i, j)];
        Some(Self::from_rows([
            [r(0, 0), r(0, 1), r(0, 2)],
            [r(1, 0), r(1, 1), r(1, 2)],
        ]))
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.m * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0], v[1])
    }

    /// Uniform scale factor of the linear part, `sqrt(m00^2 + m01^2)`.
    ///
    /// Exact for similarity transforms; for general affines it is the
    /// stretch of the first output row.
    pub fn uniform_scale(&self) -> f64 {
        self.m[(0, 0)].hypot(self.m[(0, 1)])
    }

    /// Whether every entry is within `tol` of the identity.
    pub fn is_identity(&self, tol: f64) -> bool {
        (self.m - Matrix3::identity()).amax() <= tol
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[[f64; 3]; 2]> for AffineTransform {
    fn from(rows: [[f64; 3]; 2]) -> Self {
        Self::from_rows(rows)
    }
}

impl From<AffineTransform> for [[f64; 3]; 2] {
    fn from(t: AffineTransform) -> Self {
        t.to_rows()
    }
}

/// Parameters of [`affine_matrix`].
///
/// Angles are in degrees. The default is the identity transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineParams {
    /// Pivot for rotation, scale and shear.
    pub center: [f64; 2],
    pub angle_deg: f64,
    pub translate: [f64; 2],
    /// Per-axis scale `(sx, sy)`.
    pub scale: [f64; 2],
    #[serde(default)]
    pub shear_deg: f64,
}

impl Default for AffineParams {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            angle_deg: 0.0,
            translate: [0.0, 0.0],
            scale: [1.0, 1.0],
            shear_deg: 0.0,
        }
    }
}

impl AffineParams {
    pub fn build(&self) -> AffineTransform {
        affine_matrix(self)
    }
}

/// Compose `M = T * C * RSS * C^-1`.
///
/// - `T` translates by `translate`,
/// - `C` translates by `center` (so rotation/scale/shear pivot around it),
/// - `RSS = [[cos(a)*sx, -sin(a+shear)*sy], [sin(a)*sx, cos(a+shear)*sy]]`.
pub fn affine_matrix(params: &AffineParams) -> AffineTransform {
    let a = params.angle_deg.to_radians();
    let shear = params.shear_deg.to_radians();
    let [sx, sy] = params.scale;
    let [cx, cy] = params.center;
    let [tx, ty] = params.translate;

    let t = AffineTransform::translation(tx, ty);
    let c = AffineTransform::translation(cx, cy);
    let c_inv = AffineTransform::translation(-cx, -cy);
    let rss = AffineTransform::from_rows([
        [a.cos() * sx, -(a + shear).sin() * sy, 0.0],
        [a.sin() * sx, (a + shear).cos() * sy, 0.0],
    ]);

    t.compose(&c).compose(&rss).compose(&c_inv)
}

/// Apply `m` to every point. Order and length are preserved.
pub fn warp_points(points: &[Point2<f64>], m: &AffineTransform) -> Vec<Point2<f64>> {
    points.iter().map(|&p| m.apply(p)).collect()
}

/// Apply a dynamically sized 2x3 or 3x3 matrix to every point.
///
/// Points are lifted to `[x, y, 1]` and multiplied by the transpose of the
/// matrix's top two rows, so a 3x3 bottom row never influences the result.
pub fn warp_points_dyn(
    points: &[Point2<f64>],
    m: &DMatrix<f64>,
) -> Result<Vec<Point2<f64>>, AffineError> {
    check_shape(m)?;
    let top = m.rows(0, 2);
    let mut ext = DMatrix::<f64>::from_element(points.len(), 3, 1.0);
    for (i, p) in points.iter().enumerate() {
        ext[(i, 0)] = p.x;
        ext[(i, 1)] = p.y;
    }
    let out = ext * top.transpose();
    Ok((0..points.len())
        .map(|i| Point2::new(out[(i, 0)], out[(i, 1)]))
        .collect())
}

fn check_shape(m: &DMatrix<f64>) -> Result<(), AffineError> {
    match m.shape() {
        (2, 3) | (3, 3) => Ok(()),
        (rows, cols) => Err(AffineError::Shape { rows, cols }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    #[test]
    fn identity_params_build_identity() {
        for center in [[0.0, 0.0], [12.5, -3.0], [640.0, 480.0]] {
            let m = affine_matrix(&AffineParams {
                center,
                ..AffineParams::default()
            });
            assert!(m.is_identity(1e-12), "center {center:?} gave {m:?}");
        }
    }

    #[test]
    fn rotation_about_center_keeps_center_fixed() {
        let params = AffineParams {
            center: [10.0, 20.0],
            angle_deg: 90.0,
            ..AffineParams::default()
        };
        let m = params.build();
        assert_close(m.apply(Point2::new(10.0, 20.0)), Point2::new(10.0, 20.0), 1e-9);
        // (1, 0) offset from the pivot rotates to (0, 1)
        assert_close(m.apply(Point2::new(11.0, 20.0)), Point2::new(10.0, 21.0), 1e-9);
    }

    #[test]
    fn translation_and_scale_compose_in_order() {
        let m = affine_matrix(&AffineParams {
            translate: [5.0, -2.0],
            scale: [2.0, 3.0],
            ..AffineParams::default()
        });
        assert_close(m.apply(Point2::new(1.0, 1.0)), Point2::new(7.0, 1.0), 1e-12);
    }

    #[test]
    fn shear_tilts_the_y_axis() {
        let m = affine_matrix(&AffineParams {
            shear_deg: 45.0,
            ..AffineParams::default()
        });
        let p = m.apply(Point2::new(0.0, 1.0));
        assert_relative_eq!(p.x, -(45.0_f64.to_radians().sin()), epsilon = 1e-12);
        assert_relative_eq!(p.y, 45.0_f64.to_radians().cos(), epsilon = 1e-12);
        assert_relative_eq!(m.apply(Point2::new(1.0, 0.0)).x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn identity_warp_is_exact() {
        let pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(-1.25, 3.5),
            Point2::new(1e6, -7e-3),
        ];
        assert_eq!(warp_points(&pts, &AffineTransform::identity()), pts);
        let dyn_id = DMatrix::<f64>::identity(3, 3);
        assert_eq!(warp_points_dyn(&pts, &dyn_id).unwrap(), pts);
    }

    #[test]
    fn dyn_warp_matches_typed_warp() {
        let t = AffineTransform::from_rows([[0.8, -0.6, 4.0], [0.6, 0.8, -1.0]]);
        let rows = t.to_rows();
        let m23 = DMatrix::from_row_slice(2, 3, &[rows[0], rows[1]].concat());
        let pts = [Point2::new(1.0, 2.0), Point2::new(-3.0, 0.5)];
        let typed = warp_points(&pts, &t);
        let dynamic = warp_points_dyn(&pts, &m23).unwrap();
        for (a, b) in typed.iter().zip(&dynamic) {
            assert_close(*a, *b, 1e-12);
        }
    }

    #[test]
    fn dyn_warp_rejects_bad_shapes() {
        let pts = [Point2::new(1.0, 1.0)];
        for (r, c) in [(4, 4), (2, 2), (3, 2)] {
            let err = warp_points_dyn(&pts, &DMatrix::zeros(r, c)).unwrap_err();
            assert_eq!(err, AffineError::Shape { rows: r, cols: c });
        }
        assert!(AffineTransform::try_from_dmatrix(&DMatrix::zeros(1, 3)).is_err());
    }

    #[test]
    fn inverse_round_trips_points() {
        let m = affine_matrix(&AffineParams {
            center: [3.0, 4.0],
            angle_deg: 30.0,
            translate: [10.0, -5.0],
            scale: [1.5, 0.5],
            shear_deg: 10.0,
        });
        let inv = m.inverse().expect("invertible");
        for p in [Point2::new(0.0, 0.0), Point2::new(50.0, -20.0)] {
            assert_close(inv.apply(m.apply(p)), p, 1e-9);
        }
        assert!(m.compose(&inv).is_identity(1e-9));
    }

    #[test]
    fn serializes_as_two_rows() {
        let t = AffineTransform::from_rows([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "[[1.0,2.0,3.0],[4.0,5.0,6.0]]");
        let back: AffineTransform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
