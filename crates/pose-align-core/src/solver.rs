//! Least-squares affine estimation from point correspondences.
//!
//! Both estimators stack two linear equations per correspondence into an
//! overdetermined system `A x = b` and solve it through the SVD of `A`, which
//! yields the minimum residual-sum-of-squares solution.

use crate::affine::AffineTransform;
use nalgebra::{DMatrix, DVector, Point2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the affine estimators.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    #[error("point sets differ in length (src={src}, dst={dst})")]
    LengthMismatch { src: usize, dst: usize },
    #[error("need at least {needed} correspondences (got {got})")]
    TooFewPoints { needed: usize, got: usize },
    #[error("rank-deficient system (rank={rank}, unknowns={unknowns})")]
    Singular { rank: usize, unknowns: usize },
}

/// Transform family to fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffineModel {
    /// Rotation, uniform scale and translation (4 DOF, no shear).
    #[default]
    Similarity,
    /// General affine (6 DOF).
    Full,
}

impl AffineModel {
    /// Minimal number of correspondences for a well-posed fit.
    pub fn min_points(self) -> usize {
        match self {
            AffineModel::Similarity => 2,
            AffineModel::Full => 3,
        }
    }

    pub fn solve(
        self,
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
    ) -> Result<AffineTransform, SolveError> {
        match self {
            AffineModel::Similarity => solve_similarity(src, dst),
            AffineModel::Full => solve_affine(src, dst),
        }
    }
}

/// Estimate the similarity transform mapping `src` onto `dst`.
///
/// Unknowns are `(a, b, tx, ty)` with, per correspondence,
///
/// ```text
/// [ x  y  1  0 ] . [a b tx ty]^T = x'
/// [ y -x  0  1 ] . [a b tx ty]^T = y'
/// ```
///
/// so the result is `[[a, b, tx], [-b, a, ty]]`.
#[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all, fields(n = src.len())))]
pub fn solve_similarity(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Result<AffineTransform, SolveError> {
    check_inputs(src, dst, AffineModel::Similarity.min_points())?;

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 4);
    let mut b = DVector::<f64>::zeros(2 * n);

    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let r0 = 2 * k;
        a[(r0, 0)] = s.x;
        a[(r0, 1)] = s.y;
        a[(r0, 2)] = 1.0;
        b[r0] = d.x;

        let r1 = 2 * k + 1;
        a[(r1, 0)] = s.y;
        a[(r1, 1)] = -s.x;
        a[(r1, 3)] = 1.0;
        b[r1] = d.y;
    }

    let x = lstsq_svd(a, &b)?;
    Ok(AffineTransform::from_rows([
        [x[0], x[1], x[2]],
        [-x[1], x[0], x[3]],
    ]))
}

/// Estimate the general affine transform mapping `src` onto `dst`.
///
/// Needs at least three non-collinear correspondences.
#[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all, fields(n = src.len())))]
pub fn solve_affine(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Result<AffineTransform, SolveError> {
    check_inputs(src, dst, AffineModel::Full.min_points())?;

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 6);
    let mut b = DVector::<f64>::zeros(2 * n);

    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        // [ x y 1 0 0 0 ] -> x'
        a[(2 * k, 0)] = s.x;
        a[(2 * k, 1)] = s.y;
        a[(2 * k, 2)] = 1.0;
        b[2 * k] = d.x;

        // [ 0 0 0 x y 1 ] -> y'
        a[(2 * k + 1, 3)] = s.x;
        a[(2 * k + 1, 4)] = s.y;
        a[(2 * k + 1, 5)] = 1.0;
        b[2 * k + 1] = d.y;
    }

    let x = lstsq_svd(a, &b)?;
    Ok(AffineTransform::from_rows([
        [x[0], x[1], x[2]],
        [x[3], x[4], x[5]],
    ]))
}

fn check_inputs(src: &[Point2<f64>], dst: &[Point2<f64>], needed: usize) -> Result<(), SolveError> {
    if src.len() != dst.len() {
        return Err(SolveError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    if src.len() < needed {
        return Err(SolveError::TooFewPoints {
            needed,
            got: src.len(),
        });
    }
    Ok(())
}

/// Singular values below `RANK_RTOL * sigma_max` count as zero.
const RANK_RTOL: f64 = 1e-10;

/// Least-squares solution of `a x = b`; anything below full column rank is rejected.
fn lstsq_svd(a: DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, SolveError> {
    let unknowns = a.ncols();

    let svd = a.svd(true, true);
    let sigma_max = svd.singular_values.max();
    if !sigma_max.is_finite() || sigma_max <= 0.0 {
        return Err(SolveError::Singular { rank: 0, unknowns });
    }

    let eps = RANK_RTOL * sigma_max;
    let rank = svd.rank(eps);
    if rank < unknowns {
        return Err(SolveError::Singular { rank, unknowns });
    }

    svd.solve(b, eps)
        .map_err(|_| SolveError::Singular { rank, unknowns })
}
