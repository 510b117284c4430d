//! Visibility-aware pose matching.
//!
//! A match fits an affine transform from the landmarks both poses see and
//! scores the fit in `[0, 1]`. Inputs that cannot produce a trustworthy fit
//! are not errors: they return the identity transform with score 0.

use crate::affine::{warp_points, AffineTransform};
use crate::keypoint::{KeypointSet, VisibilityOverlap};
use crate::solver::AffineModel;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Fewer common landmarks than this give no fit (0), infinitely many (1),
/// or an unstable one (2).
pub const MIN_COMMON_LANDMARKS: usize = 3;

/// Errors for malformed matcher input.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum PoseMatchError {
    #[error("keypoint sets differ in landmark count (src={src}, dst={dst})")]
    LandmarkCountMismatch { src: usize, dst: usize },
    #[error("reference area must be positive and finite (got {area})")]
    InvalidArea { area: f64 },
}

/// Fitted transform and similarity score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matrix: AffineTransform,
    pub score: f64,
}

impl MatchResult {
    /// The "no fit" sentinel: identity transform, score 0.
    pub fn no_fit() -> Self {
        Self {
            matrix: AffineTransform::identity(),
            score: 0.0,
        }
    }

    #[inline]
    pub fn is_match(&self) -> bool {
        self.score > 0.0
    }
}

/// Matcher configuration.
///
/// The default is the soft policy with a similarity fit; catalog scans use
/// [`MatchParams::templates`], which turns `hard` on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchParams {
    /// Reject when `src` shows a landmark the target hides.
    ///
    /// Use this when the target is a canonical template that must cover
    /// everything the observed pose exposes.
    #[serde(default)]
    pub hard: bool,
    #[serde(default)]
    pub model: AffineModel,
}

impl MatchParams {
    /// Settings for matching against canonical templates.
    pub fn templates() -> Self {
        Self {
            hard: true,
            model: AffineModel::Similarity,
        }
    }
}

/// Stateless pose matcher.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoseMatcher {
    params: MatchParams,
}

impl PoseMatcher {
    pub fn new(params: MatchParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    /// Fit `src` onto `dst` and score the result.
    ///
    /// `dst_area` normalizes squared residuals; use the target's area in the
    /// same units as its coordinates (1.0 for normalized coordinates).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, src, dst), fields(landmarks = src.len()))
    )]
    pub fn match_pair(
        &self,
        src: &KeypointSet,
        dst: &KeypointSet,
        dst_area: f64,
    ) -> Result<MatchResult, PoseMatchError> {
        if src.len() != dst.len() {
            return Err(PoseMatchError::LandmarkCountMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        if !dst_area.is_finite() || dst_area <= 0.0 {
            return Err(PoseMatchError::InvalidArea { area: dst_area });
        }

        let overlap = VisibilityOverlap::between(src, dst);
        if overlap.common.len() < MIN_COMMON_LANDMARKS {
            log::debug!(
                "rejecting match: {} common landmarks (need {})",
                overlap.common.len(),
                MIN_COMMON_LANDMARKS
            );
            return Ok(MatchResult::no_fit());
        }
        if self.params.hard && overlap.src_only > 0 {
            log::debug!(
                "rejecting hard match: {} source landmarks hidden in target",
                overlap.src_only
            );
            return Ok(MatchResult::no_fit());
        }

        let src_pts = src.positions_at(&overlap.common);
        let dst_pts = dst.positions_at(&overlap.common);

        let matrix = match self.params.model.solve(&src_pts, &dst_pts) {
            Ok(m) => m,
            Err(err) => {
                log::debug!("rejecting match: {err}");
                return Ok(MatchResult::no_fit());
            }
        };

        let warped = warp_points(&src_pts, &matrix);
        let similarity = warped
            .iter()
            .zip(&dst_pts)
            .map(|(w, d)| {
                // per-landmark variance fixed to 1
                let err = (w - d).norm_squared() / (2.0 * dst_area);
                (-err).exp()
            })
            .sum::<f64>()
            / warped.len() as f64;

        let score = similarity * overlap.completeness();
        log::trace!(
            "matched {} of {} landmarks: similarity={similarity:.4} score={score:.4}",
            overlap.common.len(),
            overlap.union
        );

        Ok(MatchResult { matrix, score })
    }
}

/// Fit `src` onto `dst` with the similarity model and score the fit.
///
/// See [`PoseMatcher::match_pair`].
pub fn match_pose(
    src: &KeypointSet,
    dst: &KeypointSet,
    dst_area: f64,
    hard: bool,
) -> Result<MatchResult, PoseMatchError> {
    PoseMatcher::new(MatchParams {
        hard,
        model: AffineModel::Similarity,
    })
    .match_pair(src, dst, dst_area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::{affine_matrix, AffineParams};
    use crate::keypoint::Keypoint;
    use nalgebra::Point2;

    /// 17 distinct, non-collinear landmarks laid out like a standing figure.
    fn body_pose() -> KeypointSet {
        let pts = [
            (0.50, 0.10),
            (0.47, 0.08),
            (0.53, 0.08),
            (0.44, 0.10),
            (0.56, 0.10),
            (0.40, 0.25),
            (0.60, 0.25),
            (0.35, 0.40),
            (0.65, 0.40),
            (0.33, 0.55),
            (0.67, 0.55),
            (0.43, 0.55),
            (0.57, 0.55),
            (0.42, 0.75),
            (0.58, 0.75),
            (0.41, 0.95),
            (0.59, 0.93),
        ];
        pts.iter()
            .map(|&(x, y)| Keypoint::new(x, y, 0.9))
            .collect()
    }

    fn hide(set: &KeypointSet, hidden: &[usize]) -> KeypointSet {
        set.iter()
            .enumerate()
            .map(|(i, k)| {
                if hidden.contains(&i) {
                    Keypoint::new(k.x, k.y, 0.0)
                } else {
                    *k
                }
            })
            .collect()
    }

    fn transformed(set: &KeypointSet, m: &AffineTransform) -> KeypointSet {
        set.iter()
            .map(|k| {
                let p = m.apply(Point2::new(k.x, k.y));
                Keypoint::new(p.x, p.y, k.confidence)
            })
            .collect()
    }

    #[test]
    fn default_params_are_soft_and_template_params_hard() {
        assert!(!MatchParams::default().hard);
        assert_eq!(MatchParams::default().model, AffineModel::Similarity);
        assert!(MatchParams::templates().hard);
    }

    #[test]
    fn identical_poses_score_one() {
        let pose = body_pose();
        let res = match_pose(&pose, &pose, 1.0, false).expect("valid input");
        assert!((res.score - 1.0).abs() < 1e-9, "score {}", res.score);
        assert!(res.matrix.is_identity(1e-9));
    }

    #[test]
    fn recovers_similarity_between_poses() {
        let pose = body_pose();
        let truth = affine_matrix(&AffineParams {
            center: [0.5, 0.5],
            angle_deg: 25.0,
            translate: [0.1, -0.05],
            scale: [0.8, 0.8],
            shear_deg: 0.0,
        });
        let target = transformed(&pose, &truth);
        let res = match_pose(&pose, &target, 1.0, true).expect("valid input");
        assert!((res.score - 1.0).abs() < 1e-9);
        let (fit, want) = (res.matrix.to_rows(), truth.to_rows());
        for i in 0..2 {
            for j in 0..3 {
                assert!((fit[i][j] - want[i][j]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn fewer_than_three_common_landmarks_is_no_fit() {
        let pose = body_pose();
        let all: Vec<usize> = (0..pose.len()).collect();
        for keep in 0..MIN_COMMON_LANDMARKS {
            let hidden: Vec<usize> = all[keep..].to_vec();
            let src = hide(&pose, &hidden);
            for hard in [false, true] {
                let res = match_pose(&src, &pose, 1.0, hard).expect("valid input");
                assert_eq!(res, MatchResult::no_fit(), "keep={keep} hard={hard}");
            }
        }
    }

    #[test]
    fn disjoint_visibility_is_no_fit() {
        let pose = body_pose();
        let src = hide(&pose, &(0..8).collect::<Vec<_>>());
        let dst = hide(&pose, &(8..17).collect::<Vec<_>>());
        assert_eq!(match_pose(&src, &dst, 1.0, false).unwrap(), MatchResult::no_fit());
    }

    #[test]
    fn hard_mode_rejects_landmarks_missing_from_template() {
        let pose = body_pose();
        let template = hide(&pose, &[5]);

        let hard = match_pose(&pose, &template, 1.0, true).expect("valid input");
        assert_eq!(hard, MatchResult::no_fit());

        let soft = match_pose(&pose, &template, 1.0, false).expect("valid input");
        assert!(soft.score > 0.0);

        // the reverse direction is fine: the template covers the source
        let covered = match_pose(&template, &pose, 1.0, true).expect("valid input");
        assert!(covered.score > 0.0);
    }

    #[test]
    fn completeness_scales_score_linearly() {
        let pose = body_pose();
        let nudge = AffineTransform::from_rows([[1.0, 0.02, 0.01], [0.03, 1.0, -0.02]]);
        let target = transformed(&pose, &nudge);

        let hidden: Vec<usize> = (6..17).collect();
        let src = hide(&pose, &hidden);
        let dst_same = hide(&target, &hidden);
        // one extra landmark visible only in the target
        let dst_extra = hide(&target, &hidden[1..]);

        let a = match_pose(&src, &dst_same, 1.0, false).unwrap();
        let b = match_pose(&src, &dst_extra, 1.0, false).unwrap();
        assert!(a.score > 0.0 && a.score < 1.0);
        assert_eq!(a.matrix, b.matrix);
        let ratio = b.score / a.score;
        assert!((ratio - 6.0 / 7.0).abs() < 1e-12, "ratio {ratio}");
    }

    #[test]
    fn larger_area_forgives_residuals() {
        let pose = body_pose();
        let noisy: KeypointSet = pose
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let d = if i % 2 == 0 { 0.05 } else { -0.05 };
                Keypoint::new(k.x + d, k.y - d, k.confidence)
            })
            .collect();
        let small = match_pose(&pose, &noisy, 0.01, false).unwrap();
        let large = match_pose(&pose, &noisy, 1.0, false).unwrap();
        assert!(small.score > 0.0);
        assert!(large.score > small.score);
        assert!(large.score <= 1.0);
    }

    #[test]
    fn coincident_visible_points_fold_into_no_fit() {
        let pts = vec![Keypoint::new(0.3, 0.3, 1.0); 4];
        let src = KeypointSet::new(pts.clone());
        let dst = KeypointSet::new(pts);
        assert_eq!(match_pose(&src, &dst, 1.0, false).unwrap(), MatchResult::no_fit());
    }

    #[test]
    fn malformed_input_is_an_error() {
        let pose = body_pose();
        let short: KeypointSet = pose.iter().take(10).copied().collect();
        assert_eq!(
            match_pose(&pose, &short, 1.0, false).unwrap_err(),
            PoseMatchError::LandmarkCountMismatch { src: 17, dst: 10 }
        );
        for area in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                match_pose(&pose, &pose, area, false),
                Err(PoseMatchError::InvalidArea { .. })
            ));
        }
    }

    #[test]
    fn full_model_absorbs_shear() {
        let pose = body_pose();
        let shear = affine_matrix(&AffineParams {
            shear_deg: 25.0,
            ..AffineParams::default()
        });
        let target = transformed(&pose, &shear);
        let similarity = match_pose(&pose, &target, 0.01, false).unwrap();
        let full = PoseMatcher::new(MatchParams {
            hard: false,
            model: AffineModel::Full,
        })
        .match_pair(&pose, &target, 0.01)
        .unwrap();
        assert!((full.score - 1.0).abs() < 1e-9);
        assert!(full.score > similarity.score);
    }
}
