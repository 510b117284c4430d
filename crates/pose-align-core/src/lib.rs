//! Affine keypoint alignment and template pose scoring.
//!
//! This crate is purely geometric: it does not detect keypoints or touch
//! images. Callers supply [`KeypointSet`]s (e.g. 17 body or 21 hand
//! landmarks from an external detector) and get back fitted transforms and
//! similarity scores.
//!
//! ## Pieces
//! - [`affine_matrix`], [`warp_points`]: build and apply 2D affine transforms.
//! - [`resize_with_padding`], [`resize_stretch`]: frame-to-frame resize matrices.
//! - [`solve_similarity`], [`solve_affine`]: least-squares fits via SVD.
//! - [`match_pose`], [`PoseMatcher`]: visibility-aware fit + score in `[0, 1]`.
//! - [`TemplateCatalog`]: classify a pose by its best-scoring template.
//!
//! ```
//! use pose_align_core::{match_pose, Keypoint, KeypointSet};
//!
//! let template: KeypointSet = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
//!     .iter()
//!     .map(|&(x, y)| Keypoint::new(x, y, 1.0))
//!     .collect();
//! let observed: KeypointSet = template
//!     .iter()
//!     .map(|k| Keypoint::new(2.0 * k.x + 5.0, 2.0 * k.y - 1.0, k.confidence))
//!     .collect();
//!
//! let res = match_pose(&observed, &template, 1.0, true).unwrap();
//! assert!((res.score - 1.0).abs() < 1e-9);
//! ```

mod affine;
mod catalog;
mod io;
mod keypoint;
mod logger;
mod matcher;
mod resize;
mod solver;

pub use affine::{
    affine_matrix, warp_points, warp_points_dyn, AffineError, AffineParams, AffineTransform,
};
pub use catalog::{
    select_best, CatalogError, CatalogMatch, SelectOptions, Template, TemplateCatalog,
    TemplateScore, NO_CATEGORY,
};
pub use io::{
    load_keypoints_json, CatalogFile, MatchConfig, MatchReport, PoseAlignIoError,
    TemplateScoreEntry,
};
pub use keypoint::{Keypoint, KeypointSet, VisibilityOverlap};
pub use matcher::{
    match_pose, MatchParams, MatchResult, PoseMatchError, PoseMatcher, MIN_COMMON_LANDMARKS,
};
pub use resize::{resize_stretch, resize_with_padding};
pub use solver::{solve_affine, solve_similarity, AffineModel, SolveError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
