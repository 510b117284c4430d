//! High-level facade for the `pose-align-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of [`pose_align_core`],
//! - [`run`], an end-to-end helper that loads a [`MatchConfig`], scans the
//!   template catalog and builds a [`MatchReport`],
//! - (feature `cli`) the `pose-align` command-line tool.
//!
//! ## Quickstart
//!
//! ```no_run
//! use pose_align::MatchConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = MatchConfig::new("templates.json", "pose.json");
//! let report = pose_align::run(&cfg)?;
//! println!("category {} (score {:.3})", report.category, report.score);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//! - `cli` (default): the `pose-align` binary.
//! - `rayon`: match catalog templates in parallel.
//! - `tracing`: spans on the matcher and catalog scans, plus a
//!   `tracing-subscriber` setup in the binary.

pub use pose_align_core as core;

pub use pose_align_core::{
    affine_matrix, match_pose, resize_stretch, resize_with_padding, solve_affine,
    solve_similarity, warp_points, AffineModel, AffineParams, AffineTransform, CatalogMatch,
    Keypoint, KeypointSet, MatchConfig, MatchParams, MatchReport, MatchResult, PoseMatcher,
    Template, TemplateCatalog, NO_CATEGORY,
};

/// Errors produced by the facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Io(#[from] pose_align_core::PoseAlignIoError),
    #[error(transparent)]
    Match(#[from] pose_align_core::PoseMatchError),
}

/// Load the catalog and pose named by `cfg`, classify the pose and build a report.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "info", skip(cfg), fields(catalog = %cfg.catalog_path))
)]
pub fn run(cfg: &MatchConfig) -> Result<MatchReport, RunError> {
    let catalog = cfg.load_catalog()?;
    let pose = cfg.load_pose()?;
    log::info!(
        "loaded {} templates ({} landmarks) and a pose with {}/{} visible landmarks",
        catalog.len(),
        catalog.landmarks(),
        pose.visible_count(),
        pose.len()
    );

    let matcher = cfg.build_matcher();
    let scores = catalog.score_all(&pose, &matcher)?;
    let best = pose_align_core::select_best(&scores, &cfg.select_options());
    Ok(MatchReport::new(cfg, &catalog, &pose, &scores, &best))
}
