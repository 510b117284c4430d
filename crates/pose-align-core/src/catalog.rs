//! Template catalog and best-match selection.

use crate::affine::AffineTransform;
use crate::keypoint::KeypointSet;
use crate::matcher::{MatchResult, PoseMatchError, PoseMatcher};
use crate::resize::resize_stretch;
use serde::{Deserialize, Serialize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Category reported when no template matches.
pub const NO_CATEGORY: i32 = -1;

/// Errors raised while assembling a catalog.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("catalog has no templates")]
    Empty,
    #[error("template {index} has {got} landmarks, expected {expected}")]
    LandmarkCountMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },
    #[error("template {index} has invalid reference area {area}")]
    InvalidArea { index: usize, area: f64 },
}

/// A reference pose with its category label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub category: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reference area used to normalize residuals; the catalog default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    pub keypoints: KeypointSet,
}

impl Template {
    pub fn new(category: i32, keypoints: KeypointSet) -> Self {
        Self {
            category,
            name: None,
            area: None,
            keypoints,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_area(mut self, area: f64) -> Self {
        self.area = Some(area);
        self
    }
}

/// Score of one template against an observed pose.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateScore {
    /// Position of the template in the catalog.
    pub index: usize,
    pub category: i32,
    pub result: MatchResult,
}

/// Outcome of scanning a catalog.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogMatch {
    /// Winning transform expressed in the output frame, or the fallback.
    pub matrix: AffineTransform,
    /// Winning category, [`NO_CATEGORY`] when nothing matched.
    pub category: i32,
    pub score: f64,
    /// Index of the winning template.
    pub template: Option<usize>,
    /// Uniform scale of `matrix`.
    pub scale: f64,
}

impl CatalogMatch {
    #[inline]
    pub fn is_match(&self) -> bool {
        self.template.is_some()
    }
}

/// How a catalog scan reports its winner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectOptions {
    /// Output frame size `(width, height)`; template coordinates span `1x1`.
    pub output_size: [f64; 2],
    /// Transform reported when no template matches.
    pub fallback: AffineTransform,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            output_size: [1.0, 1.0],
            fallback: AffineTransform::identity(),
        }
    }
}

/// Immutable library of templates sharing one landmark count.
#[derive(Clone, Debug)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
    landmarks: usize,
    default_area: f64,
}

impl TemplateCatalog {
    pub const DEFAULT_AREA: f64 = 1.0;

    pub fn new(templates: Vec<Template>) -> Result<Self, CatalogError> {
        Self::with_default_area(templates, Self::DEFAULT_AREA)
    }

    /// Build a catalog; `default_area` applies to templates without their own area.
    pub fn with_default_area(
        templates: Vec<Template>,
        default_area: f64,
    ) -> Result<Self, CatalogError> {
        let landmarks = templates
            .first()
            .map(|t| t.keypoints.len())
            .ok_or(CatalogError::Empty)?;

        if !valid_area(default_area) {
            return Err(CatalogError::InvalidArea {
                index: 0,
                area: default_area,
            });
        }

        for (index, t) in templates.iter().enumerate() {
            if t.keypoints.len() != landmarks {
                return Err(CatalogError::LandmarkCountMismatch {
                    index,
                    expected: landmarks,
                    got: t.keypoints.len(),
                });
            }
            if let Some(area) = t.area.filter(|&a| !valid_area(a)) {
                return Err(CatalogError::InvalidArea { index, area });
            }
        }

        Ok(Self {
            templates,
            landmarks,
            default_area,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Always `false`: construction rejects empty catalogs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    #[inline]
    pub fn landmarks(&self) -> usize {
        self.landmarks
    }

    #[inline]
    pub fn default_area(&self) -> f64 {
        self.default_area
    }

    #[inline]
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn get(&self, index: usize) -> Option<&Template> {
        self.templates.get(index)
    }

    /// Reference area used for `template`.
    pub fn area_of(&self, template: &Template) -> f64 {
        template.area.unwrap_or(self.default_area)
    }

    /// Score `pose` against every template, in catalog order.
    ///
    /// With the `rayon` feature the templates are matched in parallel; the
    /// returned order is the same either way.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(templates = self.len()))
    )]
    pub fn score_all(
        &self,
        pose: &KeypointSet,
        matcher: &PoseMatcher,
    ) -> Result<Vec<TemplateScore>, PoseMatchError> {
        #[cfg(feature = "rayon")]
        let scores = self
            .templates
            .par_iter()
            .enumerate()
            .map(|(index, t)| self.score_one(index, t, pose, matcher))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let scores = self
            .templates
            .iter()
            .enumerate()
            .map(|(index, t)| self.score_one(index, t, pose, matcher))
            .collect();
        scores
    }

    fn score_one(
        &self,
        index: usize,
        template: &Template,
        pose: &KeypointSet,
        matcher: &PoseMatcher,
    ) -> Result<TemplateScore, PoseMatchError> {
        let result = matcher.match_pair(pose, &template.keypoints, self.area_of(template))?;
        log::trace!(
            "template {index} (category {}): score {:.4}",
            template.category,
            result.score
        );
        Ok(TemplateScore {
            index,
            category: template.category,
            result,
        })
    }

    /// Classify `pose` by its best-scoring template.
    pub fn best_match(
        &self,
        pose: &KeypointSet,
        matcher: &PoseMatcher,
        options: &SelectOptions,
    ) -> Result<CatalogMatch, PoseMatchError> {
        let scores = self.score_all(pose, matcher)?;
        let selected = select_best(&scores, options);
        match selected.template {
            Some(index) => log::debug!(
                "best template {index} (category {}) score {:.4}",
                selected.category,
                selected.score
            ),
            None => log::debug!("no template matched {} templates", scores.len()),
        }
        Ok(selected)
    }
}

/// Pick the highest score above zero; the earliest template wins ties.
///
/// The winning matrix is mapped into the output frame by a stretch resize
/// from the unit square. Without a winner the fallback transform and
/// [`NO_CATEGORY`] are reported.
pub fn select_best(scores: &[TemplateScore], options: &SelectOptions) -> CatalogMatch {
    let mut best: Option<&TemplateScore> = None;
    for s in scores {
        let best_score = best.map_or(0.0, |b| b.result.score);
        if s.result.score > best_score {
            best = Some(s);
        }
    }

    match best {
        Some(s) => {
            let [w, h] = options.output_size;
            let matrix = resize_stretch(1.0, 1.0, w, h).compose(&s.result.matrix);
            CatalogMatch {
                matrix,
                category: s.category,
                score: s.result.score,
                template: Some(s.index),
                scale: matrix.uniform_scale(),
            }
        }
        None => CatalogMatch {
            matrix: options.fallback,
            category: NO_CATEGORY,
            score: 0.0,
            template: None,
            scale: options.fallback.uniform_scale(),
        },
    }
}

fn valid_area(area: f64) -> bool {
    area.is_finite() && area > 0.0
}
