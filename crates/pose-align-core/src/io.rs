//! JSON configuration, data files and reports.

use crate::affine::AffineTransform;
use crate::catalog::{
    CatalogError, CatalogMatch, SelectOptions, Template, TemplateCatalog, TemplateScore,
};
use crate::keypoint::KeypointSet;
use crate::matcher::{MatchParams, PoseMatcher};
use crate::solver::AffineModel;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum PoseAlignIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("catalog declares {declared} landmarks but templates have {actual}")]
    DeclaredLandmarks { declared: usize, actual: usize },
}

fn default_area() -> f64 {
    TemplateCatalog::DEFAULT_AREA
}

/// On-disk catalog layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Optional landmark count, checked against the templates when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<usize>,
    #[serde(default = "default_area")]
    pub default_area: f64,
    pub templates: Vec<Template>,
}

impl CatalogFile {
    pub fn from_catalog(catalog: &TemplateCatalog) -> Self {
        Self {
            landmarks: Some(catalog.landmarks()),
            default_area: catalog.default_area(),
            templates: catalog.templates().to_vec(),
        }
    }

    pub fn into_catalog(self) -> Result<TemplateCatalog, PoseAlignIoError> {
        let catalog = TemplateCatalog::with_default_area(self.templates, self.default_area)?;
        if let Some(declared) = self.landmarks {
            if declared != catalog.landmarks() {
                return Err(PoseAlignIoError::DeclaredLandmarks {
                    declared,
                    actual: catalog.landmarks(),
                });
            }
        }
        Ok(catalog)
    }
}

impl TemplateCatalog {
    /// Load a catalog from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PoseAlignIoError> {
        let raw = fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&raw)?;
        file.into_catalog()
    }

    /// Write this catalog to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PoseAlignIoError> {
        let json = serde_json::to_string_pretty(&CatalogFile::from_catalog(self))?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PoseFile {
    Bare(KeypointSet),
    Wrapped { keypoints: KeypointSet },
}

/// Load one pose from JSON: either `{ "keypoints": [...] }` or a bare keypoint array.
pub fn load_keypoints_json(path: impl AsRef<Path>) -> Result<KeypointSet, PoseAlignIoError> {
    let raw = fs::read_to_string(path)?;
    let pose = match serde_json::from_str::<PoseFile>(&raw)? {
        PoseFile::Bare(keypoints) | PoseFile::Wrapped { keypoints } => keypoints,
    };
    Ok(pose)
}

fn default_hard() -> bool {
    true
}

fn default_output_size() -> [f64; 2] {
    [1.0, 1.0]
}

fn default_fallback() -> AffineTransform {
    AffineTransform::identity()
}

/// Configuration for a catalog match run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    pub catalog_path: String,
    pub pose_path: String,
    /// Require templates to cover every landmark the pose shows.
    #[serde(default = "default_hard")]
    pub hard: bool,
    #[serde(default)]
    pub model: AffineModel,
    /// Overrides the catalog's default reference area.
    #[serde(default)]
    pub default_area: Option<f64>,
    #[serde(default = "default_output_size")]
    pub output_size: [f64; 2],
    #[serde(default = "default_fallback")]
    pub fallback: AffineTransform,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl MatchConfig {
    pub fn new(catalog_path: impl Into<String>, pose_path: impl Into<String>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            pose_path: pose_path.into(),
            hard: default_hard(),
            model: AffineModel::default(),
            default_area: None,
            output_size: default_output_size(),
            fallback: default_fallback(),
            output_path: None,
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PoseAlignIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PoseAlignIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("pose_align_report.json"))
    }

    pub fn build_matcher(&self) -> PoseMatcher {
        PoseMatcher::new(MatchParams {
            hard: self.hard,
            model: self.model,
        })
    }

    pub fn select_options(&self) -> SelectOptions {
        SelectOptions {
            output_size: self.output_size,
            fallback: self.fallback,
        }
    }

    /// Load the catalog, applying the area override.
    pub fn load_catalog(&self) -> Result<TemplateCatalog, PoseAlignIoError> {
        let raw = fs::read_to_string(&self.catalog_path)?;
        let mut file: CatalogFile = serde_json::from_str(&raw)?;
        if let Some(area) = self.default_area {
            file.default_area = area;
        }
        file.into_catalog()
    }

    pub fn load_pose(&self) -> Result<KeypointSet, PoseAlignIoError> {
        load_keypoints_json(&self.pose_path)
    }
}

/// Per-template line of a [`MatchReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateScoreEntry {
    pub index: usize,
    pub category: i32,
    #[serde(default)]
    pub name: Option<String>,
    pub score: f64,
    pub matrix: AffineTransform,
}

/// Result of a catalog match run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub catalog_path: String,
    pub pose_path: String,
    pub landmarks: usize,
    pub visible: usize,
    pub category: i32,
    #[serde(default)]
    pub template: Option<usize>,
    #[serde(default)]
    pub template_name: Option<String>,
    pub score: f64,
    pub scale: f64,
    pub matrix: AffineTransform,
    #[serde(default)]
    pub scores: Vec<TemplateScoreEntry>,
}

impl MatchReport {
    pub fn new(
        cfg: &MatchConfig,
        catalog: &TemplateCatalog,
        pose: &KeypointSet,
        scores: &[TemplateScore],
        best: &CatalogMatch,
    ) -> Self {
        let name_of = |index: usize| catalog.get(index).and_then(|t| t.name.clone());
        Self {
            catalog_path: cfg.catalog_path.clone(),
            pose_path: cfg.pose_path.clone(),
            landmarks: pose.len(),
            visible: pose.visible_count(),
            category: best.category,
            template: best.template,
            template_name: best.template.and_then(name_of),
            score: best.score,
            scale: best.scale,
            matrix: best.matrix,
            scores: scores
                .iter()
                .map(|s| TemplateScoreEntry {
                    index: s.index,
                    category: s.category,
                    name: name_of(s.index),
                    score: s.result.score,
                    matrix: s.result.matrix,
                })
                .collect(),
        }
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PoseAlignIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PoseAlignIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint::Keypoint;

    fn triangle() -> KeypointSet {
        KeypointSet::new(vec![
            Keypoint::new(0.0, 0.0, 1.0),
            Keypoint::new(1.0, 0.0, 1.0),
            Keypoint::new(0.0, 1.0, 1.0),
            Keypoint::new(0.5, 0.5, 0.0),
        ])
    }

    #[test]
    fn catalog_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        let catalog = TemplateCatalog::with_default_area(
            vec![Template::new(3, triangle()).with_name("tri")],
            0.25,
        )
        .unwrap();
        catalog.write_json(&path).unwrap();

        let loaded = TemplateCatalog::load_json(&path).unwrap();
        assert_eq!(loaded.templates(), catalog.templates());
        assert_eq!(loaded.default_area(), 0.25);
        assert_eq!(loaded.landmarks(), 4);
    }

    #[test]
    fn declared_landmarks_must_agree() {
        let file: CatalogFile = serde_json::from_str(
            r#"{ "landmarks": 21, "templates": [ { "category": 1, "keypoints": [[0,0],[1,0],[0,1]] } ] }"#,
        )
        .unwrap();
        assert!(matches!(
            file.into_catalog(),
            Err(PoseAlignIoError::DeclaredLandmarks {
                declared: 21,
                actual: 3
            })
        ));
    }

    #[test]
    fn pose_files_accept_wrapped_and_bare_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let wrapped = dir.path().join("wrapped.json");
        let bare = dir.path().join("bare.json");
        fs::write(&wrapped, r#"{ "keypoints": [[1, 2, 0.5], [3, 4]] }"#).unwrap();
        fs::write(&bare, r#"[[1, 2, 0.5], [3, 4]]"#).unwrap();

        let a = load_keypoints_json(&wrapped).unwrap();
        let b = load_keypoints_json(&bare).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_slice()[1], Keypoint::new(3.0, 4.0, 1.0));
    }

    #[test]
    fn config_defaults_apply() {
        let cfg: MatchConfig =
            serde_json::from_str(r#"{ "catalog_path": "c.json", "pose_path": "p.json" }"#)
                .unwrap();
        assert!(cfg.hard);
        assert_eq!(cfg.model, AffineModel::Similarity);
        assert_eq!(cfg.output_size, [1.0, 1.0]);
        assert!(cfg.fallback.is_identity(0.0));
        assert_eq!(cfg.output_path(), PathBuf::from("pose_align_report.json"));
        assert!(cfg.build_matcher().params().hard);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_keypoints_json("/nonexistent/pose.json").unwrap_err();
        assert!(matches!(err, PoseAlignIoError::Io(_)));
    }
}
