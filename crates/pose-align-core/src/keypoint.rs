//! Keypoints, keypoint sets and visibility overlap.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A detected landmark: position plus detector confidence.
///
/// A keypoint is visible when `confidence > 0`. Serialized as `[x, y, confidence]`;
/// `[x, y]` and `{ "x", "y", "confidence" }` forms are also accepted on input,
/// with a missing confidence meaning fully visible.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "KeypointRepr", into = "[f64; 3]")]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl Keypoint {
    pub const fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    /// A keypoint the detector did not see.
    pub const fn hidden() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.confidence > 0.0
    }

    #[inline]
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeypointRepr {
    Triple([f64; 3]),
    Pair([f64; 2]),
    Named {
        x: f64,
        y: f64,
        #[serde(default = "full_confidence")]
        confidence: f64,
    },
}

fn full_confidence() -> f64 {
    1.0
}

impl From<KeypointRepr> for Keypoint {
    fn from(repr: KeypointRepr) -> Self {
        match repr {
            KeypointRepr::Triple([x, y, c]) => Keypoint::new(x, y, c),
            KeypointRepr::Pair([x, y]) => Keypoint::new(x, y, full_confidence()),
            KeypointRepr::Named { x, y, confidence } => Keypoint::new(x, y, confidence),
        }
    }
}

impl From<Keypoint> for [f64; 3] {
    fn from(k: Keypoint) -> Self {
        [k.x, k.y, k.confidence]
    }
}

/// Ordered landmarks of one pose instance.
///
/// Index `i` names the same landmark in every set it is compared with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeypointSet {
    keypoints: Vec<Keypoint>,
}

impl KeypointSet {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    /// All points visible with confidence 1.
    pub fn from_points(points: &[Point2<f64>]) -> Self {
        Self::new(
            points
                .iter()
                .map(|p| Keypoint::new(p.x, p.y, 1.0))
                .collect(),
        )
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Keypoint> {
        self.keypoints.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&Keypoint> {
        self.keypoints.get(idx)
    }

    pub fn visibility(&self) -> Vec<bool> {
        self.keypoints.iter().map(Keypoint::is_visible).collect()
    }

    pub fn visible_count(&self) -> usize {
        self.keypoints.iter().filter(|k| k.is_visible()).count()
    }

    /// Positions of the landmarks at `indices`, in the given order.
    pub fn positions_at(&self, indices: &[usize]) -> Vec<Point2<f64>> {
        indices
            .iter()
            .filter_map(|&i| self.keypoints.get(i))
            .map(Keypoint::position)
            .collect()
    }
}

impl From<Vec<Keypoint>> for KeypointSet {
    fn from(keypoints: Vec<Keypoint>) -> Self {
        Self::new(keypoints)
    }
}

impl FromIterator<Keypoint> for KeypointSet {
    fn from_iter<I: IntoIterator<Item = Keypoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a KeypointSet {
    type Item = &'a Keypoint;
    type IntoIter = std::slice::Iter<'a, Keypoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.keypoints.iter()
    }
}

/// Visibility overlap between two keypoint sets of equal length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibilityOverlap {
    /// Landmarks visible in both sets, ascending.
    pub common: Vec<usize>,
    /// Number of landmarks visible in at least one set.
    pub union: usize,
    /// Landmarks visible in `src` but hidden in `dst`.
    pub src_only: usize,
}

impl VisibilityOverlap {
    /// Pairs landmarks by index; a length mismatch only compares the shared prefix.
    pub fn between(src: &KeypointSet, dst: &KeypointSet) -> Self {
        let mut common = Vec::new();
        let mut union = 0;
        let mut src_only = 0;
        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            match (s.is_visible(), d.is_visible()) {
                (true, true) => {
                    common.push(i);
                    union += 1;
                }
                (true, false) => {
                    src_only += 1;
                    union += 1;
                }
                (false, true) => union += 1,
                (false, false) => {}
            }
        }
        Self {
            common,
            union,
            src_only,
        }
    }

    /// Fraction of the union that both sets see, `|common| / |union|`.
    pub fn completeness(&self) -> f64 {
        if self.union == 0 {
            return 0.0;
        }
        self.common.len() as f64 / self.union as f64
    }
}
