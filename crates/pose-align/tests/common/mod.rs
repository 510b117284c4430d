#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// 21 hand landmarks in normalized coordinates: wrist, then four joints per finger.
pub fn open_hand() -> Vec<[f64; 3]> {
    let mut pts = vec![[0.5, 0.9, 1.0]];
    for (finger, dx) in [-0.2_f64, -0.1, 0.0, 0.1, 0.2].iter().enumerate() {
        for joint in 1..=4 {
            let t = joint as f64 / 4.0;
            let spread = 1.0 + 0.1 * finger as f64;
            pts.push([0.5 + dx * t * spread, 0.9 - 0.7 * t, 1.0]);
        }
    }
    pts
}

pub fn fist() -> Vec<[f64; 3]> {
    let mut pts = vec![[0.5, 0.9, 1.0]];
    for dx in [-0.2_f64, -0.1, 0.0, 0.1, 0.2] {
        pts.push([0.5 + dx * 0.5, 0.7, 1.0]);
        pts.push([0.5 + dx * 0.6, 0.55, 1.0]);
        pts.push([0.5 + dx * 0.55, 0.62, 1.0]);
        pts.push([0.5 + dx * 0.45, 0.7, 1.0]);
    }
    pts
}

/// Rotate by `deg` about (0.5, 0.5), scale by `s`, then shift by `(tx, ty)`.
pub fn moved(pts: &[[f64; 3]], deg: f64, s: f64, tx: f64, ty: f64) -> Vec<[f64; 3]> {
    let (sin, cos) = deg.to_radians().sin_cos();
    pts.iter()
        .map(|&[x, y, c]| {
            let (dx, dy) = (x - 0.5, y - 0.5);
            [
                0.5 + s * (cos * dx - sin * dy) + tx,
                0.5 + s * (sin * dx + cos * dy) + ty,
                c,
            ]
        })
        .collect()
}

pub fn catalog_json() -> Value {
    json!({
        "landmarks": 21,
        "templates": [
            { "category": 0, "name": "fist", "keypoints": fist() },
            { "category": 5, "name": "five", "keypoints": open_hand() },
        ]
    })
}

pub fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).expect("serialize"))
        .expect("write fixture");
    path
}
