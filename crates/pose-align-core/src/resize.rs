//! Resize matrices between two rectangular frames.

use crate::affine::{affine_matrix, AffineParams, AffineTransform};

/// Uniform resize that keeps the aspect ratio and fits `src` inside `dst`.
///
/// With `centered`, the leftover gap on each axis is split evenly so the
/// resized content sits in the middle of the destination frame; otherwise it
/// is anchored at the origin.
pub fn resize_with_padding(
    src_w: f64,
    src_h: f64,
    dst_w: f64,
    dst_h: f64,
    centered: bool,
) -> AffineTransform {
    let scale = (dst_w / src_w).min(dst_h / src_h);
    let translate = if centered {
        [(dst_w - src_w * scale) / 2.0, (dst_h - src_h * scale) / 2.0]
    } else {
        [0.0, 0.0]
    };
    affine_matrix(&AffineParams {
        translate,
        scale: [scale, scale],
        ..AffineParams::default()
    })
}

/// Independent per-axis resize; the aspect ratio is not preserved.
pub fn resize_stretch(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> AffineTransform {
    affine_matrix(&AffineParams {
        scale: [dst_w / src_w, dst_h / src_h],
        ..AffineParams::default()
    })
}
