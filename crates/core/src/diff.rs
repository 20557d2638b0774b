//! Pixel-level perceptual comparison of two captures
//!
//! Images of different sizes are normalized onto transparent canvases sized
//! to the element-wise maximum of both dimensions, so a pure size change
//! shows up as diff regions at the edges instead of an error. Pixels are
//! compared by YIQ color distance, the metric pixelmatch uses, against a
//! fixed similarity threshold.

use std::path::Path;

use image::{imageops, Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::error::Result;

/// Similarity threshold on the 0.0 (exact) .. 1.0 (anything goes) scale
const MATCH_THRESHOLD: f64 = 0.1;

/// Maximum possible YIQ delta between two RGBA pixels
const MAX_YIQ_DELTA: f64 = 35215.0;

/// Compare two captured images and write a visual diff
///
/// Returns the count of mismatched pixels, `0` for pixel-identical images
/// after normalization, or `-1` if either input cannot be loaded. The `-1`
/// case writes no diff file and is not an error: a partial batch must keep
/// making progress past a capture that never produced a file.
///
/// CPU-bound; callers on an async runtime should run it via
/// `spawn_blocking`.
pub fn diff_images(path_old: &Path, path_new: &Path, path_diff: &Path) -> Result<i64> {
    let img_old = match image::open(path_old) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            warn!("Cannot load {}: {}", path_old.display(), e);
            return Ok(-1);
        }
    };
    let img_new = match image::open(path_new) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            warn!("Cannot load {}: {}", path_new.display(), e);
            return Ok(-1);
        }
    };

    let width = img_old.width().max(img_new.width());
    let height = img_old.height().max(img_new.height());

    // Transparent zero-filled canvases; each source pasted at the origin,
    // never cropped or scaled.
    let mut canvas_old = RgbaImage::new(width, height);
    let mut canvas_new = RgbaImage::new(width, height);
    imageops::replace(&mut canvas_old, &img_old, 0, 0);
    imageops::replace(&mut canvas_new, &img_new, 0, 0);

    let max_delta = MAX_YIQ_DELTA * MATCH_THRESHOLD * MATCH_THRESHOLD;
    let mut diff_img = RgbaImage::new(width, height);
    let mut mismatched: i64 = 0;

    for y in 0..height {
        for x in 0..width {
            let a = canvas_old.get_pixel(x, y);
            let b = canvas_new.get_pixel(x, y);

            if color_delta(a, b) > max_delta {
                mismatched += 1;
                diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                // Dimmed original as context around the highlighted regions
                let Rgba([r, g, bl, _]) = *a;
                diff_img.put_pixel(x, y, Rgba([r / 2, g / 2, bl / 2, 128]));
            }
        }
    }

    diff_img.save(path_diff)?;
    debug!(
        "Diffed {} vs {}: {} mismatched pixels",
        path_old.display(),
        path_new.display(),
        mismatched
    );

    Ok(mismatched)
}

/// Squared perceptual distance between two pixels in YIQ space
///
/// Alpha is composited onto white before conversion so translucent padding
/// compares against page background the way a viewer sees it.
fn color_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
    if a == b {
        return 0.0;
    }

    let (r1, g1, b1) = blend_onto_white(a);
    let (r2, g2, b2) = blend_onto_white(b);

    let y = rgb_to_y(r1, g1, b1) - rgb_to_y(r2, g2, b2);
    let i = rgb_to_i(r1, g1, b1) - rgb_to_i(r2, g2, b2);
    let q = rgb_to_q(r1, g1, b1) - rgb_to_q(r2, g2, b2);

    0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q
}

fn blend_onto_white(p: &Rgba<u8>) -> (f64, f64, f64) {
    let Rgba([r, g, b, a]) = *p;
    let alpha = a as f64 / 255.0;
    (
        255.0 + (r as f64 - 255.0) * alpha,
        255.0 + (g as f64 - 255.0) * alpha,
        255.0 + (b as f64 - 255.0) * alpha,
    )
}

fn rgb_to_y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23
}

fn rgb_to_i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.595_977_99 - g * 0.274_172_1 - b * 0.321_805_89
}

fn rgb_to_q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94
}
