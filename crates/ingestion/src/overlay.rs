//! ROI masking and outline for the analysed frame.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);

/// Black out everything outside `roi` and draw its outline.
///
/// A degenerate ROI (closed or collapsed polygon) leaves the pixels unmasked
/// and only the outline is drawn.
pub fn mask_roi(image: &RgbImage, roi: &[(f64, f64); 4]) -> RgbImage {
    let mut out = image.clone();
    let poly: Vec<Point<i32>> = roi
        .iter()
        .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
        .collect();

    let distinct = poly.windows(2).all(|w| w[0] != w[1]) && poly[0] != poly[poly.len() - 1];
    if distinct {
        let mut mask = GrayImage::new(image.width(), image.height());
        draw_polygon_mut(&mut mask, &poly, Luma([255]));
        for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
            if m.0[0] == 0 {
                *pixel = Rgb([0, 0, 0]);
            }
        }
    }
    draw_outline(&mut out, roi);
    out
}

pub fn draw_outline(image: &mut RgbImage, roi: &[(f64, f64); 4]) {
    for i in 0..roi.len() {
        let (x0, y0) = roi[i];
        let (x1, y1) = roi[(i + 1) % roi.len()];
        draw_line_segment_mut(
            image,
            (x0 as f32, y0 as f32),
            (x1 as f32, y1 as f32),
            OUTLINE,
        );
    }
}
