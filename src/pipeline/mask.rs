use image::{GrayImage, Luma};
use imageproc::{drawing, filter, geometry, point::Point};

use crate::model::data::KeyPoints;

/// Soft composite weights over a face region; white where the swapped face
/// should dominate, fading to black at the region border.
pub fn build_mask(width: u32, height: u32, keypoints: Option<&KeyPoints>) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    match keypoints.and_then(|keypoints| face_hull(width, height, keypoints)) {
        Some(hull) => {
            drawing::draw_polygon_mut(&mut mask, &hull, Luma([255]));
            let kernel = force_odd((width.min(height) / 10).max(5));
            filter::gaussian_blur_f32(&mask, sigma_for_kernel(kernel))
        }
        None => {
            let (rx, ry) = (
                (width as f32 / 2. * 0.9) as i32,
                (height as f32 / 2. * 0.9) as i32,
            );
            drawing::draw_filled_ellipse_mut(
                &mut mask,
                (width as i32 / 2, height as i32 / 2),
                rx.max(1),
                ry.max(1),
                Luma([255]),
            );
            filter::gaussian_blur_f32(&mask, sigma_for_kernel(21))
        }
    }
}

/// Landmarks clamped into the region, corner anchors at a tenth-of-size
/// margin, and one forehead point mirrored up from the eye line. `None` when
/// the hull collapses below a drawable polygon.
fn face_hull(width: u32, height: u32, keypoints: &KeyPoints) -> Option<Vec<Point<i32>>> {
    let clamp = |[x, y]: [f32; 2]| {
        Point::new(
            (x.max(0.) as i32).min(width as i32 - 1),
            (y.max(0.) as i32).min(height as i32 - 1),
        )
    };
    let mut points: Vec<Point<i32>> = keypoints.iter().copied().map(clamp).collect();

    let margin = (width.min(height) / 10) as i32;
    points.extend([
        Point::new(margin, margin),
        Point::new(width as i32 - 1 - margin, margin),
        Point::new(width as i32 - 1 - margin, height as i32 - 1 - margin),
        Point::new(margin, height as i32 - 1 - margin),
    ]);

    let eye_mid_y = (keypoints.left_eye()[1] + keypoints.right_eye()[1]) / 2.;
    let forehead_y = (eye_mid_y - (keypoints.nose()[1] - eye_mid_y) * 0.5).max(0.);
    points.push(clamp([width as f32 / 2., forehead_y]));

    let hull = geometry::convex_hull(points);
    (hull.len() >= 3).then_some(hull)
}

fn force_odd(kernel: u32) -> u32 {
    match kernel % 2 {
        0 => kernel + 1,
        _ => kernel,
    }
}

// OpenCV's automatic sigma for a given Gaussian kernel size.
fn sigma_for_kernel(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.) * 0.5 - 1.) + 0.8
}
