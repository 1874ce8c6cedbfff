use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::{image::Image, model::data::Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Per-pixel weights from the face mask.
    #[default]
    Mask,
    /// One global ratio for every pixel, ignoring the mask.
    Fixed,
}

/// Blends a synthesized face into `frame` at `rect`. Geometry that does not
/// fit the frame leaves it byte-for-byte untouched.
pub fn composite(
    frame: &mut Image,
    rect: &Rect,
    face: &Image,
    mask: &GrayImage,
    mode: BlendMode,
    strength: f32,
) {
    let (frame_w, frame_h) = frame.dimensions();
    if rect.width == 0 || rect.height == 0 || !rect.within(frame_w, frame_h) {
        return;
    }

    let face = face.resize(rect.width, rect.height);
    let mask = match mask.dimensions() == (rect.width, rect.height) {
        true => mask.clone(),
        false => image::imageops::resize(
            mask,
            rect.width,
            rect.height,
            image::imageops::FilterType::Triangle,
        ),
    };

    for y in 0..rect.height {
        for x in 0..rect.width {
            let weight = match mode {
                BlendMode::Mask => mask.get_pixel(x, y).0[0] as f32 / 255.,
                BlendMode::Fixed => strength,
            };
            let original = frame.get_pixel_mut(rect.x + x, rect.y + y);
            let swapped = face.get_pixel(x, y);
            for channel in 0..3 {
                let blended = swapped.0[channel] as f32 * weight
                    + original.0[channel] as f32 * (1. - weight);
                original.0[channel] = blended.round() as u8;
            }
        }
    }
}
