pub use keypoints::KeyPoints;

pub mod keypoints;

/// Axis-aligned face region, already clamped to its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Clamps a raw detection box (top-left + size, in pixels) to a
    /// `frame_width` x `frame_height` frame. `None` when nothing of the box
    /// remains inside the frame.
    pub fn from_detection(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return None;
        }
        let left = (x as i64).max(0);
        let top = (y as i64).max(0);
        let width = (width as i64).min(frame_width as i64 - left);
        let height = (height as i64).min(frame_height as i64 - top);
        if width <= 0 || height <= 0 {
            return None;
        }
        Some(Self {
            x: left as u32,
            y: top as u32,
            width: width as u32,
            height: height as u32,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when the rect lies fully inside a `width` x `height` frame.
    pub fn within(&self, width: u32, height: u32) -> bool {
        self.x + self.width <= width && self.y + self.height <= height
    }

    pub fn crop_from(&self, image: &crate::image::Image) -> crate::image::Image {
        image.crop(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct Face {
    pub score: f32,
    pub rect: Rect,
    pub keypoints: KeyPoints,
}
