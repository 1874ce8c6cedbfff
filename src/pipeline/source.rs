use crate::{
    image::Image,
    model::data::{Embedding, KeyPoints, Rect},
};

/// Everything captured from the registered source portrait. The aligned crop
/// and the identity embedding are best-effort; the pipeline still swaps
/// geometrically when either is missing.
#[derive(Debug)]
pub struct SourceFace {
    pub image: Image,
    pub rect: Rect,
    /// Absolute coordinates within `image`.
    pub keypoints: KeyPoints,
    pub aligned: Option<Image>,
    pub embedding: Option<Embedding>,
}

impl SourceFace {
    pub fn crop(&self) -> Image {
        self.rect.crop_from(&self.image)
    }
}
