use image::{GrayImage, Luma, Rgb};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use crate::{error::Error, result::Result};

// RgbImage = ImageBuffer<Rgb<u8>, Vec<u8>>
#[derive(Debug, Clone, PartialEq)]
pub struct Image(image::RgbImage);

impl Default for Image {
    fn default() -> Self {
        Self(image::RgbImage::new(0, 0))
    }
}

impl Image {
    pub fn from_path(path: std::path::PathBuf) -> Result<Self> {
        let image = image::open(path).map_err(Error::ImageError)?;
        Ok(Self(image.to_rgb8()))
    }

    pub fn save(&self, path: std::path::PathBuf) -> Result<()> {
        self.0.save(path).map_err(Error::ImageError)
    }

    /// Copies the sub-region starting at `(x, y)`. The caller guarantees the
    /// region lies within bounds (rects are clamped before extraction).
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self(image::imageops::crop_imm(&self.0, x, y, width, height).to_image())
    }

    pub fn resize(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self(image::imageops::resize(
            &self.0,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }

    /// Warps through a forward transform (input pixel -> output pixel) into a
    /// `width` x `height` canvas, bilinear, black fill. `None` when the
    /// transform is not invertible.
    pub fn warp_into_new(
        &self,
        transform: &nalgebra::Matrix3<f32>,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        let projection = Projection::from_matrix([
            transform.m11,
            transform.m12,
            transform.m13,
            transform.m21,
            transform.m22,
            transform.m23,
            transform.m31,
            transform.m32,
            transform.m33,
        ])?;

        let mut out = image::RgbImage::new(width, height);
        warp_into(
            &self.0,
            &projection,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
            &mut out,
        );
        Some(Self(out))
    }

    /// Per-channel histogram equalization, used as optional detection
    /// preprocessing under varying lighting.
    pub fn equalize_contrast(&self) -> Self {
        let (width, height) = self.dimensions();
        let mut channels =
            [0, 1, 2].map(|c| GrayImage::from_fn(width, height, |x, y| Luma([self.0[(x, y)][c]])));
        for channel in channels.iter_mut() {
            *channel = imageproc::contrast::equalize_histogram(channel);
        }
        Self(image::RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                channels[0][(x, y)][0],
                channels[1][(x, y)][0],
                channels[2][(x, y)][0],
            ])
        }))
    }
}

impl From<image::RgbImage> for Image {
    fn from(value: image::RgbImage) -> Self {
        Self(value)
    }
}

impl std::ops::Deref for Image {
    type Target = image::RgbImage;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Image {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
