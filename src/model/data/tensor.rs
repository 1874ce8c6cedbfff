pub type TensorData = ndarray::Array<f32, ndarray::Dim<[usize; 4]>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normal {
    /// Negative One To Plus One
    N1ToP1,
    /// Zero to Plus One
    ZeroToP1,
    /// Zero to 255
    U8,
}

/// Channel-first image tensor, `(n, c, h, w)`, with the pixel normalization
/// it was built with.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub normal: Normal,
    pub data: TensorData,
}

impl Default for Tensor {
    fn default() -> Self {
        Self {
            normal: Normal::N1ToP1,
            data: ndarray::Array::zeros((1, 3, 128, 128)),
        }
    }
}

impl Tensor {
    pub fn new(data: TensorData, normal: Normal) -> Self {
        Self { normal, data }
    }

    /// Interleaved 8-bit RGB -> `(1, 3, h, w)` float, scaled per `normal`.
    pub fn from_image(image: &crate::image::Image, normal: Normal) -> Self {
        let (width, height) = image.dimensions();
        Self {
            normal,
            data: TensorData::from_shape_fn(
                (1, 3, height as usize, width as usize),
                |(_, c, y, x)| {
                    let value = image[(x as u32, y as u32)][c] as f32;
                    match normal {
                        Normal::N1ToP1 => value / 127.5 - 1.,
                        Normal::ZeroToP1 => value / 255.,
                        Normal::U8 => value,
                    }
                },
            ),
        }
    }

    /// The one layout conversion back out of model space:
    /// `(1, 3, h, w)` channel-first float -> `h x w` interleaved 8-bit RGB,
    /// denormalized per `normal`, rounded, saturating at `[0, 255]`.
    pub fn to_image(&self) -> crate::image::Image {
        let (_, _, height, width) = self.dim();
        let (normal, data) = (self.normal, &self.data);
        crate::image::Image::from(image::RgbImage::from_par_fn(
            width as u32,
            height as u32,
            |x, y| {
                image::Rgb([0, 1, 2].map(|c| {
                    let value = data[(0, c, y as usize, x as usize)];
                    let denorm = match normal {
                        Normal::N1ToP1 => value * 127.5 + 127.5,
                        Normal::ZeroToP1 => value * 255.,
                        Normal::U8 => value,
                    };
                    denorm.round().clamp(0., 255.) as u8
                }))
            },
        ))
    }

    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    /// Bilinear resize to `(height, width)`.
    pub fn resize(&self, size: (usize, usize)) -> Self {
        let (_, _, cur_h, cur_w) = self.dim();
        if (cur_h, cur_w) == size {
            return self.clone();
        }
        let (h_scale_factor, w_scale_factor) = (
            if size.0 != 0 {
                cur_h as f32 / size.0 as f32
            } else {
                0.
            },
            if size.1 != 0 {
                cur_w as f32 / size.1 as f32
            } else {
                0.
            },
        );

        let new_arr = ndarray::Zip::from(&ndarray::Array::<
            (usize, usize, usize, usize),
            ndarray::Dim<[usize; 4]>,
        >::from_shape_fn(
            (1, 3, size.0, size.1), |dim| dim
        ))
        .par_map_collect(|(n, c, y, x)| {
            // sample position in the current grid
            let (ny, nx) = ((*y as f32) * h_scale_factor, (*x as f32) * w_scale_factor);
            let (y_floor, y_ceil) = (
                ny.floor() as usize,
                std::cmp::min(ny.ceil() as usize, cur_h - 1),
            );
            let (x_floor, x_ceil) = (
                nx.floor() as usize,
                std::cmp::min(nx.ceil() as usize, cur_w - 1),
            );

            if y_ceil == y_floor && x_ceil == x_floor {
                return self.data[(*n, *c, ny as usize, nx as usize)];
            }

            if y_ceil == y_floor {
                let (q1, q2) = (
                    self.data[(*n, *c, ny as usize, x_floor)],
                    self.data[(*n, *c, ny as usize, x_ceil)],
                );
                return q1 * (x_ceil as f32 - nx) + q2 * (nx - x_floor as f32);
            }

            if x_ceil == x_floor {
                let (q1, q2) = (
                    self.data[(*n, *c, y_floor, nx as usize)],
                    self.data[(*n, *c, y_ceil, nx as usize)],
                );
                return q1 * (y_ceil as f32 - ny) + q2 * (ny - y_floor as f32);
            }

            // corner values
            let (v1, v2, v3, v4) = (
                self.data[(*n, *c, y_floor, x_floor)],
                self.data[(*n, *c, y_floor, x_ceil)],
                self.data[(*n, *c, y_ceil, x_floor)],
                self.data[(*n, *c, y_ceil, x_ceil)],
            );
            let (q1, q2) = (
                v1 * (x_ceil as f32 - nx) + v2 * (nx - x_floor as f32),
                v3 * (x_ceil as f32 - nx) + v4 * (nx - x_floor as f32),
            );
            q1 * (y_ceil as f32 - ny) + q2 * (ny - y_floor as f32)
        });

        Self {
            normal: self.normal,
            data: new_arr,
        }
    }
}

impl From<Tensor> for TensorData {
    fn from(value: Tensor) -> Self {
        value.data
    }
}

impl std::ops::Deref for Tensor {
    type Target = TensorData;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl std::ops::DerefMut for Tensor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}
