use crate::{image::Image, Error, Result};

use super::data::{Normal, Tensor};

pub struct RestoreModel {
    input_size: (usize, usize),
    input_name: String,
    output_name: String,
    session: ort::session::Session,
}

impl RestoreModel {
    // gfpgan_1_4.onnx
    #[tracing::instrument(name = "Initialize restoration model", err)]
    pub fn new(onnx_path: std::path::PathBuf) -> Result<Self> {
        let session = super::start_session_from_file(onnx_path)?;
        let (input_name, output_name) = super::single_io_names(&session, "restoration")?;

        Ok(Self {
            input_size: (512, 512),
            input_name,
            output_name,
            session,
        })
    }

    /// Detail-enhanced face, back at the input's own resolution.
    pub fn run(&mut self, face: &Image) -> Result<Image> {
        let (width, height) = face.dimensions();
        let mut tensor = Tensor::from_image(face, Normal::N1ToP1);
        // (n, c, h, w)
        let (_, _, dy, dx) = tensor.dim();
        if (dy, dx) != self.input_size {
            tensor = tensor.resize(self.input_size);
        }
        let dim = tensor.dim();

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() =>
                ort::value::Tensor::from_array(tensor.data).map_err(Error::ModelError)?])
            .map_err(Error::ModelError)?;

        let restored = Tensor {
            normal: Normal::N1ToP1,
            data: outputs
                .get(self.output_name.as_str())
                .ok_or_else(|| {
                    Error::InvalidModelIOError(format!(
                        "missing restoration output {}",
                        self.output_name
                    ))
                })?
                .try_extract_array::<f32>()
                .map_err(Error::ModelError)?
                .to_shape(dim)
                .map_err(Error::as_unknown_error)?
                .to_owned(),
        };

        Ok(restored.to_image().resize(width, height))
    }
}
