use crate::{image::Image, Error, Result};

use super::data::{Embedding, Normal, Tensor};

pub struct EmbedModel {
    input_size: (usize, usize),
    input_name: String,
    output_name: String,
    session: ort::session::Session,
}

impl EmbedModel {
    // w600k_r50.onnx
    #[tracing::instrument(name = "Initialize embedding model", err)]
    pub fn new(onnx_path: std::path::PathBuf) -> Result<Self> {
        let session = super::start_session_from_file(onnx_path)?;
        let (input_name, output_name) = super::single_io_names(&session, "embedding")?;

        Ok(Self {
            input_size: (112, 112),
            input_name,
            output_name,
            session,
        })
    }

    /// Unit-length 512-d identity vector for an aligned face crop.
    pub fn run(&mut self, face: &Image) -> Result<Embedding> {
        let mut tensor = Tensor::from_image(face, Normal::N1ToP1);
        // (n, c, h, w)
        let (_, _, dy, dx) = tensor.dim();
        if (dy, dx) != self.input_size {
            tensor = tensor.resize(self.input_size);
        }

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() =>
                ort::value::Tensor::from_array(tensor.data).map_err(Error::ModelError)?])
            .map_err(Error::ModelError)?;

        let embedding: Embedding = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| {
                Error::InvalidModelIOError(format!("missing embedding output {}", self.output_name))
            })?
            .try_extract_array::<f32>()
            .map_err(Error::ModelError)?
            .to_shape((1, 512))
            .map_err(Error::as_unknown_error)?
            .to_owned()
            .into();

        match embedding.norm() {
            norm if norm > 0. => Ok(embedding.normalized()),
            _ => Err(Error::InvalidModelIOError(
                "embedding model produced a zero vector".to_owned(),
            )),
        }
    }
}
