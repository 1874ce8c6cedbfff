use crate::{image::Image, Error, Result};

use super::data::{Embedding, Normal, Tensor};

// tar: (1, 3, 128, 128) | src: (1, 512)
pub struct SwapModel {
    input_size: (usize, usize),
    target_name: String,
    source_name: String,
    output_name: String,
    session: ort::session::Session,
}

impl SwapModel {
    // inswapper_128.onnx
    #[tracing::instrument(name = "Initialize swap model", err)]
    pub fn new(onnx_path: std::path::PathBuf) -> Result<Self> {
        let session = super::start_session_from_file(onnx_path)?;
        let mut inputs = session.inputs.iter().map(|input| input.name.clone());
        let (target_name, source_name) = inputs.next().zip(inputs.next()).ok_or_else(|| {
            Error::InvalidModelIOError("swap model declares fewer than two inputs".to_owned())
        })?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| Error::InvalidModelIOError("swap model declares no output".to_owned()))?;

        Ok(Self {
            input_size: (128, 128),
            target_name,
            source_name,
            output_name,
            session,
        })
    }

    /// Re-identified face, channel-first `[-1, 1]`, at the model resolution.
    pub fn run(&mut self, target: &Image, source: &Embedding) -> Result<Tensor> {
        let mut tensor = Tensor::from_image(target, Normal::N1ToP1);
        // (n, c, h, w)
        let (_, _, dy, dx) = tensor.dim();
        if (dy, dx) != self.input_size {
            tensor = tensor.resize(self.input_size);
        }
        let dim = tensor.dim();

        let outputs = self
            .session
            .run(ort::inputs![
                self.target_name.as_str() =>
                    ort::value::Tensor::from_array(tensor.data).map_err(Error::ModelError)?,
                self.source_name.as_str() =>
                    ort::value::Tensor::from_array(source.0.clone()).map_err(Error::ModelError)?,
            ])
            .map_err(Error::ModelError)?;

        Ok(Tensor {
            normal: Normal::N1ToP1,
            data: outputs
                .get(self.output_name.as_str())
                .ok_or_else(|| {
                    Error::InvalidModelIOError(format!("missing swap output {}", self.output_name))
                })?
                .try_extract_array::<f32>()
                .map_err(Error::ModelError)?
                .to_shape(dim)
                .map_err(Error::as_unknown_error)?
                .to_owned(),
        })
    }
}
