pub use data::{Embedding, Face, KeyPoints, Normal, Rect, Tensor, TensorData};
pub use detect_model::DetectModel;
pub use embed_model::EmbedModel;
pub use restore_model::RestoreModel;
pub use swap_model::SwapModel;

use crate::{image::Image, Error, Result};

pub mod data;
pub mod detect_model;
pub mod embed_model;
pub mod restore_model;
pub mod swap_model;

/// Face-lookup seam so the pipeline can run against any detector backend.
pub trait Locator {
    fn locate(&mut self, image: &Image) -> Result<Vec<Face>>;
}

/// The detector is mandatory; every other model degrades to `None` with a
/// startup warning when its file is absent or refuses to load.
pub struct Models<D = DetectModel> {
    pub detect: D,
    pub embed: Option<EmbedModel>,
    pub swap: Option<SwapModel>,
    pub restore: Option<RestoreModel>,
}

impl Models {
    #[tracing::instrument(name = "Initializing models", skip(config), err)]
    pub fn new(config: &crate::setting::ModelConfig) -> Result<Self> {
        Ok(Self {
            detect: DetectModel::new(config.detector.clone())?,
            embed: load_optional("embedding", config.embedder.as_ref(), EmbedModel::new),
            swap: load_optional("swap", config.swapper.as_ref(), SwapModel::new),
            restore: load_optional("restoration", config.restorer.as_ref(), RestoreModel::new),
        })
    }
}

fn load_optional<M>(
    kind: &str,
    path: Option<&std::path::PathBuf>,
    load: impl FnOnce(std::path::PathBuf) -> Result<M>,
) -> Option<M> {
    match load(path?.clone()) {
        Ok(model) => Some(model),
        Err(err) => {
            tracing::warn!("{kind} model unavailable, continuing without it: {err}");
            None
        }
    }
}

#[tracing::instrument(err)]
pub fn register_ort(config: &crate::setting::ModelConfig) -> Result<()> {
    let onnx_env = ort::init().with_name("refacer_frame_processor");

    let onnx_env = match config.cuda {
        true => onnx_env.with_execution_providers([
            ort::execution_providers::CUDAExecutionProvider::default()
                .build()
                .error_on_failure(),
        ]),
        false => onnx_env,
    };

    onnx_env.commit().map_err(Error::ModelError)?;
    Ok(())
}

fn start_session_from_file(onnx_path: std::path::PathBuf) -> Result<ort::session::Session> {
    ort::session::Session::builder()
        .map_err(Error::ModelError)?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
        .map_err(Error::ModelError)?
        .with_intra_threads(4)
        .map_err(Error::ModelError)?
        .commit_from_file(onnx_path)
        .map_err(Error::ModelError)
}

fn single_io_names(session: &ort::session::Session, kind: &str) -> Result<(String, String)> {
    let input = session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .ok_or_else(|| Error::InvalidModelIOError(format!("{kind} model declares no input")))?;
    let output = session
        .outputs
        .first()
        .map(|output| output.name.clone())
        .ok_or_else(|| Error::InvalidModelIOError(format!("{kind} model declares no output")))?;

    Ok((input, output))
}
