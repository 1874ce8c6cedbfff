use std::error::Error as StdError;

#[derive(Debug)]
pub enum Error {
    ModelError(ort::Error),
    ImageError(image::ImageError),
    ConfigError(config::ConfigError),
    InvalidModelIOError(String),
    NoSourceFaceError(String),
    UnknownError(Box<dyn StdError>),
}

impl Error {
    pub fn as_unknown_error(err: impl StdError + 'static) -> Self {
        Self::UnknownError(Box::new(err))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ModelError(err) => write!(f, "model error: {}", err),
            Error::ImageError(err) => write!(f, "image error: {}", err),
            Error::ConfigError(err) => write!(f, "configuration error: {}", err),
            Error::InvalidModelIOError(msg) => write!(f, "invalid model io: {}", msg),
            Error::NoSourceFaceError(msg) => write!(f, "source face rejected: {}", msg),
            Error::UnknownError(err) => write!(f, "unknown error: {}", err),
        }
    }
}

impl StdError for Error {}
