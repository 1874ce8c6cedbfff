pub use embedding::{Embedding, EmbeddingData};
pub use face::{Face, KeyPoints, Rect};
pub use tensor::{Normal, Tensor, TensorData};

pub mod embedding;
pub mod face;
pub mod tensor;
