pub mod error;
pub mod image;
pub mod math;
pub mod model;
pub mod pipeline;
pub mod result;
pub mod setting;
pub mod tracing;

pub use error::Error;
pub use result::Result;
