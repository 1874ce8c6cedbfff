pub type EmbeddingData = ndarray::Array<f32, ndarray::Dim<[usize; 2]>>;

/// A `(1, 512)` identity vector.
#[derive(Debug, Clone)]
pub struct Embedding(pub EmbeddingData);

impl Embedding {
    pub fn new(array: EmbeddingData) -> Self {
        Self(array)
    }

    pub fn norm(&self) -> f32 {
        self.0.flatten().map(|v| v * v).sum().sqrt()
    }

    pub fn normalized(&self) -> Self {
        Self(&self.0 / self.norm())
    }

    /// Cosine similarity for unit vectors.
    pub fn dot(&self, other: &Self) -> f32 {
        (&self.0 * &other.0).sum()
    }
}

impl From<EmbeddingData> for Embedding {
    fn from(value: EmbeddingData) -> Self {
        Self(value)
    }
}

impl std::ops::Deref for Embedding {
    type Target = EmbeddingData;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Embedding {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
