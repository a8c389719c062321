use std::path::PathBuf;

/// Errors raised while building, running or loading a ShuffleNetV2 network.
#[derive(Debug, thiserror::Error)]
pub enum ShuffleNetError {
    /// The requested layout cannot be built.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The input tensor does not fit the built architecture.
    #[error("shape error: {0}")]
    Shape(String),

    /// Pretrained weights could not be loaded.
    #[error(transparent)]
    WeightLoad(#[from] WeightLoadError),

    /// Weights could not be written to the store.
    #[error("could not store weights for `{model_name}`: {reason}")]
    WeightSave { model_name: String, reason: String },
}

impl ShuffleNetError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}

/// Failures surfaced by a [`WeightStore`](crate::store::WeightStore).
#[derive(Debug, thiserror::Error)]
pub enum WeightLoadError {
    /// The store holds nothing under this name.
    #[error("no stored weights for `{model_name}` (looked at {path:?})")]
    Missing { model_name: String, path: PathBuf },

    /// The recorder could not read the stored file.
    #[error("recorder failed for `{model_name}`: {reason}")]
    Recorder { model_name: String, reason: String },

    /// A stored tensor's shape differs from the constructed model's.
    #[error("parameter `{name}` of `{model_name}`: expected shape {expected:?}, stored {stored:?}")]
    ShapeMismatch {
        model_name: String,
        name: String,
        expected: Vec<usize>,
        stored: Vec<usize>,
    },

    /// The stored parameter names or count differ from the model's.
    #[error("stored weights for `{model_name}` do not match the model layout: {reason}")]
    Layout { model_name: String, reason: String },
}
