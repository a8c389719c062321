//! Pretrained weight storage keyed by model name.

use crate::error::{ShuffleNetError, WeightLoadError};
use crate::utils::params::{NamedParams, ParamEntry};
use burn::prelude::*;
use burn::record::{FileRecorder, FullPrecisionSettings, NamedMpkFileRecorder};
use std::path::{Path, PathBuf};

/// Environment variable overriding the root of [`FileWeightStore::from_env`].
pub const MODEL_STORE_ENV: &str = "SHUFFLENET_MODEL_STORE";

/// Source of pretrained weights.
pub trait WeightStore {
    /// Loads the weights stored under `model_name` into `module`.
    ///
    /// The stored parameters must have exactly the shapes of `module`'s.
    fn load<B: Backend, M: Module<B> + NamedParams>(
        &self,
        model_name: &str,
        module: M,
        device: &B::Device,
    ) -> Result<M, WeightLoadError>;
}

type RecorderTy = NamedMpkFileRecorder<FullPrecisionSettings>;

/// One named-MessagePack file per model under a root directory.
#[derive(Debug, Clone)]
pub struct FileWeightStore {
    root: PathBuf,
    recorder: RecorderTy,
}

impl FileWeightStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recorder: NamedMpkFileRecorder::new(),
        }
    }

    /// Store rooted at `$SHUFFLENET_MODEL_STORE`, falling back to `$HOME/.burn/models`.
    pub fn from_env() -> Result<Self, ShuffleNetError> {
        if let Some(root) = std::env::var_os(MODEL_STORE_ENV) {
            return Ok(Self::new(root));
        }
        let home = std::env::var_os("HOME").ok_or_else(|| {
            ShuffleNetError::config(format!(
                "neither `{MODEL_STORE_ENV}` nor `HOME` is set to locate the model store"
            ))
        })?;
        Ok(Self::new(Path::new(&home).join(".burn").join("models")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `model_name`'s weights.
    ///
    /// The recorder's extension is appended, so dots inside `model_name` are kept.
    pub fn model_file<B: Backend>(&self, model_name: &str) -> PathBuf {
        let file_ext = <RecorderTy as FileRecorder<B>>::file_extension();
        self.root.join(format!("{model_name}.{file_ext}"))
    }

    /// Writes `module`'s weights under `model_name`, replacing any previous file.
    pub fn save<B: Backend, M: Module<B>>(
        &self,
        model_name: &str,
        module: &M,
    ) -> Result<PathBuf, ShuffleNetError> {
        let save_error = |reason: String| ShuffleNetError::WeightSave {
            model_name: model_name.to_string(),
            reason,
        };
        std::fs::create_dir_all(&self.root).map_err(|err| save_error(err.to_string()))?;
        let path = self.model_file::<B>(model_name);
        module
            .clone()
            .save_file(path.clone(), &self.recorder)
            .map_err(|err| save_error(format!("{err:?}")))?;
        log::debug!("stored weights `{model_name}` at {path:?}");
        Ok(path)
    }
}

impl WeightStore for FileWeightStore {
    fn load<B: Backend, M: Module<B> + NamedParams>(
        &self,
        model_name: &str,
        module: M,
        device: &B::Device,
    ) -> Result<M, WeightLoadError> {
        let path = self.model_file::<B>(model_name);
        if !path.is_file() {
            log::warn!("no stored weights for `{model_name}` at {path:?}");
            return Err(WeightLoadError::Missing {
                model_name: model_name.to_string(),
                path,
            });
        }

        let expected = module.named_params();
        let loaded = module
            .load_file(path.clone(), &self.recorder, device)
            .map_err(|err| WeightLoadError::Recorder {
                model_name: model_name.to_string(),
                reason: format!("{err:?}"),
            })?;
        check_layout(model_name, &expected, &loaded.named_params())?;

        log::info!("loaded weights `{model_name}` from {path:?}");
        Ok(loaded)
    }
}

/// Fails unless `stored` lists the same parameters with the same shapes as `expected`.
pub fn check_layout(
    model_name: &str,
    expected: &[ParamEntry],
    stored: &[ParamEntry],
) -> Result<(), WeightLoadError> {
    if expected.len() != stored.len() {
        return Err(WeightLoadError::Layout {
            model_name: model_name.to_string(),
            reason: format!("expected {} tensors, found {}", expected.len(), stored.len()),
        });
    }
    for (want, got) in expected.iter().zip(stored) {
        if want.name != got.name {
            return Err(WeightLoadError::Layout {
                model_name: model_name.to_string(),
                reason: format!("expected `{}`, found `{}`", want.name, got.name),
            });
        }
        if want.shape != got.shape {
            log::warn!("`{model_name}`: shape mismatch on `{}`", want.name);
            return Err(WeightLoadError::ShapeMismatch {
                model_name: model_name.to_string(),
                name: want.name.clone(),
                expected: want.shape.clone(),
                stored: got.shape.clone(),
            });
        }
    }
    Ok(())
}
