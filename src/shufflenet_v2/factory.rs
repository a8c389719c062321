//! Width-scaled ShuffleNetV2 variants.
//!
//! Every variant keeps the canonical unit counts and scales the stage widths
//! of the 1.0x network, truncating toward zero.

use crate::error::ShuffleNetError;
use crate::shufflenet_v2::*;
use crate::store::{FileWeightStore, WeightStore};
use burn::prelude::*;
use std::str::FromStr;

pub const INIT_BLOCK_CHANNELS: usize = 24;
pub const FINAL_BLOCK_CHANNELS: usize = 1024;
pub const UNITS_PER_STAGE: [usize; 3] = [4, 8, 4];
/// Per-stage widths of the 1.0x network.
pub const STAGE_CHANNELS: [usize; 3] = [116, 232, 464];

/// Above this scale the final block widens together with the stages.
pub const FINAL_BLOCK_SCALE_THRESHOLD: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShuffleNetV2Variant {
    /// ~0.5x
    Wd2,
    /// 1.0x
    W1,
    /// ~1.5x
    W3d2,
    /// ~2.0x
    W2,
}

/// A named variant, its width scale and the key of its pretrained weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantEntry {
    pub variant: ShuffleNetV2Variant,
    pub width_scale: f64,
    pub model_name: &'static str,
}

pub const VARIANTS: [VariantEntry; 4] = [
    VariantEntry {
        variant: ShuffleNetV2Variant::Wd2,
        width_scale: 12.0 / 29.0,
        model_name: "shufflenetv2_wd2",
    },
    VariantEntry {
        variant: ShuffleNetV2Variant::W1,
        width_scale: 1.0,
        model_name: "shufflenetv2_w1",
    },
    VariantEntry {
        variant: ShuffleNetV2Variant::W3d2,
        width_scale: 44.0 / 29.0,
        model_name: "shufflenetv2_w3d2",
    },
    VariantEntry {
        variant: ShuffleNetV2Variant::W2,
        width_scale: 61.0 / 29.0,
        model_name: "shufflenetv2_w2",
    },
];

impl ShuffleNetV2Variant {
    pub const ALL: [Self; 4] = [Self::Wd2, Self::W1, Self::W3d2, Self::W2];

    pub fn entry(self) -> &'static VariantEntry {
        let entry = match self {
            Self::Wd2 => &VARIANTS[0],
            Self::W1 => &VARIANTS[1],
            Self::W3d2 => &VARIANTS[2],
            Self::W2 => &VARIANTS[3],
        };
        debug_assert_eq!(entry.variant, self);
        entry
    }

    pub fn width_scale(self) -> f64 {
        self.entry().width_scale
    }

    pub fn model_name(self) -> &'static str {
        self.entry().model_name
    }

    /// Factory configuration with the variant's width scale and weight key.
    pub fn config(self) -> WidthScaledConfig {
        WidthScaledConfig::new(self.width_scale())
            .with_model_name(Some(self.model_name().to_string()))
    }
}

impl FromStr for ShuffleNetV2Variant {
    type Err = ShuffleNetError;

    /// Accepts either the short suffix (`w1`) or the full model name (`shufflenetv2_w1`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let suffix = s.strip_prefix("shufflenetv2_").unwrap_or(s);
        VARIANTS
            .iter()
            .find(|entry| entry.model_name.strip_prefix("shufflenetv2_") == Some(suffix))
            .map(|entry| entry.variant)
            .ok_or_else(|| ShuffleNetError::config(format!("unknown ShuffleNetV2 variant `{s}`")))
    }
}

/// Builds a ShuffleNetV2 network from a width multiplier.
#[derive(Config, Debug)]
pub struct WidthScaledConfig {
    /// Multiplier applied to every stage width. Must be positive.
    pub width_scale: f64,

    /// Key of the pretrained weights in the weight store.
    #[config(default = "None")]
    pub model_name: Option<String>,

    /// Whether to load pretrained weights; requires [`Self::model_name`].
    #[config(default = false)]
    pub pretrained: bool,

    #[config(default = false)]
    pub use_se: bool,

    #[config(default = false)]
    pub use_residual: bool,

    #[config(default = 3)]
    pub in_channels: usize,

    #[config(default = 1000)]
    pub classes: usize,
}

impl WidthScaledConfig {
    /// Derives the network layout for [`Self::width_scale`].
    ///
    /// Stage widths are scaled and truncated whenever the scale differs from 1;
    /// the final block only grows for scales above [`FINAL_BLOCK_SCALE_THRESHOLD`].
    pub fn network_config(&self) -> Result<ShuffleNetV2Config, ShuffleNetError> {
        let width_scale = self.width_scale;
        if !(width_scale.is_finite() && width_scale > 0.0) {
            return Err(ShuffleNetError::config(format!(
                "width scale must be a positive number, got {width_scale}"
            )));
        }

        let mut channels: Vec<Vec<usize>> = STAGE_CHANNELS
            .iter()
            .zip(UNITS_PER_STAGE)
            .map(|(&c, units)| vec![c; units])
            .collect();
        let mut final_block_channels = FINAL_BLOCK_CHANNELS;

        if width_scale != 1.0 {
            for stage in channels.iter_mut() {
                for c in stage.iter_mut() {
                    *c = (*c as f64 * width_scale) as usize;
                }
            }
            if width_scale > FINAL_BLOCK_SCALE_THRESHOLD {
                final_block_channels = (final_block_channels as f64 * width_scale) as usize;
            }
        }
        log::debug!(
            "width scale {width_scale}: stage channels {:?}, final block {final_block_channels}",
            channels.iter().map(|stage| stage[0]).collect::<Vec<_>>()
        );

        Ok(
            ShuffleNetV2Config::new(channels, INIT_BLOCK_CHANNELS, final_block_channels)
                .with_use_se(self.use_se)
                .with_use_residual(self.use_residual)
                .with_in_channels(self.in_channels)
                .with_classes(self.classes),
        )
    }

    /// Key to load pretrained weights with, if pretrained weights are requested.
    fn pretrained_key(&self) -> Result<Option<&str>, ShuffleNetError> {
        if !self.pretrained {
            return Ok(None);
        }
        match self.model_name.as_deref() {
            Some(name) if !name.is_empty() => Ok(Some(name)),
            _ => Err(ShuffleNetError::config(
                "`model_name` must be set to load a pretrained model",
            )),
        }
    }

    /// Returns the initialized model.
    ///
    /// Pretrained weights, if requested, are read from [`FileWeightStore::from_env`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ShuffleNetV2<B>, ShuffleNetError> {
        match self.pretrained_key()? {
            None => self.network_config()?.init(device),
            Some(_) => self.init_with_store(&FileWeightStore::from_env()?, device),
        }
    }

    /// Returns the initialized model, loading pretrained weights from `store` if requested.
    pub fn init_with_store<B: Backend, S: WeightStore>(
        &self,
        store: &S,
        device: &B::Device,
    ) -> Result<ShuffleNetV2<B>, ShuffleNetError> {
        let key = self.pretrained_key()?;
        let net = self.network_config()?.init(device)?;
        match key {
            None => Ok(net),
            Some(model_name) => {
                log::info!("loading pretrained weights `{model_name}`");
                Ok(store.load::<B, _>(model_name, net, device)?)
            }
        }
    }
}
