//! ShuffleNetV2 classifier assembled from an init block, stages of shuffle units,
//! a final pointwise block, global average pooling and a linear head.
//!
//! References:
//! - ShuffleNet V2: Practical Guidelines for Efficient CNN Architecture Design, https://arxiv.org/abs/1807.11164

use crate::error::ShuffleNetError;
use crate::shufflenet_v2::*;
use crate::utils::params::{NamedParams, ParamEntry, join};
use crate::utils::window_output_size;
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

#[derive(Module, Debug)]
pub struct ShuffleNetV2<B: Backend> {
    pub init_block: ShuffleInitBlock<B>,
    pub stages: Vec<ShuffleStage<B>>,
    pub final_block: ShuffleConv<B>,
    pub final_pool: AvgPool2d,
    /// Side of the feature map expected right before [`Self::final_pool`].
    pub final_pool_size: usize,
    pub output: Linear<B>,
}

#[derive(Config, Debug)]
pub struct ShuffleNetV2Config {
    /// Output channels of every unit, grouped by stage.
    pub channels: Vec<Vec<usize>>,

    /// Output channels of the init block.
    pub init_block_channels: usize,

    /// Output channels of the final pointwise block, which is also the width of the classifier input.
    pub final_block_channels: usize,

    /// Whether every unit gates its transform branch with squeeze-and-excitation.
    #[config(default = false)]
    pub use_se: bool,

    /// Whether regular units add their second input half back to the transformed half.
    #[config(default = false)]
    pub use_residual: bool,

    #[config(default = 3)]
    pub in_channels: usize,

    #[config(default = 1000)]
    pub classes: usize,

    /// Kernel of the final average pool.
    ///
    /// With the default of 7, the network expects 224x224 inputs
    /// (two stride-2 reductions in the init block and one per stage).
    #[config(default = 7)]
    pub final_pool_size: usize,
}

impl ShuffleNetV2Config {
    /// Checks the layout-wide constraints; per-unit constraints are checked when the units are built.
    pub fn validate(&self) -> Result<(), ShuffleNetError> {
        let positive = [
            ("in_channels", self.in_channels),
            ("init_block_channels", self.init_block_channels),
            ("final_block_channels", self.final_block_channels),
            ("classes", self.classes),
            ("final_pool_size", self.final_pool_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ShuffleNetError::config(format!("`{name}` must be positive")));
            }
        }
        if self.channels.is_empty() {
            return Err(ShuffleNetError::config("at least one stage is required"));
        }
        Ok(())
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ShuffleNetV2<B>, ShuffleNetError> {
        self.validate()?;

        let init_block =
            ShuffleInitBlockConfig::new(self.in_channels, self.init_block_channels).init(device);

        let mut stages = Vec::with_capacity(self.channels.len());
        let mut in_channels = self.init_block_channels;
        for (i, channels_per_stage) in self.channels.iter().enumerate() {
            let stage_config = ShuffleStageConfig::new(in_channels, channels_per_stage.clone())
                .with_use_se(self.use_se)
                .with_use_residual(self.use_residual);
            log::debug!(
                "stage {}: {} units, {} -> {} channels",
                i + 1,
                channels_per_stage.len(),
                in_channels,
                stage_config.out_channels()
            );
            stages.push(stage_config.init(device)?);
            in_channels = stage_config.out_channels();
        }

        let final_block =
            ShuffleConvConfig::pointwise(in_channels, self.final_block_channels).init(device);
        let final_pool = AvgPool2dConfig::new([self.final_pool_size, self.final_pool_size])
            .with_strides([1, 1])
            .init();
        let output = LinearConfig::new(self.final_block_channels, self.classes).init(device);

        Ok(ShuffleNetV2 {
            init_block,
            stages,
            final_block,
            final_pool,
            final_pool_size: self.final_pool_size,
            output,
        })
    }
}

impl<B: Backend> ShuffleNetV2<B> {
    /// See also [`Self::try_forward`].
    ///
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, in_channels, _, _] = x.dims();
        debug_assert_eq!(self.in_channels(), in_channels);

        let mut x = self.init_block.forward(x);
        for stage in self.stages.iter() {
            x = stage.forward(x);
        }
        let x = self.final_block.forward(x);
        let [_, final_channels, height, width] = x.dims();
        debug_assert_eq!([self.final_pool_size; 2], [height, width]);

        let x = self.final_pool.forward(x);
        let x = x.reshape([batch, final_channels]);
        let x = self.output.forward(x);
        debug_assert_eq!([batch, self.classes()], x.dims());

        x
    }

    /// Same as [`Self::forward`], after checking that the input fits the architecture.
    ///
    /// The channel count must equal the configured input channels, and both
    /// spatial sides must reduce to exactly [`Self::final_pool_size`].
    pub fn try_forward(&self, x: Tensor<B, 4>) -> Result<Tensor<B, 2>, ShuffleNetError> {
        let [batch, channels, height, width] = x.dims();
        if batch == 0 {
            return Err(ShuffleNetError::shape("empty batch"));
        }
        if channels != self.in_channels() {
            return Err(ShuffleNetError::shape(format!(
                "expected {} input channels, got {channels}",
                self.in_channels()
            )));
        }
        for (axis, side) in [("height", height), ("width", width)] {
            match self.feature_map_size(side) {
                Some(size) if size == self.final_pool_size => {}
                reduced => {
                    return Err(ShuffleNetError::shape(format!(
                        "input {axis} {side} reduces to {reduced:?} before the final pool, expected {}",
                        self.final_pool_size
                    )));
                }
            }
        }
        Ok(self.forward(x))
    }

    /// Side of the feature map entering the final pool for an input side of `input`.
    pub fn feature_map_size(&self, input: usize) -> Option<usize> {
        let mut size = init_block_output_size(input)?;
        for unit in self.stages.iter().flat_map(|stage| stage.units.iter()) {
            if unit.is_downsample() {
                size = window_output_size(size, 3, 2, 1)?;
            }
        }
        Some(size)
    }

    pub fn in_channels(&self) -> usize {
        let [_, in_channels, _, _] = self.init_block.conv.conv.weight.dims();
        in_channels
    }

    pub fn classes(&self) -> usize {
        let [_, classes] = self.output.weight.dims();
        classes
    }

    pub fn final_block_channels(&self) -> usize {
        self.final_block.out_channels()
    }

    /// Output channels of every unit, grouped by stage.
    pub fn stage_channels(&self) -> Vec<Vec<usize>> {
        self.stages
            .iter()
            .map(|stage| stage.units.iter().map(ShuffleUnit::out_channels).collect())
            .collect()
    }
}

impl<B: Backend> NamedParams for ShuffleNetV2<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        self.init_block.collect_params(&join(prefix, "init_block"), out);
        self.stages.collect_params(&join(prefix, "stages"), out);
        self.final_block.collect_params(&join(prefix, "final_block"), out);
        self.output.collect_params(&join(prefix, "output"), out);
    }
}
