use crate::shufflenet_v2::*;
use crate::utils::params::{NamedParams, ParamEntry, join};
use crate::utils::window_output_size;
use burn::nn::PaddingConfig2d;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::*;

/// Stem: 3x3/2 convolution followed by a 3x3/2 max-pool.
#[derive(Module, Debug)]
pub struct ShuffleInitBlock<B: Backend> {
    pub conv: ShuffleConv<B>,
    /// Unpadded; windows that do not fully fit the input are dropped.
    pub pool: MaxPool2d,
}

#[derive(Config, Debug)]
pub struct ShuffleInitBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
}

impl ShuffleInitBlockConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ShuffleInitBlock<B> {
        ShuffleInitBlock {
            conv: ShuffleConvConfig::new(self.in_channels, self.out_channels)
                .with_kernel_size(3)
                .with_stride(2)
                .with_padding(1)
                .init(device),
            pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(0, 0))
                .init(),
        }
    }
}

impl<B: Backend> ShuffleInitBlock<B> {
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, out_channels, height', width'], see [`init_block_output_size`]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        self.pool.forward(x)
    }
}

/// Spatial side produced by the init block from an input side of `input`, if any.
pub fn init_block_output_size(input: usize) -> Option<usize> {
    let conv = window_output_size(input, 3, 2, 1)?;
    window_output_size(conv, 3, 2, 0)
}

impl<B: Backend> NamedParams for ShuffleInitBlock<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        self.conv.collect_params(&join(prefix, "conv"), out);
    }
}
