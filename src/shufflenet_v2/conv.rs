use crate::utils::params::{NamedParams, ParamEntry, join};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Bias-free 1x1 convolution.
pub fn conv1x1(in_channels: usize, out_channels: usize) -> Conv2dConfig {
    Conv2dConfig::new([in_channels, out_channels], [1, 1]).with_bias(false)
}

/// Bias-free depthwise 3x3 convolution (one filter per channel), padded by 1.
pub fn depthwise_conv3x3(channels: usize, stride: usize) -> Conv2dConfig {
    Conv2dConfig::new([channels, channels], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_groups(channels)
        .with_bias(false)
}

/// Convolution followed by batch normalization and ReLU.
#[derive(Module, Debug)]
pub struct ShuffleConv<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
}

#[derive(Config, Debug)]
pub struct ShuffleConvConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    #[config(default = 1)]
    pub kernel_size: usize,
    #[config(default = 1)]
    pub stride: usize,
    #[config(default = 0)]
    pub padding: usize,
}

impl ShuffleConvConfig {
    /// The 1x1 variant used by the final block.
    pub fn pointwise(in_channels: usize, out_channels: usize) -> Self {
        Self::new(in_channels, out_channels)
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ShuffleConv<B> {
        let kernel = [self.kernel_size, self.kernel_size];
        let conv = Conv2dConfig::new([self.in_channels, self.out_channels], kernel)
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
            .with_bias(false)
            .init(device);
        ShuffleConv {
            conv,
            bn: BatchNormConfig::new(self.out_channels).init(device),
        }
    }
}

impl<B: Backend> ShuffleConv<B> {
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, out_channels, height', width']
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        relu(x)
    }

    pub fn out_channels(&self) -> usize {
        let [out_channels] = self.bn.gamma.dims();
        out_channels
    }
}

impl<B: Backend> NamedParams for ShuffleConv<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        self.conv.collect_params(&join(prefix, "conv"), out);
        self.bn.collect_params(&join(prefix, "bn"), out);
    }
}
