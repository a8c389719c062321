use crate::error::ShuffleNetError;
use crate::utils::params::{NamedParams, ParamEntry, join};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid};

/// Squeeze-and-excitation gate.
///
/// Channels are averaged over the spatial extent, squeezed to
/// `channels / reduction`, expanded back and passed through a sigmoid; the
/// result rescales each input channel.
#[derive(Module, Debug)]
pub struct SeBlock<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
}

#[derive(Config, Debug)]
pub struct SeBlockConfig {
    pub channels: usize,
    #[config(default = 16)]
    pub reduction: usize,
}

impl SeBlockConfig {
    pub fn mid_channels(&self) -> usize {
        self.channels / self.reduction.max(1)
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SeBlock<B>, ShuffleNetError> {
        let mid_channels = self.mid_channels();
        if self.reduction == 0 || mid_channels == 0 {
            return Err(ShuffleNetError::config(format!(
                "squeeze-and-excitation: {} channels with reduction {} leave no squeezed channel",
                self.channels, self.reduction
            )));
        }
        Ok(SeBlock {
            conv1: Conv2dConfig::new([self.channels, mid_channels], [1, 1]).init(device),
            conv2: Conv2dConfig::new([mid_channels, self.channels], [1, 1]).init(device),
        })
    }
}

impl<B: Backend> SeBlock<B> {
    /// # Shapes
    ///   - Input [batch, channels, height, width]
    ///   - Output [batch, channels, height, width]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, _, _] = x.dims();

        let w = x.clone().mean_dim(3).mean_dim(2);
        debug_assert_eq!([batch, channels, 1, 1], w.dims());
        let w = relu(self.conv1.forward(w));
        let w = sigmoid(self.conv2.forward(w));

        x.clone() * w.expand(x.shape())
    }
}

impl<B: Backend> NamedParams for SeBlock<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        self.conv1.collect_params(&join(prefix, "conv1"), out);
        self.conv2.collect_params(&join(prefix, "conv2"), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn too_narrow_for_reduction() {
        let device = Default::default();
        let se = SeBlockConfig::new(8).init::<TestBackend>(&device);
        assert!(matches!(se, Err(ShuffleNetError::Configuration(_))));
    }

    #[test]
    fn gate_scales_channels_into_unit_range() {
        let device = Default::default();
        let se = SeBlockConfig::new(32).init::<TestBackend>(&device).unwrap();
        assert_eq!(se.conv1.weight.dims(), [2, 32, 1, 1]);

        let x = Tensor::<TestBackend, 4>::random(
            [2, 32, 5, 5],
            Distribution::Uniform(1., 2.),
            &device,
        );
        let y = se.forward(x.clone());
        assert_eq!(y.dims(), [2, 32, 5, 5]);

        // every gate value lies in (0, 1), so positive inputs can only shrink
        let ratio = y / x;
        assert!(ratio.clone().max().into_scalar() <= 1.);
        assert!(ratio.min().into_scalar() >= 0.);
    }
}
