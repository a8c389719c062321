use crate::error::ShuffleNetError;
use crate::shufflenet_v2::*;
use crate::utils::params::{NamedParams, ParamEntry, join};
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, BatchNormConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// ShuffleNetV2 unit.
///
/// Both variants produce two branches of `out_channels / 2` channels each,
/// concatenate them and shuffle the result with two groups.
#[derive(Module, Debug)]
pub enum ShuffleUnit<B: Backend> {
    /// Stride 1: the first input half passes through, the second is transformed.
    Regular(RegularUnit<B>),
    /// Stride 2: the full input feeds both branches.
    Downsample(DownsampleUnit<B>),
}

#[derive(Config, Debug)]
pub struct ShuffleUnitConfig {
    pub in_channels: usize,
    /// Must be even. Equal to `in_channels` unless downsampling.
    pub out_channels: usize,
    #[config(default = false)]
    pub downsample: bool,
    #[config(default = false)]
    pub use_se: bool,
    /// Adds the second input half to the transformed half. Ignored when downsampling.
    #[config(default = false)]
    pub use_residual: bool,
}

impl ShuffleUnitConfig {
    pub fn mid_channels(&self) -> usize {
        self.out_channels / 2
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ShuffleUnit<B>, ShuffleNetError> {
        if self.in_channels == 0 || self.out_channels == 0 || self.out_channels % 2 != 0 {
            return Err(ShuffleNetError::config(format!(
                "shuffle unit: output channels must be even and positive, got {} -> {}",
                self.in_channels, self.out_channels
            )));
        }
        if !self.downsample && self.in_channels != self.out_channels {
            return Err(ShuffleNetError::config(format!(
                "shuffle unit: a regular unit keeps its width, got {} -> {}",
                self.in_channels, self.out_channels
            )));
        }

        let mid_channels = self.mid_channels();
        let se = if self.use_se {
            Some(SeBlockConfig::new(mid_channels).init(device)?)
        } else {
            None
        };
        let shuffle = ChannelShuffleConfig::new(self.out_channels)
            .with_groups(2)
            .init()?;

        let unit = if self.downsample {
            ShuffleUnit::Downsample(DownsampleUnit {
                dw_conv4: depthwise_conv3x3(self.in_channels, 2).init(device),
                dw_bn4: BatchNormConfig::new(self.in_channels).init(device),
                expand_conv5: conv1x1(self.in_channels, mid_channels).init(device),
                expand_bn5: BatchNormConfig::new(mid_channels).init(device),
                transform: TransformBranchConfig::new(self.in_channels, mid_channels)
                    .with_stride(2)
                    .init(device),
                se,
                shuffle,
            })
        } else {
            ShuffleUnit::Regular(RegularUnit {
                transform: TransformBranchConfig::new(mid_channels, mid_channels).init(device),
                se,
                use_residual: self.use_residual,
                shuffle,
            })
        };
        Ok(unit)
    }
}

impl<B: Backend> ShuffleUnit<B> {
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, out_channels, height, width] when regular,
    ///     [batch, out_channels, ⌈height/2⌉, ⌈width/2⌉] when downsampling
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            ShuffleUnit::Regular(unit) => unit.forward(x),
            ShuffleUnit::Downsample(unit) => unit.forward(x),
        }
    }

    pub fn is_downsample(&self) -> bool {
        matches!(self, ShuffleUnit::Downsample(_))
    }

    pub fn out_channels(&self) -> usize {
        let transform = match self {
            ShuffleUnit::Regular(unit) => &unit.transform,
            ShuffleUnit::Downsample(unit) => &unit.transform,
        };
        2 * transform.out_channels()
    }
}

// Names carry the variant tag, as the record of an enum module does.
impl<B: Backend> NamedParams for ShuffleUnit<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        match self {
            ShuffleUnit::Regular(unit) => unit.collect_params(&join(prefix, "Regular"), out),
            ShuffleUnit::Downsample(unit) => {
                unit.collect_params(&join(prefix, "Downsample"), out)
            }
        }
    }
}

impl<B: Backend> NamedParams for RegularUnit<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        self.transform.collect_params(&join(prefix, "transform"), out);
        self.se.collect_params(&join(prefix, "se"), out);
    }
}

impl<B: Backend> NamedParams for DownsampleUnit<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        self.dw_conv4.collect_params(&join(prefix, "dw_conv4"), out);
        self.dw_bn4.collect_params(&join(prefix, "dw_bn4"), out);
        self.expand_conv5.collect_params(&join(prefix, "expand_conv5"), out);
        self.expand_bn5.collect_params(&join(prefix, "expand_bn5"), out);
        self.transform.collect_params(&join(prefix, "transform"), out);
        self.se.collect_params(&join(prefix, "se"), out);
    }
}

/// Pointwise → depthwise → pointwise branch shared by both unit variants.
#[derive(Module, Debug)]
pub struct TransformBranch<B: Backend> {
    pub compress_conv1: Conv2d<B>,
    pub compress_bn1: BatchNorm<B, 2>,
    pub dw_conv2: Conv2d<B>,
    pub dw_bn2: BatchNorm<B, 2>,
    pub expand_conv3: Conv2d<B>,
    pub expand_bn3: BatchNorm<B, 2>,
}

#[derive(Config, Debug)]
pub struct TransformBranchConfig {
    pub in_channels: usize,
    pub mid_channels: usize,
    #[config(default = 1)]
    pub stride: usize,
}

impl TransformBranchConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformBranch<B> {
        let mid = self.mid_channels;
        TransformBranch {
            compress_conv1: conv1x1(self.in_channels, mid).init(device),
            compress_bn1: BatchNormConfig::new(mid).init(device),
            dw_conv2: depthwise_conv3x3(mid, self.stride).init(device),
            dw_bn2: BatchNormConfig::new(mid).init(device),
            expand_conv3: conv1x1(mid, mid).init(device),
            expand_bn3: BatchNormConfig::new(mid).init(device),
        }
    }
}

impl<B: Backend> TransformBranch<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.compress_conv1.forward(x);
        let x = relu(self.compress_bn1.forward(x));

        let x = self.dw_conv2.forward(x);
        let x = self.dw_bn2.forward(x);

        let x = self.expand_conv3.forward(x);
        relu(self.expand_bn3.forward(x))
    }

    pub fn out_channels(&self) -> usize {
        let [mid_channels] = self.expand_bn3.gamma.dims();
        mid_channels
    }
}

impl<B: Backend> NamedParams for TransformBranch<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        self.compress_conv1.collect_params(&join(prefix, "compress_conv1"), out);
        self.compress_bn1.collect_params(&join(prefix, "compress_bn1"), out);
        self.dw_conv2.collect_params(&join(prefix, "dw_conv2"), out);
        self.dw_bn2.collect_params(&join(prefix, "dw_bn2"), out);
        self.expand_conv3.collect_params(&join(prefix, "expand_conv3"), out);
        self.expand_bn3.collect_params(&join(prefix, "expand_bn3"), out);
    }
}

#[derive(Module, Debug)]
pub struct RegularUnit<B: Backend> {
    pub transform: TransformBranch<B>,
    pub se: Option<SeBlock<B>>,
    pub use_residual: bool,
    pub shuffle: ChannelShuffle,
}

impl<B: Backend> RegularUnit<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, height, width] = x.dims();
        let mid = channels / 2;
        debug_assert_eq!(mid, self.transform.out_channels());

        let pass = x.clone().narrow(1, 0, mid);
        let x2 = x.narrow(1, mid, mid);

        let mut y = self.transform.forward(x2.clone());
        if let Some(se) = &self.se {
            y = se.forward(y);
        }
        if self.use_residual {
            y = y + x2;
        }

        let x = Tensor::cat(vec![pass, y], 1);
        debug_assert_eq!([batch, channels, height, width], x.dims());
        self.shuffle.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct DownsampleUnit<B: Backend> {
    pub dw_conv4: Conv2d<B>,
    pub dw_bn4: BatchNorm<B, 2>,
    pub expand_conv5: Conv2d<B>,
    pub expand_bn5: BatchNorm<B, 2>,
    pub transform: TransformBranch<B>,
    pub se: Option<SeBlock<B>>,
    pub shuffle: ChannelShuffle,
}

impl<B: Backend> DownsampleUnit<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, _, _, _] = x.dims();

        let y1 = self.dw_conv4.forward(x.clone());
        let y1 = self.dw_bn4.forward(y1);
        let y1 = self.expand_conv5.forward(y1);
        let y1 = relu(self.expand_bn5.forward(y1));

        let mut y2 = self.transform.forward(x);
        if let Some(se) = &self.se {
            y2 = se.forward(y2);
        }
        debug_assert_eq!(y1.dims(), y2.dims());

        let x = Tensor::cat(vec![y1, y2], 1);
        debug_assert_eq!(batch, x.dims()[0]);
        self.shuffle.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::module::Param;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn random_input(channels: usize, size: usize) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        Tensor::random([2, channels, size, size], Distribution::Normal(0., 1.), &device)
    }

    #[test]
    fn output_width_is_out_channels_in_every_mode() {
        let device = Default::default();
        for use_se in [false, true] {
            for use_residual in [false, true] {
                let down = ShuffleUnitConfig::new(24, 64)
                    .with_downsample(true)
                    .with_use_se(use_se)
                    .with_use_residual(use_residual)
                    .init::<TestBackend>(&device)
                    .unwrap();
                assert!(down.is_downsample());
                assert_eq!(down.out_channels(), 64);
                let y = down.forward(random_input(24, 9));
                assert_eq!(y.dims(), [2, 64, 5, 5]);

                let regular = ShuffleUnitConfig::new(64, 64)
                    .with_use_se(use_se)
                    .with_use_residual(use_residual)
                    .init::<TestBackend>(&device)
                    .unwrap();
                assert!(!regular.is_downsample());
                let y = regular.forward(y);
                assert_eq!(y.dims(), [2, 64, 5, 5]);
            }
        }
    }

    #[test]
    fn rejects_odd_or_mismatched_widths() {
        let device = Default::default();
        let odd = ShuffleUnitConfig::new(24, 35)
            .with_downsample(true)
            .init::<TestBackend>(&device);
        assert!(matches!(odd, Err(ShuffleNetError::Configuration(_))));

        let widened = ShuffleUnitConfig::new(24, 48).init::<TestBackend>(&device);
        assert!(matches!(widened, Err(ShuffleNetError::Configuration(_))));
    }

    #[test]
    fn regular_unit_owns_no_downsample_layers() {
        let device = Default::default();
        let unit = ShuffleUnitConfig::new(16, 16)
            .init::<TestBackend>(&device)
            .unwrap();
        let names: Vec<_> = unit.named_params().into_iter().map(|p| p.name).collect();
        assert!(names.contains(&"Regular.transform.compress_conv1.weight".to_string()));
        assert!(names.contains(&"Regular.transform.expand_bn3.running_var".to_string()));
        assert!(!names.iter().any(|n| n.contains("dw_conv4")));
        // compress 8*8 + depthwise 8*9 + expand 8*8, plus three normalizations
        assert_eq!(unit.learnable_params(), 64 + 72 + 64 + 3 * 16);
    }

    #[test]
    fn downsample_unit_projects_the_full_input() {
        let device = Default::default();
        let unit = ShuffleUnitConfig::new(24, 48)
            .with_downsample(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let ShuffleUnit::Downsample(unit) = unit else {
            panic!("expected a downsampling unit");
        };
        assert_eq!(unit.dw_conv4.weight.dims(), [24, 1, 3, 3]);
        assert_eq!(unit.expand_conv5.weight.dims(), [24, 24, 1, 1]);
        assert_eq!(unit.transform.compress_conv1.weight.dims(), [24, 24, 1, 1]);
    }

    #[test]
    fn zero_delta_residual_passes_second_half_through() {
        let device = Default::default();
        let unit = ShuffleUnitConfig::new(16, 16)
            .with_use_residual(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let ShuffleUnit::Regular(mut unit) = unit else {
            panic!("expected a regular unit");
        };
        // a zeroed last normalization makes the transform branch output zero
        unit.transform.expand_bn3.gamma = Param::from_tensor(Tensor::zeros([8], &device));
        unit.transform.expand_bn3.beta = Param::from_tensor(Tensor::zeros([8], &device));

        let x = random_input(16, 6);
        let y = unit.forward(x.clone());

        // undo the two-group shuffle: 16 channels, 8 groups
        let unshuffle = ChannelShuffleConfig::new(16).with_groups(8).init().unwrap();
        let y = unshuffle.forward(y);

        y.clone()
            .narrow(1, 8, 8)
            .into_data()
            .assert_eq(&x.clone().narrow(1, 8, 8).into_data(), true);
        y.narrow(1, 0, 8)
            .into_data()
            .assert_eq(&x.narrow(1, 0, 8).into_data(), true);
    }
}
