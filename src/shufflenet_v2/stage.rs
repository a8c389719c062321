use crate::error::ShuffleNetError;
use crate::shufflenet_v2::*;
use crate::utils::params::{NamedParams, ParamEntry, join};
use burn::prelude::*;

/// Sequence of units; only the first one downsamples.
#[derive(Module, Debug)]
pub struct ShuffleStage<B: Backend> {
    pub units: Vec<ShuffleUnit<B>>,
}

#[derive(Config, Debug)]
pub struct ShuffleStageConfig {
    /// Channels entering the stage.
    pub in_channels: usize,
    /// Output channels of each unit, in order.
    pub channels: Vec<usize>,
    #[config(default = false)]
    pub use_se: bool,
    #[config(default = false)]
    pub use_residual: bool,
}

impl ShuffleStageConfig {
    pub fn out_channels(&self) -> usize {
        self.channels.last().copied().unwrap_or(self.in_channels)
    }

    /// Returns the initialized model.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ShuffleStage<B>, ShuffleNetError> {
        if self.channels.is_empty() {
            return Err(ShuffleNetError::config("shuffle stage: a stage needs at least one unit"));
        }

        let mut units = Vec::with_capacity(self.channels.len());
        let mut in_channels = self.in_channels;
        for (j, &out_channels) in self.channels.iter().enumerate() {
            let unit = ShuffleUnitConfig::new(in_channels, out_channels)
                .with_downsample(j == 0)
                .with_use_se(self.use_se)
                .with_use_residual(self.use_residual)
                .init(device)?;
            units.push(unit);
            in_channels = out_channels;
        }
        Ok(ShuffleStage { units })
    }
}

impl<B: Backend> ShuffleStage<B> {
    /// # Shapes
    ///   - Input [batch, in_channels, height, width]
    ///   - Output [batch, out_channels, ⌈height/2⌉, ⌈width/2⌉]
    pub fn forward(&self, mut x: Tensor<B, 4>) -> Tensor<B, 4> {
        for unit in self.units.iter() {
            x = unit.forward(x);
        }
        x
    }

    pub fn out_channels(&self) -> usize {
        self.units.last().map(ShuffleUnit::out_channels).unwrap_or_default()
    }
}

impl<B: Backend> NamedParams for ShuffleStage<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        self.units.collect_params(&join(prefix, "units"), out);
    }
}
