use crate::error::ShuffleNetError;
use burn::module::{Content, DisplaySettings, ModuleDisplay};
use burn::prelude::*;

/// Configuration to create a [ChannelShuffle](ChannelShuffle) layer.
#[derive(Config, Debug)]
pub struct ChannelShuffleConfig {
    /// Number of channels the shuffle will be applied to.
    pub channels: usize,
    #[config(default = 2)]
    pub groups: usize,
}

impl ChannelShuffleConfig {
    /// Initialize a new [ChannelShuffle](ChannelShuffle) layer.
    ///
    /// Fails unless `channels` splits evenly into `groups`.
    pub fn init(&self) -> Result<ChannelShuffle, ShuffleNetError> {
        if self.groups == 0 || self.channels % self.groups != 0 {
            return Err(ShuffleNetError::config(format!(
                "channel shuffle: {} channels cannot be split into {} groups",
                self.channels, self.groups
            )));
        }
        Ok(ChannelShuffle {
            groups: self.groups,
        })
    }
}

/// Interleaves channels across groups.
///
/// The channel axis is viewed as `[groups, channels / groups]`, transposed
/// and flattened back, so that channel `g * (C / G) + o` moves to `o * G + g`.
/// Shuffling again with `C / G` groups restores the original order.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct ChannelShuffle {
    pub groups: usize,
}

impl ChannelShuffle {
    /// # Shapes
    ///   - Input [batch, channels, height, width]
    ///   - Output [batch, channels, height, width]
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, height, width] = x.dims();
        debug_assert_eq!(channels % self.groups, 0);
        let per_group = channels / self.groups;

        let x = x.reshape([batch, self.groups, per_group, height, width]);
        let x = x.swap_dims(1, 2);
        x.reshape([batch, channels, height, width])
    }
}

/// New position of channel `index` after shuffling `channels` with `groups`.
///
/// `None` unless `groups` is non-zero and divides `channels`, and `index < channels`.
pub fn shuffled_channel(index: usize, channels: usize, groups: usize) -> Option<usize> {
    if groups == 0 || channels % groups != 0 || index >= channels {
        return None;
    }
    let per_group = channels / groups;
    let (group, offset) = (index / per_group, index % per_group);
    Some(offset * groups + group)
}

impl ModuleDisplay for ChannelShuffle {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content.add("groups", &self.groups).optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    /// `[1, channels, 1, 1]` where every value equals its channel index.
    fn indexed(channels: usize) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        Tensor::<TestBackend, 1, Int>::arange(0..channels as i64, &device)
            .float()
            .reshape([1, channels, 1, 1])
    }

    fn channel_values(x: Tensor<TestBackend, 4>) -> Vec<f32> {
        let [_, channels, _, _] = x.dims();
        x.reshape([channels]).into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn rejects_indivisible_channels() {
        assert!(ChannelShuffleConfig::new(6).with_groups(4).init().is_err());
        assert!(ChannelShuffleConfig::new(6).with_groups(0).init().is_err());
        assert!(ChannelShuffleConfig::new(6).with_groups(3).init().is_ok());
    }

    #[test]
    fn interleaves_two_groups() {
        let shuffle = ChannelShuffleConfig::new(6).init().unwrap();
        let y = shuffle.forward(indexed(6));
        assert_eq!(channel_values(y), [0., 3., 1., 4., 2., 5.]);
    }

    #[test]
    fn moves_channels_to_shuffled_index() {
        for (channels, groups) in [(12, 3), (8, 2), (10, 5)] {
            let shuffle = ChannelShuffleConfig::new(channels)
                .with_groups(groups)
                .init()
                .unwrap();
            let values = channel_values(shuffle.forward(indexed(channels)));
            for source in 0..channels {
                let target = shuffled_channel(source, channels, groups).unwrap();
                assert_eq!(values[target], source as f32);
            }
        }
    }

    #[test]
    fn inverse_group_count_restores_order() {
        for (channels, groups) in [(4, 2), (12, 3), (12, 4), (16, 8), (9, 3)] {
            let forward = ChannelShuffleConfig::new(channels)
                .with_groups(groups)
                .init()
                .unwrap();
            let inverse = ChannelShuffleConfig::new(channels)
                .with_groups(channels / groups)
                .init()
                .unwrap();
            let x = indexed(channels);
            let y = inverse.forward(forward.forward(x.clone()));
            y.into_data().assert_eq(&x.into_data(), true);
        }
    }

    #[test]
    fn shuffled_channel_needs_a_valid_grouping() {
        assert_eq!(shuffled_channel(1, 6, 2), Some(2));
        assert_eq!(shuffled_channel(0, 6, 0), None);
        assert_eq!(shuffled_channel(0, 2, 4), None);
        assert_eq!(shuffled_channel(0, 6, 4), None);
        assert_eq!(shuffled_channel(6, 6, 2), None);
    }
}
