mod channel_shuffle;
mod conv;
mod factory;
mod init_block;
mod network;
mod se;
mod stage;
mod unit;

pub use channel_shuffle::{ChannelShuffle, ChannelShuffleConfig, shuffled_channel};
pub use conv::{ShuffleConv, ShuffleConvConfig, conv1x1, depthwise_conv3x3};
pub use factory::{
    FINAL_BLOCK_CHANNELS, FINAL_BLOCK_SCALE_THRESHOLD, INIT_BLOCK_CHANNELS, STAGE_CHANNELS,
    ShuffleNetV2Variant, UNITS_PER_STAGE, VARIANTS, VariantEntry, WidthScaledConfig,
};
pub use init_block::{ShuffleInitBlock, ShuffleInitBlockConfig, init_block_output_size};
pub use network::{ShuffleNetV2, ShuffleNetV2Config};
pub use se::{SeBlock, SeBlockConfig};
pub use stage::{ShuffleStage, ShuffleStageConfig};
pub use unit::{
    DownsampleUnit, RegularUnit, ShuffleUnit, ShuffleUnitConfig, TransformBranch,
    TransformBranchConfig,
};
