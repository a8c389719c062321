pub mod error;
pub mod shufflenet_v2;
pub mod store;
pub mod utils;

pub mod prelude {
    pub use crate::error::{ShuffleNetError, WeightLoadError};
    pub use crate::shufflenet_v2::*;
    pub use crate::store::{FileWeightStore, WeightStore};
    pub use crate::utils::params::{NamedParams, ParamEntry};
}
