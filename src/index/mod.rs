pub mod series_id_set;
pub mod shard;
pub mod shared;
pub mod sketch;

pub use series_id_set::SeriesIdSet;
pub use shard::{PartialWriteError, ShardIndex};
pub use shared::SharedIndex;
pub use sketch::CardinalitySketch;
