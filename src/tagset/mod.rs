pub mod grouper;

pub use grouper::{TagSet, TagSetGrouper};
