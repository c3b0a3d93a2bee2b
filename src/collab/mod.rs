pub mod authorizer;
pub mod iterator;
pub mod series_file;

pub use authorizer::{Authorizer, OpenAuthorizer};
pub use series_file::{InMemSeriesFile, SeriesFile};
