#[derive(Debug, Clone)]
pub struct Config {
    /// 0 disables the limit.
    pub max_series_per_database: u64,
    /// 0 disables the limit.
    pub max_values_per_tag: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_series_per_database: 0,
            max_values_per_tag: 0,
        }
    }
}
