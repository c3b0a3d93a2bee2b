use std::fmt;

#[derive(Debug)]
pub enum ErrorKind {
    Internal,
    InvalidArgument,
    InvalidState,
    MaxSeriesExceeded,
    PartialWrite,
    UnsupportedPredicate,
    FieldsInDeletePredicate,
    SeriesFile,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn max_series_exceeded(limit: u64) -> Self {
        Error::new(
            ErrorKind::MaxSeriesExceeded,
            format!("max-series-per-database limit exceeded: ({})", limit),
        )
    }

    pub fn fields_in_delete_predicate() -> Self {
        Error::new(
            ErrorKind::FieldsInDeletePredicate,
            "fields not supported in WHERE clause during deletion",
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::SeriesFile, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
