use crate::series::tags::Tags;

/// External collaborator deciding whether a series may be read. `None` in
/// any call site that takes `Option<&dyn Authorizer>` means "open" — every
/// series is authorized.
pub trait Authorizer: Send + Sync {
    fn authorize_series_read(&self, database: &str, metric: &[u8], tags: &Tags) -> bool;
}

/// Always authorizes. The sentinel used when no authorizer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAuthorizer;

impl Authorizer for OpenAuthorizer {
    fn authorize_series_read(&self, _database: &str, _metric: &[u8], _tags: &Tags) -> bool {
        true
    }
}

pub fn is_open(authorizer: Option<&dyn Authorizer>) -> bool {
    authorizer.is_none()
}
