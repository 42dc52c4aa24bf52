use super::CookieStore;
use crate::error::BackendError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

// Per-cookie limit most user agents enforce on name plus value.
const MAX_COOKIE_BYTES: usize = 4096;

/// In-process cookie jar used as the fallback backend.
///
/// Rejects cookies larger than a user agent would accept, so callers see the
/// same failure path a real cookie store produces for oversized values.
#[derive(Clone, Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }
}

impl CookieStore for MemoryCookieJar {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.cookies.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), BackendError> {
        if key.len() + value.len() > MAX_COOKIE_BYTES {
            return Err(BackendError::QuotaExceeded {
                key: key.to_string(),
            });
        }
        self.cookies
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.cookies.write().remove(key);
        Ok(())
    }
}
