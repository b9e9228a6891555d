//! Bearer credential holder.
//!
//! Credential lifetime is managed by the caller; there is no expiry.

use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct AuthManager {
    api_key: Option<String>,
}

impl AuthManager {
    /// An empty key is treated as no credential.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }

    pub fn set(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.api_key = (!key.is_empty()).then_some(key);
    }

    pub fn refresh(&mut self, new_key: impl Into<String>) {
        self.set(new_key);
    }

    pub fn clear(&mut self) {
        self.api_key = None;
    }

    pub fn is_set(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    /// `Authorization: Bearer <key>` for the stored credential.
    pub fn header(&self) -> Result<HeaderMap, AuthError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|_| AuthError::InvalidCredential)?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no API credential configured")]
    MissingCredential,
    #[error("API credential contains characters not allowed in a header")]
    InvalidCredential,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_requires_credential() {
        let auth = AuthManager::default();
        assert_eq!(auth.header().unwrap_err(), AuthError::MissingCredential);
    }

    #[test]
    fn bearer_header_after_set() {
        let mut auth = AuthManager::default();
        auth.set("abc");
        let headers = auth.header().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");

        auth.refresh("def");
        assert_eq!(auth.header().unwrap().get(AUTHORIZATION).unwrap(), "Bearer def");

        auth.clear();
        assert!(!auth.is_set());
    }

    #[test]
    fn empty_key_counts_as_unset() {
        let mut auth = AuthManager::new(Some(String::new()));
        assert!(!auth.is_set());
        assert_eq!(auth.header().unwrap_err(), AuthError::MissingCredential);

        auth.set("abc");
        auth.refresh("");
        assert!(!auth.is_set());
    }

    #[test]
    fn rejects_header_breaking_keys() {
        let auth = AuthManager::new(Some("abc\ndef".into()));
        assert_eq!(auth.header().unwrap_err(), AuthError::InvalidCredential);
    }
}
