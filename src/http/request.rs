//! Request body and path handling.
//!
//! # Responsibilities
//! - Decode optional JSON bodies
//! - Parse path identifiers
//!
//! # Design Decisions
//! - An empty body decodes to the payload's default (all fields absent), so
//!   presence checks happen in one place, the store
//! - Content-Type is not enforced

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::http::response::ApiError;

/// Decode a JSON body, treating an empty body as `T::default()`.
pub fn json_or_default<T>(body: &Bytes) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(ApiError::InvalidBody)
}

/// Parse a user id path segment. Non-numeric ids match no user.
pub fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse::<u64>().map_err(|_| ApiError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::NewUser;

    #[test]
    fn test_empty_body_is_default() {
        let input: NewUser = json_or_default(&Bytes::from_static(b"  \n")).unwrap();
        assert!(input.name.is_none());
        assert!(input.email.is_none());
    }

    #[test]
    fn test_partial_body() {
        let input: NewUser = json_or_default(&Bytes::from_static(br#"{"name":"Carl"}"#)).unwrap();
        assert_eq!(input.name.as_deref(), Some("Carl"));
        assert!(input.email.is_none());
    }

    #[test]
    fn test_malformed_body() {
        let err = json_or_default::<NewUser>(&Bytes::from_static(b"{nope")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidBody(_)));
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(parse_id("abc"), Err(ApiError::NotFound)));
        assert!(matches!(parse_id("-1"), Err(ApiError::NotFound)));
    }
}
