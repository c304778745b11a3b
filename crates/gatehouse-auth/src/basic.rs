//! HTTP Basic credential extraction

use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::AuthError;

/// Username and password submitted through `Authorization: Basic`
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicCredentials {
    /// Extract credentials from request headers.
    ///
    /// Returns `Ok(None)` when there is no `Authorization` header or it uses
    /// another scheme, and an error when a Basic header cannot be decoded.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, AuthError> {
        match headers.get(AUTHORIZATION) {
            Some(value) => Self::from_header(value),
            None => Ok(None),
        }
    }

    pub fn from_header(value: &HeaderValue) -> Result<Option<Self>, AuthError> {
        let value = value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?.trim();

        let Some((scheme, encoded)) = value.split_once(' ') else {
            return if value.eq_ignore_ascii_case("basic") {
                Err(AuthError::InvalidAuthHeader)
            } else {
                Ok(None)
            };
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return Ok(None);
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| AuthError::InvalidAuthHeader)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidAuthHeader)?;

        // The password may itself contain ':'
        let (username, password) = decoded
            .split_once(':')
            .ok_or(AuthError::InvalidAuthHeader)?;

        Ok(Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        }))
    }

    /// Encode as an `Authorization` header value
    pub fn to_header_value(&self) -> Result<HeaderValue, AuthError> {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        HeaderValue::from_str(&format!("Basic {}", token)).map_err(|_| AuthError::InvalidAuthHeader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[test]
    fn test_decode_basic_header() {
        // user:password
        let creds = BasicCredentials::from_header(&header("Basic dXNlcjpwYXNzd29yZA=="))
            .unwrap()
            .unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "password");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let creds = BasicCredentials::from_header(&header("basic dXNlcjpwYXNzd29yZA=="))
            .unwrap()
            .unwrap();
        assert_eq!(creds.username, "user");
    }

    #[test]
    fn test_password_with_colon() {
        let original = BasicCredentials {
            username: "ops".to_string(),
            password: "a:b:c".to_string(),
        };
        let decoded = BasicCredentials::from_header(&original.to_header_value().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_other_scheme_is_ignored() {
        assert!(BasicCredentials::from_header(&header("Bearer abc.def"))
            .unwrap()
            .is_none());
        assert!(BasicCredentials::from_headers(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn test_malformed_basic_header() {
        assert!(BasicCredentials::from_header(&header("Basic !!!notbase64")).is_err());
        // "nocolon"
        assert!(BasicCredentials::from_header(&header("Basic bm9jb2xvbg==")).is_err());
        assert!(BasicCredentials::from_header(&header("Basic")).is_err());
    }
}
