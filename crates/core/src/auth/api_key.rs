//! Admin API key verification.

use async_trait::async_trait;
use sha1::{Digest, Sha1};

use super::{resolve_api_key, AuthError, AuthRequest, Authenticator, Identity};
use crate::config::Config;
use crate::store::{Store, StoreError};

/// Header fields searched for a key, in lookup order. `authorization`
/// must carry a bearer scheme; `x-api-key` is taken verbatim.
const KEY_HEADERS: [&str; 2] = ["authorization", "x-api-key"];

/// Verifies requests against the admin API key.
///
/// The key itself is never held for comparison: both sides are reduced
/// to SHA-1 digests at construction/verification time, so a mismatch
/// costs the same regardless of how much of the key was guessed right.
pub struct ApiKeyAuthenticator {
    key_digest: [u8; 20],
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: String) -> Self {
        Self {
            key_digest: digest_of(api_key.as_bytes()),
        }
    }

    /// Build the authenticator from the effective key: the config
    /// override, or the settings-table key (generated on first use).
    pub fn resolve(config: &Config, store: &Store) -> Result<Self, StoreError> {
        Ok(Self::new(resolve_api_key(config, store)?))
    }

    fn verify(&self, presented: &str) -> bool {
        digest_of(presented.as_bytes()) == self.key_digest
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let presented = presented_key(request).ok_or(AuthError::NotAuthenticated)?;
        if !self.verify(presented) {
            return Err(AuthError::InvalidCredentials(
                "API key rejected".to_string(),
            ));
        }
        Ok(Identity {
            user_id: "admin".to_string(),
            method: "api_key".to_string(),
        })
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

fn digest_of(key: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(key);
    hasher.finalize().into()
}

/// Pull the presented key out of the request headers.
fn presented_key(request: &AuthRequest) -> Option<&str> {
    for header in KEY_HEADERS {
        let Some(value) = request.headers.get(header) else {
            continue;
        };
        let value = value.trim();
        if header == "authorization" {
            let mut parts = value.splitn(2, char::is_whitespace);
            match (parts.next(), parts.next()) {
                (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => {
                    return Some(token.trim());
                }
                // Any other scheme is not ours; fall through to the
                // next header rather than failing the request here.
                _ => continue,
            }
        }
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request_with(headers: &[(&str, &str)]) -> AuthRequest {
        let mut map = HashMap::new();
        for (name, value) in headers {
            map.insert(name.to_string(), value.to_string());
        }
        AuthRequest {
            headers: map,
            source_ip: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        }
    }

    #[tokio::test]
    async fn test_accepts_bearer_any_scheme_case() {
        let auth = ApiKeyAuthenticator::new("k-123".to_string());
        for value in ["Bearer k-123", "bearer k-123", "BEARER  k-123"] {
            let identity = auth
                .authenticate(&request_with(&[("authorization", value)]))
                .await
                .unwrap();
            assert_eq!(identity.user_id, "admin");
            assert_eq!(identity.method, "api_key");
        }
    }

    #[tokio::test]
    async fn test_accepts_x_api_key() {
        let auth = ApiKeyAuthenticator::new("k-123".to_string());
        let identity = auth
            .authenticate(&request_with(&[("x-api-key", "k-123")]))
            .await
            .unwrap();
        assert_eq!(identity.user_id, "admin");
    }

    #[tokio::test]
    async fn test_foreign_scheme_falls_through_to_x_api_key() {
        let auth = ApiKeyAuthenticator::new("k-123".to_string());
        let request = request_with(&[
            ("authorization", "Basic dXNlcjpwYXNz"),
            ("x-api-key", "k-123"),
        ]);
        assert!(auth.authenticate(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let auth = ApiKeyAuthenticator::new("k-123".to_string());
        let result = auth
            .authenticate(&request_with(&[("authorization", "Bearer nope")]))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_no_credentials_is_not_authenticated() {
        let auth = ApiKeyAuthenticator::new("k-123".to_string());
        let result = auth.authenticate(&request_with(&[])).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));

        // An empty x-api-key header is as good as none.
        let result = auth
            .authenticate(&request_with(&[("x-api-key", "  ")]))
            .await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_resolve_uses_stored_key() {
        let store = Store::in_memory().unwrap();
        let config = Config::default();
        let auth = ApiKeyAuthenticator::resolve(&config, &store).unwrap();

        // The generated key is in the settings table; a request carrying
        // it must pass.
        let key = store.get_setting("apikey").unwrap().unwrap();
        let identity = auth
            .authenticate(&request_with(&[("x-api-key", key.as_str())]))
            .await
            .unwrap();
        assert_eq!(identity.method, "api_key");
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(digest_of(b"abc"), digest_of(b"abc"));
        assert_ne!(digest_of(b"abc"), digest_of(b"abd"));
    }
}
