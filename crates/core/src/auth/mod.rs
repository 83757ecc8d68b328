//! Admin API authentication.

mod api_key;
mod traits;
mod types;

pub use api_key::ApiKeyAuthenticator;
pub use traits::*;
pub use types::*;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use crate::config::Config;
use crate::store::{Store, StoreError};

const API_KEY_SETTING: &str = "apikey";
const API_KEY_LEN: usize = 40;

/// Generate a fresh API key.
pub fn generate_api_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LEN)
        .map(char::from)
        .collect()
}

/// The effective API key: config override, else the stored key,
/// generated and persisted on first use.
pub fn resolve_api_key(config: &Config, store: &Store) -> Result<String, StoreError> {
    if let Some(key) = &config.auth.api_key {
        return Ok(key.clone());
    }
    if let Some(key) = store.get_setting(API_KEY_SETTING)? {
        return Ok(key);
    }
    let key = generate_api_key();
    store.set_setting(API_KEY_SETTING, &key)?;
    info!("Generated new admin API key");
    Ok(key)
}

/// Rotate the stored API key, returning the new value.
pub fn reset_api_key(store: &Store) -> Result<String, StoreError> {
    let key = generate_api_key();
    store.set_setting(API_KEY_SETTING, &key)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_api_key_shape() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_eq!(a.len(), API_KEY_LEN);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_resolve_prefers_config() {
        let store = Store::in_memory().unwrap();
        let config = Config {
            auth: crate::config::AuthConfig {
                api_key: Some("configured".to_string()),
            },
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&config, &store).unwrap(), "configured");
    }

    #[test]
    fn test_resolve_generates_and_persists() {
        let store = Store::in_memory().unwrap();
        let config = Config::default();
        let first = resolve_api_key(&config, &store).unwrap();
        let second = resolve_api_key(&config, &store).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_rotates() {
        let store = Store::in_memory().unwrap();
        let config = Config::default();
        let first = resolve_api_key(&config, &store).unwrap();
        let rotated = reset_api_key(&store).unwrap();
        assert_ne!(first, rotated);
        assert_eq!(resolve_api_key(&config, &store).unwrap(), rotated);
    }
}
