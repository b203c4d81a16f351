//! API key lookup for the Gemini transport
//!
//! The configured variable (`GOOGLE_API_KEY` by default) is checked first,
//! then `GEMINI_API_KEY`.

use scout_core::{Result, ScoutError};
use std::env;

/// Secondary variable consulted when the configured one is unset
pub const FALLBACK_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Get the API key for the model endpoint
///
/// # Arguments
///
/// * `env_var` - Name of the environment variable configured in `[model]`
pub fn get_api_key(env_var: &str) -> Result<String> {
    for name in [env_var, FALLBACK_API_KEY_ENV] {
        if let Ok(key) = env::var(name) {
            if !key.trim().is_empty() {
                tracing::info!("Using API key from {}", name);
                return Ok(key);
            }
        }
    }

    Err(ScoutError::Auth(format!(
        "No API key found. Set {} (or {}) to a Gemini API key",
        env_var, FALLBACK_API_KEY_ENV
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent concurrent env var modifications
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap();

        let originals: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();

        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        let result = f();

        for (key, original) in originals {
            match original {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        result
    }

    #[test]
    fn test_configured_var_wins() {
        with_env_vars(
            &[
                ("SCOUT_TEST_KEY", Some("primary")),
                (FALLBACK_API_KEY_ENV, Some("fallback")),
            ],
            || {
                assert_eq!(get_api_key("SCOUT_TEST_KEY").unwrap(), "primary");
            },
        );
    }

    #[test]
    fn test_fallback_var() {
        with_env_vars(
            &[
                ("SCOUT_TEST_KEY", None),
                (FALLBACK_API_KEY_ENV, Some("fallback")),
            ],
            || {
                assert_eq!(get_api_key("SCOUT_TEST_KEY").unwrap(), "fallback");
            },
        );
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        with_env_vars(
            &[("SCOUT_TEST_KEY", Some("  ")), (FALLBACK_API_KEY_ENV, None)],
            || {
                let err = get_api_key("SCOUT_TEST_KEY").unwrap_err();
                assert!(matches!(err, ScoutError::Auth(_)));
            },
        );
    }
}
