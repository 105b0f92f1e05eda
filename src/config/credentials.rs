//! Credential Resolver
//!
//! Picks the model-provider API key: the value typed by the user when it is
//! non-empty, otherwise the `GROQ_API_KEY` environment variable.

use crate::error::{Result, SqlChatError};
use std::fmt;

/// Environment variable consulted when no key is typed
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// A resolved, non-empty API key
///
/// `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential(String);

impl ApiCredential {
    /// The raw key, for building request headers
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short masked form such as `gsk_...9f2c`
    pub fn masked(&self) -> String {
        let key = &self.0;
        if key.chars().count() > 8 {
            let head: String = key.chars().take(4).collect();
            let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("{}...{}", head, tail)
        } else {
            "***".to_string()
        }
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiCredential").field(&self.masked()).finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Resolve the credential from the typed value or the process environment
pub fn resolve_credential(explicit: Option<&str>) -> Result<ApiCredential> {
    resolve_credential_with(explicit, |name| std::env::var(name).ok())
}

/// Resolve the credential using a custom environment lookup
pub fn resolve_credential_with<F>(explicit: Option<&str>, lookup: F) -> Result<ApiCredential>
where
    F: Fn(&str) -> Option<String>,
{
    let typed = explicit.map(str::trim).filter(|value| !value.is_empty());
    if let Some(value) = typed {
        return Ok(ApiCredential(value.to_string()));
    }

    match lookup(API_KEY_ENV) {
        Some(value) if !value.trim().is_empty() => {
            tracing::debug!(env_var = API_KEY_ENV, "using API key from environment");
            Ok(ApiCredential(value.trim().to_string()))
        }
        _ => Err(SqlChatError::MissingCredential {
            env_var: API_KEY_ENV.to_string(),
        }),
    }
}
