//! Index credential resolution.
//!
//! # Contract
//! - YAML stores only env var NAMES (`index.auth.api_key_env`,
//!   `index.auth.password_env`), never values.
//! - Called once at startup; the result is passed into the store
//!   constructor.
//! - `Debug` redacts every credential.
//! - Errors name the variable, never its value.
//!
//! Precedence: a non-empty API key wins; otherwise basic auth with the
//! configured username and the password from `password_env`, defaulting to
//! `guest`.

use anyhow::{bail, Result};

use crate::sync::IndexAuthSection;

const DEFAULT_PASSWORD: &str = "guest";

#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedIndexAuth {
    ApiKey(String),
    Basic { username: String, password: String },
}

impl std::fmt::Debug for ResolvedIndexAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedIndexAuth::ApiKey(_) => f.write_str("ApiKey(<REDACTED>)"),
            ResolvedIndexAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Resolve from the process environment.
pub fn resolve_index_auth(section: &IndexAuthSection) -> Result<ResolvedIndexAuth> {
    resolve_index_auth_with(section, |name| std::env::var(name).ok())
}

/// Resolve with an explicit lookup (tests, embedding).
pub fn resolve_index_auth_with(
    section: &IndexAuthSection,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedIndexAuth> {
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(var) = section.api_key_env.as_deref() {
        if let Some(key) = read(var) {
            return Ok(ResolvedIndexAuth::ApiKey(key));
        }
    }

    if section.username.trim().is_empty() {
        bail!("SECRETS_INVALID: index.auth.username must not be empty");
    }
    let password = match section.password_env.as_deref() {
        Some(var) => read(var).unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        None => DEFAULT_PASSWORD.to_string(),
    };
    Ok(ResolvedIndexAuth::Basic {
        username: section.username.clone(),
        password,
    })
}
