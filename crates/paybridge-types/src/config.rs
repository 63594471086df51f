//! Configuration value helpers.
//!
//! Registry files routinely carry secrets, most often RPC URLs with an API key in
//! the path. [`LiteralOrEnv`] lets any string-parsed value be given either
//! literally or as a reference to an environment variable:
//!
//! ```json
//! {
//!   "url": "https://mainnet.base.org",
//!   "backup": "$BASE_RPC_URL",
//!   "archive": "${BASE_ARCHIVE_RPC_URL}"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// A value that is either given literally or resolved from an environment variable
/// while deserializing.
///
/// Serializes as the resolved value, so secrets read from the environment are
/// never written back as references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Returns the variable name if `s` is written as `$VAR` or `${VAR}`.
fn env_reference(s: &str) -> Option<&str> {
    let name = match s.strip_prefix("${") {
        Some(rest) => rest.strip_suffix('}')?,
        None => s.strip_prefix('$')?,
    };
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let value = match env_reference(&raw) {
            Some(name) => std::env::var(name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{name}' not found (referenced as '{raw}')"
                ))
            })?,
            None => raw,
        };
        value
            .parse::<T>()
            .map(LiteralOrEnv)
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_env_reference_syntax() {
        assert_eq!(env_reference("$RPC_URL"), Some("RPC_URL"));
        assert_eq!(env_reference("${RPC_URL}"), Some("RPC_URL"));
        assert_eq!(env_reference("https://rpc.example"), None);
        assert_eq!(env_reference("$"), None);
        assert_eq!(env_reference("${}"), None);
        assert_eq!(env_reference("$NOT-A-VAR"), None);
    }

    #[test]
    fn test_literal_value() {
        let value: LiteralOrEnv<Url> = serde_json::from_str("\"https://rpc.example/\"").unwrap();
        assert_eq!(value.as_str(), "https://rpc.example/");
    }

    #[test]
    fn test_missing_env_var_is_an_error() {
        let result: Result<LiteralOrEnv<String>, _> =
            serde_json::from_str("\"$PAYBRIDGE_SURELY_UNSET_VARIABLE\"");
        let message = result.unwrap_err().to_string();
        assert!(message.contains("PAYBRIDGE_SURELY_UNSET_VARIABLE"));
    }

    #[test]
    fn test_serializes_resolved_value() {
        let value = LiteralOrEnv::from_literal(42u32);
        assert_eq!(serde_json::to_string(&value).unwrap(), "42");
    }
}
