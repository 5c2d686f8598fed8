//! Secret lookup seam
//!
//! The resolver never reads secret storage formats itself; it asks a
//! [`SecretStore`] for raw values by name. Production runs use
//! [`EnvSecrets`]; tests substitute a plain map.

use std::collections::HashMap;

/// Source of raw secret values, looked up by name
pub trait SecretStore {
    /// Return the secret value for `name`, if present and non-empty
    fn get(&self, name: &str) -> Option<String>;
}

/// Secret store backed by process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretStore for EnvSecrets {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl SecretStore for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned().filter(|v| !v.is_empty())
    }
}
