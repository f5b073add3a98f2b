//! Environment overlay for wrapped tool subprocesses.
//!
//! Drivers declare environment variables that their tools need. Instead of
//! writing them into the orchestrator's own process environment, they are
//! collected into an [`Environment`] carried by the execution context and
//! applied to each spawned subprocess.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Environment variables layered over the system environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Map of environment variable names to values
    #[serde(flatten)]
    pub vars: HashMap<String, String>,
}

impl Environment {
    /// Create a new empty environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create environment from a map
    #[must_use]
    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// Get an environment variable value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set an environment variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Check if an environment variable exists
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Layer `vars` on top, replacing existing keys.
    ///
    /// Two drivers declaring the same variable within one run collide; the
    /// later one wins and the collision is logged.
    pub fn extend<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.into();
            let value = value.into();
            if let Some(previous) = self.vars.get(&key)
                && *previous != value
            {
                tracing::warn!(
                    var = %key,
                    previous = %previous,
                    value = %value,
                    "Environment variable redefined by another driver"
                );
            }
            self.vars.insert(key, value);
        }
    }

    /// Merge with system environment variables.
    /// Overlay variables take precedence.
    #[must_use]
    pub fn merge_with_system(&self) -> HashMap<String, String> {
        let mut merged: HashMap<String, String> = env::vars().collect();
        merged.extend(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Get the number of environment variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if the environment is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_basics() {
        let mut env = Environment::new();
        assert!(env.is_empty());

        env.set("NODE_ENV", "test");
        assert_eq!(env.get("NODE_ENV"), Some("test"));
        assert!(env.contains("NODE_ENV"));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_extend_later_wins() {
        let mut env = Environment::new();
        env.extend([("BABEL_ENV", "cjs")]);
        env.extend([("BABEL_ENV", "esm"), ("FORCE_COLOR", "1")]);

        assert_eq!(env.get("BABEL_ENV"), Some("esm"));
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn test_merge_with_system_overrides() {
        temp_env::with_var("TOOLRIG_TEST_OVERLAY", Some("system"), || {
            let mut env = Environment::new();
            env.set("TOOLRIG_TEST_OVERLAY", "overlay");

            let merged = env.merge_with_system();
            assert_eq!(
                merged.get("TOOLRIG_TEST_OVERLAY").map(String::as_str),
                Some("overlay")
            );
        });
    }
}
