//! Output plugin registry
//!
//! Plugins are identified by name. Only names registered here can be
//! attached to a slot.

use std::collections::BTreeSet;

use crate::errors::{SlotError, SlotResult};

/// Plugins every registry starts with.
pub const BUILTIN_PLUGINS: &[&str] = &["pgoutput", "test_decoding"];

#[derive(Debug, Clone)]
pub struct PluginRegistry {
    plugins: BTreeSet<String>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_plugins(BUILTIN_PLUGINS.iter().copied())
    }
}

impl PluginRegistry {
    /// Registry with no plugins at all.
    pub fn empty() -> Self {
        Self {
            plugins: BTreeSet::new(),
        }
    }

    pub fn with_plugins<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            plugins: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>) {
        self.plugins.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(String::as_str)
    }

    /// Check that `name` can be loaded as an output plugin.
    pub fn validate(&self, name: &str) -> SlotResult<()> {
        if name.is_empty() || !self.contains(name) {
            return Err(SlotError::InvalidPlugin(name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_plugins_registered() {
        let plugins = PluginRegistry::default();
        assert!(plugins.validate("test_decoding").is_ok());
        assert!(plugins.validate("pgoutput").is_ok());
    }

    #[test]
    fn test_unknown_and_empty_rejected() {
        let plugins = PluginRegistry::default();
        assert!(matches!(
            plugins.validate("wal2json"),
            Err(SlotError::InvalidPlugin(name)) if name == "wal2json"
        ));
        assert!(plugins.validate("").is_err());
    }

    #[test]
    fn test_register() {
        let mut plugins = PluginRegistry::empty();
        assert!(plugins.validate("test_decoding").is_err());
        plugins.register("wal2json");
        assert!(plugins.validate("wal2json").is_ok());
        assert_eq!(plugins.names().collect::<Vec<_>>(), vec!["wal2json"]);
    }
}
