//! # Caller Identity

use std::fmt;

use serde::{Deserialize, Serialize};

/// The role a session is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    role: String,
}

impl Identity {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }

    /// Name of the role
    pub fn role(&self) -> &str {
        &self.role
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.role)
    }
}
