//! Configuration errors
//!
//! Configuration problems are fatal: nothing is created or modified when
//! the file cannot be loaded.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorCode {
    /// File could not be read
    Read,
    /// File is not valid JSON for the expected shape
    Parse,
    /// A value is out of range or inconsistent
    Invalid,
}

impl ConfigErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read => "SLOTANCHOR_CONFIG_READ",
            Self::Parse => "SLOTANCHOR_CONFIG_PARSE",
            Self::Invalid => "SLOTANCHOR_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    code: ConfigErrorCode,
    message: String,
}

impl ConfigError {
    pub fn new(code: ConfigErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn read(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorCode::Read, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorCode::Parse, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorCode::Invalid, message)
    }

    pub fn code(&self) -> ConfigErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for ConfigError {}

pub type ConfigResult<T> = Result<T, ConfigError>;
