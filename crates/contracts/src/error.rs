//! Layered error definitions
//!
//! Categorized by source: config / decode / output

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Pipeline Errors =====
    /// Decoder failed hard; the video chain must be torn down
    #[error("video decode error: {message}")]
    Decode { message: String },

    /// Filter chain could not be (re)initialized
    #[error("video filter init error: {message}")]
    FilterInit { message: String },

    // ===== Output Errors =====
    /// Video output rejected a format change
    #[error("video output reconfig to {width}x{height} failed: {message}")]
    OutputReconfig {
        width: u32,
        height: u32,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create filter init error
    pub fn filter_init(message: impl Into<String>) -> Self {
        Self::FilterInit {
            message: message.into(),
        }
    }

    /// Create output reconfig error
    pub fn output_reconfig(width: u32, height: u32, message: impl Into<String>) -> Self {
        Self::OutputReconfig {
            width,
            height,
            message: message.into(),
        }
    }
}
