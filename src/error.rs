//! Error types for the OSC control plane

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// OSC codec errors
///
/// Every variant maps to a stable negative code, see [`CodecError::code`].
/// None of them is fatal: the packet that produced it is dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("Address block not terminated within packet")]
    UnterminatedAddress,

    #[error("Type tag block missing or not terminated within packet")]
    UnterminatedFormat,

    #[error("Declared length of {needed} bytes exceeds {available} available")]
    OutOfBounds { needed: usize, available: usize },

    #[error("Unsupported type tag '{0}'")]
    UnknownTag(char),

    #[error("String argument is not valid UTF-8")]
    InvalidString,

    #[error("Packet is not a bundle")]
    NotABundle,

    #[error("Address or string argument contains a NUL byte")]
    InteriorNul,
}

impl CodecError {
    /// Negative integer code for this error
    pub fn code(&self) -> i32 {
        match self {
            CodecError::UnterminatedAddress => -1,
            CodecError::UnterminatedFormat => -2,
            CodecError::OutOfBounds { .. } => -3,
            CodecError::UnknownTag(_) => -4,
            CodecError::InvalidString => -5,
            CodecError::NotABundle => -6,
            CodecError::InteriorNul => -7,
        }
    }
}

/// Parameter tree errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Duplicate child name '{name}' under '{parent}'")]
    DuplicateChild { parent: String, name: String },

    #[error("Invalid node name '{0}'")]
    InvalidName(String),

    #[error("Node is not a container")]
    NotAContainer,

    #[error("Node no longer exists")]
    StaleNode,

    #[error("The root container cannot be removed")]
    RootRemoval,
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Connector not found: {0}")]
    ConnectorNotFound(u32),

    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_codes_are_negative_and_distinct() {
        let errors = [
            CodecError::UnterminatedAddress,
            CodecError::UnterminatedFormat,
            CodecError::OutOfBounds { needed: 8, available: 4 },
            CodecError::UnknownTag('x'),
            CodecError::InvalidString,
            CodecError::NotABundle,
            CodecError::InteriorNul,
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        assert!(codes.iter().all(|&c| c < 0));
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_tree_error_wraps_into_error() {
        let err: Error = TreeError::NotAContainer.into();
        assert!(err.to_string().starts_with("Tree error"));
    }
}
