//! Error types for kernel operations.
//!
//! Service and repository failures live next to their contracts
//! ([`ServiceError`](crate::service::ServiceError),
//! [`RepositoryError`](crate::repository::RepositoryError)); this module
//! holds the errors of the kernel's own machinery.

use crate::identity::TypeName;

/// Errors raised while encoding or decoding a tagged identity.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    /// The wrapped identity's concrete type has no entry in the encoding map.
    #[error("invalid value: unsupported identity {identity}")]
    UnsupportedIdentity { identity: String },

    /// The identity's own payload failed to serialize.
    #[error("invalid value: identity {identity} failed to encode: {message}")]
    Payload { identity: String, message: String },

    /// The wire tag has no entry in the decoding map.
    #[error("data corrupted: unsupported identity type {tag}")]
    UnsupportedType { tag: TypeName },

    /// The tag resolved, but its payload does not fit the resolved type.
    #[error("data corrupted: malformed payload for identity type {tag}: {message}")]
    MalformedPayload { tag: TypeName, message: String },

    /// The encoded form is not a `[tag, payload]` pair.
    #[error("data corrupted: {0}")]
    Shape(String),
}

/// Errors raised while loading a [`ContextConfig`](crate::config::ContextConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
