// src/error.rs

use thiserror::Error;

/// The primary error type for the `nila-jwt` library.
#[derive(Debug, Error)]
pub enum NilaJwtError {
    /// The presented token could not be decoded.
    #[error("Token decoding error: {0}")]
    Decode(#[from] DecodeError),

    /// The algorithm named in the token header is not accepted by the configured key.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The token names a `kid` that is not present in the key store.
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),

    /// Configured key material is malformed or unusable.
    ///
    /// This is a startup failure: a verifier is never built around a bad key.
    #[error("Failed to load key material: {0}")]
    KeyLoadFailure(String),

    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An error occurred during an HTTP request.
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A configuration or key file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML configuration could not be parsed.
    #[error("Failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Reasons a compact token could not be decoded into a [`DecodedToken`](crate::token::DecodedToken).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The token did not split into exactly three `.`-separated segments.
    #[error("Malformed token: expected 3 segments, found {found}")]
    MalformedStructure { found: usize },

    /// A segment is not valid base64url.
    #[error("Invalid base64url in {segment} segment: {source}")]
    InvalidEncoding {
        segment: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// A segment decoded, but is not the JSON object it should be.
    #[error("Invalid JSON in {segment} segment: {reason}")]
    InvalidPayload {
        segment: &'static str,
        reason: String,
    },
}
