// src/lib.rs

pub mod client;
pub mod config;
pub mod error;
pub mod key;
pub mod model;
#[cfg(feature = "pingora-integration")]
pub mod proxy;
pub mod token;
pub mod validator;

#[cfg(test)]
mod test_support;

/// The public prelude for the `nila-jwt` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::config::{
        Config, ConfigBuilder, KeySourceConfig, MissingExpiryPolicy, ProxyAppConfig,
    };
    pub use crate::error::{DecodeError, NilaJwtError};
    pub use crate::key::{KeyStore, PublicKey};
    pub use crate::token::{decode, extract, DecodedToken};
    pub use crate::validator::{RejectReason, TokenVerifier, Verdict};
    pub use jsonwebtoken::Algorithm;
}
