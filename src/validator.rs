// src/validator.rs

use crate::config::{Config, MissingExpiryPolicy, ValidationDetails};
use crate::error::NilaJwtError;
use crate::key::{KeyStore, PublicKey};
use crate::token::{self, DecodedToken};
use http::HeaderMap;
use jsonwebtoken::Algorithm;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Why a request was not authenticated. Logged, never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No `Authorization: Bearer` credential.
    Absent,
    /// Wrong segment count, bad base64url or bad JSON.
    Malformed,
    Expired,
    UnsupportedAlgorithm,
    /// The header `kid` matches no configured key.
    UnknownKey,
    BadSignature,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Absent => "absent",
            RejectReason::Malformed => "malformed",
            RejectReason::Expired => "expired",
            RejectReason::UnsupportedAlgorithm => "unsupported-algorithm",
            RejectReason::UnknownKey => "unknown-key",
            RejectReason::BadSignature => "bad-signature",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of checking a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Authenticated,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Verdict::Authenticated)
    }
}

/// Decides whether a bearer token is well-formed, unexpired and signed by a
/// configured key.
///
/// Build it once at startup and share it; it holds no mutable state and
/// cloning only bumps a reference count.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
    keys: KeyStore,
    validation: ValidationDetails,
}

impl TokenVerifier {
    pub fn new(keys: KeyStore, validation: ValidationDetails) -> Self {
        Self { keys, validation }
    }

    /// Loads the configured key material and builds the verifier.
    ///
    /// # Errors
    ///
    /// Any key loading problem. Callers should refuse to serve rather than
    /// fall back to accepting tokens.
    pub async fn from_config(config: &Config) -> Result<Self, NilaJwtError> {
        let keys = KeyStore::load(config).await?;
        Ok(Self::new(keys, config.validation.clone()))
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// True if the request carries a valid bearer token right now.
    pub fn is_valid(&self, headers: &HeaderMap) -> bool {
        self.is_valid_at(headers, SystemTime::now())
    }

    pub fn is_valid_at(&self, headers: &HeaderMap, now: SystemTime) -> bool {
        self.authenticate_at(headers, now).is_authenticated()
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Verdict {
        self.authenticate_at(headers, SystemTime::now())
    }

    /// Runs the whole pipeline: extract, decode, expiry, key selection, signature.
    /// Every failure becomes a `Rejected` verdict with a log entry.
    pub fn authenticate_at(&self, headers: &HeaderMap, now: SystemTime) -> Verdict {
        match token::extract(headers) {
            Some(token) => self.verify_token_at(token, now),
            None => {
                info!(reason = %RejectReason::Absent, "Rejected request without bearer token");
                Verdict::Rejected(RejectReason::Absent)
            }
        }
    }

    /// Like [`authenticate_at`](Self::authenticate_at), for a token obtained elsewhere.
    pub fn verify_token_at(&self, token: &str, now: SystemTime) -> Verdict {
        let decoded = match token::decode(token) {
            Ok(decoded) => decoded,
            Err(e) => return reject(RejectReason::Malformed, NilaJwtError::from(e)),
        };

        if !self.check_expiry(&decoded, now) {
            return reject(RejectReason::Expired, format_args!("exp = {:?}", decoded.claim("exp")));
        }

        let Some(key) = self.keys.select(decoded.header()) else {
            let kid = decoded.header().kid.clone().unwrap_or_default();
            return reject(RejectReason::UnknownKey, NilaJwtError::KeyNotFound(kid));
        };

        match Self::verify_signature(&decoded, key) {
            Ok(true) => {
                debug!(kid = ?key.kid(), "Bearer token authenticated");
                Verdict::Authenticated
            }
            Ok(false) => reject(RejectReason::BadSignature, "signature does not match"),
            Err(e) => reject(RejectReason::UnsupportedAlgorithm, e),
        }
    }

    /// True if the token is unexpired at `now`.
    ///
    /// `exp` is Unix seconds; the token is valid while `now < exp * 1000 ms`
    /// (plus leeway). A missing or non-numeric `exp` follows the configured
    /// [`MissingExpiryPolicy`].
    pub fn check_expiry(&self, decoded: &DecodedToken, now: SystemTime) -> bool {
        let Some(exp) = decoded.claim("exp").and_then(Value::as_f64) else {
            return match self.validation.missing_expiry {
                MissingExpiryPolicy::Reject => false,
                MissingExpiryPolicy::Accept => {
                    warn!("Token has no numeric 'exp' claim; accepting it as unexpired by configuration");
                    true
                }
            };
        };
        let expires_at_ms = exp * 1000.0 + self.validation.leeway.as_millis() as f64;
        let now_ms = now
            .duration_since(UNIX_EPOCH)
            .map(|since_epoch| since_epoch.as_millis() as f64)
            .unwrap_or(0.0);
        now_ms < expires_at_ms
    }

    /// Checks the signature over the original `header.payload` segments.
    ///
    /// Returns `Ok(false)` for a signature that does not verify.
    ///
    /// # Errors
    ///
    /// `UnsupportedAlgorithm` when the header `alg` is not the key's algorithm
    /// (`RS256`). `none` and symmetric algorithms always land here.
    pub fn verify_signature(decoded: &DecodedToken, key: &PublicKey) -> Result<bool, NilaJwtError> {
        let alg = &decoded.header().alg;
        match Algorithm::from_str(alg) {
            Ok(declared) if declared == key.algorithm() => {}
            _ => return Err(NilaJwtError::UnsupportedAlgorithm(alg.clone())),
        }
        Ok(key.verify(decoded.signing_input().as_bytes(), decoded.signature()))
    }
}

fn reject(reason: RejectReason, detail: impl fmt::Display) -> Verdict {
    warn!(reason = %reason, detail = %detail, "Rejected bearer token");
    Verdict::Rejected(reason)
}
