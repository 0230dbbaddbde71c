// src/key.rs

use crate::client::JwksClient;
use crate::config::{Config, KeySourceConfig};
use crate::error::NilaJwtError;
use crate::model::JsonWebKey;
use crate::token::{JwtHeader, BASE64_URL};
use base64::Engine;
use jsonwebtoken::Algorithm;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Keys shorter than this are refused at load time.
pub const MIN_MODULUS_BITS: usize = 2048;

/// An RSA public key used to check `RS256` signatures.
///
/// Immutable once loaded; share it freely between threads.
#[derive(Debug, Clone)]
pub struct PublicKey {
    kid: Option<String>,
    algorithm: Algorithm,
    key: RsaPublicKey,
}

impl PublicKey {
    fn new(key: RsaPublicKey, kid: Option<String>) -> Result<Self, NilaJwtError> {
        let bits = key.n().bits();
        if bits < MIN_MODULUS_BITS {
            return Err(NilaJwtError::KeyLoadFailure(format!(
                "RSA modulus is {} bits, at least {} are required",
                bits, MIN_MODULUS_BITS
            )));
        }
        Ok(Self {
            kid,
            algorithm: Algorithm::RS256,
            key,
        })
    }

    /// Builds a key from base64url-encoded modulus and exponent, as found in a JWK.
    pub fn from_components(n: &str, e: &str, kid: Option<String>) -> Result<Self, NilaJwtError> {
        let n = BASE64_URL
            .decode(n)
            .map_err(|e| NilaJwtError::KeyLoadFailure(format!("RSA modulus 'n' is not base64url: {}", e)))?;
        let e = BASE64_URL
            .decode(e)
            .map_err(|e| NilaJwtError::KeyLoadFailure(format!("RSA exponent 'e' is not base64url: {}", e)))?;
        let key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
            .map_err(|e| NilaJwtError::KeyLoadFailure(format!("Invalid RSA public key: {}", e)))?;
        Self::new(key, kid)
    }

    /// Builds a key from a JWK. Only RSA signing keys declared for `RS256` (or
    /// declaring no algorithm) are accepted.
    pub fn from_jwk(jwk: &JsonWebKey) -> Result<Self, NilaJwtError> {
        if jwk.kty != "RSA" {
            return Err(NilaJwtError::KeyLoadFailure(format!(
                "Unsupported key type '{}', expected 'RSA'",
                jwk.kty
            )));
        }
        if let Some(purpose) = jwk.use_purpose.as_deref() {
            if purpose != "sig" {
                return Err(NilaJwtError::KeyLoadFailure(format!(
                    "Key is declared for '{}', expected 'sig'",
                    purpose
                )));
            }
        }
        if let Some(alg) = jwk.alg.as_deref() {
            match Algorithm::from_str(alg) {
                Ok(Algorithm::RS256) => {}
                _ => {
                    return Err(NilaJwtError::KeyLoadFailure(format!(
                        "Key is declared for algorithm '{}', only RS256 is supported",
                        alg
                    )))
                }
            }
        }
        let n = jwk
            .n
            .as_deref()
            .ok_or_else(|| NilaJwtError::KeyLoadFailure("RSA key missing 'n' component".to_string()))?;
        let e = jwk
            .e
            .as_deref()
            .ok_or_else(|| NilaJwtError::KeyLoadFailure("RSA key missing 'e' component".to_string()))?;
        Self::from_components(n, e, jwk.kid.clone())
    }

    /// Parses a PEM public key, either SPKI (`BEGIN PUBLIC KEY`) or PKCS#1
    /// (`BEGIN RSA PUBLIC KEY`).
    pub fn from_pem(pem: &str, kid: Option<String>) -> Result<Self, NilaJwtError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|spki_err| {
                RsaPublicKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                    NilaJwtError::KeyLoadFailure(format!(
                        "PEM is neither an SPKI ({}) nor a PKCS#1 ({}) RSA public key",
                        spki_err, pkcs1_err
                    ))
                })
            })?;
        Self::new(key, kid)
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, NilaJwtError> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            NilaJwtError::KeyLoadFailure(format!("Failed to read public key file {:?}: {}", path, e))
        })?;
        Self::from_pem(&pem, None)
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// RSASSA-PKCS1-v1_5 / SHA-256 check of `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let digest = Sha256::digest(message);
        self.key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .is_ok()
    }
}

/// The set of keys a verifier may check signatures against. Never empty.
#[derive(Debug, Clone)]
pub struct KeyStore {
    keys: Arc<[PublicKey]>,
}

impl KeyStore {
    pub fn new(keys: Vec<PublicKey>) -> Result<Self, NilaJwtError> {
        if keys.is_empty() {
            return Err(NilaJwtError::KeyLoadFailure(
                "No usable RSA signing key was configured".to_string(),
            ));
        }
        Ok(Self { keys: keys.into() })
    }

    pub fn single(key: PublicKey) -> Self {
        Self {
            keys: Arc::from(vec![key]),
        }
    }

    /// Resolves the configured key source. Called once at startup.
    pub async fn load(config: &Config) -> Result<Self, NilaJwtError> {
        let store = match &config.key_source {
            KeySourceConfig::RsaComponents { n, e, kid } => {
                Self::single(PublicKey::from_components(n, e, kid.clone())?)
            }
            KeySourceConfig::Jwk(jwk) => Self::single(PublicKey::from_jwk(jwk)?),
            KeySourceConfig::PemFile(path) => Self::single(PublicKey::from_pem_file(path)?),
            KeySourceConfig::JwksUri(uri) => {
                let client = JwksClient::new(uri.clone(), config.fetch_timeout)?;
                Self::new(client.fetch_keys().await?)?
            }
        };
        info!("Loaded {} verification key(s)", store.len());
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Picks the key for a token.
    ///
    /// A header `kid` must match a key with that exact `kid`. Without a `kid`,
    /// the first key for the header's `alg` wins, falling back to the first key
    /// so that the algorithm check can reject it.
    pub fn select(&self, header: &JwtHeader) -> Option<&PublicKey> {
        match header.kid.as_deref() {
            Some(kid) => self.keys.iter().find(|key| key.kid() == Some(kid)),
            None => {
                let by_alg = self
                    .keys
                    .iter()
                    .find(|key| Algorithm::from_str(&header.alg).ok() == Some(key.algorithm()));
                if by_alg.is_none() {
                    debug!(alg = %header.alg, "No key declared for token algorithm");
                }
                by_alg.or_else(|| self.keys.first())
            }
        }
    }
}
