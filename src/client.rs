// src/client.rs

use crate::error::NilaJwtError;
use crate::key::PublicKey;
use crate::model::JsonWebKeySet;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Fetches a JSON Web Key Set once, when a verifier is being built.
///
/// Keys are not refreshed afterwards; restart the process to pick up a rotation.
#[derive(Clone)]
pub struct JwksClient {
    http_client: reqwest::Client,
    jwks_uri: Url,
}

impl JwksClient {
    pub fn new(jwks_uri: Url, timeout: Duration) -> Result<Self, NilaJwtError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            jwks_uri,
        })
    }

    /// Downloads the JWKS and converts every RSA `RS256` signing key in it.
    ///
    /// Keys of other types or algorithms are skipped. A malformed RSA key fails
    /// the whole fetch.
    #[instrument(skip(self), fields(jwks_uri = %self.jwks_uri), err)]
    pub async fn fetch_keys(&self) -> Result<Vec<PublicKey>, NilaJwtError> {
        let response = self
            .http_client
            .get(self.jwks_uri.clone())
            .send()
            .await?
            .error_for_status()?;
        let jwks: JsonWebKeySet = response.json().await?;

        debug!("Fetched JWKS with {} key(s)", jwks.keys.len());

        let mut keys = Vec::with_capacity(jwks.keys.len());
        for jwk in jwks.keys {
            if !jwk.is_rsa_signing_key() {
                debug!(kid = ?jwk.kid, kty = %jwk.kty, "Skipping non-RSA or non-signing key");
                continue;
            }
            if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
                debug!(kid = ?jwk.kid, alg = ?jwk.alg, "Skipping key for unsupported algorithm");
                continue;
            }
            keys.push(PublicKey::from_jwk(&jwk)?);
        }
        Ok(keys)
    }
}
