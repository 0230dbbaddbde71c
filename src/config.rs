// src/config.rs

use crate::error::NilaJwtError;
use crate::model::JsonWebKey;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// What to do with a token whose `exp` claim is missing or not a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingExpiryPolicy {
    /// Treat the token as expired.
    #[default]
    Reject,
    /// Treat the token as unexpired. Only for issuers known to omit `exp`;
    /// every acceptance under this policy is logged as a warning.
    Accept,
}

/// Contains the claim checks applied before the signature is verified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationDetails {
    /// Added to `exp` before comparing against the current time. Defaults to zero.
    pub leeway: Duration,
    pub missing_expiry: MissingExpiryPolicy,
}

/// Defines the source for the RSA verification key(s).
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "value")]
#[serde(rename_all = "snake_case")]
pub enum KeySourceConfig {
    /// Base64url modulus and exponent, as in the `n`/`e` members of a JWK.
    RsaComponents {
        n: String,
        e: String,
        #[serde(default)]
        kid: Option<String>,
    },
    /// A single JWK object.
    Jwk(JsonWebKey),
    /// Path to a PEM-encoded RSA public key (SPKI or PKCS#1).
    PemFile(PathBuf),
    /// A JWKS endpoint, fetched once when the verifier is built.
    JwksUri(Url),
}

/// The configuration for a [`TokenVerifier`](crate::validator::TokenVerifier).
///
/// Construct it with [`ConfigBuilder`].
#[derive(Clone, Debug)]
pub struct Config {
    pub key_source: KeySourceConfig,
    pub validation: ValidationDetails,
    /// Timeout for the JWKS request when the key source is `JwksUri`.
    pub fetch_timeout: Duration,
}

/// A builder for creating a `Config` instance.
#[derive(Default)]
pub struct ConfigBuilder {
    key_source: Option<KeySourceConfig>,
    fetch_timeout: Option<Duration>,
    validation: ValidationDetails,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key source. Exactly one key source may be configured.
    pub fn key_source(mut self, source: KeySourceConfig) -> Result<Self, NilaJwtError> {
        if self.key_source.is_some() {
            return Err(NilaJwtError::InvalidConfiguration(
                "Ambiguous key source: a key source is already configured".to_string(),
            ));
        }
        self.key_source = Some(source);
        Ok(self)
    }

    pub fn rsa_components(self, n: &str, e: &str, kid: Option<String>) -> Result<Self, NilaJwtError> {
        self.key_source(KeySourceConfig::RsaComponents {
            n: n.to_string(),
            e: e.to_string(),
            kid,
        })
    }

    pub fn jwk(self, jwk: JsonWebKey) -> Result<Self, NilaJwtError> {
        self.key_source(KeySourceConfig::Jwk(jwk))
    }

    pub fn pem_file(self, path: impl Into<PathBuf>) -> Result<Self, NilaJwtError> {
        self.key_source(KeySourceConfig::PemFile(path.into()))
    }

    pub fn jwks_uri(self, url: &str) -> Result<Self, NilaJwtError> {
        let parsed_url = Url::parse(url).map_err(|e| NilaJwtError::InvalidUrl(e.to_string()))?;
        self.key_source(KeySourceConfig::JwksUri(parsed_url))
    }

    /// Sets the clock skew tolerance for `exp`. Defaults to zero.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.validation.leeway = leeway;
        self
    }

    pub fn missing_expiry(mut self, policy: MissingExpiryPolicy) -> Self {
        self.validation.missing_expiry = policy;
        self
    }

    /// Sets the JWKS request timeout. Defaults to 10 seconds.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Consumes the builder and returns a `Config` object.
    ///
    /// # Errors
    ///
    /// Returns an error if no key source was configured.
    pub fn build(self) -> Result<Config, NilaJwtError> {
        let key_source = self
            .key_source
            .ok_or_else(|| NilaJwtError::MissingConfiguration("key_source".to_string()))?;
        Ok(Config {
            key_source,
            validation: self.validation,
            fetch_timeout: self.fetch_timeout.unwrap_or(Duration::from_secs(10)),
        })
    }
}

/// The `verifier` section of the proxy configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifierAppConfig {
    pub key_source: KeySourceConfig,
    pub leeway_seconds: Option<u64>,
    pub missing_expiry: Option<MissingExpiryPolicy>,
    pub fetch_timeout_seconds: Option<u64>,
}

impl VerifierAppConfig {
    pub fn to_config(&self) -> Result<Config, NilaJwtError> {
        let mut builder = ConfigBuilder::new().key_source(self.key_source.clone())?;
        if let Some(leeway_s) = self.leeway_seconds {
            builder = builder.leeway(Duration::from_secs(leeway_s));
        }
        if let Some(policy) = self.missing_expiry {
            builder = builder.missing_expiry(policy);
        }
        if let Some(timeout_s) = self.fetch_timeout_seconds {
            builder = builder.fetch_timeout(Duration::from_secs(timeout_s));
        }
        builder.build()
    }
}

/// Where authenticated requests are forwarded.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub addr: String,
    #[serde(default)]
    pub tls: bool,
    /// Defaults to the host part of `addr`.
    pub sni: Option<String>,
}

impl UpstreamConfig {
    pub fn sni(&self) -> String {
        match &self.sni {
            Some(sni) => sni.clone(),
            None => self.addr.split(':').next().unwrap_or(&self.addr).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

/// The proxy configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyAppConfig {
    pub listen_addr: String,
    pub upstream: UpstreamConfig,
    pub verifier: VerifierAppConfig,
    /// Serve the unauthenticated `/parse_jwt/...` inspection routes.
    #[serde(default)]
    pub inspection_routes: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProxyAppConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, NilaJwtError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, NilaJwtError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or("info")
    }
}
