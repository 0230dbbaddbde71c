// src/model.rs

use serde::Deserialize;

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
///
/// Only the members needed to build an RSA verification key are modelled;
/// anything else (`x5c`, `x5t`, `key_ops`, ...) is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonWebKey {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(rename = "use", default)]
    pub use_purpose: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

impl JsonWebKey {
    /// True for RSA keys that may be used to check signatures.
    pub fn is_rsa_signing_key(&self) -> bool {
        self.kty == "RSA" && self.use_purpose.as_deref().map_or(true, |u| u == "sig")
    }
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_auth0_style_jwks() {
        let jwks: JsonWebKeySet = serde_json::from_str(
            r#"{"keys":[
                {"alg":"RS256","kty":"RSA","use":"sig","n":"AQAB","e":"AQAB","kid":"one","x5c":["abc"],"x5t":"xyz"},
                {"kty":"EC","crv":"P-256","x":"a","y":"b","kid":"two"},
                {"kty":"RSA","use":"enc","n":"AQAB","e":"AQAB"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(jwks.keys.len(), 3);
        assert_eq!(jwks.keys[0].kid.as_deref(), Some("one"));
        assert!(jwks.keys[0].is_rsa_signing_key());
        assert!(!jwks.keys[1].is_rsa_signing_key());
        assert!(!jwks.keys[2].is_rsa_signing_key());
    }
}
