// src/test_support.rs

use crate::token::BASE64_URL;
use base64::Engine;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use serde_json::Value;
use sha2::{Digest, Sha256};

const PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/test_private_key.pem");

pub(crate) fn private_key() -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY_PEM).unwrap()
}

pub(crate) fn public_key_pem() -> String {
    private_key()
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap()
}

/// Base64url `(n, e)` of the test key.
pub(crate) fn public_components() -> (String, String) {
    let public_key = private_key().to_public_key();
    (
        BASE64_URL.encode(public_key.n().to_bytes_be()),
        BASE64_URL.encode(public_key.e().to_bytes_be()),
    )
}

/// RSASSA-PKCS1-v1_5 / SHA-256 signature with the test key.
pub(crate) fn sign(message: &[u8]) -> Vec<u8> {
    private_key()
        .sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(message))
        .unwrap()
}

/// A compact token with an RS256 signature, whatever `alg` the header claims.
pub(crate) fn signed_token(header: &Value, claims: &Value) -> String {
    let signing_input = format!(
        "{}.{}",
        BASE64_URL.encode(serde_json::to_vec(header).unwrap()),
        BASE64_URL.encode(serde_json::to_vec(claims).unwrap())
    );
    let signature = BASE64_URL.encode(sign(signing_input.as_bytes()));
    format!("{signing_input}.{signature}")
}
