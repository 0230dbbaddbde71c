// src/token.rs

use crate::error::DecodeError;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The authorization scheme expected in front of the compact token.
pub const BEARER_SCHEME: &str = "Bearer";

/// RFC 4648 §5 alphabet. Encodes without padding, decodes with or without it.
pub(crate) const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Pulls the compact token out of the `Authorization` header.
///
/// The value must start with `Bearer` (case-sensitive). Everything after the
/// scheme, trimmed, is returned as-is; no separator check is made, so
/// `BearerXYZ` yields `XYZ`. `None` means "treat the request as
/// unauthenticated", not an error.
pub fn extract(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_SCHEME)?;
    Some(token.trim())
}

/// The JOSE header of a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Any other header parameters, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A token split into its parts, with the header and payload parsed.
///
/// The raw header and payload segments are kept because the signature covers
/// those exact bytes. Never rebuild the signing input from the parsed values.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    header: JwtHeader,
    claims: Map<String, Value>,
    signature: Vec<u8>,
    raw_header: String,
    raw_payload: String,
}

/// Splits and decodes a compact token. Nothing here is trusted yet.
pub fn decode(token: &str) -> Result<DecodedToken, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::MalformedStructure {
            found: segments.len(),
        });
    }
    let (raw_header, raw_payload, raw_signature) = (segments[0], segments[1], segments[2]);

    let header_object = decode_json_object(raw_header, "header")?;
    let header: JwtHeader = serde_json::from_value(Value::Object(header_object)).map_err(|e| {
        DecodeError::InvalidPayload {
            segment: "header",
            reason: e.to_string(),
        }
    })?;
    let claims = decode_json_object(raw_payload, "payload")?;
    let signature = decode_segment(raw_signature, "signature")?;

    Ok(DecodedToken {
        header,
        claims,
        signature,
        raw_header: raw_header.to_string(),
        raw_payload: raw_payload.to_string(),
    })
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Vec<u8>, DecodeError> {
    BASE64_URL
        .decode(segment)
        .map_err(|source| DecodeError::InvalidEncoding {
            segment: name,
            source,
        })
}

fn decode_json_object(segment: &str, name: &'static str) -> Result<Map<String, Value>, DecodeError> {
    let bytes = decode_segment(segment, name)?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(DecodeError::InvalidPayload {
            segment: name,
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
        Err(e) => Err(DecodeError::InvalidPayload {
            segment: name,
            reason: e.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl DecodedToken {
    pub fn header(&self) -> &JwtHeader {
        &self.header
    }

    /// All payload claims.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The header segment exactly as it appeared in the token.
    pub fn raw_header(&self) -> &str {
        &self.raw_header
    }

    /// The payload segment exactly as it appeared in the token.
    pub fn raw_payload(&self) -> &str {
        &self.raw_payload
    }

    /// The bytes covered by the signature: `raw_header + "." + raw_payload`.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.raw_header, self.raw_payload)
    }

    /// Header and payload for display. The signature has NOT been checked.
    pub fn inspect(&self) -> TokenInspection<'_> {
        TokenInspection {
            header: &self.header,
            payload: &self.claims,
        }
    }

    /// The `email` and `country` claims, when they are strings.
    /// The signature has NOT been checked.
    pub fn user_data(&self) -> UserData {
        let string_claim = |name: &str| self.claim(name).and_then(Value::as_str).map(str::to_string);
        UserData {
            email: string_claim("email"),
            country: string_claim("country"),
        }
    }
}

/// Serializable view of an unverified token's header and payload.
#[derive(Debug, Serialize)]
pub struct TokenInspection<'a> {
    pub header: &'a JwtHeader,
    pub payload: &'a Map<String, Value>,
}

/// The user profile claims carried by tokens from the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn segment(value: &Value) -> String {
        BASE64_URL.encode(serde_json::to_vec(value).unwrap())
    }

    fn sample_token() -> String {
        format!(
            "{}.{}.{}",
            segment(&json!({"alg": "RS256", "typ": "JWT"})),
            segment(&json!({"exp": 1_700_000_000u64, "email": "ada@example.com", "country": "AU"})),
            BASE64_URL.encode([0xde, 0xad, 0xbe, 0xef])
        )
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extract_strips_scheme_and_whitespace() {
        let headers = headers_with("Bearer   abc.def.ghi  ");
        assert_eq!(extract(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn extract_only_matches_the_prefix() {
        assert_eq!(extract(&headers_with("Bearerabc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract(&headers_with("bearer abc.def.ghi")), None);
        assert_eq!(extract(&headers_with("Basic dXNlcjpwYXNz")), None);
    }

    #[test]
    fn extract_without_header_is_none() {
        assert_eq!(extract(&HeaderMap::new()), None);
    }

    #[test]
    fn extract_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer t.o.k"));
        assert_eq!(extract(&headers), Some("t.o.k"));
    }

    #[test]
    fn decode_keeps_raw_segments_and_parses_json() {
        let token = sample_token();
        let decoded = decode(&token).unwrap();

        let mut parts = token.split('.');
        assert_eq!(decoded.raw_header(), parts.next().unwrap());
        assert_eq!(decoded.raw_payload(), parts.next().unwrap());
        assert_eq!(decoded.header().alg, "RS256");
        assert_eq!(decoded.header().typ.as_deref(), Some("JWT"));
        assert_eq!(decoded.claim("exp"), Some(&json!(1_700_000_000u64)));
        assert_eq!(decoded.signature(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(
            decoded.signing_input(),
            format!("{}.{}", decoded.raw_header(), decoded.raw_payload())
        );
    }

    #[test]
    fn decode_rejects_wrong_segment_counts() {
        for token in ["", "onlyone", "two.parts", "a.b.c.d"] {
            match decode(token) {
                Err(DecodeError::MalformedStructure { found }) => {
                    assert_eq!(found, token.split('.').count())
                }
                other => panic!("expected MalformedStructure for {token:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn decode_of_garbage_segments_fails_without_panicking() {
        assert!(matches!(
            decode("A.B.sig"),
            Err(DecodeError::InvalidEncoding { segment: "header", .. })
        ));
        // Valid base64url, but not JSON.
        let not_json = format!("{}.{}.sig", BASE64_URL.encode("hello"), BASE64_URL.encode("world"));
        assert!(matches!(
            decode(&not_json),
            Err(DecodeError::InvalidPayload { segment: "header", .. })
        ));
    }

    #[test]
    fn decode_requires_json_objects_and_alg() {
        let array_payload = format!(
            "{}.{}.",
            segment(&json!({"alg": "RS256"})),
            segment(&json!([1, 2, 3]))
        );
        assert!(matches!(
            decode(&array_payload),
            Err(DecodeError::InvalidPayload { segment: "payload", .. })
        ));

        let no_alg = format!("{}.{}.", segment(&json!({"typ": "JWT"})), segment(&json!({})));
        assert!(matches!(
            decode(&no_alg),
            Err(DecodeError::InvalidPayload { segment: "header", .. })
        ));
    }

    #[test]
    fn decode_accepts_padded_segments() {
        let header = base64::engine::general_purpose::URL_SAFE.encode(br#"{"alg":"RS256","kid":"k1"}"#);
        assert!(header.ends_with('='));
        let token = format!("{header}.{}.", segment(&json!({"exp": 1})));
        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.raw_header(), header);
        assert!(decoded.signature().is_empty());
    }

    #[test]
    fn signature_uses_the_url_safe_alphabet() {
        let bytes = [0xfb, 0xff, 0xfe];
        let url_safe = BASE64_URL.encode(bytes);
        assert_eq!(url_safe, "-__-");
        let token = format!("{}.{}.{url_safe}", segment(&json!({"alg": "RS256"})), segment(&json!({})));
        assert_eq!(decode(&token).unwrap().signature(), &bytes);

        let standard = format!("{}.{}.+//+", segment(&json!({"alg": "RS256"})), segment(&json!({})));
        assert!(matches!(
            decode(&standard),
            Err(DecodeError::InvalidEncoding { segment: "signature", .. })
        ));
    }

    #[test]
    fn reencoding_decoded_segments_is_byte_identical() {
        let token = sample_token();
        let decoded = decode(&token).unwrap();
        let header_bytes = BASE64_URL.decode(decoded.raw_header()).unwrap();
        let payload_bytes = BASE64_URL.decode(decoded.raw_payload()).unwrap();
        let reencoded = format!(
            "{}.{}.{}",
            BASE64_URL.encode(header_bytes),
            BASE64_URL.encode(payload_bytes),
            BASE64_URL.encode(decoded.signature())
        );
        assert_eq!(reencoded, token);
    }

    #[test]
    fn user_data_and_inspection() {
        let decoded = decode(&sample_token()).unwrap();
        assert_eq!(
            decoded.user_data(),
            UserData {
                email: Some("ada@example.com".to_string()),
                country: Some("AU".to_string()),
            }
        );
        let inspected = serde_json::to_value(decoded.inspect()).unwrap();
        assert_eq!(inspected["header"]["alg"], "RS256");
        assert_eq!(inspected["payload"]["country"], "AU");
    }
}
