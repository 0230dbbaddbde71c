// src/proxy.rs

use crate::config::UpstreamConfig;
use crate::token;
use crate::validator::TokenVerifier;
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use serde_json::json;
use std::sync::Arc;

/// Body of every rejection. The reason is only logged.
pub const INVALID_JWT_BODY: &str = "Invalid JWT";

const PARSE_JWT_PREFIX: &str = "/parse_jwt/";
const USER_DATA_PREFIX: &str = "/parse_jwt/user_data/";

/// The unauthenticated token inspection endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionRoute<'a> {
    /// `GET /parse_jwt/{token}`: decoded header and payload.
    Token(&'a str),
    /// `GET /parse_jwt/user_data/{token}`: `email` and `country`.
    UserData(&'a str),
}

impl<'a> InspectionRoute<'a> {
    pub fn from_path(path: &'a str) -> Option<Self> {
        let non_empty = |token: &'a str| (!token.is_empty() && !token.contains('/')).then_some(token);
        if let Some(token) = path.strip_prefix(USER_DATA_PREFIX) {
            return non_empty(token).map(InspectionRoute::UserData);
        }
        path.strip_prefix(PARSE_JWT_PREFIX)
            .and_then(non_empty)
            .map(InspectionRoute::Token)
    }

    /// Status code and JSON body. Decodes only; nothing is verified.
    pub fn respond(&self) -> (u16, String) {
        let raw = match self {
            InspectionRoute::Token(raw) | InspectionRoute::UserData(raw) => *raw,
        };
        match token::decode(raw) {
            Ok(decoded) => {
                let body = match self {
                    InspectionRoute::Token(_) => serde_json::to_string(&decoded.inspect()),
                    InspectionRoute::UserData(_) => serde_json::to_string(&decoded.user_data()),
                };
                match body {
                    Ok(body) => (200, body),
                    Err(e) => (500, json!({ "error": e.to_string() }).to_string()),
                }
            }
            Err(e) => (400, json!({ "error": e.to_string() }).to_string()),
        }
    }
}

/// Pingora service that only lets requests with a valid bearer token through
/// to the upstream.
pub struct NilaJwtGate {
    verifier: Arc<TokenVerifier>,
    upstream: UpstreamConfig,
    inspection_routes: bool,
}

impl NilaJwtGate {
    pub fn new(verifier: Arc<TokenVerifier>, upstream: UpstreamConfig, inspection_routes: bool) -> Self {
        Self {
            verifier,
            upstream,
            inspection_routes,
        }
    }

    fn inspection_response(&self, session: &Session) -> Option<(u16, String)> {
        if !self.inspection_routes || session.req_header().method != "GET" {
            return None;
        }
        InspectionRoute::from_path(session.req_header().uri.path()).map(|route| route.respond())
    }

    /// `None` forwards the request; otherwise the status and body to answer with.
    pub fn gate(&self, headers: &HeaderMap) -> Option<(u16, &'static str)> {
        if self.verifier.is_valid(headers) {
            None
        } else {
            Some((403, INVALID_JWT_BODY))
        }
    }
}

async fn write_response(
    session: &mut Session,
    status: u16,
    content_type: &str,
    body: Vec<u8>,
) -> Result<()> {
    let mut resp_header = ResponseHeader::build(status, None)?;
    resp_header.insert_header("Content-Type", content_type)?;
    resp_header.insert_header("Content-Length", body.len().to_string())?;
    session.write_response_header(Box::new(resp_header), false).await?;
    session.write_response_body(Some(Bytes::from(body)), true).await?;
    Ok(())
}

#[async_trait]
impl ProxyHttp for NilaJwtGate {
    type CTX = ();
    fn new_ctx(&self) -> Self::CTX {}

    async fn request_filter(&self, session: &mut Session, _ctx: &mut Self::CTX) -> Result<bool> {
        if let Some((status, body)) = self.inspection_response(session) {
            write_response(session, status, "application/json", body.into_bytes()).await?;
            return Ok(true);
        }

        let Some((status, body)) = self.gate(&session.req_header().headers) else {
            return Ok(false); // Continue to upstream
        };

        write_response(session, status, "text/plain", body.as_bytes().to_vec()).await?;
        Ok(true)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let peer = Box::new(HttpPeer::new(
            &self.upstream.addr,
            self.upstream.tls,
            self.upstream.sni(),
        ));
        Ok(peer)
    }
}
