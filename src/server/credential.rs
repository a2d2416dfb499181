//! Per-request credential extraction.
//!
//! Clients hand over their upstream credential in one of four places,
//! checked in order: a `?token=` query parameter, the `token` header, an
//! `Authorization: Bearer` header, or an `X-API-Key` header. The first match
//! wins; absence is not an HTTP error here, method handlers decide whether
//! a credential is required.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use crate::upstream::{Credential, CREDENTIAL_HEADER};

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const API_KEY_HEADER: &str = "X-API-Key";
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Optional credential extractor.
#[derive(Debug)]
pub struct MaybeCredential(pub Option<Credential>);

impl<S> FromRequestParts<S> for MaybeCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeCredential(extract_credential(parts)))
    }
}

fn extract_credential(parts: &Parts) -> Option<Credential> {
    if let Some(value) = query_param(parts, TOKEN_QUERY_PARAM) {
        debug!("Credential supplied via query parameter");
        return Some(Credential::new(value));
    }

    if let Some(value) = header_value(parts, CREDENTIAL_HEADER) {
        return Some(Credential::new(value));
    }

    if let Some(value) = header_value(parts, AUTHORIZATION_HEADER) {
        if let Some(bearer) = value.strip_prefix("Bearer ") {
            let bearer = bearer.trim();
            if !bearer.is_empty() {
                return Some(Credential::new(bearer));
            }
        }
    }

    if let Some(value) = header_value(parts, API_KEY_HEADER) {
        return Some(Credential::new(value));
    }

    None
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn query_param(parts: &Parts, name: &str) -> Option<String> {
    let query = parts.uri.query()?;
    for pair in query.split('&') {
        // Key-only pairs (e.g. `?debug`) carry no value to match.
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key == name && !value.is_empty() {
            return urlencoding::decode(value).ok().map(|v| v.into_owned());
        }
    }
    None
}
