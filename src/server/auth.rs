/// Identity of the requesting user, for display only
///
/// The `user_jwt` cookie carries an RSA-signed token issued by an external
/// identity service. The signing key is fetched from that service by key id.
/// Nothing here grants or denies access.

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::utils::{AUTH_COOKIE, DEFAULT_AUTH_URL};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Identity {
    pub username: String,
    pub group: String,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("no {0} cookie")]
    MissingCookie(&'static str),

    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("token has no key id")]
    MissingKeyId,

    #[error("public key lookup failed: {0}")]
    KeyLookup(String),

    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    #[serde(default)]
    username: String,
    #[serde(default)]
    group: String,
}

pub struct IdentityResolver {
    auth_url: String,
    client: reqwest::Client,
}

impl IdentityResolver {
    pub fn new(auth_url: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Base URL from AUTH_URL, falling back to the default service
    pub fn from_env() -> Self {
        let url = std::env::var("AUTH_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string());
        Self::new(url)
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Identity from request cookies; anonymous when anything is missing or invalid
    pub async fn identify_request(&self, headers: &HeaderMap) -> Identity {
        let result = match cookie_value(headers, AUTH_COOKIE) {
            Some(token) => self.identify(token).await,
            None => Err(IdentityError::MissingCookie(AUTH_COOKIE)),
        };

        result.unwrap_or_else(|e| {
            debug!(error = %e, "request is anonymous");
            Identity::default()
        })
    }

    /// Verify `token` against the issuer's public key and read its claims
    pub async fn identify(&self, token: &str) -> Result<Identity, IdentityError> {
        let header = decode_header(token)?;
        if !matches!(
            header.alg,
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
        ) {
            return Err(IdentityError::UnsupportedAlgorithm(header.alg));
        }
        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or(IdentityError::MissingKeyId)?;

        let pem = self.fetch_public_key(&kid).await?;
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())?;

        let mut validation = Validation::new(header.alg);
        // exp/nbf are checked when present but not required
        validation.set_required_spec_claims::<&str>(&[]);
        validation.validate_nbf = true;
        validation.validate_aud = false;

        let claims = decode::<IdentityClaims>(token, &key, &validation)?.claims;
        Ok(Identity {
            username: claims.username,
            group: claims.group,
        })
    }

    async fn fetch_public_key(&self, kid: &str) -> Result<String, IdentityError> {
        let url = format!("{}/public_key/{}", self.auth_url, kid);
        let lookup_error = |e: reqwest::Error| IdentityError::KeyLookup(e.to_string());

        self.client
            .get(&url)
            .send()
            .await
            .map_err(lookup_error)?
            .error_for_status()
            .map_err(lookup_error)?
            .text()
            .await
            .map_err(lookup_error)
    }
}

/// Value of cookie `name` from the Cookie headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
