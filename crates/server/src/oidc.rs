//! OIDC bearer-token verification.
//!
//! Discovery runs once at startup: the issuer's well-known document points
//! at a JWKS, whose RSA keys become the decoding set. Tokens must be RS256,
//! carry the configured audience, and come from the configured issuer.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::auth::{Claims, TokenVerifier};

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    tenant_id: String,
}

pub struct OidcVerifier {
    keys: Vec<DecodingKey>,
    validation: Validation,
}

impl OidcVerifier {
    /// Fetches the issuer's discovery document and JWKS, returning a
    /// verifier pinned to the issuer and audience.
    pub async fn discover(issuer: &str, audience: &str) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| format!("oidc: build http client: {err}"))?;

        let discovery_url =
            format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
        let discovery: DiscoveryDocument = http
            .get(&discovery_url)
            .send()
            .await
            .map_err(|err| format!("oidc: fetch discovery document: {err}"))?
            .json()
            .await
            .map_err(|err| format!("oidc: parse discovery document: {err}"))?;

        let jwks: JwkSet = http
            .get(&discovery.jwks_uri)
            .send()
            .await
            .map_err(|err| format!("oidc: fetch jwks: {err}"))?
            .json()
            .await
            .map_err(|err| format!("oidc: parse jwks: {err}"))?;

        Self::from_jwks(jwks, issuer, audience)
    }

    fn from_jwks(jwks: JwkSet, issuer: &str, audience: &str) -> Result<Self, String> {
        let keys: Vec<DecodingKey> = jwks
            .keys
            .iter()
            .filter(|key| key.kty == "RSA")
            .filter_map(|key| DecodingKey::from_rsa_components(&key.n, &key.e).ok())
            .collect();
        if keys.is_empty() {
            return Err("oidc: jwks contains no usable RSA keys".to_string());
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[issuer]);

        Ok(Self { keys, validation })
    }
}

#[async_trait]
impl TokenVerifier for OidcVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, String> {
        let mut last_error = "no decoding keys".to_string();
        for key in &self.keys {
            match decode::<TokenClaims>(token, key, &self.validation) {
                Ok(data) => {
                    let subject = if data.claims.sub.is_empty() {
                        data.claims.email
                    } else {
                        data.claims.sub
                    };
                    return Ok(Claims { subject, tenant_id: data.claims.tenant_id });
                }
                Err(error) => last_error = error.to_string(),
            }
        }
        Err(last_error)
    }
}
