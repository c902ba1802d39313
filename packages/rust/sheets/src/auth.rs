//! Credentials for the Sheets API.
//!
//! A Google service-account key is turned into a short-lived OAuth access
//! token: an RS256-signed JWT assertion is exchanged at the key's `token_uri`.
//! The token is kept until shortly before it expires.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use fieldcheck_shared::{FieldcheckError, Result, SpreadsheetConfig};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Read-only scopes requested for the access token.
const SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets.readonly \
                      https://www.googleapis.com/auth/drive.readonly";

/// Lifetime requested for the JWT assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Renew the access token this long before it actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

// ---------------------------------------------------------------------------
// ServiceAccountKey
// ---------------------------------------------------------------------------

/// The fields of a service-account JSON key that the token flow needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FieldcheckError::parse(format!("invalid service account key: {e}")))
    }

    /// Read and parse a key file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| FieldcheckError::io(path, e))?;
        Self::from_json(&content)
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// How requests to the Sheets API are authorized.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Exchange a service-account key for access tokens.
    ServiceAccount(ServiceAccountKey),
    /// Use a ready bearer token as-is.
    Bearer(String),
}

impl Credentials {
    /// Pick credentials from config: a non-empty token env var wins over the key file.
    pub fn from_config(config: &SpreadsheetConfig) -> Result<Self> {
        if let Some(var_name) = &config.access_token_env {
            match std::env::var(var_name) {
                Ok(token) if !token.is_empty() => return Ok(Self::Bearer(token)),
                _ => debug!(var = %var_name, "token env var unset, using service account key"),
            }
        }

        let path = Path::new(&config.credentials_file);
        if !path.exists() {
            return Err(FieldcheckError::config(format!(
                "service account file not found: {}",
                path.display()
            )));
        }
        Ok(Self::ServiceAccount(ServiceAccountKey::from_file(path)?))
    }

    /// Non-secret description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::ServiceAccount(key) => key.client_email.clone(),
            Self::Bearer(_) => "bearer token".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Token exchange
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

fn assertion_claims(key: &ServiceAccountKey, now: DateTime<Utc>) -> AssertionClaims<'_> {
    let iat = now.timestamp();
    AssertionClaims {
        iss: &key.client_email,
        scope: SCOPES,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    }
}

fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| FieldcheckError::parse(format!("invalid service account private key: {e}")))?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    encode(&header, &assertion_claims(key, now), &encoding_key)
        .map_err(|e| FieldcheckError::parse(format!("failed to sign JWT assertion: {e}")))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Hands out access tokens, exchanging a new assertion only when needed.
#[derive(Debug)]
pub struct TokenProvider {
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// A valid bearer token, fetching a new one through `client` if required.
    #[instrument(skip_all)]
    pub async fn token(&self, client: &Client) -> Result<String> {
        let key = match &self.credentials {
            Credentials::Bearer(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(key) => key,
        };

        // Held across the exchange so concurrent callers share one request.
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.token.clone());
        }

        let fresh = exchange(client, key, now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

async fn exchange(client: &Client, key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<CachedToken> {
    let assertion = sign_assertion(key, now)?;
    debug!(token_uri = %key.token_uri, "exchanging service account assertion");

    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| FieldcheckError::SourceUnavailable(format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FieldcheckError::SourceUnavailable(format!(
            "token endpoint returned HTTP {status}: {}",
            crate::google::truncate_body(&body)
        )));
    }

    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|e| FieldcheckError::parse(format!("invalid token response: {e}")))?;

    Ok(CachedToken {
        token: parsed.access_token,
        expires_at: now + Duration::seconds(parsed.expires_in),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_JSON: &str = r#"{
        "type": "service_account",
        "client_email": "checker@example.iam.gserviceaccount.com",
        "private_key": "not a pem",
        "private_key_id": "abc123"
    }"#;

    #[test]
    fn parses_key_with_default_token_uri() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        assert_eq!(key.client_email, "checker@example.iam.gserviceaccount.com");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(!format!("{key:?}").contains("not a pem"));
    }

    #[test]
    fn claims_cover_one_hour_for_token_uri() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        let now = Utc::now();
        let claims = assertion_claims(&key, now);
        assert_eq!(claims.iss, key.client_email);
        assert_eq!(claims.aud, DEFAULT_TOKEN_URI);
        assert_eq!(claims.exp - claims.iat, ASSERTION_LIFETIME_SECS);
        assert!(claims.scope.contains("spreadsheets.readonly"));
    }

    #[test]
    fn bad_private_key_is_parse_error() {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        let err = sign_assertion(&key, Utc::now()).unwrap_err();
        assert!(matches!(err, FieldcheckError::Parse { .. }));
    }

    #[test]
    fn cached_token_freshness_respects_margin() {
        let now = Utc::now();
        let token = CachedToken {
            token: "t".into(),
            expires_at: now + Duration::seconds(EXPIRY_MARGIN_SECS + 10),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::seconds(20)));
    }

    #[tokio::test]
    async fn bearer_token_is_used_directly() {
        let provider = TokenProvider::new(Credentials::Bearer("abc".into()));
        let token = provider.token(&Client::new()).await.unwrap();
        assert_eq!(token, "abc");
        assert_eq!(provider.credentials().describe(), "bearer token");
    }
}
