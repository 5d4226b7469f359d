//! Google Service-Account Authentication
//!
//! Signs an RS256 JWT bearer assertion with the service-account key and
//! exchanges it for an OAuth access token. Tokens are cached and refreshed
//! shortly before they expire.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use cardex_utils::{CardexError, CardexResult};

pub const GOOGLE_SCOPES: &str =
    "https://www.googleapis.com/auth/drive.readonly https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;
const REFRESH_MARGIN_SECONDS: i64 = 60;

/// Subset of a Google service-account key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Accepts inline JSON (anything starting with `{`) or a path to the key file.
    pub fn from_config(raw: &str) -> CardexResult<Self> {
        let raw = raw.trim();
        let json = if raw.starts_with('{') {
            raw.to_string()
        } else {
            std::fs::read_to_string(raw).map_err(|e| {
                CardexError::configuration(format!("Service account file {}: {}", raw, e))
            })?
        };

        serde_json::from_str(&json)
            .map_err(|e| CardexError::configuration(format!("Service account JSON: {}", e)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct GoogleAuth {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn new(key: ServiceAccountKey, client: Client) -> CardexResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self {
            key,
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// A valid access token, reusing the cached one when it is not about to expire.
    pub async fn access_token(&self) -> CardexResult<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECONDS) > now {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.fetch_token(now).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    pub(crate) fn signed_assertion(&self, now: DateTime<Utc>) -> CardexResult<String> {
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: GOOGLE_SCOPES.to_string(),
            aud: self.key.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECONDS,
        };
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)?)
    }

    async fn fetch_token(&self, now: DateTime<Utc>) -> CardexResult<CachedToken> {
        let assertion = self.signed_assertion(now)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| CardexError::external_service("Google OAuth", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CardexError::external_service(
                "Google OAuth",
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CardexError::external_service("Google OAuth", e.to_string()))?;

        let lifetime = body.expires_in.unwrap_or(ASSERTION_LIFETIME_SECONDS);
        debug!(client_email = %self.key.client_email, expires_in = lifetime, "google_token_refreshed");

        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: now + Duration::seconds(lifetime),
        })
    }
}
