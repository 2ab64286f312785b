use crate::utils::error::{transport_detail, NotifierError, Result};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const SOURCE_NAME: &str = "firestore";

/// Google service account 金鑰（client email + PEM 私鑰）
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

// 私鑰不進 log
impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ServiceAccountKey {
    /// 環境變數裡的私鑰常把換行存成字面上的 `\n`
    pub fn new(client_email: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: private_key.into().replace("\\n", "\n"),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    pub fn encoding_key(&self) -> Result<EncodingKey> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
            NotifierError::InvalidConfigValueError {
                field: "source.private_key".to_string(),
                value: "<redacted>".to_string(),
                reason: format!("not a usable RSA PEM key: {}", e),
            }
        })
    }

    pub fn signed_assertion(&self, issued_at: i64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key()?)
            .map_err(|e| NotifierError::config(format!("could not sign service account assertion: {}", e)))
    }

    /// 用簽好的 JWT 換一個短效 OAuth access token
    pub async fn exchange(&self, client: &Client) -> Result<String> {
        let assertion = self.signed_assertion(Utc::now().timestamp())?;

        let response = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| {
                NotifierError::source_unavailable(
                    SOURCE_NAME,
                    format!("token exchange failed: {}", transport_detail(e)),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::source_unavailable(
                SOURCE_NAME,
                format!("token exchange rejected (HTTP {}): {}", status.as_u16(), body),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            NotifierError::source_unavailable(SOURCE_NAME, format!("invalid token response: {}", e))
        })?;
        tracing::debug!("Obtained Firestore access token for {}", self.client_email);
        Ok(token.access_token)
    }
}
