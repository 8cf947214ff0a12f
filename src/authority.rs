//! Token endpoint client for the authorization-code and refresh grants

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::auth::ClientIdentity;
use crate::error::{Result, SyncError};
use crate::token_store::DelegatedCredential;

/// Token endpoint response for either grant
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    /// Build the credential to persist. Providers usually omit the refresh
    /// token on refresh, in which case `previous_refresh` is carried over.
    pub fn into_credential(
        self,
        previous_refresh: Option<String>,
        fallback_scopes: &[String],
        now: DateTime<Utc>,
    ) -> DelegatedCredential {
        let scopes = match self.scope {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(String::from).collect()
            }
            _ => fallback_scopes.to_vec(),
        };

        DelegatedCredential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            scopes,
            obtained_at: now,
        }
    }
}

/// The provider's delegated-access protocol
#[async_trait]
pub trait CredentialAuthority: Send + Sync {
    /// Trade an authorization code for tokens
    async fn exchange_code(
        &self,
        identity: &ClientIdentity,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant>;

    /// Obtain a fresh access token from a refresh token
    async fn refresh(&self, identity: &ClientIdentity, refresh_token: &str) -> Result<TokenGrant>;
}

/// Talks to the `token_uri` from the client identity over HTTPS
pub struct HttpCredentialAuthority {
    http: reqwest::Client,
}

impl HttpCredentialAuthority {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::AuthError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    async fn post_form(&self, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenGrant> {
        let response = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| SyncError::AuthError(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| {
            SyncError::AuthError(format!("Failed to parse token response ({}): {}", status, e))
        })?;

        if !status.is_success() {
            let error = body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(SyncError::AuthError(format!(
                "Token endpoint rejected the request ({}): {}",
                status, error
            )));
        }

        serde_json::from_value(body)
            .map_err(|e| SyncError::AuthError(format!("Malformed token response: {}", e)))
    }
}

#[async_trait]
impl CredentialAuthority for HttpCredentialAuthority {
    async fn exchange_code(
        &self,
        identity: &ClientIdentity,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant> {
        debug!("Exchanging authorization code at {}", identity.token_uri());
        self.post_form(
            identity.token_uri(),
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", identity.client_id()),
                ("client_secret", identity.client_secret()),
            ],
        )
        .await
    }

    async fn refresh(&self, identity: &ClientIdentity, refresh_token: &str) -> Result<TokenGrant> {
        debug!("Refreshing access token at {}", identity.token_uri());
        self.post_form(
            identity.token_uri(),
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", identity.client_id()),
                ("client_secret", identity.client_secret()),
            ],
        )
        .await
    }
}

/// Consent page URL requesting offline access for `scopes`
pub fn authorization_url(
    identity: &ClientIdentity,
    redirect_uri: &str,
    scopes: &[&str],
    state: &str,
) -> Result<String> {
    let mut url = url::Url::parse(identity.auth_uri()).map_err(|e| {
        SyncError::ConfigError(format!("Invalid auth_uri '{}': {}", identity.auth_uri(), e))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", identity.client_id())
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &scopes.join(" "))
        .append_pair("access_type", "offline")
        .append_pair("state", state);

    Ok(url.to_string())
}
