//! Credential lifecycle for Gmail API access
//!
//! The [`CredentialManager`] is the only writer of the token store. It
//! reuses a stored credential while it is valid, refreshes it silently once
//! it expires, and falls back to the interactive consent flow when nothing
//! usable is stored.

use chrono::Utc;
use google_gmail1::common::GetToken;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use yup_oauth2::ApplicationSecret;

use crate::authority::{authorization_url, CredentialAuthority, HttpCredentialAuthority};
use crate::client::AuthenticatedChannel;
use crate::config::Config;
use crate::consent::{ConsentReceiver, LocalCallbackReceiver};
use crate::error::{Result, SyncError};
use crate::token_store::{DelegatedCredential, TokenStore};

/// Full mailbox access. A single broad scope covers listing and creating labels.
pub const FULL_MAILBOX_SCOPE: &str = "https://mail.google.com/";

/// OAuth2 client id/secret loaded from the downloaded client JSON
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    secret: ApplicationSecret,
}

impl ClientIdentity {
    /// Load the `installed` (or `web`) client JSON from disk
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::error!(
                "Credentials file not found at: {:?}. Download the OAuth client JSON from the Google Cloud Console.",
                path
            );
            return Err(SyncError::ConfigError(format!(
                "Credentials file not found at {:?}",
                path
            )));
        }

        let secret = yup_oauth2::read_application_secret(path)
            .await
            .map_err(|e| SyncError::ConfigError(format!("Failed to read credentials: {}", e)))?;

        Self::from_secret(secret)
    }

    pub fn from_secret(secret: ApplicationSecret) -> Result<Self> {
        if secret.client_id.is_empty() {
            return Err(SyncError::ConfigError(
                "Client credentials have an empty client_id".to_string(),
            ));
        }
        if secret.token_uri.is_empty() || secret.auth_uri.is_empty() {
            return Err(SyncError::ConfigError(
                "Client credentials must include auth_uri and token_uri".to_string(),
            ));
        }
        Ok(Self { secret })
    }

    pub fn client_id(&self) -> &str {
        &self.secret.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.secret.client_secret
    }

    pub fn auth_uri(&self) -> &str {
        &self.secret.auth_uri
    }

    pub fn token_uri(&self) -> &str {
        &self.secret.token_uri
    }
}

/// Where the credential for the configured user key currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    NoCredential,
    PendingUserConsent,
    Authorized { expired: bool },
}

pub struct CredentialManager {
    identity: ClientIdentity,
    store: TokenStore,
    user_key: String,
    authority: Box<dyn CredentialAuthority>,
    receiver: Box<dyn ConsentReceiver>,
    consent_timeout: Option<Duration>,
    state: Mutex<CredentialState>,
    // Serializes load/refresh/store so a refresh never races another
    store_lock: tokio::sync::Mutex<()>,
}

impl CredentialManager {
    pub fn new(
        identity: ClientIdentity,
        store: TokenStore,
        user_key: impl Into<String>,
        authority: Box<dyn CredentialAuthority>,
        receiver: Box<dyn ConsentReceiver>,
    ) -> Self {
        Self {
            identity,
            store,
            user_key: user_key.into(),
            authority,
            receiver,
            consent_timeout: None,
            state: Mutex::new(CredentialState::NoCredential),
            store_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_consent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.consent_timeout = timeout;
        self
    }

    pub fn state(&self) -> CredentialState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: CredentialState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    /// Return a valid credential for `scopes`, refreshing or running the
    /// consent flow as needed. Persists whatever it obtains.
    pub async fn obtain_credential(&self, scopes: &[&str]) -> Result<DelegatedCredential> {
        let _guard = self.store_lock.lock().await;

        let stored = self.store.load(&self.user_key).await?;
        let now = Utc::now();

        match stored {
            Some(credential) if !credential.covers(scopes) => {
                info!(
                    "Stored credential for '{}' does not cover the requested scopes, re-authorizing",
                    self.user_key
                );
                self.authorize_interactively(scopes).await
            }
            Some(credential) if !credential.is_expired(now) => {
                debug!("Reusing stored credential for '{}'", self.user_key);
                self.set_state(CredentialState::Authorized { expired: false });
                Ok(credential)
            }
            Some(credential) if credential.can_refresh() => {
                self.set_state(CredentialState::Authorized { expired: true });
                self.refresh(credential).await
            }
            Some(_) => {
                info!(
                    "Stored credential for '{}' expired and has no refresh token, re-authorizing",
                    self.user_key
                );
                self.authorize_interactively(scopes).await
            }
            None => {
                info!("No stored credential for '{}', starting authorization", self.user_key);
                self.authorize_interactively(scopes).await
            }
        }
    }

    /// Current access token, refreshed first if it has expired
    pub async fn access_token(&self, scopes: &[&str]) -> Result<String> {
        self.obtain_credential(scopes)
            .await
            .map(|credential| credential.access_token)
    }

    /// Drop the stored credential so the next call starts from consent
    pub async fn forget(&self) -> Result<bool> {
        let _guard = self.store_lock.lock().await;
        let removed = self.store.remove(&self.user_key).await?;
        self.set_state(CredentialState::NoCredential);
        Ok(removed)
    }

    async fn refresh(&self, expired: DelegatedCredential) -> Result<DelegatedCredential> {
        let refresh_token = expired.refresh_token.clone().unwrap_or_default();
        debug!("Access token for '{}' expired, refreshing", self.user_key);

        let grant = match self.authority.refresh(&self.identity, &refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                // A revoked grant means the next attempt starts over
                self.set_state(CredentialState::NoCredential);
                return Err(e);
            }
        };
        let credential = grant.into_credential(expired.refresh_token, &expired.scopes, Utc::now());

        self.store.store(&self.user_key, &credential).await?;
        self.set_state(CredentialState::Authorized { expired: false });
        info!("Refreshed access token for '{}'", self.user_key);
        Ok(credential)
    }

    async fn authorize_interactively(&self, scopes: &[&str]) -> Result<DelegatedCredential> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let redirect_uri = self.receiver.redirect_uri();
        let url = authorization_url(&self.identity, &redirect_uri, scopes, &state)?;

        self.set_state(CredentialState::PendingUserConsent);
        let code = match self
            .receiver
            .receive_code(&url, &state, self.consent_timeout)
            .await
        {
            Ok(code) => code,
            Err(e) => {
                self.set_state(CredentialState::NoCredential);
                return Err(e);
            }
        };

        let grant = match self
            .authority
            .exchange_code(&self.identity, &code, &redirect_uri)
            .await
        {
            Ok(grant) => grant,
            Err(e) => {
                self.set_state(CredentialState::NoCredential);
                return Err(e);
            }
        };

        let requested: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();
        let credential = grant.into_credential(None, &requested, Utc::now());
        if !credential.can_refresh() {
            warn!("Authorization returned no refresh token; consent will be needed again after expiry");
        }

        self.store.store(&self.user_key, &credential).await?;
        self.set_state(CredentialState::Authorized { expired: false });
        info!("Gmail API authorization successful.");
        Ok(credential)
    }
}

/// Token source handed to the Gmail hub so every call gets a valid token
#[derive(Clone)]
pub struct ChannelToken {
    manager: Arc<CredentialManager>,
    scopes: Vec<String>,
}

impl ChannelToken {
    pub fn new(manager: Arc<CredentialManager>, scopes: &[&str]) -> Self {
        Self {
            manager,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GetToken for ChannelToken {
    fn get_token<'a>(
        &'a self,
        _scopes: &'a [&str],
    ) -> Pin<
        Box<
            dyn Future<
                    Output = std::result::Result<
                        Option<String>,
                        Box<dyn std::error::Error + Send + Sync>,
                    >,
                > + Send
                + 'a,
        >,
    > {
        Box::pin(async move {
            let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
            let token = self.manager.access_token(&scopes).await?;
            Ok(Some(token))
        })
    }
}

/// Build the production credential manager from configuration
pub async fn credential_manager(
    client_identity_path: &Path,
    token_store_path: &Path,
    config: &Config,
) -> Result<CredentialManager> {
    let identity = ClientIdentity::load(client_identity_path).await?;
    let authority = HttpCredentialAuthority::new()?;
    let receiver = LocalCallbackReceiver::new(config.auth.port);

    Ok(CredentialManager::new(
        identity,
        TokenStore::new(token_store_path),
        config.auth.user_key.clone(),
        Box::new(authority),
        Box::new(receiver),
    )
    .with_consent_timeout(config.auth.consent_timeout()))
}

/// Authorize (reusing, refreshing or asking for consent) and return a
/// channel ready for label API calls
pub async fn obtain_credential(
    client_identity_path: &Path,
    token_store_path: &Path,
    requested_scopes: &[&str],
    config: &Config,
) -> Result<AuthenticatedChannel> {
    let manager = credential_manager(client_identity_path, token_store_path, config).await?;
    AuthenticatedChannel::connect(
        Arc::new(manager),
        requested_scopes,
        &config.auth.application_name,
        config.api.request_timeout(),
    )
    .await
}
