//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use gmail_label_sync::auth::{ClientIdentity, CredentialManager, FULL_MAILBOX_SCOPE};
use gmail_label_sync::authority::{CredentialAuthority, TokenGrant};
use gmail_label_sync::client::LabelApi;
use gmail_label_sync::consent::ConsentReceiver;
use gmail_label_sync::error::{Result, SyncError};
use gmail_label_sync::models::{NewLabel, RemoteLabel};
use gmail_label_sync::token_store::{DelegatedCredential, TokenStore};
use mockall::mock;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use yup_oauth2::ApplicationSecret;

pub const TEST_USER: &str = "user";
pub const TEST_REDIRECT_URI: &str = "http://localhost:8887/Callback";

// Mock implementation of LabelApi for testing
mock! {
    pub LabelApi {}

    #[async_trait]
    impl LabelApi for LabelApi {
        async fn list_labels(&self) -> Result<Vec<RemoteLabel>>;
        async fn create_label(&self, label: &NewLabel) -> Result<RemoteLabel>;
    }
}

/// Create a remote label with no color or visibility set
pub fn create_remote_label(id: &str, name: &str) -> RemoteLabel {
    RemoteLabel {
        id: id.to_string(),
        name: name.to_string(),
        color: None,
        label_list_visibility: None,
        message_list_visibility: None,
    }
}

/// In-memory mailbox that remembers created labels between passes
#[derive(Clone, Default)]
pub struct FakeMailbox {
    labels: Arc<Mutex<Vec<RemoteLabel>>>,
    created: Arc<Mutex<Vec<NewLabel>>>,
    pub list_calls: Arc<AtomicUsize>,
}

impl FakeMailbox {
    pub fn with_labels(names: &[&str]) -> Self {
        let mailbox = Self::default();
        {
            let mut labels = mailbox.labels.lock().unwrap();
            for (i, name) in names.iter().enumerate() {
                labels.push(create_remote_label(&format!("Label_{}", i + 1), name));
            }
        }
        mailbox
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.name.clone())
            .collect()
    }

    /// Every create request received, in order
    pub fn create_requests(&self) -> Vec<NewLabel> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl LabelApi for FakeMailbox {
    async fn list_labels(&self) -> Result<Vec<RemoteLabel>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn create_label(&self, label: &NewLabel) -> Result<RemoteLabel> {
        self.created.lock().unwrap().push(label.clone());

        let mut labels = self.labels.lock().unwrap();
        let created = RemoteLabel {
            id: format!("Label_{}", labels.len() + 1),
            name: label.name.clone(),
            color: Some(label.color.clone()),
            label_list_visibility: Some(label.label_list_visibility.clone()),
            message_list_visibility: Some(label.message_list_visibility.clone()),
        };
        labels.push(created.clone());
        Ok(created)
    }
}

/// Scripted token endpoint with call counters
#[derive(Clone, Default)]
pub struct FakeAuthority {
    pub exchange_calls: Arc<AtomicUsize>,
    pub refresh_calls: Arc<AtomicUsize>,
    pub exchanged_codes: Arc<Mutex<Vec<String>>>,
    pub fail_exchange: bool,
    pub fail_refresh: bool,
    pub omit_refresh_token: bool,
}

impl FakeAuthority {
    pub fn exchanges(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialAuthority for FakeAuthority {
    async fn exchange_code(
        &self,
        _identity: &ClientIdentity,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenGrant> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchanged_codes.lock().unwrap().push(code.to_string());

        if self.fail_exchange {
            return Err(SyncError::AuthError("invalid_grant".to_string()));
        }

        Ok(TokenGrant {
            access_token: format!("access-for-{}", code),
            refresh_token: if self.omit_refresh_token {
                None
            } else {
                Some("refresh-from-consent".to_string())
            },
            expires_in: Some(3600),
            scope: Some(FULL_MAILBOX_SCOPE.to_string()),
        })
    }

    async fn refresh(&self, _identity: &ClientIdentity, refresh_token: &str) -> Result<TokenGrant> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_refresh {
            return Err(SyncError::AuthError(format!(
                "Token endpoint rejected refresh token '{}'",
                refresh_token
            )));
        }

        Ok(TokenGrant {
            access_token: format!("refreshed-access-{}", n),
            refresh_token: None,
            expires_in: Some(3600),
            scope: None,
        })
    }
}

#[derive(Clone, Debug)]
pub enum ConsentOutcome {
    Grant(String),
    Deny,
    Timeout,
}

/// Consent receiver that answers immediately with a scripted outcome
#[derive(Clone)]
pub struct FakeConsent {
    pub outcome: ConsentOutcome,
    pub calls: Arc<AtomicUsize>,
    pub urls: Arc<Mutex<Vec<String>>>,
    pub timeouts: Arc<Mutex<Vec<Option<Duration>>>>,
}

impl FakeConsent {
    pub fn granting(code: &str) -> Self {
        Self::new(ConsentOutcome::Grant(code.to_string()))
    }

    pub fn new(outcome: ConsentOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
            urls: Arc::new(Mutex::new(Vec::new())),
            timeouts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsentReceiver for FakeConsent {
    fn redirect_uri(&self) -> String {
        TEST_REDIRECT_URI.to_string()
    }

    async fn receive_code(
        &self,
        authorization_url: &str,
        _expected_state: &str,
        timeout: Option<Duration>,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(authorization_url.to_string());
        self.timeouts.lock().unwrap().push(timeout);

        match &self.outcome {
            ConsentOutcome::Grant(code) => Ok(code.clone()),
            ConsentOutcome::Deny => Err(SyncError::AuthError(
                "Authorization was denied: access_denied".to_string(),
            )),
            ConsentOutcome::Timeout => Err(SyncError::ConsentTimeout(
                timeout.unwrap_or(Duration::from_secs(0)),
            )),
        }
    }
}

pub fn test_identity() -> ClientIdentity {
    ClientIdentity::from_secret(ApplicationSecret {
        client_id: "test-client-id".to_string(),
        client_secret: "test-secret".to_string(),
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        ..Default::default()
    })
    .unwrap()
}

pub fn test_manager(
    tokens_dir: &Path,
    authority: &FakeAuthority,
    consent: &FakeConsent,
) -> CredentialManager {
    CredentialManager::new(
        test_identity(),
        TokenStore::new(tokens_dir),
        TEST_USER,
        Box::new(authority.clone()),
        Box::new(consent.clone()),
    )
}

/// Credential expiring `expires_in_secs` from now (negative for already expired)
pub fn create_test_credential(
    access_token: &str,
    refresh_token: Option<&str>,
    expires_in_secs: i64,
) -> DelegatedCredential {
    let now = Utc::now();
    DelegatedCredential {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(String::from),
        expires_at: Some(now + ChronoDuration::seconds(expires_in_secs)),
        scopes: vec![FULL_MAILBOX_SCOPE.to_string()],
        obtained_at: now,
    }
}

/// Install the process-wide rustls provider the TLS connector expects
pub fn install_crypto_provider() {
    #[cfg(not(windows))]
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    #[cfg(windows)]
    let _ = rustls::crypto::ring::default_provider().install_default();
}
