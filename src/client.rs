//! Gmail label API boundary

use async_trait::async_trait;
use google_gmail1::{
    api::{Label, LabelColor, ListLabelsResponse},
    hyper_rustls, hyper_util, Gmail,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{ChannelToken, CredentialManager};
use crate::error::{Result, SyncError};
use crate::models::{LabelColorSpec, NewLabel, RemoteLabel};

/// The authenticated user, as the Gmail API spells it
pub const USER_ID: &str = "me";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Label operations the reconciler needs. Mocked in tests.
#[async_trait]
pub trait LabelApi: Send + Sync {
    /// List all labels in the mailbox
    async fn list_labels(&self) -> Result<Vec<RemoteLabel>>;

    /// Create a label and return it as the provider stored it
    async fn create_label(&self, label: &NewLabel) -> Result<RemoteLabel>;
}

/// Transport, serialization and credential bundled into one handle
pub struct AuthenticatedChannel {
    hub: GmailHub,
    application_name: String,
    request_timeout: Duration,
}

impl AuthenticatedChannel {
    /// Ensure the manager holds a valid credential, then build the hub
    pub async fn connect(
        manager: Arc<CredentialManager>,
        scopes: &[&str],
        application_name: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        manager.obtain_credential(scopes).await?;

        // Use HTTP/1 for compatibility (HTTP/2 is default but HTTP/1 works better with google-gmail1)
        let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(
                hyper_rustls::HttpsConnectorBuilder::new()
                    .with_native_roots()
                    .map_err(|e| SyncError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                    .https_or_http()
                    .enable_http1()
                    .build(),
            );

        let mut hub = Gmail::new(client, ChannelToken::new(Arc::clone(&manager), scopes));
        hub.user_agent(application_name.to_string());
        info!(
            "Configuring Gmail service client with application name: {}",
            application_name
        );

        Ok(Self {
            hub,
            application_name: application_name.to_string(),
            request_timeout,
        })
    }

    /// Send API calls to `base_url` instead of the public endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.hub.base_url(base_url.into());
        self
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Address of the authorized account
    pub async fn profile_email(&self) -> Result<String> {
        let call = self.hub.users().get_profile(USER_ID).doit();
        let (_, profile) = self.bounded("get_profile", call).await?;
        Ok(profile.email_address.unwrap_or_default())
    }

    /// Run one API call under the request timeout. No retries.
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, google_gmail1::Error>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => {
                warn!(
                    "Gmail API {} call timed out after {:?}",
                    operation, self.request_timeout
                );
                Err(SyncError::NetworkError(format!(
                    "API call timed out after {:?}",
                    self.request_timeout
                )))
            }
        }
    }
}

#[async_trait]
impl LabelApi for AuthenticatedChannel {
    async fn list_labels(&self) -> Result<Vec<RemoteLabel>> {
        debug!("Calling Gmail API to list labels...");
        let call = self.hub.users().labels_list(USER_ID).doit();
        let (_, response) = self.bounded("list_labels", call).await?;

        let labels = labels_from_response(response);
        debug!("Successfully parsed {} labels", labels.len());
        Ok(labels)
    }

    async fn create_label(&self, label: &NewLabel) -> Result<RemoteLabel> {
        let request = Label {
            name: Some(label.name.clone()),
            label_list_visibility: Some(label.label_list_visibility.clone()),
            message_list_visibility: Some(label.message_list_visibility.clone()),
            color: Some(LabelColor {
                background_color: Some(label.color.background_color.clone()),
                text_color: Some(label.color.text_color.clone()),
            }),
            ..Default::default()
        };

        let call = self.hub.users().labels_create(request, USER_ID).doit();
        let (_, created) = self.bounded("create_label", call).await?;

        remote_label_from(created)
            .ok_or_else(|| SyncError::LabelError("Created label has no ID".to_string()))
    }
}

/// An absent `labels` array means the mailbox has none
pub fn labels_from_response(response: ListLabelsResponse) -> Vec<RemoteLabel> {
    response
        .labels
        .unwrap_or_default()
        .into_iter()
        .filter_map(remote_label_from)
        .collect()
}

fn remote_label_from(label: Label) -> Option<RemoteLabel> {
    let (id, name) = match (label.id, label.name) {
        (Some(id), Some(name)) => (id, name),
        _ => return None,
    };

    let color = label.color.and_then(|c| match (c.background_color, c.text_color) {
        (Some(background_color), Some(text_color)) => Some(LabelColorSpec {
            background_color,
            text_color,
        }),
        _ => None,
    });

    Some(RemoteLabel {
        id,
        name,
        color,
        label_list_visibility: label.label_list_visibility,
        message_list_visibility: label.message_list_visibility,
    })
}
