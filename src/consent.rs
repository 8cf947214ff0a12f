//! Interactive consent: a loopback HTTP listener that waits for the
//! provider's redirect carrying the authorization code.

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// Path the provider redirects to after consent
pub const CALLBACK_PATH: &str = "/Callback";

/// How long the listener may keep finishing responses after the code arrived
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Where the user is sent after consent, and how the code comes back
#[async_trait]
pub trait ConsentReceiver: Send + Sync {
    fn redirect_uri(&self) -> String;

    /// Present `authorization_url` and block until the redirect arrives.
    /// `None` waits indefinitely.
    async fn receive_code(
        &self,
        authorization_url: &str,
        expected_state: &str,
        timeout: Option<Duration>,
    ) -> Result<String>;
}

/// Receives the redirect on `127.0.0.1:<port>`
#[derive(Debug, Clone)]
pub struct LocalCallbackReceiver {
    port: u16,
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Denied(String),
    /// Carries a code or error but not the state this flow issued
    Forged,
    Ignored,
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<String>,
    result_tx: Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>,
}

impl LocalCallbackReceiver {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl ConsentReceiver for LocalCallbackReceiver {
    fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.port, CALLBACK_PATH)
    }

    async fn receive_code(
        &self,
        authorization_url: &str,
        expected_state: &str,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|e| {
                SyncError::AuthError(format!(
                    "Failed to open callback listener on port {}: {}",
                    self.port, e
                ))
            })?;

        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = callback_router(CallbackState {
            expected_state: Arc::new(expected_state.to_string()),
            result_tx: Arc::new(Mutex::new(Some(result_tx))),
        });

        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("Waiting for authorization callback on port {}", self.port);
        eprintln!(
            "Please open the following URL in your browser to authorize access:\n\n{}\n",
            authorization_url
        );

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, result_rx)
                .await
                .map_err(|_| SyncError::ConsentTimeout(limit)),
            None => Ok(result_rx.await),
        };

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
            debug!("Callback listener did not drain in time, aborting it");
            server.abort();
        }

        match received? {
            Ok(outcome) => outcome,
            Err(_) => Err(SyncError::AuthError(
                "Callback listener stopped before authorization completed".to_string(),
            )),
        }
    }
}

fn callback_router(state: CallbackState) -> Router {
    Router::new()
        .route(CALLBACK_PATH, get(handle_callback))
        .fallback(handle_not_found)
        .with_state(state)
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    let (outcome, message) = match parse_callback(&params, &state.expected_state) {
        Callback::Code(code) => (
            Ok(code),
            "Authorization complete. You may close this window.",
        ),
        Callback::Denied(error) => (
            Err(SyncError::AuthError(format!(
                "Authorization was denied: {}",
                error
            ))),
            "Authorization was not granted.",
        ),
        Callback::Forged => {
            warn!("Ignoring authorization callback with mismatched state");
            return page(StatusCode::BAD_REQUEST, "Invalid authorization state.");
        }
        Callback::Ignored => return page(StatusCode::NOT_FOUND, "Not found."),
    };

    match state.result_tx.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => debug!("Authorization already completed, ignoring repeated callback"),
    }
    page(StatusCode::OK, message)
}

async fn handle_not_found() -> (StatusCode, Html<String>) {
    page(StatusCode::NOT_FOUND, "Not found.")
}

fn parse_callback(params: &HashMap<String, String>, expected_state: &str) -> Callback {
    let code = params.get("code").filter(|c| !c.is_empty());
    let error = params.get("error");
    if code.is_none() && error.is_none() {
        return Callback::Ignored;
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Callback::Forged;
    }

    match (code, error) {
        (_, Some(error)) => Callback::Denied(error.clone()),
        (Some(code), None) => Callback::Code(code.clone()),
        (None, None) => Callback::Ignored,
    }
}

fn page(status: StatusCode, message: &str) -> (StatusCode, Html<String>) {
    (
        status,
        Html(format!(
            "<html><head><title>Gmail authorization</title></head><body><p>{}</p></body></html>",
            message
        )),
    )
}
