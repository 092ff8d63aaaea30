//! Session: owns the bearer credential used by gateways.
//!
//! A session starts `Unknown`, resolves its credential from a `CredentialSource` on
//! `initialize` (or lazily on first use), and is invalidated by `sign_out`. Observers
//! are notified of every change through a watch channel.

use crate::error::ApiError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Where the bearer credential comes from
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Current credential, or `None` when nobody is signed in.
    async fn fetch(&self) -> Result<Option<String>, ApiError>;

    /// Invalidate the credential upstream.
    async fn revoke(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Credential fixed at construction (configuration or tests)
pub struct StaticCredential {
    token: Option<String>,
}

impl StaticCredential {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredential {
    async fn fetch(&self) -> Result<Option<String>, ApiError> {
        Ok(self.token.clone())
    }
}

/// Credential read from an environment variable at fetch time
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialSource for EnvCredential {
    async fn fetch(&self) -> Result<Option<String>, ApiError> {
        Ok(std::env::var(&self.var)
            .ok()
            .filter(|t| !t.trim().is_empty()))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    SignedIn { token: String },
    SignedOut,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unknown => f.write_str("Unknown"),
            SessionState::SignedIn { .. } => f.write_str("SignedIn { token: <redacted> }"),
            SessionState::SignedOut => f.write_str("SignedOut"),
        }
    }
}

/// Shared handle to one session
#[derive(Clone)]
pub struct Session {
    source: Arc<dyn CredentialSource>,
    state: Arc<watch::Sender<SessionState>>,
}

impl Session {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            source,
            state: Arc::new(state),
        }
    }

    /// Session with a fixed credential.
    pub fn with_token(token: Option<String>) -> Self {
        Self::new(Arc::new(StaticCredential::new(token)))
    }

    /// Fetch the current credential and publish the resulting state.
    pub async fn initialize(&self) -> Result<SessionState, ApiError> {
        let next = match self.source.fetch().await? {
            Some(token) => SessionState::SignedIn { token },
            None => SessionState::SignedOut,
        };
        debug!(state = ?next, "Session initialized");
        self.state.send_replace(next.clone());
        Ok(next)
    }

    /// Bearer credential for an outbound call, or `Unauthenticated`.
    pub async fn bearer_token(&self) -> Result<String, ApiError> {
        let current = self.state.borrow().clone();
        let resolved = match current {
            SessionState::Unknown => self.initialize().await?,
            other => other,
        };
        match resolved {
            SessionState::SignedIn { token } => Ok(token),
            _ => Err(ApiError::Unauthenticated),
        }
    }

    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.source.revoke().await?;
        self.state.send_replace(SessionState::SignedOut);
        info!("Signed out");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Session-changed notifications.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}
