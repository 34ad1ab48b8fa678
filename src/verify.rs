//! Shared verification pipeline for camera-decoded and manually entered
//! tokens: a read-only validate step, then the state-changing scan step.
//! The split lets the UI say why a code failed before anything is written,
//! and validate failures short-circuit so scan is never attempted.

use thiserror::Error;

use crate::gateway::{Gateway, GatewayError, ScanConfirmation, SessionInfo};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// Camera permission denied or no usable device.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    /// Decoded text is not the attendance token envelope.
    #[error("not a valid attendance code: {0}")]
    MalformedPayload(String),
    /// The backend rejected the token at the validate step.
    #[error("{0}")]
    ValidationRejected(String),
    /// The token validated but the scan step was refused.
    #[error("{0}")]
    ScanRejected(String),
    /// The request never produced a usable response.
    #[error("network error: {0}")]
    Transient(String),
    /// Manual entry was blank; caught before any network call.
    #[error("session token must not be empty")]
    EmptyInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Validated,
    Scanned,
    Rejected,
}

/// Transient record of one submission, camera-decoded or typed. Both entry
/// paths produce this exact shape so they are indistinguishable downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanAttempt {
    pub session_token: String,
    pub outcome: AttemptOutcome,
    pub session: Option<SessionInfo>,
    pub confirmation: Option<ScanConfirmation>,
    pub error: Option<ScanError>,
}

impl ScanAttempt {
    fn pending(session_token: &str) -> Self {
        Self {
            session_token: session_token.to_string(),
            outcome: AttemptOutcome::Pending,
            session: None,
            confirmation: None,
            error: None,
        }
    }

    pub fn rejected(session_token: &str, error: ScanError) -> Self {
        Self {
            session_token: session_token.to_string(),
            outcome: AttemptOutcome::Rejected,
            session: None,
            confirmation: None,
            error: Some(error),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Scanned
    }
}

fn validate_error(err: GatewayError) -> ScanError {
    match err {
        GatewayError::Rejected(msg) => ScanError::ValidationRejected(msg),
        GatewayError::Transport(msg) => ScanError::Transient(msg),
        GatewayError::MalformedResponse(msg) => ScanError::Transient(msg),
    }
}

fn scan_error(err: GatewayError) -> ScanError {
    match err {
        GatewayError::Rejected(msg) => ScanError::ScanRejected(msg),
        GatewayError::Transport(msg) => ScanError::Transient(msg),
        GatewayError::MalformedResponse(msg) => ScanError::Transient(msg),
    }
}

/// Run one token through validate then scan. Never panics; every failure
/// comes back inside the attempt.
pub async fn verify_and_scan<G: Gateway>(gateway: &G, session_token: &str) -> ScanAttempt {
    let mut attempt = ScanAttempt::pending(session_token);

    match gateway.validate(session_token).await {
        Ok(info) => {
            attempt.outcome = AttemptOutcome::Validated;
            attempt.session = Some(info);
        }
        Err(err) => {
            tracing::debug!(token = session_token, error = %err, "validate rejected");
            attempt.outcome = AttemptOutcome::Rejected;
            attempt.error = Some(validate_error(err));
            return attempt;
        }
    }

    match gateway.scan(session_token).await {
        Ok(confirmation) => {
            attempt.outcome = AttemptOutcome::Scanned;
            attempt.confirmation = Some(confirmation);
        }
        Err(err) => {
            tracing::debug!(token = session_token, error = %err, "scan rejected");
            attempt.outcome = AttemptOutcome::Rejected;
            attempt.error = Some(scan_error(err));
        }
    }

    attempt
}
