//! Backend gateway for the attendance REST API.
//!
//! Every endpoint has an explicit response schema validated here at the
//! boundary; a response that does not match its schema becomes a typed
//! error instead of silently defaulting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ApiConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The backend answered and said no; carries its message verbatim.
    #[error("{0}")]
    Rejected(String),
    /// The request failed before a usable response arrived.
    #[error("request failed: {0}")]
    Transport(String),
    /// The response arrived but did not match the endpoint schema.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub class_id: String,
    pub attendance_date: NaiveDate,
    pub validity_minutes: u32,
}

/// Payload of a successful generate call. The session token is optional;
/// backends that allow manual entry include it alongside the QR image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSession {
    pub session_id: String,
    pub qr_payload: String,
    #[serde(default)]
    pub session_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Course/class descriptive info returned by the read-only validate step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub course_code: String,
    pub class_code: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfirmation {
    pub attendance_date: NaiveDate,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanLogEntry {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub matric_no: String,
    pub scan_time: DateTime<Utc>,
}

impl ScanLogEntry {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The five operations the attendance client needs from the backend.
pub trait Gateway {
    async fn generate(&self, req: &GenerateRequest) -> Result<GeneratedSession, GatewayError>;
    async fn validate(&self, session_token: &str) -> Result<SessionInfo, GatewayError>;
    async fn scan(&self, session_token: &str) -> Result<ScanConfirmation, GatewayError>;
    async fn deactivate(&self, session_id: &str) -> Result<(), GatewayError>;
    async fn scan_logs(&self, session_id: &str) -> Result<Vec<ScanLogEntry>, GatewayError>;
}

/// Response envelope shared by every backend endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    message: Option<String>,
}

fn parse_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, GatewayError> {
    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) if !envelope.success => Err(GatewayError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| format!("backend rejected the request (HTTP {status})")),
        )),
        Ok(envelope) => serde_json::from_value(envelope.data)
            .map_err(|e| GatewayError::MalformedResponse(format!("unexpected data shape: {e}"))),
        Err(e) => {
            if (400..600).contains(&status) {
                Err(GatewayError::Rejected(format!(
                    "backend returned HTTP {status}"
                )))
            } else {
                Err(GatewayError::MalformedResponse(format!(
                    "invalid envelope: {e}"
                )))
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenBody<'a> {
    session_token: &'a str,
}

/// HTTP implementation of the gateway.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpGateway {
    /// Build a client for the configured backend. The bearer token is read
    /// from the environment variable named in the config; the surrounding
    /// login flow is expected to have exported it already.
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(format!("rollcall/{}", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: std::env::var(&config.token_env).ok(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        parse_response(status, &body)
    }
}

impl Gateway for HttpGateway {
    async fn generate(&self, req: &GenerateRequest) -> Result<GeneratedSession, GatewayError> {
        self.execute(
            self.client
                .post(self.url("/attendance/sessions"))
                .json(req),
        )
        .await
    }

    async fn validate(&self, session_token: &str) -> Result<SessionInfo, GatewayError> {
        self.execute(
            self.client
                .post(self.url("/attendance/validate"))
                .json(&TokenBody { session_token }),
        )
        .await
    }

    async fn scan(&self, session_token: &str) -> Result<ScanConfirmation, GatewayError> {
        self.execute(
            self.client
                .post(self.url("/attendance/scan"))
                .json(&TokenBody { session_token }),
        )
        .await
    }

    async fn deactivate(&self, session_id: &str) -> Result<(), GatewayError> {
        let _: serde_json::Value = self
            .execute(
                self.client
                    .post(self.url(&format!("/attendance/sessions/{session_id}/deactivate"))),
            )
            .await?;
        Ok(())
    }

    async fn scan_logs(&self, session_id: &str) -> Result<Vec<ScanLogEntry>, GatewayError> {
        self.execute(
            self.client
                .get(self.url(&format!("/attendance/sessions/{session_id}/scans"))),
        )
        .await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    // --- parse_response ---

    #[test]
    fn test_parse_success_envelope() {
        let body = r#"{
            "success": true,
            "data": {"courseCode": "COS212", "classCode": "L01"},
            "message": "ok"
        }"#;
        let info: SessionInfo = parse_response(200, body).unwrap();
        assert_eq!(info.course_code, "COS212");
        assert_eq!(info.class_code, "L01");
    }

    #[test]
    fn test_parse_rejection_keeps_backend_message_verbatim() {
        let body = r#"{"success": false, "data": null, "message": "Session expired"}"#;
        let err = parse_response::<SessionInfo>(400, body).unwrap_err();
        assert_eq!(err, GatewayError::Rejected("Session expired".to_string()));
    }

    #[test]
    fn test_parse_rejection_without_message() {
        let body = r#"{"success": false}"#;
        let err = parse_response::<SessionInfo>(404, body).unwrap_err();
        match err {
            GatewayError::Rejected(msg) => assert!(msg.contains("404")),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_data_shape_is_malformed_not_defaulted() {
        let body = r#"{"success": true, "data": {"courseCode": 7}}"#;
        let err = parse_response::<SessionInfo>(200, body).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[test]
    fn test_non_json_error_body_maps_to_rejected() {
        let err = parse_response::<SessionInfo>(502, "Bad Gateway").unwrap_err();
        match err {
            GatewayError::Rejected(msg) => assert!(msg.contains("502")),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_non_json_success_body_is_malformed() {
        let err = parse_response::<SessionInfo>(200, "<html>").unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[test]
    fn test_generated_session_parses_optional_token() {
        let body = r#"{
            "success": true,
            "data": {
                "sessionId": "s-9",
                "qrPayload": "data:image/png;base64,AAAA",
                "expiresAt": "2024-05-01T08:15:00Z"
            }
        }"#;
        let session: GeneratedSession = parse_response(201, body).unwrap();
        assert_eq!(session.session_id, "s-9");
        assert_eq!(session.session_token, None);
    }

    #[test]
    fn test_scan_log_entries_parse() {
        let body = r#"{
            "success": true,
            "data": [{
                "id": 1,
                "firstName": "Thandi",
                "lastName": "Mokoena",
                "matricNo": "u21000001",
                "scanTime": "2024-05-01T08:03:11Z"
            }]
        }"#;
        let logs: Vec<ScanLogEntry> = parse_response(200, body).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].matric_no, "u21000001");
        assert_eq!(logs[0].display_name(), "Thandi Mokoena");
    }
}
