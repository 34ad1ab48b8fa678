//! The attendance token envelope carried inside a QR code.

use serde::Deserialize;

use crate::verify::ScanError;

const ATTENDANCE_KIND: &str = "attendance";

#[derive(Debug, Deserialize)]
struct AttendancePayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "sessionToken")]
    session_token: String,
}

/// Extract the session token from a decoded QR string.
///
/// Anything other than a JSON object with `type: "attendance"` and a
/// non-empty `sessionToken` is a malformed payload, distinct from any
/// network failure.
pub fn decode_payload(text: &str) -> Result<String, ScanError> {
    let payload: AttendancePayload = serde_json::from_str(text)
        .map_err(|_| ScanError::MalformedPayload("not an attendance QR code".to_string()))?;

    if payload.kind != ATTENDANCE_KIND {
        return Err(ScanError::MalformedPayload(format!(
            "unexpected code type \"{}\"",
            payload.kind
        )));
    }

    if payload.session_token.trim().is_empty() {
        return Err(ScanError::MalformedPayload(
            "code carries no session token".to_string(),
        ));
    }

    Ok(payload.session_token)
}
