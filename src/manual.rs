//! Manual-entry fallback: a typed session token goes through the exact
//! pipeline a camera-decoded one does.

use crate::gateway::Gateway;
use crate::verify::{self, ScanAttempt, ScanError};

/// Submit an operator-typed token. Blank input is rejected locally with
/// zero network calls; anything else runs validate then scan and returns
/// the same attempt shape as the camera path.
pub async fn submit<G: Gateway>(gateway: &G, token_text: &str) -> ScanAttempt {
    let session_token = token_text.trim();

    if session_token.is_empty() {
        return ScanAttempt::rejected(session_token, ScanError::EmptyInput);
    }

    verify::verify_and_scan(gateway, session_token).await
}
