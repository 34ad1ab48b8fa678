//! Lecturer-side session controller: requests a QR attendance session,
//! tracks its remaining lifetime against wall-clock, caches the polled
//! scan log, and handles early deactivation.

use chrono::{DateTime, NaiveDate, Utc};

use crate::gateway::{Gateway, GatewayError, GenerateRequest, ScanLogEntry};

/// Shortest and longest session the backend accepts, in minutes.
pub const MIN_VALIDITY_MINUTES: u32 = 5;
pub const MAX_VALIDITY_MINUTES: u32 = 60;

/// One open attendance window for one class meeting. `expires_at` is fixed
/// at creation; the client only ever computes remaining time against it.
#[derive(Debug, Clone, PartialEq)]
pub struct QrSession {
    pub session_id: String,
    pub class_id: String,
    pub attendance_date: NaiveDate,
    pub qr_payload: String,
    pub session_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub validity_minutes: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    Idle,
    Generating,
    Active { session: QrSession },
    Expired { session: QrSession },
}

pub struct SessionController<G> {
    gateway: G,
    phase: SessionPhase,
    scan_log: Vec<ScanLogEntry>,
}

impl<G: Gateway> SessionController<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            phase: SessionPhase::Idle,
            scan_log: Vec::new(),
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Active { .. })
    }

    pub fn session(&self) -> Option<&QrSession> {
        match &self.phase {
            SessionPhase::Active { session } | SessionPhase::Expired { session } => Some(session),
            _ => None,
        }
    }

    pub fn scan_log(&self) -> &[ScanLogEntry] {
        &self.scan_log
    }

    /// Request a new session. On success the controller holds the session
    /// and is ready for its countdown and poll timers; on failure the
    /// gateway's message is handed back and the controller returns to idle.
    pub async fn generate_session(
        &mut self,
        class_id: &str,
        attendance_date: NaiveDate,
        validity_minutes: u32,
    ) -> Result<(), GatewayError> {
        let validity_minutes = validity_minutes.clamp(MIN_VALIDITY_MINUTES, MAX_VALIDITY_MINUTES);
        let request = GenerateRequest {
            class_id: class_id.to_string(),
            attendance_date,
            validity_minutes,
        };

        self.phase = SessionPhase::Generating;

        match self.gateway.generate(&request).await {
            Ok(generated) => {
                tracing::info!(
                    session_id = %generated.session_id,
                    expires_at = %generated.expires_at,
                    "attendance session opened"
                );
                self.scan_log.clear();
                self.phase = SessionPhase::Active {
                    session: QrSession {
                        session_id: generated.session_id,
                        class_id: request.class_id,
                        attendance_date,
                        qr_payload: generated.qr_payload,
                        session_token: generated.session_token,
                        expires_at: generated.expires_at,
                        validity_minutes,
                    },
                };
                Ok(())
            }
            Err(err) => {
                self.phase = SessionPhase::Idle;
                Err(err)
            }
        }
    }

    /// Countdown tick. Purely local: when the wall clock passes
    /// `expires_at` the phase flips to `Expired` with no network call.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let SessionPhase::Active { session } = &self.phase {
            if now >= session.expires_at {
                self.phase = SessionPhase::Expired {
                    session: session.clone(),
                };
            }
        }
    }

    /// Seconds left in the session, clamped at zero.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.session()
            .map(|s| (s.expires_at - now).num_seconds().max(0))
    }

    /// Countdown text for display: "MM:SS" while time remains, "Expired"
    /// once it runs out.
    pub fn countdown_label(&self, now: DateTime<Utc>) -> String {
        match self.remaining_seconds(now) {
            None => "--:--".to_string(),
            Some(0) => "Expired".to_string(),
            Some(secs) => format!("{:02}:{:02}", secs / 60, secs % 60),
        }
    }

    /// Replace the cached scan log with the backend's current list.
    /// Best-effort: a failed refresh keeps the cached list and must never
    /// interrupt the countdown display.
    pub async fn refresh_scan_log(&mut self) {
        let Some(session_id) = self.session().map(|s| s.session_id.clone()) else {
            return;
        };

        match self.gateway.scan_logs(&session_id).await {
            Ok(entries) => self.scan_log = entries,
            Err(err) => {
                tracing::debug!(%session_id, error = %err, "scan log refresh failed");
            }
        }
    }

    /// End the session early. Confirmation happens in the UI before this is
    /// called. On success the controller is back in its pre-generation
    /// state; on failure the session is presumed still active.
    pub async fn deactivate(&mut self) -> Result<(), GatewayError> {
        let Some(session_id) = self.session().map(|s| s.session_id.clone()) else {
            return Ok(());
        };

        self.gateway.deactivate(&session_id).await?;

        tracing::info!(%session_id, "attendance session deactivated");
        self.phase = SessionPhase::Idle;
        self.scan_log.clear();
        Ok(())
    }
}
