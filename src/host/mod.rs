//! Lecturer dashboard: live countdown, QR display, and the polled
//! check-in list for one attendance session.

use crate::capture::qr;
use crate::gateway::Gateway;
use crate::session::SessionController;

mod runtime;
mod ui;

pub use runtime::run_host;

/// Widest the rendered QR block may get before it is downscaled.
const MAX_QR_COLS: u32 = 64;

pub struct HostApp<G: Gateway> {
    pub controller: SessionController<G>,
    /// Unicode rendering of the session QR, one string per terminal row.
    pub qr_rows: Vec<String>,
    pub status_message: Option<String>,
    pub confirm_deactivate: bool,
    pub should_quit: bool,
    /// Printed after the terminal is restored.
    pub closing_note: Option<String>,
}

impl<G: Gateway> HostApp<G> {
    pub fn new(controller: SessionController<G>) -> Self {
        let mut app = Self {
            controller,
            qr_rows: Vec::new(),
            status_message: None,
            confirm_deactivate: false,
            should_quit: false,
            closing_note: None,
        };
        app.load_qr();
        app
    }

    /// Decode the backend's QR payload into terminal rows. A payload that
    /// does not decode leaves the manual code as the only way in, which is
    /// worth a status line rather than a failed session.
    fn load_qr(&mut self) {
        let Some(session) = self.controller.session() else {
            return;
        };

        match qr::decode_data_uri(&session.qr_payload) {
            Ok(image) => self.qr_rows = qr::render_unicode(&image, MAX_QR_COLS),
            Err(err) => {
                tracing::warn!(error = %err, "QR payload did not render");
                self.status_message =
                    Some("QR image unavailable; share the manual code instead".to_string());
            }
        }
    }

    pub fn manual_code(&self) -> Option<&str> {
        self.controller
            .session()
            .and_then(|s| s.session_token.as_deref())
    }
}
