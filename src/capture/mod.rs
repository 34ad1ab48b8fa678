//! Student-side capture engine: owns the camera stream lifecycle, the
//! frame-grab/decode loop, and the hand-off of the first well-formed
//! attendance payload into the verification pipeline.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::gateway::Gateway;
use crate::token;
use crate::verify::{self, ScanAttempt, ScanError};

pub mod camera;
pub mod qr;

pub use camera::{CommandFrameSource, FrameSource};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    Idle,
    Scanning,
    Processing { session_token: String },
    Success { attempt: ScanAttempt },
    Error { error: ScanError },
}

pub struct CaptureEngine<S: FrameSource, G> {
    gateway: G,
    source: Option<S>,
    state: EngineState,
    frame_interval: Duration,
}

impl<S: FrameSource, G: Gateway> CaptureEngine<S, G> {
    pub fn new(gateway: G, frame_interval: Duration) -> Self {
        Self {
            gateway,
            source: None,
            state: EngineState::Idle,
            frame_interval,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Acquire the camera and enter `Scanning`. The probe grab verifies the
    /// device actually answers before the loop starts; on failure the
    /// engine stays idle and the error is handed to the caller.
    pub async fn start(&mut self, mut source: S) -> Result<(), ScanError> {
        self.stop();

        match source.grab().await {
            Ok(_) => {
                self.source = Some(source);
                self.state = EngineState::Scanning;
                Ok(())
            }
            Err(err) => {
                source.close();
                Err(err)
            }
        }
    }

    /// One sampling tick: grab a frame, try to decode it, and on the first
    /// well-formed attendance payload release the camera and move to
    /// `Processing`. Malformed codes are reported and scanning resumes.
    pub async fn sample(&mut self) {
        match self.state {
            EngineState::Scanning => {}
            // Busy-skip guard: a verification round-trip is still in
            // flight; this frame is dropped, not queued.
            EngineState::Processing { .. } => return,
            _ => return,
        }

        let Some(source) = self.source.as_mut() else {
            return;
        };

        let frame = match source.grab().await {
            Ok(Some(frame)) => frame,
            // Frame buffer not ready yet.
            Ok(None) => return,
            Err(err) => {
                self.stop();
                self.state = EngineState::Error { error: err };
                return;
            }
        };

        let Some(text) = qr::decode_frame(&frame) else {
            return;
        };

        match token::decode_payload(&text) {
            Ok(session_token) => {
                // Release the camera before any network call.
                self.stop();
                self.state = EngineState::Processing { session_token };
            }
            Err(err) => {
                tracing::warn!(error = %err, "ignoring non-attendance code, still scanning");
            }
        }
    }

    /// Run the pending verification round-trip, if any.
    pub async fn process(&mut self) -> Option<ScanAttempt> {
        let EngineState::Processing { session_token } = &self.state else {
            return None;
        };
        let session_token = session_token.clone();

        let attempt = verify::verify_and_scan(&self.gateway, &session_token).await;

        self.state = if attempt.succeeded() {
            EngineState::Success {
                attempt: attempt.clone(),
            }
        } else {
            EngineState::Error {
                error: attempt
                    .error
                    .clone()
                    .unwrap_or_else(|| ScanError::Transient("verification failed".to_string())),
            }
        };

        Some(attempt)
    }

    /// Scoped teardown: release the camera and halt sampling. Safe to call
    /// repeatedly and with no active stream; runs on every exit path.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        if self.state == EngineState::Scanning {
            self.state = EngineState::Idle;
        }
    }

    /// Drive the engine from camera acquisition to one finished attempt.
    ///
    /// Capability failures come back as `Err`; every verification outcome,
    /// accepted or rejected, comes back inside the attempt.
    pub async fn run_to_completion(&mut self, source: S) -> Result<ScanAttempt, ScanError> {
        self.start(source).await?;

        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.sample().await;

            if let EngineState::Error { error } = &self.state {
                let error = error.clone();
                self.stop();
                return Err(error);
            }

            if let Some(attempt) = self.process().await {
                self.stop();
                return Ok(attempt);
            }
        }
    }
}

impl<S: FrameSource, G> Drop for CaptureEngine<S, G> {
    fn drop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use image::GrayImage;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Rasterize a QR code for `content` the way a camera would see it:
    /// dark modules on a light background, 8 px per module.
    pub(crate) fn qr_frame(content: &str) -> GrayImage {
        const SCALE: u32 = 8;

        let code = qrcode::QrCode::new(content.as_bytes()).unwrap();
        let text = code
            .render::<char>()
            .quiet_zone(true)
            .module_dimensions(1, 1)
            .dark_color('#')
            .light_color(' ')
            .build();

        let rows: Vec<&[u8]> = text.lines().map(|line| line.as_bytes()).collect();
        let height = rows.len() as u32;
        let width = rows.iter().map(|row| row.len()).max().unwrap_or(0) as u32;

        GrayImage::from_fn(width * SCALE, height * SCALE, |x, y| {
            let row = rows[(y / SCALE) as usize];
            let col = (x / SCALE) as usize;
            let dark = col < row.len() && row[col] == b'#';
            image::Luma([if dark { 0 } else { 255 }])
        })
    }

    /// Frame source fed from a script, recording grabs and closes into the
    /// shared event log so ordering against gateway calls can be asserted.
    pub(crate) struct ScriptedSource {
        frames: VecDeque<Result<Option<GrayImage>, ScanError>>,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedSource {
        pub(crate) fn new(
            events: Arc<Mutex<Vec<String>>>,
            frames: Vec<Result<Option<GrayImage>, ScanError>>,
        ) -> Self {
            Self {
                frames: frames.into(),
                events,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        async fn grab(&mut self) -> Result<Option<GrayImage>, ScanError> {
            self.events.lock().unwrap().push("grab".to_string());
            self.frames.pop_front().unwrap_or(Ok(None))
        }

        fn close(&mut self) {
            self.events.lock().unwrap().push("close".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{qr_frame, ScriptedSource};
    use super::*;
    use crate::gateway::testing::MockGateway;
    use crate::gateway::GatewayError;
    use std::sync::{Arc, Mutex};

    const VALID_PAYLOAD: &str = r#"{"type":"attendance","sessionToken":"tok-abc"}"#;
    const WRONG_KIND_PAYLOAD: &str = r#"{"type":"wifi","sessionToken":"tok-abc"}"#;

    fn engine_with_events() -> (
        CaptureEngine<ScriptedSource, MockGateway>,
        Arc<Mutex<Vec<String>>>,
    ) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let gateway = MockGateway::with_events(events.clone());
        let engine = CaptureEngine::new(gateway, Duration::from_millis(1));
        (engine, events)
    }

    fn positions(events: &[String], name: &str) -> Vec<usize> {
        events
            .iter()
            .enumerate()
            .filter(|(_, e)| *e == name)
            .map(|(i, _)| i)
            .collect()
    }

    #[tokio::test]
    async fn test_stop_without_stream_is_a_noop() {
        let (mut engine, events) = engine_with_events();
        engine.stop();
        engine.stop();
        assert_eq!(*engine.state(), EngineState::Idle);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_failure_keeps_engine_idle() {
        let (mut engine, events) = engine_with_events();
        let source = ScriptedSource::new(
            events.clone(),
            vec![Err(ScanError::CameraUnavailable("permission denied".to_string()))],
        );

        let err = engine.start(source).await.unwrap_err();

        assert!(matches!(err, ScanError::CameraUnavailable(_)));
        assert_eq!(*engine.state(), EngineState::Idle);
        // The probed source is still released on the failure path.
        assert_eq!(*events.lock().unwrap(), vec!["grab", "close"]);
    }

    #[tokio::test]
    async fn test_first_well_formed_decode_wins_and_frees_camera_before_network() {
        let (mut engine, events) = engine_with_events();
        let source = ScriptedSource::new(
            events.clone(),
            vec![
                Ok(None), // probe
                Ok(None), // buffer not ready
                Ok(Some(qr_frame(WRONG_KIND_PAYLOAD))),
                Ok(Some(qr_frame(VALID_PAYLOAD))),
            ],
        );

        let attempt = engine.run_to_completion(source).await.unwrap();

        assert!(attempt.succeeded());
        assert_eq!(attempt.session_token, "tok-abc");
        assert!(matches!(engine.state(), EngineState::Success { .. }));

        let events = events.lock().unwrap().clone();
        assert_eq!(positions(&events, "validate").len(), 1);
        assert_eq!(positions(&events, "scan").len(), 1);
        // Camera released before the first network call.
        assert!(positions(&events, "close")[0] < positions(&events, "validate")[0]);
    }

    #[tokio::test]
    async fn test_malformed_payload_never_reaches_gateway() {
        let (mut engine, events) = engine_with_events();
        let source = ScriptedSource::new(
            events.clone(),
            vec![Ok(None), Ok(Some(qr_frame(WRONG_KIND_PAYLOAD)))],
        );

        engine.start(source).await.unwrap();
        engine.sample().await;

        // Sampling resumes after a malformed code; nothing was verified.
        assert_eq!(*engine.state(), EngineState::Scanning);
        let events = events.lock().unwrap().clone();
        assert!(positions(&events, "validate").is_empty());
        assert!(positions(&events, "scan").is_empty());
    }

    #[tokio::test]
    async fn test_busy_skip_guard_admits_one_roundtrip() {
        let (mut engine, events) = engine_with_events();
        let source = ScriptedSource::new(
            events.clone(),
            vec![Ok(None), Ok(Some(qr_frame(VALID_PAYLOAD)))],
        );

        engine.start(source).await.unwrap();
        engine.sample().await;
        assert!(matches!(engine.state(), EngineState::Processing { .. }));
        let grabs_after_decode = positions(&events.lock().unwrap(), "grab").len();

        // Frames arriving while verification is pending are dropped.
        engine.sample().await;
        engine.sample().await;
        assert_eq!(
            positions(&events.lock().unwrap(), "grab").len(),
            grabs_after_decode
        );

        let attempt = engine.process().await.unwrap();
        assert!(attempt.succeeded());
        assert!(engine.process().await.is_none());

        let events = events.lock().unwrap().clone();
        assert_eq!(positions(&events, "validate").len(), 1);
        assert_eq!(positions(&events, "scan").len(), 1);
    }

    #[tokio::test]
    async fn test_camera_failure_mid_loop_releases_and_errors() {
        let (mut engine, events) = engine_with_events();
        let source = ScriptedSource::new(
            events.clone(),
            vec![
                Ok(None),
                Err(ScanError::CameraUnavailable("device unplugged".to_string())),
            ],
        );

        let err = engine.run_to_completion(source).await.unwrap_err();

        assert!(matches!(err, ScanError::CameraUnavailable(_)));
        assert!(matches!(engine.state(), EngineState::Error { .. }));
        assert_eq!(positions(&events.lock().unwrap(), "close").len(), 1);
    }

    #[tokio::test]
    async fn test_verification_rejection_comes_back_inside_attempt() {
        let (mut engine, events) = engine_with_events();
        engine
            .gateway
            .validate_results
            .lock()
            .unwrap()
            .push_back(Err(GatewayError::Rejected("Session expired".to_string())));
        let source = ScriptedSource::new(
            events.clone(),
            vec![Ok(None), Ok(Some(qr_frame(VALID_PAYLOAD)))],
        );

        let attempt = engine.run_to_completion(source).await.unwrap();

        assert!(!attempt.succeeded());
        assert_eq!(
            attempt.error,
            Some(ScanError::ValidationRejected("Session expired".to_string()))
        );
        assert!(matches!(engine.state(), EngineState::Error { .. }));
    }
}
