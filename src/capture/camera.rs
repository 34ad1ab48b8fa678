//! Camera access through an external frame-grab command.
//!
//! The configured command writes one encoded frame to stdout per
//! invocation (ffmpeg against a V4L2 device by default). Wrapping a
//! command keeps the client working across capture stacks the same way
//! screen detection falls back between compositor tools.

use std::process::Stdio;

use image::GrayImage;

use crate::verify::ScanError;

/// A source of camera frames for the capture loop.
///
/// `grab` returns `Ok(None)` while the frame buffer is not ready yet,
/// `Ok(Some(frame))` for a usable frame, and `Err` when the device is
/// gone. `close` releases the device and must be idempotent.
pub trait FrameSource {
    async fn grab(&mut self) -> Result<Option<GrayImage>, ScanError>;
    fn close(&mut self);
}

#[derive(Debug)]
pub struct CommandFrameSource {
    program: String,
    args: Vec<String>,
    open: bool,
}

impl CommandFrameSource {
    pub fn from_command(command: &str) -> Result<Self, ScanError> {
        let words = shell_words::split(command)
            .map_err(|e| ScanError::CameraUnavailable(format!("bad grab command: {e}")))?;

        let Some((program, args)) = words.split_first() else {
            return Err(ScanError::CameraUnavailable(
                "camera grab command is empty".to_string(),
            ));
        };

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            open: true,
        })
    }
}

impl FrameSource for CommandFrameSource {
    async fn grab(&mut self) -> Result<Option<GrayImage>, ScanError> {
        if !self.open {
            return Ok(None);
        }

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ScanError::CameraUnavailable(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::CameraUnavailable(
                stderr
                    .lines()
                    .next()
                    .unwrap_or("frame grab command failed")
                    .to_string(),
            ));
        }

        if output.stdout.is_empty() {
            return Ok(None);
        }

        match image::load_from_memory(&output.stdout) {
            Ok(frame) => Ok(Some(frame.into_luma8())),
            // A torn or partial frame; skip it and wait for the next tick.
            Err(_) => Ok(None),
        }
    }

    fn close(&mut self) {
        self.open = false;
    }
}
