//! Streaming of an uploaded firmware image into the updater.
//!
//! Failures never propagate: they are logged and only show up in
//! `succeeded`, which the upload route turns into `OK` / `FAIL`.

use crate::traits::FirmwareUpdater;
use std::sync::Arc;

pub struct OtaSession {
    updater: Arc<dyn FirmwareUpdater>,
    started: bool,
    failed: bool,
    total: usize,
}

impl OtaSession {
    pub fn new(updater: Arc<dyn FirmwareUpdater>) -> Self {
        Self {
            updater,
            started: false,
            failed: false,
            total: 0,
        }
    }

    pub async fn start(&mut self, filename: &str) {
        tracing::info!("Update: {}", filename);
        self.started = true;
        self.failed = false;
        self.total = 0;
        if let Err(e) = self.updater.begin().await {
            tracing::error!("Update begin failed: {}", e);
            self.failed = true;
        }
    }

    pub async fn write(&mut self, chunk: &[u8]) {
        self.total += chunk.len();
        match self.updater.write(chunk).await {
            Ok(written) if written == chunk.len() => {}
            Ok(written) => {
                tracing::error!(written, expected = chunk.len(), "Update short write");
                self.failed = true;
            }
            Err(e) => {
                tracing::error!("Update write failed: {}", e);
                self.failed = true;
            }
        }
    }

    pub async fn finish(&mut self) {
        match self.updater.end(true).await {
            Ok(()) => tracing::info!("Update Success: {}", self.total),
            Err(e) => {
                tracing::error!("Update end failed: {}", e);
                self.failed = true;
            }
        }
    }

    /// The upload stream broke before the image was complete.
    pub fn abort(&mut self, reason: &str) {
        tracing::error!(
            "Update Failed Unexpectedly (likely broken connection): {}",
            reason
        );
        self.failed = true;
    }

    /// Whether an image was received at all; only then is a reboot due.
    pub fn started(&self) -> bool {
        self.started
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub async fn succeeded(&self) -> bool {
        self.started && !self.failed && !self.updater.has_error().await
    }
}
