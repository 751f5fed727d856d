//! Dashboard controller: owns the camera, drives capture-and-process runs,
//! and fronts the alert replica.
//!
//! A run moves `Idle → CapturingFrame → Compressing → Uploading → Classifying
//! → Idle`, and any stage may fall back to `Idle` with an error message. Stages
//! run strictly in order on the calling thread. The camera lifecycle is
//! tracked separately by [`Camera`].
//!
//! The controller MUST NOT:
//! - Run two capture-and-process runs at once (the second is rejected with `Busy`)
//! - Start a run while the last health check failed
//! - Leave the loading flag set after a run returns, on any path

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

use crate::alerts::{Alert, AlertQuery, AlertStore};
use crate::compress::compress;
use crate::config::ClientConfig;
use crate::detect::{classify, DetectionResult, SeverityVerdict};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::ingest::{Camera, CameraDevice, CameraState, CaptureSource, Facing};
use crate::transport::{probe_health, HttpTransport, Transport};
use crate::upload::{CancelHandle, UploadClient};

mod stats;

pub use stats::{format_since, DashboardStats};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PipelineStage {
    #[default]
    Idle,
    CapturingFrame,
    Compressing,
    Uploading,
    Classifying,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::CapturingFrame => "capturing",
            PipelineStage::Compressing => "compressing",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Classifying => "classifying",
        }
    }
}

/// Result of one successful capture-and-process run.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessOutcome {
    pub detection: DetectionResult,
    pub verdict: SeverityVerdict,
    /// Where the annotated image can be fetched, if the path is usable.
    pub processed_image_url: Option<Url>,
}

/// Point-in-time copy of everything the dashboard renders.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardSnapshot {
    pub stage: PipelineStage,
    pub loading: bool,
    pub error: Option<String>,
    pub last_outcome: Option<ProcessOutcome>,
    pub backend_healthy: bool,
    pub camera: CameraState,
    pub facing: Facing,
}

#[derive(Default)]
struct UiState {
    stage: PipelineStage,
    loading: bool,
    error: Option<String>,
    last_outcome: Option<ProcessOutcome>,
    backend_healthy: bool,
}

pub struct DashboardController<D: CameraDevice> {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    camera: Mutex<Camera<D>>,
    uploader: UploadClient,
    alerts: AlertStore,
    ui: Mutex<UiState>,
    in_flight: AtomicBool,
    cancel: CancelHandle,
}

/// Marks a run as in flight. Dropping it returns the UI to `Idle` with the
/// loading flag cleared.
///
/// The cancel flag is only ever set while a run is in flight, and it is
/// cleared under the UI lock before the slot is released, so the next run
/// always starts uncancelled.
struct RunGuard<'a, D: CameraDevice> {
    controller: &'a DashboardController<D>,
}

impl<D: CameraDevice> Drop for RunGuard<'_, D> {
    fn drop(&mut self) {
        let controller = self.controller;
        controller.update_ui(|ui| {
            ui.loading = false;
            ui.stage = PipelineStage::Idle;
            controller.cancel.reset();
            controller.in_flight.store(false, Ordering::SeqCst);
        });
    }
}

impl<D: CameraDevice> DashboardController<D> {
    /// Controller talking to `config.base_url` over HTTP.
    pub fn new(config: ClientConfig, device: D) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.base_url.clone()));
        Self::with_transport(config, transport, device)
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>, device: D) -> Self {
        let camera = Camera::new(device, config.facing);
        let uploader = UploadClient::new(transport.clone(), config.upload.clone());
        let alerts = AlertStore::new(transport.clone(), config.alerts_timeout);
        Self {
            config,
            transport,
            camera: Mutex::new(camera),
            uploader,
            alerts,
            ui: Mutex::new(UiState::default()),
            in_flight: AtomicBool::new(false),
            cancel: CancelHandle::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn alerts(&self) -> &AlertStore {
        &self.alerts
    }

    fn camera(&self) -> MutexGuard<'_, Camera<D>> {
        self.camera
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_ui<T>(&self, apply: impl FnOnce(&mut UiState) -> T) -> T {
        let mut ui = self
            .ui
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut ui)
    }

    fn set_stage(&self, stage: PipelineStage) {
        log::debug!("pipeline: {}", stage.as_str());
        self.update_ui(|ui| ui.stage = stage);
    }

    fn report(&self, err: &Error) {
        let message = err.user_message();
        self.update_ui(|ui| ui.error = Some(message));
    }

    pub fn clear_error(&self) {
        self.update_ui(|ui| ui.error = None);
    }

    // ------------------------------------------------------------------
    // Backend health
    // ------------------------------------------------------------------

    /// Probe `GET /health` and record the answer. Capture is gated on the
    /// most recent probe.
    pub fn check_health(&self) -> bool {
        let healthy = probe_health(self.transport.as_ref(), self.config.health_timeout);
        self.update_ui(|ui| {
            ui.backend_healthy = healthy;
            if healthy {
                ui.error = None;
            } else {
                ui.error = Some(
                    "Server is not reachable. Please ensure the backend is running.".to_string(),
                );
            }
        });
        log::info!(
            "backend {} is {}",
            self.config.base_url,
            if healthy { "healthy" } else { "unreachable" }
        );
        healthy
    }

    pub fn backend_healthy(&self) -> bool {
        self.update_ui(|ui| ui.backend_healthy)
    }

    // ------------------------------------------------------------------
    // Camera lifecycle
    // ------------------------------------------------------------------

    pub fn start_camera(&self) -> Result<()> {
        let result = self.camera().start();
        match &result {
            Ok(()) => self.clear_error(),
            Err(err) => self.report(err),
        }
        result
    }

    /// Stop the camera and release every track. Returns the number stopped.
    pub fn stop_camera(&self) -> usize {
        self.camera().stop()
    }

    /// Flip facing mode. A live camera is stopped before the new stream opens.
    pub fn toggle_facing(&self) -> Result<()> {
        let result = self.camera().toggle_facing();
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera().state()
    }

    pub fn facing(&self) -> Facing {
        self.camera().facing()
    }

    // ------------------------------------------------------------------
    // Capture and process
    // ------------------------------------------------------------------

    /// Capture a still from the live camera and run it through the pipeline.
    pub fn capture_and_process(&self) -> Result<ProcessOutcome> {
        let _run = self.begin_run()?;
        self.ensure_backend()?;
        if !self.camera().is_on() {
            let err = Error::CameraNotReady;
            self.report(&err);
            return Err(err);
        }
        self.execute(|| self.camera().acquire_frame())
    }

    /// Run a non-camera source (a selected file) through the pipeline.
    pub fn process_source(&self, source: &mut dyn CaptureSource) -> Result<ProcessOutcome> {
        let _run = self.begin_run()?;
        self.ensure_backend()?;
        log::info!("processing {}", source.describe());
        self.execute(|| source.acquire_frame())
    }

    /// Abort the in-flight run. The run ends with `Cancelled` at the next
    /// stage boundary, or immediately if it is waiting on the upload.
    pub fn cancel_upload(&self) {
        self.update_ui(|_| {
            if self.in_flight.load(Ordering::SeqCst) {
                log::info!("upload cancellation requested");
                self.cancel.cancel();
            }
        });
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Claim the single run slot. A concurrent request gets `Busy` and leaves
    /// the UI state alone.
    fn begin_run(&self) -> Result<RunGuard<'_, D>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::warn!("capture rejected: another run is in flight");
            return Err(Error::Busy);
        }
        Ok(RunGuard { controller: self })
    }

    fn ensure_backend(&self) -> Result<()> {
        if self.backend_healthy() {
            return Ok(());
        }
        let err = Error::BackendUnreachable;
        self.report(&err);
        Err(err)
    }

    fn execute(&self, acquire: impl FnOnce() -> Result<Frame>) -> Result<ProcessOutcome> {
        self.update_ui(|ui| {
            ui.loading = true;
            ui.error = None;
            ui.last_outcome = None;
            ui.stage = PipelineStage::CapturingFrame;
        });

        let result = self.run_stages(acquire);
        match &result {
            Ok(outcome) => {
                log::info!(
                    "run finished: {} ({} class(es))",
                    outcome.verdict.level,
                    outcome.detection.detected_classes.len()
                );
                let outcome = outcome.clone();
                self.update_ui(|ui| ui.last_outcome = Some(outcome));
            }
            Err(err) => {
                log::warn!("run failed: {}", err);
                self.report(err);
            }
        }
        result
    }

    fn run_stages(&self, acquire: impl FnOnce() -> Result<Frame>) -> Result<ProcessOutcome> {
        let frame = acquire()?;

        self.set_stage(PipelineStage::Compressing);
        let image = compress(frame, &self.config.compression)?;

        self.set_stage(PipelineStage::Uploading);
        let detection = self.uploader.submit(&image, &self.cancel)?;

        self.set_stage(PipelineStage::Classifying);
        let verdict = classify(&detection.detected_classes);
        let processed_image_url = detection.processed_image_url(&self.config.base_url);

        // The backend records the alert; pull the list so it shows up.
        if let Err(err) = self.alerts.refresh() {
            log::warn!("alert refresh after detection failed: {}", err);
        }

        Ok(ProcessOutcome {
            detection,
            verdict,
            processed_image_url,
        })
    }

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    pub fn refresh_alerts(&self) -> Result<Vec<Alert>> {
        let result = self.alerts.refresh();
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    /// Delete an alert. The caller has already confirmed with the user.
    pub fn delete_alert(&self, timestamp: &str) -> Result<()> {
        let result = self.alerts.delete(timestamp);
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    pub fn alert_view(&self, query: &AlertQuery) -> Vec<Alert> {
        self.alerts.view(query)
    }

    pub fn alert_classes(&self) -> Vec<String> {
        self.alerts.classes()
    }

    pub fn stats(&self) -> DashboardStats {
        let camera_active = self.camera().is_on();
        DashboardStats::current(&self.alerts.snapshot(), camera_active)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let (camera, facing) = {
            let camera = self.camera();
            (camera.state(), camera.facing())
        };
        self.update_ui(|ui| DashboardSnapshot {
            stage: ui.stage,
            loading: ui.loading,
            error: ui.error.clone(),
            last_outcome: ui.last_outcome.clone(),
            backend_healthy: ui.backend_healthy,
            camera,
            facing,
        })
    }

    /// Tear down: cancel any upload and release the camera.
    pub fn shutdown(&self) -> usize {
        self.cancel_upload();
        self.stop_camera()
    }
}

impl<D: CameraDevice> Drop for DashboardController<D> {
    fn drop(&mut self) {
        let stopped = self.shutdown();
        if stopped > 0 {
            log::debug!("dashboard dropped; released {} camera track(s)", stopped);
        }
    }
}
