use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wastewatch::dashboard::{DashboardController, PipelineStage};
use wastewatch::ingest::{CameraDevice, MediaStream, MediaTrack, StreamRequest, TrackKind};
use wastewatch::transport::{HttpResponse, Transport, TransportError};
use wastewatch::{
    CameraState, ClientConfig, Error, Facing, FileSource, Frame, SelectedFile, Severity,
};

const UPLOAD_OK: &str = r#"{
    "status": "success",
    "processed_image": "processed_run.jpg",
    "detected_classes": ["plastic bottle", "wrapper", "person"]
}"#;

const ALERT_LIST: &str = r#"{
    "status": "success",
    "alerts": [
        {"timestamp": "2024-02-01 10:00:00", "classes": ["plastic bottle", "wrapper"], "image_path": "processed_run.jpg"}
    ]
}"#;

type Reply = Result<HttpResponse, TransportError>;

// ----------------------------------------------------------------------------
// Camera stub that counts track starts and stops
// ----------------------------------------------------------------------------

#[derive(Clone, Default)]
struct TrackCounters {
    started: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    /// Tracks still live at the moment each stream was opened.
    live_at_open: Arc<Mutex<Vec<usize>>>,
}

impl TrackCounters {
    fn live(&self) -> usize {
        self.started.load(Ordering::SeqCst) - self.stopped.load(Ordering::SeqCst)
    }
}

struct CountingDevice {
    counters: TrackCounters,
    with_audio: bool,
    deny: bool,
}

impl CountingDevice {
    fn new(counters: &TrackCounters) -> Self {
        Self {
            counters: counters.clone(),
            with_audio: true,
            deny: false,
        }
    }
}

impl CameraDevice for CountingDevice {
    fn open(&mut self, request: &StreamRequest) -> wastewatch::Result<MediaStream> {
        if self.deny {
            return Err(Error::CameraUnavailable("permission denied".to_string()));
        }
        self.counters
            .live_at_open
            .lock()
            .unwrap()
            .push(self.counters.live());
        self.counters.opens.fetch_add(1, Ordering::SeqCst);

        let mut kinds = vec![TrackKind::Video];
        if self.with_audio {
            kinds.push(TrackKind::Audio);
        }
        let tracks: Vec<Box<dyn MediaTrack>> = kinds
            .into_iter()
            .map(|kind| {
                self.counters.started.fetch_add(1, Ordering::SeqCst);
                Box::new(CountingTrack {
                    kind,
                    facing: request.facing,
                    live: true,
                    stopped: self.counters.stopped.clone(),
                }) as Box<dyn MediaTrack>
            })
            .collect();
        Ok(MediaStream::new(tracks))
    }
}

struct CountingTrack {
    kind: TrackKind,
    facing: Facing,
    live: bool,
    stopped: Arc<AtomicUsize>,
}

impl MediaTrack for CountingTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn read_frame(&mut self) -> wastewatch::Result<Frame> {
        let shade = match self.facing {
            Facing::Environment => 40,
            Facing::User => 200,
        };
        Frame::from_rgb(vec![shade; 32 * 24 * 3], 32, 24)
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

// ----------------------------------------------------------------------------
// Backend double
// ----------------------------------------------------------------------------

struct Backend {
    healthy: AtomicBool,
    upload_replies: Mutex<VecDeque<Reply>>,
    uploads: AtomicUsize,
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl Backend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(true),
            upload_replies: Mutex::new(VecDeque::new()),
            uploads: AtomicUsize::new(0),
            gate: Mutex::new(None),
        })
    }

    fn hold_next_upload(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }

    fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

impl Transport for Backend {
    fn is_online(&self) -> bool {
        true
    }

    fn get(&self, path: &str, _timeout: Duration) -> Reply {
        match path {
            "health" if self.healthy.load(Ordering::SeqCst) => {
                Ok(HttpResponse::new(200, r#"{"status": "healthy"}"#))
            }
            "health" => Ok(HttpResponse::new(503, "unavailable")),
            "alerts/list" => Ok(HttpResponse::new(200, ALERT_LIST)),
            other => panic!("unexpected GET {}", other),
        }
    }

    fn post_json(&self, path: &str, _body: &serde_json::Value, _timeout: Duration) -> Reply {
        assert_eq!(path, "upload");
        let gate = self.gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.upload_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(200, UPLOAD_OK)))
    }
}

fn controller(
    backend: &Arc<Backend>,
    device: CountingDevice,
) -> DashboardController<CountingDevice> {
    let mut config = ClientConfig::for_base_url("http://localhost:5000").unwrap();
    config.upload.retry_delay = Duration::from_millis(5);
    let transport: Arc<dyn Transport> = backend.clone();
    DashboardController::with_transport(config, transport, device)
}

fn png_file() -> SelectedFile {
    let img = image::RgbImage::from_pixel(20, 10, image::Rgb([10, 120, 30]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    SelectedFile {
        name: "street.png".to_string(),
        mime_type: "image/png".to_string(),
        bytes: bytes.into_inner(),
    }
}

// ----------------------------------------------------------------------------
// Gating
// ----------------------------------------------------------------------------

#[test]
fn capture_rejected_until_health_check_succeeds() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let dashboard = controller(&backend, CountingDevice::new(&counters));
    dashboard.start_camera().unwrap();

    let err = dashboard.capture_and_process().unwrap_err();
    assert_eq!(err, Error::BackendUnreachable);

    backend.healthy.store(false, Ordering::SeqCst);
    assert!(!dashboard.check_health());
    assert_eq!(
        dashboard.capture_and_process().unwrap_err(),
        Error::BackendUnreachable
    );

    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.stage, PipelineStage::Idle);
    assert!(!snapshot.loading);
    assert!(snapshot.error.is_some());
    assert_eq!(backend.uploads(), 0);
}

#[test]
fn capture_requires_camera_on() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let dashboard = controller(&backend, CountingDevice::new(&counters));
    assert!(dashboard.check_health());

    let err = dashboard.capture_and_process().unwrap_err();
    assert_eq!(err, Error::CameraNotReady);
    assert_eq!(counters.opens.load(Ordering::SeqCst), 0);
    assert_eq!(backend.uploads(), 0);

    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.camera, CameraState::Off);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Camera not ready. Please ensure camera is started and try again.")
    );
}

// ----------------------------------------------------------------------------
// Pipeline runs
// ----------------------------------------------------------------------------

#[test]
fn capture_runs_full_pipeline_and_refreshes_alerts() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let dashboard = controller(&backend, CountingDevice::new(&counters));
    assert!(dashboard.check_health());
    dashboard.start_camera().unwrap();

    let outcome = dashboard.capture_and_process().unwrap();
    assert_eq!(outcome.verdict.level, Severity::Moderate);
    assert_eq!(outcome.verdict.waste_count, 2);
    assert_eq!(
        outcome.processed_image_url.unwrap().as_str(),
        "http://localhost:5000/uploads/processed_run.jpg"
    );
    assert_eq!(backend.uploads(), 1);

    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.stage, PipelineStage::Idle);
    assert!(!snapshot.loading);
    assert!(snapshot.error.is_none());
    assert!(snapshot.last_outcome.is_some());
    assert_eq!(dashboard.alerts().len(), 1);

    let stats = dashboard.stats();
    assert_eq!(stats.total_alerts, 1);
    assert!(stats.camera_active);
}

#[test]
fn loading_cleared_after_upload_failure() {
    let backend = Backend::new();
    backend.upload_replies.lock().unwrap().push_back(Ok(HttpResponse::new(
        500,
        r#"{"error": "model unavailable"}"#,
    )));
    let counters = TrackCounters::default();
    let dashboard = controller(&backend, CountingDevice::new(&counters));
    assert!(dashboard.check_health());
    dashboard.start_camera().unwrap();

    let err = dashboard.capture_and_process().unwrap_err();
    assert_eq!(
        err,
        Error::ServerError {
            status: 500,
            message: "model unavailable".to_string()
        }
    );
    assert_eq!(backend.uploads(), 1);

    let snapshot = dashboard.snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.stage, PipelineStage::Idle);
    assert!(snapshot.last_outcome.is_none());
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Upload failed: Server error: 500 - model unavailable")
    );
    assert!(!dashboard.is_processing());

    // The next run starts clean.
    let outcome = dashboard.capture_and_process().unwrap();
    assert_eq!(outcome.detection.detected_classes.len(), 3);
    assert!(dashboard.snapshot().error.is_none());
}

#[test]
fn concurrent_capture_is_rejected_without_disturbing_first_run() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let dashboard = Arc::new(controller(&backend, CountingDevice::new(&counters)));
    assert!(dashboard.check_health());
    dashboard.start_camera().unwrap();

    let (entered, release) = backend.hold_next_upload();
    let first = {
        let dashboard = dashboard.clone();
        std::thread::spawn(move || dashboard.capture_and_process())
    };
    entered.recv().unwrap();

    let during = dashboard.snapshot();
    assert!(during.loading);
    assert_eq!(during.stage, PipelineStage::Uploading);

    assert_eq!(dashboard.capture_and_process().unwrap_err(), Error::Busy);

    // The rejection left the in-flight run's UI state alone.
    let after_reject = dashboard.snapshot();
    assert!(after_reject.loading);
    assert_eq!(after_reject.stage, PipelineStage::Uploading);
    assert!(after_reject.error.is_none());

    release.send(()).unwrap();
    let outcome = first.join().unwrap().unwrap();
    assert_eq!(outcome.detection.processed_image, "processed_run.jpg");
    assert_eq!(backend.uploads(), 1);

    let done = dashboard.snapshot();
    assert!(!done.loading);
    assert!(done.error.is_none());
    assert_eq!(done.last_outcome, Some(outcome));
}

#[test]
fn upload_timeouts_end_run_with_timeout_error() {
    let backend = Backend::new();
    backend
        .upload_replies
        .lock()
        .unwrap()
        .extend((0..3).map(|_| Err(TransportError::Timeout)));
    let counters = TrackCounters::default();
    let dashboard = controller(&backend, CountingDevice::new(&counters));
    assert!(dashboard.check_health());
    dashboard.start_camera().unwrap();

    let err = dashboard.capture_and_process().unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got {:?}", err);
    assert_eq!(backend.uploads(), 3);

    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.stage, PipelineStage::Idle);
    assert!(!snapshot.loading);
    assert!(snapshot.last_outcome.is_none());
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Request timed out. Please try again with a smaller image.")
    );
    assert!(!dashboard.is_processing());
}

#[test]
fn cancel_while_uploading_ends_run_cancelled() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let dashboard = Arc::new(controller(&backend, CountingDevice::new(&counters)));
    assert!(dashboard.check_health());
    dashboard.start_camera().unwrap();

    // Nothing is in flight, so this must not leak into the next run.
    dashboard.cancel_upload();

    let (entered, release) = backend.hold_next_upload();
    let run = {
        let dashboard = dashboard.clone();
        std::thread::spawn(move || dashboard.capture_and_process())
    };
    entered.recv().unwrap();
    assert_eq!(dashboard.snapshot().stage, PipelineStage::Uploading);

    // The backend is still holding the request when the run gives up.
    dashboard.cancel_upload();
    assert_eq!(run.join().unwrap().unwrap_err(), Error::Cancelled);
    release.send(()).unwrap();

    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.stage, PipelineStage::Idle);
    assert!(!snapshot.loading);
    assert!(snapshot.last_outcome.is_none());
    assert_eq!(snapshot.error.as_deref(), Some("Upload cancelled"));
    assert!(!dashboard.is_processing());

    // The cancel was consumed by the run it targeted.
    let outcome = dashboard.capture_and_process().unwrap();
    assert_eq!(outcome.detection.processed_image, "processed_run.jpg");
    assert!(dashboard.snapshot().error.is_none());
}

#[test]
fn file_source_goes_through_same_pipeline() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let dashboard = controller(&backend, CountingDevice::new(&counters));
    assert!(dashboard.check_health());

    let mut source = FileSource::from_selected(png_file());
    let outcome = dashboard.process_source(&mut source).unwrap();
    assert_eq!(outcome.verdict.level, Severity::Moderate);
    assert_eq!(counters.opens.load(Ordering::SeqCst), 0);
}

#[test]
fn non_image_file_fails_without_upload() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let dashboard = controller(&backend, CountingDevice::new(&counters));
    assert!(dashboard.check_health());

    let mut source = FileSource::from_selected(SelectedFile {
        name: "notes.txt".to_string(),
        mime_type: "text/plain".to_string(),
        bytes: b"not an image".to_vec(),
    });
    let err = dashboard.process_source(&mut source).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
    assert_eq!(backend.uploads(), 0);
    assert!(!dashboard.snapshot().loading);
}

// ----------------------------------------------------------------------------
// Camera lifecycle
// ----------------------------------------------------------------------------

#[test]
fn stopping_camera_releases_every_track() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let dashboard = controller(&backend, CountingDevice::new(&counters));

    dashboard.start_camera().unwrap();
    assert_eq!(counters.started.load(Ordering::SeqCst), 2);
    assert_eq!(dashboard.stop_camera(), 2);
    assert_eq!(counters.live(), 0);
    assert_eq!(
        counters.stopped.load(Ordering::SeqCst),
        counters.started.load(Ordering::SeqCst)
    );
    assert_eq!(dashboard.camera_state(), CameraState::Off);
}

#[test]
fn toggle_stops_old_stream_before_opening_new_one() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let dashboard = controller(&backend, CountingDevice::new(&counters));

    dashboard.start_camera().unwrap();
    dashboard.toggle_facing().unwrap();
    assert_eq!(dashboard.facing(), Facing::User);
    assert_eq!(dashboard.camera_state(), CameraState::On);

    assert_eq!(*counters.live_at_open.lock().unwrap(), vec![0, 0]);
    assert_eq!(counters.live(), 2);

    dashboard.stop_camera();
    assert_eq!(counters.live(), 0);
}

#[test]
fn dropping_controller_releases_camera() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    {
        let dashboard = controller(&backend, CountingDevice::new(&counters));
        dashboard.start_camera().unwrap();
        assert_eq!(counters.live(), 2);
    }
    assert_eq!(counters.live(), 0);
    assert_eq!(counters.stopped.load(Ordering::SeqCst), 2);
}

#[test]
fn denied_camera_reports_unavailable() {
    let backend = Backend::new();
    let counters = TrackCounters::default();
    let mut device = CountingDevice::new(&counters);
    device.deny = true;
    let dashboard = controller(&backend, device);

    let err = dashboard.start_camera().unwrap_err();
    assert!(matches!(err, Error::CameraUnavailable(_)));

    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.camera, CameraState::Off);
    assert_eq!(snapshot.error.as_deref(), Some("Failed to access camera"));
    assert_eq!(counters.started.load(Ordering::SeqCst), 0);
}
