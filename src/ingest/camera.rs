//! Live camera source.
//!
//! `Camera` owns at most one `CameraSession` at a time. A session owns the
//! `MediaStream` returned by the device, and every track of that stream is
//! stopped when the session ends, whether through `Camera::stop`, a facing
//! toggle, or drop.
//!
//! The camera source MUST NOT:
//! - Open a stream while another is live
//! - Keep any track running after the session is released

use crate::error::{Error, Result};
use crate::frame::Frame;

use super::{CaptureSource, Facing};

/// Preferred capture resolution requested from the device.
const IDEAL_WIDTH: u32 = 1920;
const IDEAL_HEIGHT: u32 = 1080;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// One track of a media stream. Hardware handles are released by `stop`.
pub trait MediaTrack: Send {
    fn kind(&self) -> TrackKind;

    /// Grab the current still from a video track.
    fn read_frame(&mut self) -> Result<Frame>;

    /// Release the underlying hardware handle. Must be idempotent.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// Constraints passed to the device when opening a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl StreamRequest {
    pub fn new(facing: Facing) -> Self {
        Self {
            facing,
            ideal_width: IDEAL_WIDTH,
            ideal_height: IDEAL_HEIGHT,
        }
    }
}

/// Camera collaborator (browser media devices, V4L2, a test stub).
pub trait CameraDevice: Send {
    /// Open a stream. Denied permission or missing hardware is `CameraUnavailable`.
    fn open(&mut self, request: &StreamRequest) -> Result<MediaStream>;
}

/// Set of tracks handed out by a device. Dropping the stream stops every track.
pub struct MediaStream {
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn live_track_count(&self) -> usize {
        self.tracks.iter().filter(|track| track.is_live()).count()
    }

    fn has_video(&self) -> bool {
        self.tracks
            .iter()
            .any(|track| track.kind() == TrackKind::Video)
    }

    fn video_track(&mut self) -> Option<&mut Box<dyn MediaTrack>> {
        self.tracks
            .iter_mut()
            .find(|track| track.kind() == TrackKind::Video && track.is_live())
    }

    /// Stop and release every track. Returns how many were stopped.
    fn stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for mut track in self.tracks.drain(..) {
            track.stop();
            stopped += 1;
        }
        stopped
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// An active camera session: facing mode plus the owned stream handle.
pub struct CameraSession {
    facing: Facing,
    stream: MediaStream,
}

impl CameraSession {
    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn live_track_count(&self) -> usize {
        self.stream.live_track_count()
    }

    /// End the session, stopping every track. Returns the number of tracks stopped.
    pub fn close(mut self) -> usize {
        self.stream.stop_all()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraState {
    Off,
    Starting,
    On,
}

/// Camera lifecycle: `Off → Starting → On → Off`.
pub struct Camera<D: CameraDevice> {
    device: D,
    facing: Facing,
    state: CameraState,
    session: Option<CameraSession>,
}

impl<D: CameraDevice> Camera<D> {
    pub fn new(device: D, facing: Facing) -> Self {
        Self {
            device,
            facing,
            state: CameraState::Off,
            session: None,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn is_on(&self) -> bool {
        self.state == CameraState::On
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    #[cfg(test)]
    pub(crate) fn device(&self) -> &D {
        &self.device
    }

    /// Start a session with the current facing mode. Starting a live camera is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        self.state = CameraState::Starting;
        let request = StreamRequest::new(self.facing);
        let stream = match self.device.open(&request) {
            Ok(stream) => stream,
            Err(err) => {
                self.state = CameraState::Off;
                log::warn!("camera: failed to open {} stream: {}", self.facing, err);
                return Err(match err {
                    Error::CameraUnavailable(_) => err,
                    other => Error::CameraUnavailable(other.to_string()),
                });
            }
        };
        if !stream.has_video() {
            // Dropping the stream stops whatever tracks it did carry.
            drop(stream);
            self.state = CameraState::Off;
            return Err(Error::CameraUnavailable(
                "device returned a stream without a video track".to_string(),
            ));
        }
        log::info!(
            "camera: started {} stream with {} track(s)",
            self.facing,
            stream.track_count()
        );
        self.session = Some(CameraSession {
            facing: self.facing,
            stream,
        });
        self.state = CameraState::On;
        Ok(())
    }

    /// Stop the session, if any. Returns the number of tracks stopped.
    pub fn stop(&mut self) -> usize {
        let stopped = match self.session.take() {
            Some(session) => session.close(),
            None => 0,
        };
        if stopped > 0 {
            log::info!("camera: stopped {} track(s)", stopped);
        }
        self.state = CameraState::Off;
        stopped
    }

    /// Flip between environment and user facing. A live camera is fully
    /// stopped before the opposite stream is requested.
    pub fn toggle_facing(&mut self) -> Result<()> {
        self.set_facing(self.facing.opposite())
    }

    /// Switch facing mode. Facing only changes while the camera is off, so a
    /// live camera is stopped, switched, and restarted.
    pub fn set_facing(&mut self, facing: Facing) -> Result<()> {
        if facing == self.facing {
            return Ok(());
        }
        let was_on = self.session.is_some();
        self.stop();
        self.facing = facing;
        if was_on {
            self.start()
        } else {
            Ok(())
        }
    }
}

impl<D: CameraDevice> CaptureSource for Camera<D> {
    fn acquire_frame(&mut self) -> Result<Frame> {
        let session = self.session.as_mut().ok_or(Error::CameraNotReady)?;
        let track = session
            .stream
            .video_track()
            .ok_or(Error::CameraNotReady)?;
        track.read_frame()
    }

    fn describe(&self) -> String {
        format!("camera ({})", self.facing)
    }
}

impl<D: CameraDevice> Drop for Camera<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

// ----------------------------------------------------------------------------
// Synthetic device for demos and tests
// ----------------------------------------------------------------------------

/// Camera device that produces generated gradient frames.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    opened: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            opened: 0,
        }
    }

    #[cfg(test)]
    fn streams_opened(&self) -> u64 {
        self.opened
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl CameraDevice for SyntheticCamera {
    fn open(&mut self, request: &StreamRequest) -> Result<MediaStream> {
        self.opened += 1;
        log::debug!(
            "synthetic camera: stream {} ({}, {}x{})",
            self.opened,
            request.facing,
            self.width,
            self.height
        );
        let track = SyntheticTrack {
            width: self.width.min(request.ideal_width),
            height: self.height.min(request.ideal_height),
            seed: match request.facing {
                Facing::Environment => 0,
                Facing::User => 128,
            },
            frames: 0,
            live: true,
        };
        Ok(MediaStream::new(vec![Box::new(track)]))
    }
}

struct SyntheticTrack {
    width: u32,
    height: u32,
    seed: u8,
    frames: u64,
    live: bool,
}

impl MediaTrack for SyntheticTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn read_frame(&mut self) -> Result<Frame> {
        if !self.live {
            return Err(Error::CameraNotReady);
        }
        self.frames += 1;
        let pixel_count = self.width as usize * self.height as usize * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frames + self.seed as u64) % 256) as u8;
        }
        Frame::from_rgb(pixels, self.width, self.height)
    }

    fn stop(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
