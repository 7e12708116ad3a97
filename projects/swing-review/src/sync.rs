// Dual-video sync engine

use crate::clock::{FrameClock, FrameIndex};
use crate::config::SyncConfig;
use crate::surface::{MediaSurface, NetworkState, SurfaceRole, SurfaceStatus};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Published whenever the displayed frame is resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUpdate {
    pub frame: FrameIndex,
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Dragging,
}

/// Transport state of the pair. Only `DualVideoSync` writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoPairState {
    pub original_time: f64,
    pub skeleton_time: f64,
    pub is_playing: bool,
    pub speed: f64,
    pub is_dragging: bool,
}

impl Default for VideoPairState {
    fn default() -> Self {
        Self {
            original_time: 0.0,
            skeleton_time: 0.0,
            is_playing: false,
            speed: 1.0,
            is_dragging: false,
        }
    }
}

/// Diagnostic emitted by the load watchdog for a surface still loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadHint {
    /// Data is still arriving; the network is slow.
    StillBuffering,
    /// The surface has no usable source.
    NoSource,
    /// Loading has not visibly started.
    Pending,
}

/// Keyboard shortcuts understood by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKey {
    Space,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

/// URLs of the two media streams for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSources {
    pub original: String,
    pub skeleton: String,
}

impl MediaSources {
    /// Stream paths relative to the backend root.
    pub fn for_video(base_url: &str, video_id: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            original: format!("{}/video_file/{}/original", base, video_id),
            skeleton: format!("{}/video_file/{}/skeleton", base, video_id),
        }
    }
}

pub struct DualVideoSync<S: MediaSurface> {
    primary: S,
    overlay: S,
    clock: FrameClock,
    config: SyncConfig,
    state: VideoPairState,
    phase: PlayerPhase,
    primary_status: SurfaceStatus,
    overlay_status: SurfaceStatus,
    frames: broadcast::Sender<FrameUpdate>,
    last_update: Option<FrameUpdate>,
    drift_corrections: u64,
}

impl<S: MediaSurface> DualVideoSync<S> {
    pub fn new(primary: S, overlay: S, config: SyncConfig) -> Self {
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        Self {
            primary,
            overlay,
            clock: FrameClock::new(&config),
            config,
            state: VideoPairState::default(),
            phase: PlayerPhase::Idle,
            primary_status: SurfaceStatus::Idle,
            overlay_status: SurfaceStatus::Idle,
            frames,
            last_update: None,
            drift_corrections: 0,
        }
    }

    /// Receive every `FrameUpdate` published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<FrameUpdate> {
        self.frames.subscribe()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> &VideoPairState {
        &self.state
    }

    pub fn phase(&self) -> PlayerPhase {
        self.phase
    }

    pub fn last_update(&self) -> Option<FrameUpdate> {
        self.last_update
    }

    pub fn drift_corrections(&self) -> u64 {
        self.drift_corrections
    }

    pub fn status(&self, role: SurfaceRole) -> &SurfaceStatus {
        match role {
            SurfaceRole::Primary => &self.primary_status,
            SurfaceRole::Overlay => &self.overlay_status,
        }
    }

    pub fn surface(&self, role: SurfaceRole) -> &S {
        match role {
            SurfaceRole::Primary => &self.primary,
            SurfaceRole::Overlay => &self.overlay,
        }
    }

    /// Mutable access for the host that drives decoding. Callers must not
    /// write surface time through it; use the transport commands instead.
    pub fn surface_mut(&mut self, role: SurfaceRole) -> &mut S {
        match role {
            SurfaceRole::Primary => &mut self.primary,
            SurfaceRole::Overlay => &mut self.overlay,
        }
    }

    /// Both surfaces reported a playable state.
    pub fn is_ready(&self) -> bool {
        self.primary_status == SurfaceStatus::Ready && self.overlay_status == SurfaceStatus::Ready
    }

    /// Start loading a new pair of streams. Resets transport state and the clock.
    pub fn load(&mut self, sources: &MediaSources) {
        info!("Loading original video from {}", sources.original);
        info!("Loading skeleton video from {}", sources.skeleton);

        self.primary.load(&sources.original);
        self.overlay.load(&sources.skeleton);
        self.primary_status = SurfaceStatus::Loading;
        self.overlay_status = SurfaceStatus::Loading;
        self.phase = PlayerPhase::Loading;
        self.state = VideoPairState::default();
        self.primary.set_playback_rate(self.state.speed);
        self.overlay.set_playback_rate(self.state.speed);
        self.clock.reset();
        self.last_update = None;
        self.drift_corrections = 0;
    }

    /// Forward the backend's frame count to the clock.
    pub fn set_total_frames(&mut self, frames: usize) {
        self.clock.set_authoritative_frame_count(frames);
    }

    pub fn on_loaded_metadata(&mut self, role: SurfaceRole) {
        match role {
            SurfaceRole::Primary => {
                if let Some(duration) = self.primary.duration() {
                    self.clock.set_media_duration(duration);
                }
            }
            SurfaceRole::Overlay => {
                debug!("Skeleton video metadata loaded");
            }
        }
    }

    /// Mark one surface playable. A play request issued while it was still
    /// buffering is replayed on it now.
    pub fn on_can_play(&mut self, role: SurfaceRole) {
        info!("{} loaded successfully", role);
        *self.status_mut(role) = SurfaceStatus::Ready;
        if self.state.is_playing {
            if let Err(e) = self.surface_mut(role).play() {
                warn!("{} play request failed: {}", role, e);
            }
        }
        if self.phase == PlayerPhase::Loading && self.is_ready() {
            self.phase = PlayerPhase::Ready;
        }
    }

    /// Mark one surface as failed. The other surface keeps playing.
    pub fn on_error(&mut self, role: SurfaceRole, message: &str) {
        warn!("{} failed to load: {}", role, message);
        *self.status_mut(role) = SurfaceStatus::Errored(message.to_string());
    }

    pub fn on_ended(&mut self) {
        self.primary.pause();
        self.overlay.pause();
        self.state.is_playing = false;
        self.settle_phase();
    }

    /// Watchdog check for one surface. Returns a hint while it is still loading.
    pub fn check_loading(&self, role: SurfaceRole) -> Option<LoadHint> {
        if *self.status(role) != SurfaceStatus::Loading {
            return None;
        }
        let hint = match self.surface(role).network_state() {
            NetworkState::Loading => LoadHint::StillBuffering,
            NetworkState::NoSource => LoadHint::NoSource,
            NetworkState::Empty | NetworkState::Idle => LoadHint::Pending,
        };
        warn!(
            "{} still loading after {:?}: {:?}",
            role, self.config.load_watchdog, hint
        );
        Some(hint)
    }

    pub fn check_loading_all(&self) -> Vec<(SurfaceRole, LoadHint)> {
        [SurfaceRole::Primary, SurfaceRole::Overlay]
            .into_iter()
            .filter_map(|role| self.check_loading(role).map(|hint| (role, hint)))
            .collect()
    }

    pub fn play(&mut self) {
        if !self.primary_status.is_errored() {
            if let Err(e) = self.primary.play() {
                warn!("Original video play request failed: {}", e);
            }
        }
        if !self.overlay_status.is_errored() {
            if let Err(e) = self.overlay.play() {
                warn!("Skeleton video play request failed: {}", e);
            }
        }
        self.state.is_playing = true;
        self.settle_phase();
    }

    pub fn pause(&mut self) {
        self.primary.pause();
        self.overlay.pause();
        self.state.is_playing = false;
        self.settle_phase();
    }

    pub fn toggle_play_pause(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Time of the surface currently driving the pair.
    pub fn current_time(&self) -> f64 {
        self.driver().current_time()
    }

    pub fn current_frame(&self) -> FrameIndex {
        self.clock.frame_at(self.current_time())
    }

    pub fn seek_to_time(&mut self, time: f64) -> FrameUpdate {
        let mut target = if time.is_finite() { time.max(0.0) } else { 0.0 };
        if let Some(duration) = self.clock.duration() {
            target = target.min(duration);
        }
        self.primary.set_current_time(target);
        self.overlay.set_current_time(target);
        self.refresh()
    }

    pub fn seek_to_frame(&mut self, frame: FrameIndex) -> FrameUpdate {
        let time = self.clock.frame_to_time(frame);
        self.seek_to_time(time)
    }

    /// Pause and move one frame forward. No-op on the last frame.
    pub fn step_forward(&mut self) -> Option<FrameUpdate> {
        self.pause();
        let next = self.current_frame() + 1;
        if next < self.clock.total_frames() {
            Some(self.seek_to_frame(next))
        } else {
            None
        }
    }

    /// Pause and move one frame back. No-op on frame 0.
    pub fn step_backward(&mut self) -> Option<FrameUpdate> {
        self.pause();
        let current = self.current_frame();
        if current == 0 {
            return None;
        }
        Some(self.seek_to_frame(current - 1))
    }

    pub fn change_speed(&mut self, delta: f64) -> f64 {
        self.state.speed = self.config.clamp_speed(self.state.speed + delta);
        self.primary.set_playback_rate(self.state.speed);
        self.overlay.set_playback_rate(self.state.speed);
        self.state.speed
    }

    /// Pointer went down on the timeline at `fraction` of its width.
    pub fn begin_drag(&mut self, fraction: f64) -> Option<FrameUpdate> {
        self.state.is_dragging = true;
        self.pause();
        self.drag_to(fraction)
    }

    pub fn drag_to(&mut self, fraction: f64) -> Option<FrameUpdate> {
        if !self.state.is_dragging {
            return None;
        }
        let duration = self.clock.duration()?;
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some(self.seek_to_time(fraction * duration))
    }

    pub fn end_drag(&mut self) {
        self.state.is_dragging = false;
        self.settle_phase();
    }

    /// Handle a time update from the driving surface. Suppressed while dragging.
    pub fn on_time_update(&mut self) -> Option<FrameUpdate> {
        if self.state.is_dragging {
            return None;
        }
        self.correct_drift();
        Some(self.refresh())
    }

    pub fn handle_key(&mut self, key: TransportKey) -> Option<FrameUpdate> {
        match key {
            TransportKey::Space => {
                self.toggle_play_pause();
                None
            }
            TransportKey::ArrowLeft => self.step_backward(),
            TransportKey::ArrowRight => self.step_forward(),
            TransportKey::ArrowUp => {
                self.change_speed(self.config.speed_step);
                None
            }
            TransportKey::ArrowDown => {
                self.change_speed(-self.config.speed_step);
                None
            }
        }
    }

    /// Playback position as a fraction of the duration, for the progress bar.
    pub fn timeline_fraction(&self) -> f64 {
        match self.clock.duration() {
            Some(duration) if duration > 0.0 => (self.current_time() / duration).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    fn correct_drift(&mut self) -> bool {
        if self.primary_status.is_errored() || self.overlay_status.is_errored() {
            return false;
        }
        let primary_time = self.primary.current_time();
        let drift = (primary_time - self.overlay.current_time()).abs();
        if drift > self.config.drift_tolerance {
            debug!(
                "Resyncing skeleton video: drift {:.3}s at {:.3}s",
                drift, primary_time
            );
            self.overlay.set_current_time(primary_time);
            self.drift_corrections += 1;
            return true;
        }
        false
    }

    fn refresh(&mut self) -> FrameUpdate {
        self.state.original_time = self.primary.current_time();
        self.state.skeleton_time = self.overlay.current_time();

        let time = self.current_time();
        let update = FrameUpdate {
            frame: self.clock.frame_at(time),
            time,
        };
        self.last_update = Some(update);
        // No receivers is fine; nobody is rendering yet
        let _ = self.frames.send(update);
        update
    }

    fn driver(&self) -> &S {
        if self.primary_status.is_errored() && !self.overlay_status.is_errored() {
            &self.overlay
        } else {
            &self.primary
        }
    }

    fn status_mut(&mut self, role: SurfaceRole) -> &mut SurfaceStatus {
        match role {
            SurfaceRole::Primary => &mut self.primary_status,
            SurfaceRole::Overlay => &mut self.overlay_status,
        }
    }

    fn settle_phase(&mut self) {
        if self.phase == PlayerPhase::Idle {
            return;
        }
        self.phase = if self.state.is_dragging {
            PlayerPhase::Dragging
        } else if self.state.is_playing {
            PlayerPhase::Playing
        } else {
            PlayerPhase::Paused
        };
    }
}

/// Format seconds as `m:ss` for the time display.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{}:{:02}", mins, secs)
}
