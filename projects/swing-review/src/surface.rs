use crate::error::SurfaceError;
use std::fmt;

/// Which of the two surfaces an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    /// The original recording; its clock drives the pair.
    Primary,
    /// The skeleton overlay rendering.
    Overlay,
}

impl SurfaceRole {
    pub fn media_kind(&self) -> &'static str {
        match self {
            Self::Primary => "original",
            Self::Overlay => "skeleton",
        }
    }
}

impl fmt::Display for SurfaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} video", self.media_kind())
    }
}

/// Network activity of a surface, mirroring the media element states the
/// load watchdog inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Empty,
    Idle,
    Loading,
    NoSource,
}

/// Load status tracked per surface by the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceStatus {
    Idle,
    Loading,
    Ready,
    Errored(String),
}

impl SurfaceStatus {
    pub fn is_errored(&self) -> bool {
        matches!(self, Self::Errored(_))
    }
}

pub trait MediaSurface {
    /// Point the surface at a new source and start buffering.
    fn load(&mut self, url: &str);
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, time: f64);
    /// Playable duration, once metadata is available.
    fn duration(&self) -> Option<f64>;
    fn play(&mut self) -> Result<(), SurfaceError>;
    fn pause(&mut self);
    fn set_playback_rate(&mut self, rate: f64);
    fn network_state(&self) -> NetworkState;
}

/// In-memory surface that advances its clock on demand.
///
/// `rate_skew` multiplies the playback rate so tests and the harness can
/// reproduce decoder drift between the two surfaces.
#[derive(Debug, Clone)]
pub struct SimulatedSurface {
    pub src: Option<String>,
    current_time: f64,
    duration: Option<f64>,
    playing: bool,
    playback_rate: f64,
    rate_skew: f64,
    ready: bool,
    fail_play: bool,
    network_state: NetworkState,
}

impl SimulatedSurface {
    pub fn new(duration: f64) -> Self {
        Self {
            src: None,
            current_time: 0.0,
            duration: Some(duration),
            playing: false,
            playback_rate: 1.0,
            rate_skew: 1.0,
            ready: true,
            fail_play: false,
            network_state: NetworkState::Idle,
        }
    }

    /// A surface whose metadata and data have not arrived yet.
    pub fn unloaded() -> Self {
        Self {
            duration: None,
            ready: false,
            network_state: NetworkState::Empty,
            ..Self::new(0.0)
        }
    }

    pub fn with_rate_skew(mut self, skew: f64) -> Self {
        self.rate_skew = skew;
        self
    }

    pub fn with_failing_play(mut self) -> Self {
        self.fail_play = true;
        self
    }

    pub fn set_network_state(&mut self, state: NetworkState) {
        self.network_state = state;
    }

    /// Simulate metadata and first data arriving.
    pub fn finish_loading(&mut self, duration: f64) {
        self.duration = Some(duration);
        self.ready = true;
        self.network_state = NetworkState::Idle;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Advance the clock by `dt` wall seconds. Returns true when the end was reached.
    pub fn advance(&mut self, dt: f64) -> bool {
        if !self.playing {
            return false;
        }
        self.current_time += dt * self.playback_rate * self.rate_skew;
        if let Some(duration) = self.duration {
            if self.current_time >= duration {
                self.current_time = duration;
                self.playing = false;
                return true;
            }
        }
        false
    }
}

impl MediaSurface for SimulatedSurface {
    fn load(&mut self, url: &str) {
        self.src = Some(url.to_string());
        self.current_time = 0.0;
        self.playing = false;
        self.network_state = NetworkState::Loading;
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn set_current_time(&mut self, time: f64) {
        let upper = self.duration.unwrap_or(f64::MAX);
        self.current_time = time.max(0.0).min(upper);
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn play(&mut self) -> Result<(), SurfaceError> {
        if self.fail_play {
            return Err(SurfaceError::Errored("playback rejected".to_string()));
        }
        if !self.ready {
            return Err(SurfaceError::NotReady);
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
    }

    fn network_state(&self) -> NetworkState {
        self.network_state
    }
}
