use std::time::Duration;

/// Frame rate assumed until the backend reports an authoritative frame count.
pub const DEFAULT_FPS: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Frame rate used before authoritative data arrives
    pub default_fps: f64,
    /// Added before flooring in `time_to_frame` to absorb media clock jitter
    pub frame_epsilon: f64,
    /// Fraction of a frame added in `frame_to_time` so seeks land inside the frame
    pub seek_offset: f64,
    /// Maximum tolerated skew between the two surfaces, in seconds
    pub drift_tolerance: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Step used by the speed keys
    pub speed_step: f64,
    /// How long a surface may stay in its loading state before a hint is emitted
    pub load_watchdog: Duration,
    /// Interval between analysis status checks
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_fps: DEFAULT_FPS,
            frame_epsilon: 1e-3,
            seek_offset: 0.1,
            drift_tolerance: 0.1,
            min_speed: 0.25,
            max_speed: 2.0,
            speed_step: 0.25,
            load_watchdog: Duration::from_secs(5),
            poll_interval: Duration::from_secs(3),
        }
    }
}

impl SyncConfig {
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        speed.max(self.min_speed).min(self.max_speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_player_constants() {
        let config = SyncConfig::default();
        assert_eq!(config.default_fps, 30.0);
        assert_eq!(config.drift_tolerance, 0.1);
        assert_eq!(config.seek_offset, 0.1);
        assert_eq!(config.load_watchdog, Duration::from_secs(5));
    }

    #[test]
    fn test_clamp_speed() {
        let config = SyncConfig::default();
        assert_eq!(config.clamp_speed(3.0), 2.0);
        assert_eq!(config.clamp_speed(0.1), 0.25);
        assert_eq!(config.clamp_speed(1.5), 1.5);
    }
}
