use crate::config::SyncConfig;
use tracing::info;

/// 0-based index of an analysis frame.
pub type FrameIndex = usize;

#[derive(Debug, Clone)]
pub struct FrameClock {
    fps: f64,
    default_fps: f64,
    total_frames: usize,
    authoritative_frames: Option<usize>,
    duration: Option<f64>,
    epsilon: f64,
    seek_offset: f64,
}

impl FrameClock {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            fps: config.default_fps,
            default_fps: config.default_fps,
            total_frames: 0,
            authoritative_frames: None,
            duration: None,
            epsilon: config.frame_epsilon,
            seek_offset: config.seek_offset,
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// True once the frame rate was derived from a backend frame count.
    pub fn is_authoritative(&self) -> bool {
        self.authoritative_frames.is_some() && self.duration.is_some()
    }

    pub fn time_to_frame(&self, time: f64) -> FrameIndex {
        if !time.is_finite() || time <= 0.0 {
            return 0;
        }
        (time * self.fps + self.epsilon).floor() as FrameIndex
    }

    /// `time_to_frame` kept below the frame count once it is known. The
    /// media clock rests at `duration` after the end, one frame past the last.
    pub fn frame_at(&self, time: f64) -> FrameIndex {
        let frame = self.time_to_frame(time);
        match self.total_frames {
            0 => frame,
            total => frame.min(total - 1),
        }
    }

    pub fn frame_to_time(&self, frame: FrameIndex) -> f64 {
        (frame as f64 + self.seek_offset) / self.fps
    }

    /// Record the backend's frame count. Recomputes the rate immediately when
    /// the media duration is already known.
    pub fn set_authoritative_frame_count(&mut self, frames: usize) {
        self.authoritative_frames = Some(frames);
        self.total_frames = frames;
        self.recompute();
    }

    /// Record the playable media duration. Zero or invalid durations are ignored.
    pub fn set_media_duration(&mut self, duration: f64) {
        if !duration.is_finite() || duration <= 0.0 {
            return;
        }
        self.duration = Some(duration);
        if self.authoritative_frames.is_some() {
            self.recompute();
        } else {
            // Estimate until the analysis data says otherwise
            self.total_frames = (duration * self.fps).floor() as usize;
        }
    }

    /// Forget everything learned from the previous load.
    pub fn reset(&mut self) {
        self.fps = self.default_fps;
        self.total_frames = 0;
        self.authoritative_frames = None;
        self.duration = None;
    }

    fn recompute(&mut self) {
        let (Some(frames), Some(duration)) = (self.authoritative_frames, self.duration) else {
            return;
        };
        if frames == 0 || duration <= 0.0 {
            return;
        }
        self.fps = frames as f64 / duration;
        info!(
            "FPS updated to {:.2} from {} frames over {:.3}s",
            self.fps, frames, duration
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> FrameClock {
        FrameClock::new(&SyncConfig::default())
    }

    #[test]
    fn test_round_trip_default_rate() {
        let mut c = clock();
        c.set_authoritative_frame_count(300);
        for f in 0..300 {
            assert_eq!(c.time_to_frame(c.frame_to_time(f)), f);
        }
    }

    #[test]
    fn test_round_trip_fractional_rate() {
        let mut c = clock();
        c.set_media_duration(10.0);
        c.set_authoritative_frame_count(301);
        assert!((c.fps() - 30.1).abs() < 1e-9);
        for f in 0..301 {
            assert_eq!(c.time_to_frame(c.frame_to_time(f)), f);
        }
    }

    #[test]
    fn test_frame_count_before_duration_is_deferred() {
        let mut c = clock();
        c.set_authoritative_frame_count(300);
        assert_eq!(c.fps(), 30.0);
        assert!(!c.is_authoritative());

        c.set_media_duration(10.0);
        assert_eq!(c.fps(), 30.0);
        assert!(c.is_authoritative());

        // Later count recomputes immediately
        c.set_authoritative_frame_count(301);
        assert!((c.fps() - 30.1).abs() < 1e-9);
        assert_eq!(c.total_frames(), 301);
    }

    #[test]
    fn test_zero_duration_keeps_previous_rate() {
        let mut c = clock();
        c.set_media_duration(5.0);
        c.set_authoritative_frame_count(250);
        assert_eq!(c.fps(), 50.0);

        c.set_media_duration(0.0);
        assert_eq!(c.fps(), 50.0);
        c.set_media_duration(f64::NAN);
        assert_eq!(c.fps(), 50.0);
        assert_eq!(c.duration(), Some(5.0));
    }

    #[test]
    fn test_zero_frame_count_does_not_zero_rate() {
        let mut c = clock();
        c.set_media_duration(4.0);
        c.set_authoritative_frame_count(0);
        assert_eq!(c.fps(), 30.0);
    }

    #[test]
    fn test_estimated_total_frames_without_backend_count() {
        let mut c = clock();
        c.set_media_duration(2.5);
        assert_eq!(c.total_frames(), 75);
        assert!(!c.is_authoritative());
    }

    #[test]
    fn test_time_to_frame_absorbs_jitter() {
        let c = clock();
        // 1/30 computed with float error lands just under the boundary
        assert_eq!(c.time_to_frame(0.033_333), 1);
        assert_eq!(c.time_to_frame(-1.0), 0);
        assert_eq!(c.time_to_frame(f64::INFINITY), 0);
    }

    #[test]
    fn test_monotone_under_forward_playback() {
        let c = clock();
        let mut last = 0;
        let mut t = 0.0;
        while t < 3.0 {
            let f = c.time_to_frame(t);
            assert!(f >= last);
            last = f;
            t += 0.007;
        }
    }

    #[test]
    fn test_reset_restores_default() {
        let mut c = clock();
        c.set_media_duration(10.0);
        c.set_authoritative_frame_count(600);
        c.reset();
        assert_eq!(c.fps(), 30.0);
        assert_eq!(c.total_frames(), 0);
        assert_eq!(c.duration(), None);
    }

    #[test]
    fn test_frame_at_stays_below_count() {
        let mut c = clock();
        assert_eq!(c.frame_at(20.0), 600);
        c.set_media_duration(10.0);
        c.set_authoritative_frame_count(300);
        assert_eq!(c.time_to_frame(10.0), 300);
        assert_eq!(c.frame_at(10.0), 299);
        assert_eq!(c.frame_at(5.0), 150);
    }
}
