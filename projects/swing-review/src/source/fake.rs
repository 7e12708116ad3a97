use super::{AnalysisKind, AnalysisSource};
use crate::error::SourceError;
use crate::payload::{
    AnalysisStatus, FrameAnalysis, KeyframeAnalysis, KeyframeCsv, MetricStandard, VideoInfo,
    ViewAngle,
};
use crate::sync::MediaSources;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeSource {
    pub video: Option<VideoInfo>,
    /// Statuses reported by successive `video_info` calls; the last one repeats.
    pub statuses: Mutex<VecDeque<AnalysisStatus>>,
    pub frames: Option<FrameAnalysis>,
    pub keyframes: Option<KeyframeAnalysis>,
    pub export: Option<KeyframeCsv>,
    pub standards: Vec<MetricStandard>,
    pub fail_frames: bool,
    pub video_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_statuses(mut self, statuses: &[AnalysisStatus]) -> Self {
        self.statuses = Mutex::new(statuses.iter().copied().collect());
        self
    }

    pub fn video_calls(&self) -> usize {
        self.video_calls.load(Ordering::SeqCst)
    }
}

fn missing(what: &str) -> SourceError {
    SourceError::NotFound(what.to_string())
}

#[async_trait]
impl AnalysisSource for FakeSource {
    async fn video_info(&self, _video_id: &str) -> Result<VideoInfo, SourceError> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        let mut video = self.video.clone().ok_or_else(|| missing("video"))?;
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        if let Some(status) = status {
            video.status = status;
        }
        Ok(video)
    }

    async fn frame_analysis(&self, _video_id: &str) -> Result<FrameAnalysis, SourceError> {
        if self.fail_frames {
            return Err(SourceError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        self.frames.clone().ok_or_else(|| missing("frames"))
    }

    async fn keyframe_analysis(&self, _video_id: &str) -> Result<KeyframeAnalysis, SourceError> {
        self.keyframes.clone().ok_or_else(|| missing("keyframes"))
    }

    async fn keyframe_export(
        &self,
        _video_id: &str,
        _view: ViewAngle,
    ) -> Result<KeyframeAnalysis, SourceError> {
        self.export
            .clone()
            .map(KeyframeAnalysis::from)
            .ok_or_else(|| missing("export"))
    }

    async fn metric_standards(
        &self,
        _view: ViewAngle,
        _kind: AnalysisKind,
    ) -> Result<Vec<MetricStandard>, SourceError> {
        Ok(self.standards.clone())
    }

    fn media_sources(&self, video_id: &str) -> MediaSources {
        MediaSources::for_video("http://fake", video_id)
    }

    fn describe(&self) -> String {
        "fake source".to_string()
    }
}
