#[cfg(test)]
pub(crate) mod fake;
pub mod http;
pub mod local;

use crate::error::SourceError;
use crate::payload::{FrameAnalysis, KeyframeAnalysis, MetricStandard, VideoInfo, ViewAngle};
use crate::sync::MediaSources;
use async_trait::async_trait;

/// Which analysis a request refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    FrameByFrame,
    Keyframe,
}

impl AnalysisKind {
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::FrameByFrame => "frame_by_frame",
            Self::Keyframe => "keyframe",
        }
    }
}

#[async_trait]
pub trait AnalysisSource: Send + Sync {
    async fn video_info(&self, video_id: &str) -> Result<VideoInfo, SourceError>;

    async fn frame_analysis(&self, video_id: &str) -> Result<FrameAnalysis, SourceError>;

    /// Event-level analysis in wide or long layout.
    async fn keyframe_analysis(&self, video_id: &str) -> Result<KeyframeAnalysis, SourceError>;

    /// Raw keyframe export, used when `keyframe_analysis` has nothing.
    async fn keyframe_export(
        &self,
        video_id: &str,
        view: ViewAngle,
    ) -> Result<KeyframeAnalysis, SourceError>;

    async fn metric_standards(
        &self,
        view: ViewAngle,
        kind: AnalysisKind,
    ) -> Result<Vec<MetricStandard>, SourceError>;

    /// Locations of the original and skeleton streams.
    fn media_sources(&self, video_id: &str) -> MediaSources;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}
