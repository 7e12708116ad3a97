// Backend response models

use crate::clock::FrameIndex;
use crate::locale::Locale;
use crate::shape::{as_index, RawRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Body of `GET /videos/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoEnvelope {
    pub video: VideoInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub video_id: String,
    #[serde(default)]
    pub view_angle: Option<String>,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub total_frames: Option<usize>,
}

impl VideoInfo {
    pub fn view(&self) -> ViewAngle {
        self.view_angle
            .as_deref()
            .map(ViewAngle::parse)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl AnalysisStatus {
    /// Completed and failed analyses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera position of the recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewAngle {
    /// Down the line
    #[default]
    Side,
    /// Face on
    Front,
}

impl ViewAngle {
    /// Accepts both the stored Chinese names and the English aliases.
    /// Anything unrecognised reads as side, matching the backend default.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "正面" | "front" => Self::Front,
            _ => Self::Side,
        }
    }

    /// Name the backend expects in query strings.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Side => "侧面",
            Self::Front => "正面",
        }
    }
}

/// Keyframe list: either `{"events": [...]}` or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Keyframes {
    Wrapped { events: Vec<Value> },
    Bare(Vec<Value>),
}

impl Keyframes {
    /// Frame of each event by position. Non-numeric entries are `None`.
    pub fn event_frames(&self) -> Vec<Option<FrameIndex>> {
        let raw = match self {
            Self::Wrapped { events } => events,
            Self::Bare(events) => events,
        };
        raw.iter().map(as_index).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiFeedback {
    #[serde(default)]
    pub zh: Option<String>,
    #[serde(default)]
    pub en: Option<String>,
}

impl AiFeedback {
    pub fn for_locale(&self, locale: Locale) -> Option<&str> {
        match locale {
            Locale::Zh => self.zh.as_deref(),
            Locale::En => self.en.as_deref(),
        }
    }
}

/// Body of `GET /analysis/{id}?type=frame_by_frame`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameAnalysis {
    #[serde(default)]
    pub total_frames: Option<usize>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<RawRow>,
    #[serde(default)]
    pub keyframes: Option<Keyframes>,
    #[serde(default)]
    pub video_summary: Option<Value>,
    #[serde(default)]
    pub ai_feedback: Option<AiFeedback>,
}

impl FrameAnalysis {
    pub fn event_frames(&self) -> Vec<Option<FrameIndex>> {
        self.keyframes
            .as_ref()
            .map(Keyframes::event_frames)
            .unwrap_or_default()
    }
}

/// Body of `GET /analysis/{id}?type=keyframe`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyframeAnalysis {
    #[serde(default)]
    pub data: Vec<RawRow>,
    #[serde(default)]
    pub keyframes: Option<Keyframes>,
}

/// Body of `GET /keyframe_csv/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyframeCsv {
    #[serde(default)]
    pub data: Vec<RawRow>,
    #[serde(default)]
    pub events: Vec<Value>,
}

impl From<KeyframeCsv> for KeyframeAnalysis {
    fn from(csv: KeyframeCsv) -> Self {
        Self {
            data: csv.data,
            keyframes: Some(Keyframes::Bare(csv.events)),
        }
    }
}

/// One row of `GET /metrics`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricStandard {
    pub metric_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub lower_limit: Option<f64>,
    #[serde(default)]
    pub upper_limit: Option<f64>,
}

pub fn find_standard<'a>(standards: &'a [MetricStandard], metric: &str) -> Option<&'a MetricStandard> {
    standards.iter().find(|s| s.metric_name == metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_video_envelope() {
        let body = json!({
            "video": {"video_id": "v1", "view_angle": "正面", "status": "processing", "upload_time": "x"},
            "analysis_results": []
        });
        let envelope: VideoEnvelope = serde_json::from_value(body).unwrap();
        assert_eq!(envelope.video.view(), ViewAngle::Front);
        assert_eq!(envelope.video.status, AnalysisStatus::Processing);
        assert!(!envelope.video.status.is_terminal());
        assert_eq!(envelope.video.total_frames, None);
    }

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let status: AnalysisStatus = serde_json::from_value(json!("queued")).unwrap();
        assert_eq!(status, AnalysisStatus::Unknown);
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_keyframes_both_layouts() {
        let wrapped: Keyframes = serde_json::from_value(json!({"events": [3, 10, null]})).unwrap();
        assert_eq!(wrapped.event_frames(), vec![Some(3), Some(10), None]);
        let bare: Keyframes = serde_json::from_value(json!([4, 9.0])).unwrap();
        assert_eq!(bare.event_frames(), vec![Some(4), Some(9)]);
    }

    #[test]
    fn test_frame_analysis_defaults() {
        let body = json!({"total_frames": 2, "data": [{"帧序号": 0}, {"帧序号": 1}], "keyframes": null});
        let analysis: FrameAnalysis = serde_json::from_value(body).unwrap();
        assert_eq!(analysis.total_frames, Some(2));
        assert_eq!(analysis.data.len(), 2);
        assert!(analysis.event_frames().is_empty());
        assert!(analysis.ai_feedback.is_none());
    }

    #[test]
    fn test_view_angle_aliases() {
        assert_eq!(ViewAngle::parse("side"), ViewAngle::Side);
        assert_eq!(ViewAngle::parse("front"), ViewAngle::Front);
        assert_eq!(ViewAngle::parse("侧面").backend_name(), "侧面");
        assert_eq!(ViewAngle::parse("???"), ViewAngle::Side);
    }
}
