// Analysis loader: fetches one view and decodes it into an AnalysisBundle

use crate::clock::FrameIndex;
use crate::error::SourceError;
use crate::index::MetricFrameIndex;
use crate::payload::{
    AiFeedback, FrameAnalysis, KeyframeAnalysis, MetricStandard, VideoInfo, ViewAngle,
};
use crate::record::{EventRecord, FrameRecord, EVENT_COUNT};
use crate::shape::{self, DecodedPayload};
use crate::source::{AnalysisKind, AnalysisSource};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Display state of one panel after a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    Ready,
    /// Nothing to show; not an error.
    Empty,
    Failed(String),
}

/// Where the event records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    KeyframeAnalysis,
    KeyframeExport,
    FrameRows,
    None,
}

#[derive(Debug, Clone)]
pub struct AnalysisBundle {
    pub video_id: String,
    pub video: Option<VideoInfo>,
    pub index: Arc<MetricFrameIndex>,
    /// Authoritative frame count, when the backend reported one.
    pub total_frames: Option<usize>,
    pub standards: Vec<MetricStandard>,
    pub frame_panel: PanelState,
    pub event_panel: PanelState,
    pub event_origin: EventOrigin,
    pub video_summary: Option<Value>,
    pub ai_feedback: Option<AiFeedback>,
    pub loaded_at: DateTime<Utc>,
}

pub async fn load_analysis(source: &dyn AnalysisSource, video_id: &str) -> AnalysisBundle {
    info!("Loading analysis for {} from {}", video_id, source.describe());

    let video = match source.video_info(video_id).await {
        Ok(video) => Some(video),
        Err(e) => {
            warn!("Failed to load video info for {}: {}", video_id, e);
            None
        }
    };
    let view = video.as_ref().map(VideoInfo::view).unwrap_or_default();

    let (standards, frame_result) = tokio::join!(
        source.metric_standards(view, AnalysisKind::FrameByFrame),
        source.frame_analysis(video_id),
    );

    let standards = standards.unwrap_or_else(|e| {
        warn!("Failed to load metric standards: {}", e);
        Vec::new()
    });

    let (frames, frame_panel) = match frame_result {
        Ok(frames) if frames.data.is_empty() => (frames, PanelState::Empty),
        Ok(frames) => (frames, PanelState::Ready),
        Err(e) if e.is_not_found() => {
            warn!("No frame analysis for {}: {}", video_id, e);
            (FrameAnalysis::default(), PanelState::Empty)
        }
        Err(e) => {
            warn!("Failed to load frame analysis for {}: {}", video_id, e);
            (FrameAnalysis::default(), PanelState::Failed(e.to_string()))
        }
    };

    let frame_payload = shape::decode(&frames.data);
    let frame_event_frames = frames.event_frames();

    let (event_payload, event_frames, event_origin, event_panel) =
        match load_events(source, video_id, view).await {
            Ok((origin, keyframes)) => {
                let mut event_frames = keyframes
                    .keyframes
                    .as_ref()
                    .map(|k| k.event_frames())
                    .unwrap_or_default();
                if event_frames.is_empty() {
                    event_frames = frame_event_frames.clone();
                }
                let payload = shape::decode(&keyframes.data);
                let panel = if keyframes.data.is_empty() {
                    PanelState::Empty
                } else {
                    PanelState::Ready
                };
                (payload, event_frames, origin, panel)
            }
            Err(e) => {
                warn!("No event analysis for {}: {}", video_id, e);
                let derived = derive_events(&frame_payload, &frame_event_frames);
                if derived.is_empty() {
                    let panel = if e.is_not_found() {
                        PanelState::Empty
                    } else {
                        PanelState::Failed(e.to_string())
                    };
                    (DecodedPayload::Empty, frame_event_frames, EventOrigin::None, panel)
                } else {
                    info!("Derived {} events from frame rows", derived.len());
                    (
                        DecodedPayload::Events(derived),
                        frame_event_frames,
                        EventOrigin::FrameRows,
                        PanelState::Ready,
                    )
                }
            }
        };

    let index = MetricFrameIndex::build(frame_payload, event_payload, event_frames);
    let total_frames = frames
        .total_frames
        .or_else(|| video.as_ref().and_then(|v| v.total_frames));

    AnalysisBundle {
        video_id: video_id.to_string(),
        video,
        index: Arc::new(index),
        total_frames,
        standards,
        frame_panel,
        event_panel,
        event_origin,
        video_summary: frames.video_summary,
        ai_feedback: frames.ai_feedback,
        loaded_at: Utc::now(),
    }
}

// Keyframe analysis first, then the raw keyframe export.
async fn load_events(
    source: &dyn AnalysisSource,
    video_id: &str,
    view: ViewAngle,
) -> Result<(EventOrigin, KeyframeAnalysis), SourceError> {
    match source.keyframe_analysis(video_id).await {
        Ok(analysis) => return Ok((EventOrigin::KeyframeAnalysis, analysis)),
        Err(e) => info!("Keyframe analysis unavailable ({}), trying keyframe export", e),
    }
    let export = source.keyframe_export(video_id, view).await?;
    Ok((EventOrigin::KeyframeExport, export))
}

/// Build one event per keyframe position from the frame row at that frame.
/// Keyframes with no matching row still produce a bare event.
fn derive_events(
    frame_payload: &DecodedPayload,
    event_frames: &[Option<FrameIndex>],
) -> Vec<EventRecord> {
    let rows: &[FrameRecord] = match frame_payload {
        DecodedPayload::Frames(rows) => rows,
        _ => &[],
    };
    event_frames
        .iter()
        .take(EVENT_COUNT as usize)
        .enumerate()
        .map(|(slot, frame)| {
            let event_index = slot as u8 + 1;
            let mut event = EventRecord::bare(event_index, *frame);
            if let Some(row) = frame.and_then(|f| rows.iter().find(|r| r.frame == f)) {
                event.metrics = row.metrics.clone();
            }
            event
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{AnalysisStatus, KeyframeCsv, Keyframes};
    use crate::record::WorstLabel;
    use crate::shape::RawRow;
    use crate::source::fake::FakeSource;
    use serde_json::json;

    fn rows(value: Value) -> Vec<RawRow> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    fn video() -> VideoInfo {
        VideoInfo {
            video_id: "v1".to_string(),
            view_angle: Some("侧面".to_string()),
            status: AnalysisStatus::Completed,
            total_frames: Some(3),
        }
    }

    fn frames() -> FrameAnalysis {
        FrameAnalysis {
            total_frames: Some(3),
            data: rows(json!([
                {"帧序号": 0, "脊柱倾角": 30.0},
                {"帧序号": 1, "脊柱倾角": 31.0},
                {"帧序号": 2, "脊柱倾角": 32.0},
            ])),
            keyframes: Some(Keyframes::Wrapped {
                events: vec![json!(0), json!(2)],
            }),
            ..FrameAnalysis::default()
        }
    }

    #[tokio::test]
    async fn test_prefers_keyframe_analysis() {
        let source = FakeSource {
            video: Some(video()),
            frames: Some(frames()),
            keyframes: Some(KeyframeAnalysis {
                data: rows(json!([
                    {"event_index": 1, "metric": "hip_dx", "value": 0.2, "label": "severe_insufficient"},
                    {"event_index": 2, "metric": "hip_dx", "value": 0.1, "label": "normal"},
                ])),
                keyframes: None,
            }),
            ..FakeSource::default()
        };
        let bundle = load_analysis(&source, "v1").await;
        assert_eq!(bundle.event_origin, EventOrigin::KeyframeAnalysis);
        assert_eq!(bundle.frame_panel, PanelState::Ready);
        assert_eq!(bundle.event_panel, PanelState::Ready);
        assert_eq!(bundle.total_frames, Some(3));
        // frame analysis keyframes backfill the pivot
        let first = bundle.index.event(1).unwrap();
        assert_eq!(first.abs_frame, Some(0));
        assert_eq!(first.worst_label, WorstLabel::SevereInsufficient);
        assert_eq!(bundle.index.event(2).unwrap().abs_frame, Some(2));
    }

    #[tokio::test]
    async fn test_falls_back_to_keyframe_export() {
        let source = FakeSource {
            video: Some(video()),
            frames: Some(frames()),
            export: Some(KeyframeCsv {
                data: rows(json!([{"event_index": 1, "hip_dx": 0.3, "hip_dx__label": "slight_exceed"}])),
                events: vec![json!(1)],
            }),
            ..FakeSource::default()
        };
        let bundle = load_analysis(&source, "v1").await;
        assert_eq!(bundle.event_origin, EventOrigin::KeyframeExport);
        let event = bundle.index.event(1).unwrap();
        assert_eq!(event.abs_frame, Some(1));
        assert_eq!(event.defect_count, 1);
    }

    #[tokio::test]
    async fn test_derives_events_from_frame_rows() {
        let source = FakeSource {
            video: Some(video()),
            frames: Some(frames()),
            ..FakeSource::default()
        };
        let bundle = load_analysis(&source, "v1").await;
        assert_eq!(bundle.event_origin, EventOrigin::FrameRows);
        assert_eq!(bundle.index.events().len(), 2);
        let second = bundle.index.event(2).unwrap();
        assert_eq!(second.abs_frame, Some(2));
        assert!(second.metrics.get("脊柱倾角").is_some());
    }

    #[tokio::test]
    async fn test_failures_degrade_panels() {
        let source = FakeSource {
            fail_frames: true,
            ..FakeSource::default()
        };
        let bundle = load_analysis(&source, "v1").await;
        assert!(bundle.video.is_none());
        assert!(matches!(bundle.frame_panel, PanelState::Failed(_)));
        assert_eq!(bundle.event_panel, PanelState::Empty);
        assert_eq!(bundle.event_origin, EventOrigin::None);
        assert!(bundle.index.is_empty());
        assert_eq!(bundle.total_frames, None);
    }
}
