use crate::clock::FrameIndex;
use crate::pivot::{backfill_abs_frames, pivot_long};
use crate::record::{
    EventRecord, FrameRecord, Judgment, MetricRecord, MetricValue, WorstLabel, HIGH_SUFFIX,
    LOW_SUFFIX,
};
use crate::shape::DecodedPayload;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Frame-level columns that are bookkeeping rather than metrics.
pub const FRAME_BOOKKEEPING_COLUMNS: &[&str] = &[
    "视频ID",
    "帧序号",
    "帧级加权偏差",
    "帧级评分_0到100",
    "帧级结论",
    "帧级异常指标数",
    "帧级轻微指标数",
    "帧级结论_连续过滤后",
    "帧级异常_连续过滤后",
    "异常指标数_帧级",
    "轻微偏差指标数_帧级",
    "frame_index",
    "abs_frame",
];

/// Event-level columns that are bookkeeping rather than metrics.
pub const EVENT_BOOKKEEPING_COLUMNS: &[&str] = &[
    "video_id",
    "event_index",
    "abs_frame",
    "real_frame",
    "defect_count",
    "has_defect",
    "worst_label",
    "关键帧名称",
    "关键帧索引",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrEvent {
    Frame(FrameIndex),
    /// 1-based event index
    Event(u8),
}

/// One metric of one event, with its label and threshold channels.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMetric {
    pub value: MetricValue,
    /// Raw label text, `normal` when missing.
    pub label: String,
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl EventMetric {
    /// Known label, or `None` for labels outside the three known classes.
    pub fn worst_label(&self) -> Option<WorstLabel> {
        WorstLabel::parse(Some(&self.label))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricFrameIndex {
    frames: BTreeMap<FrameIndex, MetricRecord>,
    first_frame_columns: Option<FrameIndex>,
    events: Vec<EventRecord>,
    event_frames: Vec<Option<FrameIndex>>,
}

impl MetricFrameIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from the frame payload, the event payload and the bare event-frame list.
    pub fn build(
        frame_payload: DecodedPayload,
        event_payload: DecodedPayload,
        event_frames: Vec<Option<FrameIndex>>,
    ) -> Self {
        let mut frames = BTreeMap::new();
        let mut first_frame_columns = None;
        match frame_payload {
            DecodedPayload::Frames(rows) => {
                first_frame_columns = rows.first().map(|r| r.frame);
                for FrameRecord { frame, metrics } in rows {
                    // first row for a frame number wins
                    frames.entry(frame).or_insert(metrics);
                }
            }
            DecodedPayload::Empty => {}
            other => warn!(
                "Ignoring frame payload decoded as {:?}; expected frame rows",
                other.shape()
            ),
        }

        let events = match event_payload {
            DecodedPayload::Long(rows) => pivot_long(&rows, &event_frames),
            DecodedPayload::Events(mut events) => {
                events.sort_by_key(|e| e.event_index);
                backfill_abs_frames(&mut events, &event_frames);
                events
            }
            DecodedPayload::Empty => Vec::new(),
            DecodedPayload::Frames(_) => {
                warn!("Ignoring event payload decoded as frame rows");
                Vec::new()
            }
        };

        info!(
            "Indexed {} frames, {} events, {} event frames",
            frames.len(),
            events.len(),
            event_frames.len()
        );

        Self {
            frames,
            first_frame_columns,
            events,
            event_frames,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.events.is_empty()
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Frame of each event by position; `None` where the backend had no frame.
    pub fn event_frames(&self) -> &[Option<FrameIndex>] {
        &self.event_frames
    }

    pub fn event(&self, event_index: u8) -> Option<&EventRecord> {
        self.events.iter().find(|e| e.event_index == event_index)
    }

    pub fn frame(&self, frame: FrameIndex) -> Option<&MetricRecord> {
        self.frames.get(&frame)
    }

    /// Exact-match lookup. No interpolation between frames.
    pub fn lookup_frame(&self, metric: &str, frame: FrameIndex) -> Option<&MetricValue> {
        self.frames
            .get(&frame)?
            .get(metric)
            .filter(|v| !v.is_missing())
    }

    pub fn judgment_at(&self, metric: &str, frame: FrameIndex) -> Option<Judgment> {
        self.frames.get(&frame)?.judgment(metric)
    }

    /// First frame, in ascending order, whose judgment is abnormal.
    pub fn first_abnormal_frame(&self, metric: &str) -> Option<FrameIndex> {
        self.frames
            .iter()
            .find(|(_, record)| record.judgment(metric) == Some(Judgment::Abnormal))
            .map(|(frame, _)| *frame)
    }

    pub fn metric_names_at(&self, at: FrameOrEvent) -> Vec<&str> {
        match at {
            FrameOrEvent::Frame(frame) => self
                .frames
                .get(&frame)
                .map(|r| r.primary_keys(FRAME_BOOKKEEPING_COLUMNS).collect())
                .unwrap_or_default(),
            FrameOrEvent::Event(index) => self
                .event(index)
                .map(|e| e.metrics.primary_keys(EVENT_BOOKKEEPING_COLUMNS).collect())
                .unwrap_or_default(),
        }
    }

    /// Metric names of the first frame row, which define the frame panel.
    pub fn frame_metric_names(&self) -> Vec<&str> {
        match self.first_frame_columns {
            Some(frame) => self.metric_names_at(FrameOrEvent::Frame(frame)),
            None => Vec::new(),
        }
    }

    pub fn event_metric(&self, event_index: u8, metric: &str) -> Option<EventMetric> {
        let record = &self.event(event_index)?.metrics;
        let value = record.get(metric).filter(|v| !v.is_missing())?.clone();
        let threshold = |suffix| {
            record
                .channel(metric, suffix)
                .filter(|v| !v.is_missing())
                .and_then(MetricValue::as_f64)
        };
        Some(EventMetric {
            value,
            label: record.label(metric).to_string(),
            low: threshold(LOW_SUFFIX),
            high: threshold(HIGH_SUFFIX),
        })
    }
}
