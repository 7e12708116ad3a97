use crate::clock::FrameIndex;
use crate::record::{
    channel_key, EventRecord, FrameRecord, LabelTally, MetricRecord, MetricValue, WorstLabel,
    EVENT_COUNT, LABEL_SUFFIX,
};
use serde_json::{Map, Value};
use tracing::warn;

/// One raw JSON row as delivered by the backend or read from CSV.
pub type RawRow = Map<String, Value>;

const FRAME_NUMBER_KEYS: [&str; 3] = ["帧序号", "frame_index", "abs_frame"];
const EVENT_INDEX_KEYS: [&str; 2] = ["event_index", "关键帧索引"];
const EVENT_FRAME_KEYS: [&str; 2] = ["abs_frame", "帧序号"];
const LOW_THRESHOLD_KEYS: [&str; 2] = ["low_th_q20", "low_q20"];
const HIGH_THRESHOLD_KEYS: [&str; 2] = ["high_th_q80", "high_q80"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// One row per frame
    WideFrames,
    /// One row per swing event
    WideEvents,
    /// One row per (event, metric) pair
    Long,
    Empty,
}

/// One (event, metric) pair from a long-format payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub event_index: u8,
    pub abs_frame: Option<FrameIndex>,
    pub metric: String,
    pub value: MetricValue,
    pub label: Option<String>,
    pub low: Option<MetricValue>,
    pub high: Option<MetricValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    Frames(Vec<FrameRecord>),
    Events(Vec<EventRecord>),
    Long(Vec<LongRow>),
    Empty,
}

impl DecodedPayload {
    pub fn shape(&self) -> PayloadShape {
        match self {
            Self::Frames(_) => PayloadShape::WideFrames,
            Self::Events(_) => PayloadShape::WideEvents,
            Self::Long(_) => PayloadShape::Long,
            Self::Empty => PayloadShape::Empty,
        }
    }
}

/// Classify rows by probing the first one.
pub fn detect(rows: &[RawRow]) -> PayloadShape {
    let Some(sample) = rows.first() else {
        return PayloadShape::Empty;
    };
    if sample.contains_key("metric") {
        PayloadShape::Long
    } else if EVENT_INDEX_KEYS.iter().any(|k| sample.contains_key(*k)) {
        PayloadShape::WideEvents
    } else {
        PayloadShape::WideFrames
    }
}

pub fn decode(rows: &[RawRow]) -> DecodedPayload {
    match detect(rows) {
        PayloadShape::Empty => DecodedPayload::Empty,
        PayloadShape::WideFrames => DecodedPayload::Frames(decode_frames(rows)),
        PayloadShape::WideEvents => DecodedPayload::Events(decode_events(rows)),
        PayloadShape::Long => DecodedPayload::Long(decode_long(rows)),
    }
}

fn decode_frames(rows: &[RawRow]) -> Vec<FrameRecord> {
    rows.iter()
        .enumerate()
        .map(|(position, row)| {
            let frame = first_of(row, &FRAME_NUMBER_KEYS)
                .and_then(as_index)
                .unwrap_or(position);
            FrameRecord {
                frame,
                metrics: MetricRecord::from_json_object(row),
            }
        })
        .collect()
}

fn decode_events(rows: &[RawRow]) -> Vec<EventRecord> {
    let mut events = Vec::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        let Some(event_index) = event_index_of(row, position) else {
            continue;
        };
        let metrics = MetricRecord::from_json_object(row);
        let abs_frame = first_of(row, &EVENT_FRAME_KEYS).and_then(as_index);

        let explicit_worst = row
            .get("worst_label")
            .and_then(Value::as_str)
            .and_then(|s| WorstLabel::parse(Some(s)));
        let explicit_defects = row
            .get("defect_count")
            .and_then(as_index)
            .map(|n| n as u32);

        let (worst_label, defect_count) = match (explicit_worst, explicit_defects) {
            (Some(worst), Some(count)) => (worst, count),
            (worst, count) => {
                let tally = tally_labels(&metrics);
                (worst.unwrap_or(tally.worst), count.unwrap_or(tally.defect_count))
            }
        };

        events.push(EventRecord {
            event_index,
            abs_frame,
            defect_count,
            worst_label,
            metrics,
        });
    }
    events
}

fn decode_long(rows: &[RawRow]) -> Vec<LongRow> {
    let mut out = Vec::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        let Some(event_index) = event_index_of(row, position) else {
            continue;
        };
        let Some(metric) = row.get("metric").and_then(Value::as_str) else {
            warn!("Skipping long-format row {} without a metric name", position);
            continue;
        };
        let label = row
            .get("label")
            .and_then(Value::as_str)
            .map(str::to_string);
        out.push(LongRow {
            event_index,
            abs_frame: first_of(row, &EVENT_FRAME_KEYS).and_then(as_index),
            metric: metric.to_string(),
            value: row
                .get("value")
                .map(MetricValue::from_json)
                .unwrap_or(MetricValue::Null),
            label,
            low: first_of(row, &LOW_THRESHOLD_KEYS).map(MetricValue::from_json),
            high: first_of(row, &HIGH_THRESHOLD_KEYS).map(MetricValue::from_json),
        });
    }
    out
}

/// Derive worst label and defect count from every `__label` channel of a wide row.
fn tally_labels(metrics: &MetricRecord) -> LabelTally {
    let suffix = channel_key("", LABEL_SUFFIX);
    let mut tally = LabelTally::default();
    for key in metrics.keys().filter(|k| k.ends_with(&suffix)) {
        let raw = metrics.get(key).filter(|v| !v.is_missing());
        tally.observe(raw.and_then(MetricValue::as_str));
    }
    tally
}

fn event_index_of(row: &RawRow, position: usize) -> Option<u8> {
    let index = first_of(row, &EVENT_INDEX_KEYS).and_then(as_index);
    match index {
        Some(i) if (1..=EVENT_COUNT as usize).contains(&i) => Some(i as u8),
        Some(i) => {
            warn!("Skipping row {}: event index {} out of range", position, i);
            None
        }
        None => {
            warn!("Skipping row {}: missing event index", position);
            None
        }
    }
}

/// First key in the chain with a non-null value.
fn first_of<'a>(row: &'a RawRow, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .find(|v| !v.is_null())
}

/// Non-negative integral index from a JSON number or numeric string.
pub(crate) fn as_index(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 {
        Some(n as usize)
    } else {
        None
    }
}
