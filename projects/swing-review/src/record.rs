use crate::clock::FrameIndex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Separates a metric key from an auxiliary channel suffix.
pub const CHANNEL_DELIMITER: &str = "__";
/// Frame judgment channel: 0 standard, 1 minor, 2 abnormal.
pub const JUDGMENT_SUFFIX: &str = "审判_0标准1轻微2异常";
pub const LABEL_SUFFIX: &str = "label";
pub const LOW_SUFFIX: &str = "low_q20";
pub const HIGH_SUFFIX: &str = "high_q80";

/// Number of fixed swing phases.
pub const EVENT_COUNT: u8 = 8;

pub fn channel_key(metric: &str, suffix: &str) -> String {
    format!("{}{}{}", metric, CHANNEL_DELIMITER, suffix)
}

pub fn is_channel_key(key: &str) -> bool {
    key.contains(CHANNEL_DELIMITER)
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Number(f64),
    Text(String),
    Null,
}

impl MetricValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Null),
            Value::String(s) => Self::Text(s.clone()),
            Value::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            Value::Null => Self::Null,
            other => Self::Text(other.to_string()),
        }
    }

    /// Decode a CSV cell: numbers when they parse, empty as null, else text.
    pub fn parse_cell(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            return Self::Null;
        }
        match cell.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::Text(cell.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
            Self::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Null, empty, or the `nan` placeholder pandas writes for missing cells.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Number(n) => n.is_nan(),
            Self::Text(s) => {
                let s = s.trim();
                s.is_empty() || s.eq_ignore_ascii_case("nan")
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
            Self::Null => Value::Null,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{:.2}", n),
            Self::Text(s) => write!(f, "{}", s),
            Self::Null => write!(f, "--"),
        }
    }
}

/// One frame's or one event's metrics, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    values: BTreeMap<String, MetricValue>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_object(row: &serde_json::Map<String, Value>) -> Self {
        let values = row
            .iter()
            .map(|(k, v)| (k.clone(), MetricValue::from_json(v)))
            .collect();
        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetricValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.values.get(key)
    }

    pub fn channel(&self, metric: &str, suffix: &str) -> Option<&MetricValue> {
        self.values.get(&channel_key(metric, suffix))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys that name a metric rather than a channel or a bookkeeping column.
    pub fn primary_keys<'a>(&'a self, excluded: &'a [&'a str]) -> impl Iterator<Item = &'a str> {
        self.keys()
            .filter(move |k| !is_channel_key(k) && !excluded.contains(k))
    }

    pub fn judgment(&self, metric: &str) -> Option<Judgment> {
        self.channel(metric, JUDGMENT_SUFFIX)
            .and_then(MetricValue::as_f64)
            .map(Judgment::from_code)
    }

    /// Label channel text with missing values normalised to `normal`.
    pub fn label(&self, metric: &str) -> &str {
        match self.channel(metric, LABEL_SUFFIX) {
            Some(v) if !v.is_missing() => v.as_str().unwrap_or(NORMAL_LABEL),
            _ => NORMAL_LABEL,
        }
    }
}

/// Per-frame classification decoded from the judgment channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    Standard,
    Minor,
    Abnormal,
}

impl Judgment {
    pub fn from_code(code: f64) -> Self {
        if code == 2.0 {
            Self::Abnormal
        } else if code == 1.0 {
            Self::Minor
        } else {
            Self::Standard
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Standard => 0,
            Self::Minor => 1,
            Self::Abnormal => 2,
        }
    }
}

const NORMAL_LABEL: &str = "normal";

/// Event-level label. Ordered by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorstLabel {
    #[default]
    Normal,
    SlightExceed,
    SevereInsufficient,
}

impl WorstLabel {
    /// Parse a known label. Missing and `nan` read as normal; unknown text is `None`.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw.map(str::trim).unwrap_or("");
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            return Some(Self::Normal);
        }
        match raw {
            "normal" => Some(Self::Normal),
            "slight_exceed" => Some(Self::SlightExceed),
            "severe_insufficient" => Some(Self::SevereInsufficient),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => NORMAL_LABEL,
            Self::SlightExceed => "slight_exceed",
            Self::SevereInsufficient => "severe_insufficient",
        }
    }
}

impl fmt::Display for WorstLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running worst label and defect count over a group of labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelTally {
    pub worst: WorstLabel,
    pub defect_count: u32,
}

impl LabelTally {
    pub fn observe(&mut self, raw: Option<&str>) {
        match WorstLabel::parse(raw) {
            Some(WorstLabel::Normal) => {}
            Some(label) => {
                self.defect_count += 1;
                // never downgraded once elevated
                self.worst = self.worst.max(label);
            }
            None => self.defect_count += 1,
        }
    }
}

/// One swing-phase event with its metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// 1..=8
    pub event_index: u8,
    pub abs_frame: Option<FrameIndex>,
    pub defect_count: u32,
    pub worst_label: WorstLabel,
    pub metrics: MetricRecord,
}

impl EventRecord {
    /// A placeholder for an event known only by its frame.
    pub fn bare(event_index: u8, abs_frame: Option<FrameIndex>) -> Self {
        Self {
            event_index,
            abs_frame,
            defect_count: 0,
            worst_label: WorstLabel::Normal,
            metrics: MetricRecord::new(),
        }
    }
}

/// One analysis frame with its metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub frame: FrameIndex,
    pub metrics: MetricRecord,
}
