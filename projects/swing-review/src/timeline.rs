use crate::clock::FrameIndex;
use crate::index::MetricFrameIndex;
use crate::locale::{Locale, SwingPhase};
use crate::record::{WorstLabel, EVENT_COUNT};
use crate::surface::MediaSurface;
use crate::sync::DualVideoSync;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Normal,
    Warning,
    Severe,
}

impl Severity {
    pub fn classify(worst: WorstLabel, defect_count: u32) -> Self {
        match worst {
            WorstLabel::SevereInsufficient => Self::Severe,
            WorstLabel::SlightExceed => Self::Warning,
            WorstLabel::Normal if defect_count > 0 => Self::Warning,
            WorstLabel::Normal => Self::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventMarker {
    pub event_index: u8,
    pub phase: SwingPhase,
    pub frame: Option<FrameIndex>,
    pub defect_count: u32,
    pub worst_label: WorstLabel,
    pub severity: Severity,
    /// False when the event has no resolved frame to seek to.
    pub enabled: bool,
}

impl EventMarker {
    fn new(
        phase: SwingPhase,
        frame: Option<FrameIndex>,
        defect_count: u32,
        worst_label: WorstLabel,
    ) -> Self {
        Self {
            event_index: phase.event_index(),
            phase,
            frame,
            defect_count,
            worst_label,
            severity: Severity::classify(worst_label, defect_count),
            enabled: frame.is_some(),
        }
    }

    pub fn label(&self, locale: Locale) -> &'static str {
        self.phase.label(locale)
    }

    /// Position on a progress bar covering `total_frames`.
    pub fn position_fraction(&self, total_frames: usize) -> Option<f64> {
        let frame = self.frame?;
        if total_frames == 0 {
            return None;
        }
        Some((frame as f64 / total_frames as f64).clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerClick {
    /// The marker was activated and the player sought to its frame.
    Selected { event_index: u8, frame: FrameIndex },
    /// The marker has no resolved frame; nothing changed.
    Disabled,
    /// No marker carries that event index.
    Unknown,
}

#[derive(Debug, Clone, Default)]
pub struct EventTimeline {
    markers: Vec<EventMarker>,
    active: Option<u8>,
    degraded: bool,
}

impl EventTimeline {
    pub fn build(index: &MetricFrameIndex) -> Self {
        let mut degraded = false;
        let mut markers: Vec<EventMarker> = index
            .events()
            .iter()
            .filter_map(|e| {
                let phase = SwingPhase::from_event_index(e.event_index)?;
                Some(EventMarker::new(
                    phase,
                    e.abs_frame,
                    e.defect_count,
                    e.worst_label,
                ))
            })
            .collect();

        if markers.is_empty() && !index.event_frames().is_empty() {
            debug!("No event records; building markers from the event frame list");
            degraded = true;
            markers = index
                .event_frames()
                .iter()
                .zip(SwingPhase::ALL)
                .map(|(frame, phase)| EventMarker::new(phase, *frame, 0, WorstLabel::Normal))
                .collect();
        }
        markers.truncate(EVENT_COUNT as usize);

        let active = markers.iter().find(|m| m.enabled).map(|m| m.event_index);
        Self {
            markers,
            active,
            degraded,
        }
    }

    pub fn markers(&self) -> &[EventMarker] {
        &self.markers
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Built from frame numbers alone, without labels or defect counts.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn active(&self) -> Option<&EventMarker> {
        let index = self.active?;
        self.marker(index)
    }

    pub fn marker(&self, event_index: u8) -> Option<&EventMarker> {
        self.markers.iter().find(|m| m.event_index == event_index)
    }

    /// Latest enabled marker at or before `frame`.
    pub fn phase_at(&self, frame: FrameIndex) -> Option<&EventMarker> {
        self.markers
            .iter()
            .filter(|m| m.frame.is_some_and(|f| f <= frame))
            .max_by_key(|m| m.frame)
    }

    /// Activate a marker, then seek the player to its frame and pause.
    pub fn click<S: MediaSurface>(
        &mut self,
        event_index: u8,
        sync: &mut DualVideoSync<S>,
    ) -> MarkerClick {
        let Some(marker) = self.marker(event_index) else {
            return MarkerClick::Unknown;
        };
        let Some(frame) = marker.frame.filter(|_| marker.enabled) else {
            debug!("Marker {} has no resolved frame", event_index);
            return MarkerClick::Disabled;
        };

        self.active = Some(event_index);
        sync.seek_to_frame(frame);
        sync.pause();
        info!("Jumped to event {} at frame {}", event_index, frame);
        MarkerClick::Selected { event_index, frame }
    }
}
