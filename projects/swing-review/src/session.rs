use crate::clock::FrameIndex;
use crate::error::StaleLoad;
use crate::index::{FrameOrEvent, MetricFrameIndex};
use crate::loader::{self, AnalysisBundle};
use crate::locale::Locale;
use crate::naming::{describe_metric, MetricDescriptor};
use crate::payload::{find_standard, MetricStandard};
use crate::record::{Judgment, MetricValue, WorstLabel};
use crate::scheduler::{LoadWatchdog, StatusPoller, TaskSlot};
use crate::source::AnalysisSource;
use crate::surface::{MediaSurface, SurfaceRole};
use crate::sync::{DualVideoSync, LoadHint};
use crate::timeline::{EventTimeline, MarkerClick};
use std::sync::Arc;
use tracing::{info, warn};

/// Issued by `begin_load`; only the newest ticket may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// One metric of the frame panel at the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReadout {
    pub metric: String,
    pub descriptor: MetricDescriptor,
    /// `None` when the frame has no value for the metric.
    pub value: Option<MetricValue>,
    pub judgment: Option<Judgment>,
}

impl MetricReadout {
    pub fn display_name(&self, locale: Locale) -> &str {
        self.descriptor.display.text(locale)
    }
}

/// One metric of an event card.
#[derive(Debug, Clone, PartialEq)]
pub struct EventReadout {
    pub metric: String,
    pub descriptor: MetricDescriptor,
    pub value: MetricValue,
    /// `None` for labels outside the known classes.
    pub label: Option<WorstLabel>,
    pub low: Option<f64>,
    pub high: Option<f64>,
}

/// A marker click and the event card it scopes the metric panel to.
/// `readout` is empty unless the click selected the marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSelection {
    pub click: MarkerClick,
    pub readout: Vec<EventReadout>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpOutcome {
    Jumped(FrameIndex),
    NothingToJump,
}

impl JumpOutcome {
    /// Alert shown when there was nothing to jump to.
    pub fn alert(&self, locale: Locale) -> Option<&'static str> {
        match self {
            Self::Jumped(_) => None,
            Self::NothingToJump => Some(locale.text("alert_no_abnormal")),
        }
    }
}

pub struct AnalysisSession<S: MediaSurface> {
    source: Arc<dyn AnalysisSource>,
    sync: DualVideoSync<S>,
    index: Arc<MetricFrameIndex>,
    timeline: EventTimeline,
    bundle: Option<AnalysisBundle>,
    locale: Locale,
    generation: u64,
    watchdog: Option<LoadWatchdog>,
    poller: TaskSlot,
    polled_video: Option<String>,
}

impl<S: MediaSurface> AnalysisSession<S> {
    pub fn new(source: Arc<dyn AnalysisSource>, sync: DualVideoSync<S>, locale: Locale) -> Self {
        Self {
            source,
            sync,
            index: Arc::new(MetricFrameIndex::empty()),
            timeline: EventTimeline::default(),
            bundle: None,
            locale,
            generation: 0,
            watchdog: None,
            poller: TaskSlot::new(),
            polled_video: None,
        }
    }

    pub fn source(&self) -> Arc<dyn AnalysisSource> {
        self.source.clone()
    }

    pub fn sync(&self) -> &DualVideoSync<S> {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut DualVideoSync<S> {
        &mut self.sync
    }

    pub fn index(&self) -> Arc<MetricFrameIndex> {
        self.index.clone()
    }

    pub fn timeline(&self) -> &EventTimeline {
        &self.timeline
    }

    pub fn bundle(&self) -> Option<&AnalysisBundle> {
        self.bundle.as_ref()
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn set_locale(&mut self, locale: Locale) {
        if self.locale != locale {
            info!("Locale switched to {}", locale);
            self.locale = locale;
        }
    }

    /// Start a new load, superseding any load still in flight.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket(self.generation)
    }

    /// Install a loaded bundle if `ticket` is still the newest load.
    pub fn apply_load(&mut self, ticket: LoadTicket, bundle: AnalysisBundle) -> Result<(), StaleLoad> {
        if ticket.0 != self.generation {
            warn!(
                "Discarding analysis for {} from load {} (current {})",
                bundle.video_id, ticket.0, self.generation
            );
            return Err(StaleLoad {
                ticket: ticket.0,
                current: self.generation,
            });
        }

        self.index = bundle.index.clone();
        self.timeline = EventTimeline::build(&self.index);
        if let Some(total) = bundle.total_frames {
            self.sync.set_total_frames(total);
        }
        info!(
            "Applied analysis for {}: {} frames, {} markers{}",
            bundle.video_id,
            self.index.frame_count(),
            self.timeline.markers().len(),
            if self.timeline.is_degraded() {
                " (frame list only)"
            } else {
                ""
            }
        );
        self.bundle = Some(bundle);
        Ok(())
    }

    /// Fetch and apply the analysis for `video_id`.
    pub async fn load_analysis(&mut self, video_id: &str) -> Result<(), StaleLoad> {
        let ticket = self.begin_load();
        let bundle = loader::load_analysis(self.source.as_ref(), video_id).await;
        self.apply_load(ticket, bundle)
    }

    /// Point both surfaces at the video's streams and arm the load watchdog.
    ///
    /// Loading resets the clock, so a frame count already applied for the
    /// same video is forwarded again. Status polling for another video stops.
    pub fn load_media(&mut self, video_id: &str) {
        if self
            .polled_video
            .as_deref()
            .is_some_and(|polled| polled != video_id)
        {
            self.stop_status_poller();
        }

        let sources = self.source.media_sources(video_id);
        self.sync.load(&sources);
        let total = self
            .bundle
            .as_ref()
            .filter(|b| b.video_id == video_id)
            .and_then(|b| b.total_frames);
        if let Some(total) = total {
            self.sync.set_total_frames(total);
        }
        self.watchdog = Some(LoadWatchdog::arm(self.sync.config().load_watchdog));
    }

    /// Hints for surfaces still loading once the watchdog has expired.
    /// Empty before expiry and after the hints were reported once.
    pub fn check_watchdog(&mut self) -> Vec<(SurfaceRole, LoadHint)> {
        let expired = self.watchdog.as_mut().is_some_and(LoadWatchdog::expired);
        if !expired {
            return Vec::new();
        }
        self.watchdog = None;
        self.sync.check_loading_all()
    }

    /// Follow the analysis status of `video_id`. The session owns the
    /// polling task, so starting another poller stops this one and the
    /// returned handle only observes updates.
    pub async fn start_status_poller(&mut self, video_id: &str) -> StatusPoller {
        self.stop_status_poller();
        let mut poller = StatusPoller::start(
            self.source.clone(),
            video_id.to_string(),
            self.sync.config().poll_interval,
        )
        .await;
        if let Some(task) = poller.detach() {
            self.poller.replace(task);
            self.polled_video = Some(video_id.to_string());
        }
        poller
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    pub fn stop_status_poller(&mut self) {
        self.poller.clear();
        self.polled_video = None;
    }

    fn standards(&self) -> &[MetricStandard] {
        self.bundle
            .as_ref()
            .map(|b| b.standards.as_slice())
            .unwrap_or_default()
    }

    /// Frame panel contents at `frame`, one entry per metric of the first frame row.
    pub fn frame_readout(&self, frame: FrameIndex) -> Vec<MetricReadout> {
        let standards = self.standards();
        self.index
            .frame_metric_names()
            .into_iter()
            .map(|metric| MetricReadout {
                metric: metric.to_string(),
                descriptor: describe_metric(metric, find_standard(standards, metric)),
                value: self.index.lookup_frame(metric, frame).cloned(),
                judgment: self.index.judgment_at(metric, frame),
            })
            .collect()
    }

    /// Event card contents for a 1-based event index.
    pub fn event_readout(&self, event_index: u8) -> Vec<EventReadout> {
        let standards = self.standards();
        self.index
            .metric_names_at(FrameOrEvent::Event(event_index))
            .into_iter()
            .filter_map(|metric| {
                let m = self.index.event_metric(event_index, metric)?;
                Some(EventReadout {
                    metric: metric.to_string(),
                    descriptor: describe_metric(metric, find_standard(standards, metric)),
                    label: m.worst_label(),
                    value: m.value,
                    low: m.low,
                    high: m.high,
                })
            })
            .collect()
    }

    /// Frame panel contents at the displayed frame.
    pub fn current_readout(&self) -> Vec<MetricReadout> {
        self.frame_readout(self.sync.current_frame())
    }

    /// Seek to the first abnormal frame of `metric` and pause there.
    pub fn jump_to_first_abnormal(&mut self, metric: &str) -> JumpOutcome {
        match self.index.first_abnormal_frame(metric) {
            Some(frame) => {
                self.sync.seek_to_frame(frame);
                self.sync.pause();
                info!("Jumped to first abnormal frame {} of {}", frame, metric);
                JumpOutcome::Jumped(frame)
            }
            None => {
                info!("No abnormal frame for {}", metric);
                JumpOutcome::NothingToJump
            }
        }
    }

    /// Seek to a marker's frame and return the event card for it.
    pub fn click_marker(&mut self, event_index: u8) -> MarkerSelection {
        let click = self.timeline.click(event_index, &mut self.sync);
        let readout = match click {
            MarkerClick::Selected { event_index, .. } => self.event_readout(event_index),
            MarkerClick::Disabled | MarkerClick::Unknown => Vec::new(),
        };
        MarkerSelection { click, readout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::payload::{AnalysisStatus, FrameAnalysis, KeyframeAnalysis, Keyframes, VideoInfo};
    use crate::record::JUDGMENT_SUFFIX;
    use crate::shape::RawRow;
    use crate::source::fake::FakeSource;
    use crate::surface::SimulatedSurface;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn rows(value: Value) -> Vec<RawRow> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    fn source() -> FakeSource {
        let judgment = format!("脊柱倾角__{}", JUDGMENT_SUFFIX);
        let mut frame_rows = Vec::new();
        for frame in 0..300 {
            let code = match frame {
                120 | 121 => 2,
                60 => 1,
                _ => 0,
            };
            frame_rows.push(json!({"帧序号": frame, "脊柱倾角": 30.0, judgment.clone(): code}));
        }
        FakeSource {
            video: Some(VideoInfo {
                video_id: "v1".to_string(),
                view_angle: Some("侧面".to_string()),
                status: AnalysisStatus::Completed,
                total_frames: Some(300),
            }),
            frames: Some(FrameAnalysis {
                total_frames: Some(300),
                data: rows(Value::Array(frame_rows)),
                keyframes: Some(Keyframes::Wrapped {
                    events: vec![json!(0), json!(45), json!(90)],
                }),
                ..FrameAnalysis::default()
            }),
            keyframes: Some(KeyframeAnalysis {
                data: rows(json!([
                    {"event_index": 1, "metric": "hip_dx", "value": 0.1, "label": "normal"},
                    {"event_index": 2, "metric": "hip_dx", "value": 0.4, "label": "slight_exceed", "low_th_q20": 0.0, "high_th_q80": 0.3},
                    {"event_index": 3, "metric": "hip_dx", "value": 0.9, "label": "severe_insufficient"},
                ])),
                keyframes: None,
            }),
            ..FakeSource::default()
        }
    }

    fn session() -> AnalysisSession<SimulatedSurface> {
        let sync = DualVideoSync::new(
            SimulatedSurface::new(10.0),
            SimulatedSurface::new(10.0),
            SyncConfig::default(),
        );
        AnalysisSession::new(Arc::new(source()), sync, Locale::En)
    }

    async fn loaded() -> AnalysisSession<SimulatedSurface> {
        let mut session = session();
        session.load_media("v1");
        session.sync_mut().on_loaded_metadata(SurfaceRole::Primary);
        session.load_analysis("v1").await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_load_builds_index_and_timeline() {
        let session = loaded().await;
        assert_eq!(session.index().frame_count(), 300);
        assert_eq!(session.sync().clock().total_frames(), 300);
        assert_eq!(session.timeline().markers().len(), 3);
        assert_eq!(session.timeline().marker(2).unwrap().frame, Some(45));
        assert!(session.bundle().is_some());
    }

    #[tokio::test]
    async fn test_stale_load_is_rejected() {
        let mut session = session();
        let source = session.source();
        let old = session.begin_load();
        let new = session.begin_load();

        let bundle = loader::load_analysis(source.as_ref(), "v1").await;
        let err = session.apply_load(old, bundle.clone()).unwrap_err();
        assert_eq!(err, StaleLoad { ticket: 1, current: 2 });
        assert!(session.index().is_empty());

        session.apply_load(new, bundle).unwrap();
        assert!(!session.index().is_empty());
    }

    #[tokio::test]
    async fn test_frame_readout() {
        let session = loaded().await;
        let readout = session.frame_readout(60);
        assert_eq!(readout.len(), 1);
        let spine = &readout[0];
        assert_eq!(spine.metric, "脊柱倾角");
        assert_eq!(spine.value, Some(MetricValue::Number(30.0)));
        assert_eq!(spine.judgment, Some(Judgment::Minor));
        // frames past the data have no values
        assert_eq!(session.frame_readout(400)[0].value, None);
    }

    #[tokio::test]
    async fn test_event_readout() {
        let session = loaded().await;
        let readout = session.event_readout(2);
        assert_eq!(readout.len(), 1);
        assert_eq!(readout[0].label, Some(WorstLabel::SlightExceed));
        assert_eq!(readout[0].high, Some(0.3));
        assert!(session.event_readout(7).is_empty());
    }

    #[tokio::test]
    async fn test_jump_to_first_abnormal() {
        let mut session = loaded().await;
        session.sync_mut().play();

        let outcome = session.jump_to_first_abnormal("脊柱倾角");
        assert_eq!(outcome, JumpOutcome::Jumped(120));
        assert_eq!(session.sync().current_frame(), 120);
        assert!(!session.sync().state().is_playing);
        assert_eq!(outcome.alert(Locale::En), None);

        let nothing = session.jump_to_first_abnormal("missing_metric");
        assert_eq!(nothing, JumpOutcome::NothingToJump);
        assert_eq!(session.sync().current_frame(), 120);
        assert!(nothing.alert(Locale::Zh).is_some());
    }

    #[tokio::test]
    async fn test_click_marker_seeks_and_scopes_panel() {
        let mut session = loaded().await;
        let selection = session.click_marker(3);
        assert_eq!(
            selection.click,
            MarkerClick::Selected {
                event_index: 3,
                frame: 90
            }
        );
        assert_eq!(session.sync().current_frame(), 90);
        assert_eq!(selection.readout.len(), 1);
        assert_eq!(selection.readout[0].metric, "hip_dx");
        assert_eq!(selection.readout[0].label, Some(WorstLabel::SevereInsufficient));

        let unknown = session.click_marker(7);
        assert_eq!(unknown.click, MarkerClick::Unknown);
        assert!(unknown.readout.is_empty());
        assert_eq!(session.sync().current_frame(), 90);
    }

    #[tokio::test]
    async fn test_analysis_before_media_keeps_frame_count() {
        let mut fake = source();
        if let Some(frames) = fake.frames.as_mut() {
            frames.total_frames = Some(301);
        }
        let sync = DualVideoSync::new(
            SimulatedSurface::new(10.0),
            SimulatedSurface::new(10.0),
            SyncConfig::default(),
        );
        let mut session = AnalysisSession::new(Arc::new(fake), sync, Locale::En);

        session.load_analysis("v1").await.unwrap();
        session.load_media("v1");
        session.sync_mut().on_loaded_metadata(SurfaceRole::Primary);

        let clock = session.sync().clock();
        assert_eq!(clock.total_frames(), 301);
        assert!((clock.fps() - 30.1).abs() < 1e-9);
        assert!(clock.is_authoritative());
    }

    #[tokio::test]
    async fn test_media_for_another_video_drops_frame_count() {
        let mut session = session();
        session.load_analysis("v1").await.unwrap();
        session.load_media("v2");
        assert_eq!(session.sync().clock().total_frames(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_poller_and_new_video_stop_polling() {
        let fake = source().with_statuses(&[AnalysisStatus::Processing]);
        let sync = DualVideoSync::new(
            SimulatedSurface::new(10.0),
            SimulatedSurface::new(10.0),
            SyncConfig::default(),
        );
        let mut session = AnalysisSession::new(Arc::new(fake), sync, Locale::En);

        let mut first = session.start_status_poller("v1").await;
        assert!(session.is_polling());

        let mut second = session.start_status_poller("v1").await;
        let last = first.wait_terminal().await;
        assert_eq!(last.map(|u| u.status), Some(AnalysisStatus::Processing));
        assert!(!first.is_polling());
        assert!(session.is_polling());

        // same video: polling continues
        session.load_media("v1");
        assert!(session.is_polling());

        session.load_media("v2");
        assert!(!session.is_polling());
        let last = second.wait_terminal().await;
        assert_eq!(last.map(|u| u.status), Some(AnalysisStatus::Processing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_reports_stuck_surfaces_once() {
        let mut session = session();
        session.load_media("v1");
        assert!(session.check_watchdog().is_empty());

        tokio::time::sleep(Duration::from_secs(6)).await;
        let hints = session.check_watchdog();
        assert_eq!(hints.len(), 2);
        assert!(session.check_watchdog().is_empty());
    }

    #[test]
    fn test_set_locale() {
        let mut session = session();
        session.set_locale(Locale::Zh);
        assert_eq!(session.locale(), Locale::Zh);
    }
}
