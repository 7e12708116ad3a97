// Headless review run over simulated surfaces

use crate::cli::Args;
use anyhow::{bail, Context, Result};
use std::time::Duration;
use swing_review::loader::PanelState;
use swing_review::payload::AnalysisStatus;
use swing_review::session::AnalysisSession;
use swing_review::surface::{SimulatedSurface, SurfaceRole};
use swing_review::sync::format_clock;
use swing_review::{DualVideoSync, JumpOutcome};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_millis(250);
const FALLBACK_DURATION_SECS: f64 = 10.0;

pub async fn run(args: Args) -> Result<()> {
    let source = args.source()?;
    let config = args.sync_config();
    let sync = DualVideoSync::new(
        SimulatedSurface::unloaded(),
        SimulatedSurface::unloaded().with_rate_skew(args.overlay_skew),
        config.clone(),
    );
    let mut session = AnalysisSession::new(source, sync, args.locale);
    let locale = session.locale();

    if args.poll {
        let mut poller = session.start_status_poller(&args.video_id).await;
        match poller.wait_terminal().await {
            Some(update) if update.status == AnalysisStatus::Failed => {
                bail!("Analysis of {} failed", args.video_id)
            }
            Some(update) => info!(
                "Analysis {} at {}",
                locale.status(update.status),
                update.observed_at
            ),
            None => warn!("Status polling stopped without a final status"),
        }
    }

    session.load_media(&args.video_id);
    session
        .load_analysis(&args.video_id)
        .await
        .context("Analysis load was superseded")?;

    let (total_frames, frame_panel, event_panel) = match session.bundle() {
        Some(bundle) => (
            bundle.total_frames,
            bundle.frame_panel.clone(),
            bundle.event_panel.clone(),
        ),
        None => bail!("No analysis was applied for {}", args.video_id),
    };
    report_panel("Frame panel", &frame_panel, locale.text("no_data"));
    report_panel("Event panel", &event_panel, locale.text("no_data"));
    report_timeline(&session);
    report_abnormal_frames(&mut session);

    let duration = total_frames
        .map(|n| n as f64 / config.default_fps)
        .filter(|d| *d > 0.0)
        .unwrap_or(FALLBACK_DURATION_SECS);
    let sync = session.sync_mut();
    for role in [SurfaceRole::Primary, SurfaceRole::Overlay] {
        sync.surface_mut(role).finish_loading(duration);
        sync.on_loaded_metadata(role);
        sync.on_can_play(role);
    }
    for (role, hint) in session.check_watchdog() {
        warn!("{} did not finish loading: {:?}", role, hint);
    }

    simulate(session, args.simulate_secs).await;
    Ok(())
}

fn report_panel(name: &str, state: &PanelState, no_data: &str) {
    match state {
        PanelState::Ready => info!("{}: ready", name),
        PanelState::Empty => info!("{}: {}", name, no_data),
        PanelState::Failed(message) => warn!("{}: failed: {}", name, message),
    }
}

fn report_timeline(session: &AnalysisSession<SimulatedSurface>) {
    let locale = session.locale();
    let timeline = session.timeline();
    if timeline.is_empty() {
        info!("No swing phase markers");
        return;
    }
    for marker in timeline.markers() {
        let frame = marker
            .frame
            .map_or_else(|| "-".to_string(), |f| f.to_string());
        info!(
            "Phase {} {:<16} frame {:>5}  {:?} ({} defects, {})",
            marker.event_index,
            marker.label(locale),
            frame,
            marker.severity,
            marker.defect_count,
            locale.worst_label(marker.worst_label),
        );
    }
}

fn report_abnormal_frames(session: &mut AnalysisSession<SimulatedSurface>) {
    let locale = session.locale();
    let index = session.index();
    for metric in index.frame_metric_names() {
        match session.jump_to_first_abnormal(metric) {
            JumpOutcome::Jumped(frame) => info!("{}: first abnormal frame {}", metric, frame),
            outcome @ JumpOutcome::NothingToJump => {
                debug!("{}: {}", metric, outcome.alert(locale).unwrap_or_default())
            }
        }
    }
    session.sync_mut().seek_to_frame(0);
}

async fn simulate(mut session: AnalysisSession<SimulatedSurface>, secs: f64) {
    let mut frames = session.sync().subscribe();
    let listener = tokio::spawn(async move {
        let mut seen = 0usize;
        loop {
            match frames.recv().await {
                Ok(update) => {
                    debug!("Frame {} at {:.3}s", update.frame, update.time);
                    seen += 1;
                }
                Err(RecvError::Lagged(skipped)) => seen += skipped as usize,
                Err(RecvError::Closed) => break,
            }
        }
        seen
    });

    let dt = TICK.as_secs_f64();
    let mut interval = tokio::time::interval(TICK);
    let mut elapsed = 0.0;
    session.sync_mut().play();
    info!("Playing for {:.1}s", secs);

    while elapsed < secs {
        interval.tick().await;
        elapsed += dt;
        let sync = session.sync_mut();
        let primary_ended = sync.surface_mut(SurfaceRole::Primary).advance(dt);
        sync.surface_mut(SurfaceRole::Overlay).advance(dt);
        if primary_ended {
            sync.on_ended();
            info!("Reached the end of the video");
            break;
        }
        if let Some(update) = sync.on_time_update() {
            if let Some(marker) = session.timeline().phase_at(update.frame) {
                debug!("In phase {}", marker.label(session.locale()));
            }
        }
    }
    session.sync_mut().pause();

    let sync = session.sync();
    info!(
        "Stopped at frame {} ({} / {}), {} drift corrections",
        sync.current_frame(),
        format_clock(sync.current_time()),
        format_clock(sync.clock().duration().unwrap_or_default()),
        sync.drift_corrections()
    );
    for readout in session.current_readout() {
        let value = readout
            .value
            .as_ref()
            .map_or_else(|| "--".to_string(), |v| v.to_string());
        info!(
            "  {} = {} {} {:?}",
            readout.display_name(session.locale()),
            value,
            readout.descriptor.unit,
            readout.judgment
        );
    }

    // closes the frame channel
    drop(session);
    match listener.await {
        Ok(seen) => info!("Published {} frame updates", seen),
        Err(e) => warn!("Frame listener failed: {}", e),
    }
}
