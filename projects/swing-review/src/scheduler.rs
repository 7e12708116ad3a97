// Cancellable background tasks: periodic steps, the status poller and the load watchdog

use crate::payload::AnalysisStatus;
use crate::source::AnalysisSource;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct ScheduledTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `step` every `period`, starting one period from now.
    ///
    /// Steps never overlap: a slow step delays the next one and missed ticks
    /// are skipped. The task ends when a step returns `ControlFlow::Break`.
    pub fn every<F, Fut>(name: &'static str, period: Duration, mut step: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if step().await.is_break() {
                    debug!("{} finished", name);
                    break;
                }
            }
        });
        Self { name, handle }
    }

    /// Run `fut` once after `delay`.
    pub fn once<Fut>(name: &'static str, delay: Duration, fut: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await;
        });
        Self { name, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stop(&self) {
        if !self.handle.is_finished() {
            debug!("Stopping {}", self.name);
        }
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Holds at most one task of a kind.
#[derive(Default)]
pub struct TaskSlot {
    current: Option<ScheduledTask>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `task`, aborting whatever was there.
    pub fn replace(&mut self, task: ScheduledTask) {
        if let Some(previous) = self.current.replace(task) {
            previous.stop();
        }
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_finished())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusUpdate {
    pub status: AnalysisStatus,
    pub observed_at: DateTime<Utc>,
}

impl StatusUpdate {
    fn now(status: AnalysisStatus) -> Self {
        Self {
            status,
            observed_at: Utc::now(),
        }
    }
}

/// Follows a video's analysis status until it completes or fails.
pub struct StatusPoller {
    updates: watch::Receiver<Option<StatusUpdate>>,
    task: Option<ScheduledTask>,
}

impl StatusPoller {
    /// Check the status once, then poll every `interval` unless it is
    /// already terminal.
    pub async fn start(
        source: Arc<dyn AnalysisSource>,
        video_id: String,
        interval: Duration,
    ) -> Self {
        let (tx, updates) = watch::channel(None);

        match source.video_info(&video_id).await {
            Ok(video) => {
                info!("Analysis status of {}: {}", video_id, video.status);
                let terminal = video.status.is_terminal();
                tx.send_replace(Some(StatusUpdate::now(video.status)));
                if terminal {
                    return Self {
                        updates,
                        task: None,
                    };
                }
            }
            Err(e) => warn!("Initial status check for {} failed: {}", video_id, e),
        }

        let tx = Arc::new(tx);
        let task = ScheduledTask::every("status poller", interval, move || {
            let source = source.clone();
            let video_id = video_id.clone();
            let tx = tx.clone();
            async move {
                match source.video_info(&video_id).await {
                    Ok(video) => {
                        let previous = *tx.borrow();
                        let changed = previous.map_or(true, |p| p.status != video.status);
                        if changed {
                            info!("Analysis status of {}: {}", video_id, video.status);
                        }
                        tx.send_replace(Some(StatusUpdate::now(video.status)));
                        if video.status.is_terminal() {
                            return ControlFlow::Break(());
                        }
                    }
                    Err(e) => warn!("Status check for {} failed: {}", video_id, e),
                }
                ControlFlow::Continue(())
            }
        });

        Self {
            updates,
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StatusUpdate>> {
        self.updates.clone()
    }

    pub fn latest(&self) -> Option<StatusUpdate> {
        *self.updates.borrow()
    }

    pub fn is_polling(&self) -> bool {
        match &self.task {
            Some(task) => !task.is_finished(),
            // a detached task owns the sender until it ends
            None => self.updates.has_changed().is_ok(),
        }
    }

    /// Hand the polling task to another owner, usually a `TaskSlot`.
    /// Updates keep arriving here until that owner stops it.
    pub fn detach(&mut self) -> Option<ScheduledTask> {
        self.task.take()
    }

    /// Wait for a terminal status. Returns the last update seen if polling
    /// stops first.
    pub async fn wait_terminal(&mut self) -> Option<StatusUpdate> {
        loop {
            let latest = *self.updates.borrow_and_update();
            if latest.is_some_and(|u| u.status.is_terminal()) {
                return latest;
            }
            if self.updates.changed().await.is_err() {
                return *self.updates.borrow();
            }
        }
    }

    /// Stop polling. Does nothing once the task was detached.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.stop();
        }
    }
}

/// One-shot timer armed when media loading starts.
pub struct LoadWatchdog {
    fired: oneshot::Receiver<()>,
    _task: ScheduledTask,
}

impl LoadWatchdog {
    pub fn arm(delay: Duration) -> Self {
        let (tx, fired) = oneshot::channel();
        let task = ScheduledTask::once("load watchdog", delay, async move {
            let _ = tx.send(());
        });
        Self { fired, _task: task }
    }

    /// True once the delay has elapsed. Reports the expiry only once.
    pub fn expired(&mut self) -> bool {
        self.fired.try_recv().is_ok()
    }

    pub async fn wait(self) {
        let _ = self.fired.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::VideoInfo;
    use crate::source::fake::FakeSource;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn video() -> VideoInfo {
        VideoInfo {
            video_id: "v1".to_string(),
            view_angle: None,
            status: AnalysisStatus::Pending,
            total_frames: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_runs_until_break() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = ScheduledTask::every("counter", Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_steps_never_overlap() {
        let running = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));
        let steps = Arc::new(AtomicUsize::new(0));
        let (r, o, s) = (running.clone(), overlapped.clone(), steps.clone());
        let _task = ScheduledTask::every("slow", Duration::from_secs(1), move || {
            let (r, o, s) = (r.clone(), o.clone(), s.clone());
            async move {
                if r.swap(true, Ordering::SeqCst) {
                    o.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(2500)).await;
                r.store(false, Ordering::SeqCst);
                s.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!overlapped.load(Ordering::SeqCst));
        // at least one skipped tick per step
        assert!(steps.load(Ordering::SeqCst) <= 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_replace_aborts_previous() {
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));
        let mut slot = TaskSlot::new();

        let flag = first.clone();
        slot.replace(ScheduledTask::once("first", Duration::from_secs(1), async move {
            flag.store(true, Ordering::SeqCst);
        }));
        let flag = second.clone();
        slot.replace(ScheduledTask::once("second", Duration::from_secs(1), async move {
            flag.store(true, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
        assert!(!slot.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_task_aborts_it() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let task = ScheduledTask::once("dropped", Duration::from_secs(1), async move {
            flag.store(true, Ordering::SeqCst);
        });
        drop(task);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_skips_terminal_status() {
        let source = Arc::new(
            FakeSource {
                video: Some(video()),
                ..FakeSource::default()
            }
            .with_statuses(&[AnalysisStatus::Completed]),
        );
        let mut poller =
            StatusPoller::start(source.clone(), "v1".to_string(), Duration::from_secs(3)).await;
        assert!(!poller.is_polling());
        assert_eq!(poller.latest().unwrap().status, AnalysisStatus::Completed);
        assert_eq!(poller.wait_terminal().await.unwrap().status, AnalysisStatus::Completed);
        assert_eq!(source.video_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_stops_on_completion() {
        let source = Arc::new(
            FakeSource {
                video: Some(video()),
                ..FakeSource::default()
            }
            .with_statuses(&[
                AnalysisStatus::Pending,
                AnalysisStatus::Processing,
                AnalysisStatus::Completed,
            ]),
        );
        let mut poller =
            StatusPoller::start(source.clone(), "v1".to_string(), Duration::from_secs(3)).await;
        assert!(poller.is_polling());
        assert_eq!(poller.latest().unwrap().status, AnalysisStatus::Pending);

        let done = poller.wait_terminal().await.unwrap();
        assert_eq!(done.status, AnalysisStatus::Completed);
        assert_eq!(source.video_calls(), 3);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.video_calls(), 3);
        assert!(!poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_keeps_going_after_errors() {
        let source: Arc<dyn AnalysisSource> = Arc::new(FakeSource::default());
        let mut poller = StatusPoller::start(source, "v1".to_string(), Duration::from_secs(3)).await;
        assert!(poller.latest().is_none());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(poller.is_polling());
        poller.stop();
        assert!(!poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_fires_once() {
        let mut watchdog = LoadWatchdog::arm(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!watchdog.expired());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(watchdog.expired());
        assert!(!watchdog.expired());
    }
}
