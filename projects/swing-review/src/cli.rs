use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use swing_review::source::http::BackendClient;
use swing_review::source::local::LocalExport;
use swing_review::{AnalysisSource, Locale, SyncConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Video to review
    pub video_id: String,

    /// Analysis backend, e.g. http://localhost:5000
    #[arg(long, env = "SWING_REVIEW_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Local export directory; takes precedence over the backend
    #[arg(long, env = "SWING_REVIEW_EXPORT_DIR")]
    pub export_dir: Option<PathBuf>,

    /// Label language (zh or en)
    #[arg(long, default_value = "zh")]
    pub locale: Locale,

    /// Seconds of playback to simulate
    #[arg(long, default_value_t = 5.0)]
    pub simulate_secs: f64,

    /// Playback rate multiplier of the simulated skeleton video
    #[arg(long, default_value_t = 1.03)]
    pub overlay_skew: f64,

    /// Maximum skew between the videos before a resync, in seconds
    #[arg(long, default_value_t = 0.1)]
    pub drift_tolerance: f64,

    /// Fraction of a frame added when seeking to a frame
    #[arg(long, default_value_t = 0.1)]
    pub seek_offset: f64,

    /// Seconds before the load watchdog reports stuck videos
    #[arg(long, default_value_t = 5)]
    pub watchdog_secs: u64,

    /// Seconds between analysis status checks
    #[arg(long, default_value_t = 3)]
    pub poll_secs: u64,

    /// Wait for the analysis to finish before loading it
    #[arg(long)]
    pub poll: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            drift_tolerance: self.drift_tolerance,
            seek_offset: self.seek_offset,
            load_watchdog: Duration::from_secs(self.watchdog_secs),
            poll_interval: Duration::from_secs(self.poll_secs),
            ..SyncConfig::default()
        }
    }

    pub fn source(&self) -> Result<Arc<dyn AnalysisSource>> {
        if let Some(dir) = &self.export_dir {
            if !dir.is_dir() {
                bail!("Export directory does not exist: {}", dir.display());
            }
            return Ok(Arc::new(LocalExport::new(dir)));
        }
        match &self.backend_url {
            Some(url) => Ok(Arc::new(BackendClient::new(url.as_str()))),
            None => bail!("Either --backend-url or --export-dir is required"),
        }
    }
}
