//! Presentation core for swing analysis review.
//!
//! Binds precomputed per-frame and per-keyframe metrics to a frame-accurate
//! clock, keeps the original and skeleton videos in lockstep and derives the
//! swing-phase timeline.

pub mod clock;
pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod locale;
pub mod naming;
pub mod payload;
pub mod pivot;
pub mod record;
pub mod scheduler;
pub mod session;
pub mod shape;
pub mod source;
pub mod surface;
pub mod sync;
pub mod timeline;

pub use clock::{FrameClock, FrameIndex};
pub use config::SyncConfig;
pub use error::{SourceError, StaleLoad, SurfaceError};
pub use index::MetricFrameIndex;
pub use locale::Locale;
pub use session::{AnalysisSession, JumpOutcome, MarkerSelection};
pub use source::AnalysisSource;
pub use sync::{DualVideoSync, FrameUpdate};
pub use timeline::EventTimeline;
