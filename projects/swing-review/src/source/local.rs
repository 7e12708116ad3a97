use super::{AnalysisKind, AnalysisSource};
use crate::error::SourceError;
use crate::payload::{
    FrameAnalysis, KeyframeAnalysis, Keyframes, MetricStandard, VideoEnvelope, VideoInfo,
    ViewAngle,
};
use crate::record::MetricValue;
use crate::shape::RawRow;
use crate::sync::MediaSources;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const VIDEO_FILE: &str = "video.json";
pub const FRAME_CSV: &str = "frame_by_frame.csv";
pub const KEYFRAMES_FILE: &str = "keyframes.json";
pub const KEYFRAME_CSV: &str = "keyframe.csv";
pub const STANDARDS_FILE: &str = "standards.json";

/// Analysis data read from an export directory.
///
/// ```text
/// <root>/standards.json                 metric standards, shared
/// <root>/<video_id>/video.json          body of /videos/{id}
/// <root>/<video_id>/frame_by_frame.csv  frame rows
/// <root>/<video_id>/keyframes.json      {"events": [...]} or a bare array
/// <root>/<video_id>/keyframe.csv        event rows, wide or long
/// <root>/<video_id>/original.mp4
/// <root>/<video_id>/skeleton.mp4
/// ```
pub struct LocalExport {
    root: PathBuf,
}

impl LocalExport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn video_dir(&self, video_id: &str) -> PathBuf {
        self.root.join(video_id)
    }

    async fn read_text(path: &Path) -> Result<String, SourceError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
        debug!("Reading {}", path.display());
        let text = Self::read_text(path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn read_csv(path: &Path) -> Result<Vec<RawRow>, SourceError> {
        debug!("Reading {}", path.display());
        let text = Self::read_text(path).await?;
        parse_csv_rows(&text)
    }

    /// Keyframe list, or `None` when the export has no keyframes file.
    async fn read_keyframes(&self, video_id: &str) -> Result<Option<Keyframes>, SourceError> {
        match Self::read_json(&self.video_dir(video_id).join(KEYFRAMES_FILE)).await {
            Ok(keyframes) => Ok(Some(keyframes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Parse CSV text into rows: numbers when they parse, empty cells as null.
pub fn parse_csv_rows(text: &str) -> Result<Vec<RawRow>, SourceError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| (h.to_string(), MetricValue::parse_cell(cell).to_json()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

#[async_trait]
impl AnalysisSource for LocalExport {
    async fn video_info(&self, video_id: &str) -> Result<VideoInfo, SourceError> {
        let envelope: VideoEnvelope =
            Self::read_json(&self.video_dir(video_id).join(VIDEO_FILE)).await?;
        Ok(envelope.video)
    }

    async fn frame_analysis(&self, video_id: &str) -> Result<FrameAnalysis, SourceError> {
        let path = self.video_dir(video_id).join(FRAME_CSV);
        let data = Self::read_csv(&path).await?;
        let columns = data
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Ok(FrameAnalysis {
            total_frames: Some(data.len()),
            columns,
            data,
            keyframes: self.read_keyframes(video_id).await?,
            video_summary: None,
            ai_feedback: None,
        })
    }

    async fn keyframe_analysis(&self, video_id: &str) -> Result<KeyframeAnalysis, SourceError> {
        let data = Self::read_csv(&self.video_dir(video_id).join(KEYFRAME_CSV)).await?;
        Ok(KeyframeAnalysis {
            data,
            keyframes: self.read_keyframes(video_id).await?,
        })
    }

    async fn keyframe_export(
        &self,
        video_id: &str,
        _view: ViewAngle,
    ) -> Result<KeyframeAnalysis, SourceError> {
        // an export has a single event file, already tried by keyframe_analysis
        Err(SourceError::NotFound(format!(
            "no separate keyframe export for {}",
            video_id
        )))
    }

    async fn metric_standards(
        &self,
        _view: ViewAngle,
        _kind: AnalysisKind,
    ) -> Result<Vec<MetricStandard>, SourceError> {
        // a single table covers both views in an export
        match Self::read_json(&self.root.join(STANDARDS_FILE)).await {
            Ok(standards) => Ok(standards),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn media_sources(&self, video_id: &str) -> MediaSources {
        let dir = self.video_dir(video_id);
        MediaSources {
            original: dir.join("original.mp4").display().to_string(),
            skeleton: dir.join("skeleton.mp4").display().to_string(),
        }
    }

    fn describe(&self) -> String {
        format!("export directory {}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::AnalysisStatus;
    use std::fs;
    use tempfile::TempDir;

    fn export() -> (TempDir, LocalExport) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("v1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(VIDEO_FILE),
            r#"{"video":{"video_id":"v1","view_angle":"侧面","status":"completed"}}"#,
        )
        .unwrap();
        fs::write(
            dir.join(FRAME_CSV),
            "\u{feff}视频ID,帧序号,脊柱倾角,脊柱倾角__审判_0标准1轻微2异常\nv1,0,30.5,0\nv1,1,,2\n",
        )
        .unwrap();
        fs::write(dir.join(KEYFRAMES_FILE), r#"{"events":[0,1]}"#).unwrap();
        let source = LocalExport::new(tmp.path());
        (tmp, source)
    }

    #[test]
    fn test_parse_csv_rows_cells() {
        let rows = parse_csv_rows("a,b,c\n1.5,,x\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["a"], serde_json::json!(1.5));
        assert!(rows[0]["b"].is_null());
        assert_eq!(rows[0]["c"], serde_json::json!("x"));
    }

    #[tokio::test]
    async fn test_reads_video_and_frames() {
        let (_tmp, source) = export();
        let info = source.video_info("v1").await.unwrap();
        assert_eq!(info.status, AnalysisStatus::Completed);

        let frames = source.frame_analysis("v1").await.unwrap();
        assert_eq!(frames.total_frames, Some(2));
        assert!(frames.columns.contains(&"视频ID".to_string()));
        assert_eq!(frames.data[0]["帧序号"], serde_json::json!(0.0));
        assert!(frames.data[1]["脊柱倾角"].is_null());
        assert_eq!(frames.event_frames(), vec![Some(0), Some(1)]);
    }

    #[tokio::test]
    async fn test_reads_standards_from_root() {
        let (tmp, source) = export();
        fs::write(
            tmp.path().join(STANDARDS_FILE),
            r#"[{"metric_name":"脊柱倾角","category":"姿态指标","unit":"°","lower_limit":20.0,"upper_limit":40.0}]"#,
        )
        .unwrap();
        let standards = source
            .metric_standards(ViewAngle::Side, AnalysisKind::FrameByFrame)
            .await
            .unwrap();
        assert_eq!(standards.len(), 1);
        assert_eq!(standards[0].upper_limit, Some(40.0));
    }

    #[tokio::test]
    async fn test_missing_files_are_not_found() {
        let (_tmp, source) = export();
        let err = source.keyframe_analysis("v1").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(source.keyframe_export("v1", ViewAngle::Side).await.unwrap_err().is_not_found());
        assert!(source.video_info("nope").await.unwrap_err().is_not_found());
        // standards are optional
        assert!(source
            .metric_standards(ViewAngle::Side, AnalysisKind::FrameByFrame)
            .await
            .unwrap()
            .is_empty());
    }
}
