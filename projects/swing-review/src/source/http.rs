use super::{AnalysisKind, AnalysisSource};
use crate::error::SourceError;
use crate::payload::{
    FrameAnalysis, KeyframeAnalysis, KeyframeCsv, MetricStandard, VideoEnvelope, VideoInfo,
    ViewAngle,
};
use crate::sync::MediaSources;
use async_trait::async_trait;
use tracing::debug;

/// Client for one backend instance.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// * `base_url` - e.g. `http://localhost:5000`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);
        let response = self.client.get(&url).query(query).send().await?;
        Self::parse_response(response).await
    }

    /// Pass 2xx responses through; turn anything else into `SourceError::Status`.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SourceError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl AnalysisSource for BackendClient {
    async fn video_info(&self, video_id: &str) -> Result<VideoInfo, SourceError> {
        let envelope: VideoEnvelope = self.get_json(&format!("/videos/{}", video_id), &[]).await?;
        Ok(envelope.video)
    }

    async fn frame_analysis(&self, video_id: &str) -> Result<FrameAnalysis, SourceError> {
        self.get_json(
            &format!("/analysis/{}", video_id),
            &[("type", AnalysisKind::FrameByFrame.as_query())],
        )
        .await
    }

    async fn keyframe_analysis(&self, video_id: &str) -> Result<KeyframeAnalysis, SourceError> {
        self.get_json(
            &format!("/analysis/{}", video_id),
            &[("type", AnalysisKind::Keyframe.as_query())],
        )
        .await
    }

    async fn keyframe_export(
        &self,
        video_id: &str,
        view: ViewAngle,
    ) -> Result<KeyframeAnalysis, SourceError> {
        let csv: KeyframeCsv = self
            .get_json(
                &format!("/keyframe_csv/{}", video_id),
                &[("view", view.backend_name())],
            )
            .await?;
        Ok(csv.into())
    }

    async fn metric_standards(
        &self,
        view: ViewAngle,
        kind: AnalysisKind,
    ) -> Result<Vec<MetricStandard>, SourceError> {
        self.get_json(
            "/metrics",
            &[("view_angle", view.backend_name()), ("type", kind.as_query())],
        )
        .await
    }

    fn media_sources(&self, video_id: &str) -> MediaSources {
        MediaSources::for_video(&self.base_url, video_id)
    }

    fn describe(&self) -> String {
        format!("backend at {}", self.base_url)
    }
}
