use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capture::FramePayload;

use super::{ClassificationError, ClassificationResult, Classifier, RewardStatus};

pub const ANALYZE_EMOTION_PATH: &str = "/api/analyze-emotion";

const MAX_ERROR_BODY_CHARS: usize = 256;

/// Request body. Carries no wallet or identity field, which tells the service
/// to run in collection mode.
#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    emotion: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reward_status: Option<String>,
}

/// Classifier backed by the `analyze-emotion` HTTP endpoint.
#[derive(Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpClassifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .context("failed to build classification http client")?;

        Ok(Self {
            client,
            endpoint: endpoint_url(base_url),
            bearer_token: None,
        })
    }

    /// Optional; the collection-mode endpoint accepts anonymous requests.
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        payload: FramePayload,
    ) -> Result<ClassificationResult, ClassificationError> {
        let body = AnalyzeRequest {
            image: &payload.data_url,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ClassificationError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassificationError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| ClassificationError::Transport(err.to_string()))?;

        parse_response(&bytes)
    }
}

fn endpoint_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), ANALYZE_EMOTION_PATH)
}

fn parse_response(bytes: &[u8]) -> Result<ClassificationResult, ClassificationError> {
    let response: AnalyzeResponse = serde_json::from_slice(bytes)
        .map_err(|err| ClassificationError::Decode(err.to_string()))?;

    let emotion = response
        .emotion
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ClassificationError::Decode("missing emotion label".into()))?;

    Ok(ClassificationResult::new(
        emotion,
        response.confidence.unwrap_or(0.0),
        RewardStatus::from_wire(response.reward_status.as_deref()),
    ))
}
