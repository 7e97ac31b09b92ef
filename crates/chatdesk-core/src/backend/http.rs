use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;

use super::types::{
    DeleteSessionResponse, ExpertListResponse, GenerateReplyRequest, GenerateReplyResponse,
    ReplySuggestions, SendMessageRequest, SendMessageResponse,
};
use super::ChatBackend;
use crate::constants::endpoints;
use crate::error::{CoreError, Result};
use crate::models::Expert;

/// reqwest client for the local backend's REST endpoints
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| CoreError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CoreError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { base_url, client })
    }

    /// Append `path` (and optional extra segments) to the base URL, percent-encoding each segment.
    fn endpoint_url(&self, path: &str, extra: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CoreError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            segments.extend(extra.iter().copied());
        }
        Ok(url)
    }

    /// The backend answers with a JSON body even on error statuses, so the
    /// body is decoded first and the status only matters when decoding fails.
    async fn decode<T: DeserializeOwned>(
        endpoint: &'static str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<T>(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(CoreError::Backend {
                endpoint,
                message: format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            }),
            Err(e) => Err(CoreError::Decode(e)),
        }
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn generate_reply(&self, request: &GenerateReplyRequest) -> Result<ReplySuggestions> {
        let url = self.endpoint_url(endpoints::AI_GENERATE, &[])?;
        let response = self.client.post(url).json(request).send().await?;
        let parsed: GenerateReplyResponse = Self::decode("generate reply", response).await?;
        parsed.into_result()
    }

    async fn send_message(&self, recipient: &str, message: &str) -> Result<()> {
        let url = self.endpoint_url(endpoints::SEND_MESSAGE, &[])?;
        let body = SendMessageRequest {
            who: recipient.to_string(),
            message: message.to_string(),
        };
        let response = self.client.post(url).json(&body).send().await?;
        let parsed: SendMessageResponse = Self::decode("send message", response).await?;
        parsed.into_result()
    }

    async fn list_experts(&self) -> Result<Vec<Expert>> {
        let url = self.endpoint_url(endpoints::AI_PROMPTS, &[])?;
        let response = self.client.get(url).send().await?;
        let parsed: ExpertListResponse = Self::decode("list experts", response).await?;
        parsed.into_result()
    }

    async fn delete_session(&self, conversation_id: &str) -> Result<u64> {
        let url = self.endpoint_url(endpoints::AI_CONTEXT_SESSION, &[conversation_id])?;
        let response = self.client.delete(url).send().await?;
        let parsed: DeleteSessionResponse = Self::decode("delete session", response).await?;
        parsed.into_result()
    }
}
