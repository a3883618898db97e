use super::{ChatModelInfo, ChatProvider, GenerationError, prompt::build_prompt};
use crate::{config::ChatConfig, provider::Connection};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Chat provider that calls Ollama's `/api/generate` endpoint without streaming.
pub struct OllamaChat {
    base_url: String,
    model: String,
    timeout: Duration,
    http: Connection<Client>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    done: bool,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TaggedModel>,
}

#[derive(Deserialize)]
struct TaggedModel {
    name: String,
}

impl OllamaChat {
    /// Construct a provider from configuration. No network traffic happens until `initialize`.
    pub fn new(config: &ChatConfig, timeout: Duration) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout,
            http: Connection::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn build_client(&self) -> Result<Client, GenerationError> {
        Client::builder()
            .user_agent("docsearch/chat")
            .timeout(self.timeout)
            .build()
            .map_err(|error| GenerationError::InvalidConfig(error.to_string()))
    }

    async fn probe_model(&self, http: &Client) -> Result<(), GenerationError> {
        let endpoint = self.endpoint("/api/tags");
        let response = http
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| GenerationError::Request { endpoint, source })?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|error| GenerationError::InvalidResponse(error.to_string()))?;

        if tags.models.iter().any(|tagged| tagged.name.contains(&self.model)) {
            Ok(())
        } else {
            Err(GenerationError::ModelUnavailable {
                model: self.model.clone(),
                base_url: self.base_url.clone(),
            })
        }
    }
}

async fn status_error(response: reqwest::Response) -> GenerationError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    GenerationError::UnexpectedStatus { status, body }
}

#[async_trait]
impl ChatProvider for OllamaChat {
    async fn initialize(&self) -> Result<(), GenerationError> {
        let http = self.build_client()?;
        self.probe_model(&http).await?;
        self.http.install(http);
        tracing::info!(
            provider = "ollama",
            model = %self.model,
            base_url = %self.base_url,
            "Chat provider initialized"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<(), GenerationError> {
        match self.http.get() {
            Some(http) => self.probe_model(&http).await,
            None => self.probe_model(&self.build_client()?).await,
        }
    }

    async fn generate_response(
        &self,
        context: &str,
        message: &str,
    ) -> Result<String, GenerationError> {
        let http = self.http.get().ok_or(GenerationError::NotInitialized)?;
        let payload = json!({
            "model": self.model,
            "prompt": build_prompt(context, message),
            "stream": false,
            "options": {
                "temperature": 0.1,
                "top_p": 0.9,
                "num_predict": 1000,
            }
        });

        let endpoint = self.endpoint("/api/generate");
        let response = http
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|source| GenerationError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationError::ModelUnavailable {
                model: self.model.clone(),
                base_url: self.base_url.clone(),
            });
        }

        if !response.status().is_success() {
            let error = status_error(response).await;
            tracing::error!(endpoint = %endpoint, error = %error, "Generation request rejected");
            return Err(error);
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(GenerationError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }

    fn model_info(&self) -> ChatModelInfo {
        ChatModelInfo {
            provider: "ollama".into(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
        }
    }

    async fn close(&self) {
        self.http.release();
    }
}
