use crate::traits::{EmbeddingProvider, GenerationProvider};
use crate::{GenerationOptions, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const PROVIDER: &str = "mistral";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
struct MistralClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MistralClient {
    fn new(
        base_url: &Url,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut details = response.text().await.unwrap_or_default();
            if details.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !details.is_char_boundary(cut) {
                    cut -= 1;
                }
                details.truncate(cut);
            }
            return Err(ProviderError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                details,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| ProviderError::Response {
            provider: PROVIDER.to_string(),
            details: error.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Clone)]
pub struct MistralEmbeddings {
    client: MistralClient,
    model: String,
}

impl MistralEmbeddings {
    pub fn new(
        base_url: &Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: MistralClient::new(base_url, api_key, timeout)?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for MistralEmbeddings {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| ProviderError::Response {
            provider: PROVIDER.to_string(),
            details: "no embedding returned".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        };
        let mut response: EmbeddingResponse = self.client.post("embeddings", &request).await?;

        if response.data.len() != texts.len() {
            return Err(ProviderError::Response {
                provider: PROVIDER.to_string(),
                details: format!(
                    "requested {} embeddings, received {}",
                    texts.len(),
                    response.data.len()
                ),
            });
        }

        response.data.sort_by_key(|item| item.index);
        Ok(response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    random_seed: u64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MistralChat {
    client: MistralClient,
}

impl MistralChat {
    pub fn new(
        base_url: &Url,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: MistralClient::new(base_url, api_key, timeout)?,
        })
    }
}

#[async_trait]
impl GenerationProvider for MistralChat {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &options.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            random_seed: options.random_seed,
        };
        let response: ChatResponse = self.client.post("chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Response {
                provider: PROVIDER.to_string(),
                details: "completion had no message content".to_string(),
            })
    }
}
