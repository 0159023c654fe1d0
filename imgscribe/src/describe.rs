//! Image description through an OpenAI-compatible chat completions API.

use async_openai::types::chat::{
    ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateChatCompletionResponse,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::DescriberConfig;

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("describer request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("describer returned HTTP {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },

    #[error("describer returned no content")]
    EmptyResponse,

    #[error("invalid describer endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Something that can turn an image URL into prose.
#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    /// Describe the image at `image_url` using `model`. Returns the first choice's text.
    async fn describe(&self, model: &str, prompt: &str, image_url: &str) -> Result<String, DescribeError>;
}

pub struct OpenAiDescriber {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl OpenAiDescriber {
    pub fn new(config: &DescriberConfig) -> Result<Self, DescribeError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let endpoint = config.base_url.join("chat/completions")?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone().unwrap_or_default(),
        })
    }
}

/// A single user turn carrying the prompt text followed by the image.
fn vision_request(model: &str, prompt: &str, image_url: &str) -> CreateChatCompletionRequest {
    let message = ChatCompletionRequestUserMessage {
        content: ChatCompletionRequestUserMessageContent::Array(vec![
            ChatCompletionRequestMessageContentPartText::from(prompt).into(),
            ChatCompletionRequestMessageContentPartImage {
                image_url: image_url.into(),
            }
            .into(),
        ]),
        name: None,
    };

    CreateChatCompletionRequest {
        model: model.to_string(),
        messages: vec![message.into()],
        ..Default::default()
    }
}

#[async_trait]
impl DescriptionGenerator for OpenAiDescriber {
    #[instrument(skip(self, prompt), fields(endpoint = %self.endpoint), err)]
    async fn describe(&self, model: &str, prompt: &str, image_url: &str) -> Result<String, DescribeError> {
        let body = vision_request(model, prompt, image_url);

        let response = self.client.post(self.endpoint.clone()).bearer_auth(&self.api_key).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DescribeError::Status { status, body });
        }

        let completion: CreateChatCompletionResponse = response.json().await?;
        debug!(model = %completion.model, choices = completion.choices.len(), "Received completion");

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(DescribeError::EmptyResponse)
    }
}
