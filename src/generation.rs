//! Free-form replies for utterances the recognizer could not map
//!
//! Single short words get a canned retort. Everything else goes to a
//! language model seeded with the persona prompt and the current game
//! state; any failure there turns into the apology line.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bridge::GameStateSnapshot;
use crate::config::GenerationConfig;
use crate::persona;
use crate::{Error, Result};

/// One-shot text completion
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt` into a single reply
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions endpoint
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    /// Create a client, or `None` when no endpoint is configured
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &GenerationConfig) -> Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Some(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }))
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "generation service error {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::Generation("empty completion".to_string()))
    }
}

/// Produces the spoken answer for a recognized fallback
pub struct FallbackResponder {
    model: Option<Box<dyn LanguageModel>>,
}

impl FallbackResponder {
    #[must_use]
    pub fn new(model: Option<Box<dyn LanguageModel>>) -> Self {
        Self { model }
    }

    /// Reply to `transcript`; never fails
    pub async fn respond(&self, transcript: &str, snapshot: Option<&GameStateSnapshot>) -> String {
        if let Some(reply) = persona::short_transcript_reply(transcript) {
            tracing::debug!(transcript, "short transcript, canned reply");
            return reply;
        }

        let Some(model) = &self.model else {
            tracing::debug!("generation disabled");
            return persona::GENERATION_APOLOGY.to_string();
        };

        let prompt = persona::generation_prompt(transcript, snapshot);
        match model.complete(&prompt).await {
            Ok(reply) => {
                tracing::info!(reply = %reply, "generated reply");
                reply
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                persona::GENERATION_APOLOGY.to_string()
            }
        }
    }
}
