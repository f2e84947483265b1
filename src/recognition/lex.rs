//! Lex-style runtime recognizer over HTTP

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;

use super::{FALLBACK_INTENT, RecognitionResult, SpeechRecognizer, metadata};
use crate::config::RecognitionConfig;
use crate::voice::{SAMPLE_RATE, Utterance};
use crate::{Error, Result};

const SESSION_STATE_HEADER: &str = "x-amz-lex-session-state";
const INTERPRETATIONS_HEADER: &str = "x-amz-lex-interpretations";
const TRANSCRIPT_HEADER: &str = "x-amz-lex-input-transcript";

#[derive(Debug, Default, Deserialize)]
struct SessionState {
    #[serde(default)]
    intent: Option<IntentState>,
}

#[derive(Debug, Default, Deserialize)]
struct IntentState {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    slots: BTreeMap<String, Option<Slot>>,
}

#[derive(Debug, Deserialize)]
struct Slot {
    #[serde(default)]
    value: Option<SlotValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotValue {
    #[serde(default)]
    interpreted_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Interpretation {
    #[serde(default)]
    intent: Option<IntentState>,
    #[serde(default)]
    nlu_confidence: Option<NluConfidence>,
}

#[derive(Debug, Deserialize)]
struct NluConfidence {
    score: Option<f64>,
}

/// Recognizer speaking the Lex V2 runtime `RecognizeUtterance` contract
///
/// Requests are not SigV4-signed; point `endpoint` at a gateway that
/// authenticates with the bearer token, or at a compatible local service.
pub struct LexRecognizer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl LexRecognizer {
    /// Create a recognizer from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the bot identifiers are missing or the HTTP client
    /// cannot be built
    pub fn new(config: &RecognitionConfig) -> Result<Self> {
        if config.bot_id.is_empty() || config.bot_alias_id.is_empty() {
            return Err(Error::Config(
                "LEX_BOT_ID and LEX_ALIAS_ID are required for recognition".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let url = format!(
            "{}/bots/{}/botAliases/{}/botLocales/{}/sessions/{}/utterance",
            config.endpoint.trim_end_matches('/'),
            config.bot_id,
            config.bot_alias_id,
            config.locale_id,
            config.session_id,
        );

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SpeechRecognizer for LexRecognizer {
    async fn recognize(&self, utterance: &Utterance) -> Result<RecognitionResult> {
        tracing::debug!(audio_bytes = utterance.as_bytes().len(), "sending utterance");

        let mut request = self
            .client
            .post(&self.url)
            .header(
                "Content-Type",
                format!("audio/l16; rate={SAMPLE_RATE}; channels=1"),
            )
            .header("Accept", "text/plain; charset=utf-8")
            .body(utterance.as_bytes().to_vec());

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Recognition(format!(
                "recognition service error {status}: {body}"
            )));
        }

        parse_headers(response.headers())
    }
}

/// Build a result from the encoded response headers
///
/// Malformed session state or interpretations fail the attempt. A transcript
/// that cannot be decoded is treated as absent.
fn parse_headers(headers: &HeaderMap) -> Result<RecognitionResult> {
    let session: SessionState = header_str(headers, SESSION_STATE_HEADER)
        .map(metadata::decode_json)
        .transpose()?
        .unwrap_or_default();

    let interpretations: Vec<Interpretation> = header_str(headers, INTERPRETATIONS_HEADER)
        .map(metadata::decode_json)
        .transpose()?
        .unwrap_or_default();

    let intent = session.intent.unwrap_or_default();
    let mut intent_name = intent
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| FALLBACK_INTENT.to_string());
    let mut confidence = None;

    if let Some(top) = interpretations.first() {
        if let Some(name) = top
            .intent
            .as_ref()
            .and_then(|i| i.name.as_ref())
            .filter(|n| !n.is_empty())
        {
            intent_name.clone_from(name);
        }
        confidence = top.nlu_confidence.as_ref().and_then(|c| c.score);
    }

    let slots = intent
        .slots
        .into_iter()
        .filter_map(|(name, slot)| {
            let value = slot?.value?.interpreted_value?;
            Some((name, value))
        })
        .collect();

    let transcript = header_str(headers, TRANSCRIPT_HEADER).and_then(|raw| {
        metadata::decode_text(raw)
            .inspect_err(|e| tracing::debug!(error = %e, "undecodable transcript"))
            .ok()
            .map(|text| unquote(&text))
    });

    Ok(RecognitionResult {
        transcript,
        intent_name,
        confidence,
        slots,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// The transcript arrives as a JSON string literal; fall back to the raw text
fn unquote(text: &str) -> String {
    serde_json::from_str::<String>(text).unwrap_or_else(|_| text.to_string())
}
