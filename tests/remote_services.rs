//! HTTP contract tests for the recognition, synthesis and generation clients

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tapvoice::config::{GenerationConfig, RecognitionConfig, SynthesisConfig};
use tapvoice::generation::{ChatCompletionsClient, LanguageModel};
use tapvoice::recognition::{LexRecognizer, RecognitionClient, metadata};
use tapvoice::retry::RetryPolicy;
use tapvoice::synthesis::{HttpSynthesizer, SynthesisClient};
use tapvoice::voice::{AudioSink, Utterance};

mod common;

use common::RecordingSink;

const UTTERANCE_PATH: &str =
    "/bots/BOT/botAliases/ALIAS/botLocales/en_US/sessions/session-1/utterance";

fn recognition_config(server: &MockServer) -> RecognitionConfig {
    RecognitionConfig {
        endpoint: server.uri(),
        bot_id: "BOT".to_string(),
        bot_alias_id: "ALIAS".to_string(),
        locale_id: "en_US".to_string(),
        session_id: "session-1".to_string(),
        api_key: Some("gateway-token".to_string()),
        timeout: Duration::from_secs(2),
        retry: RetryPolicy::with_base_delay(Duration::from_millis(10)),
        min_confidence: 0.6,
    }
}

fn lex_response() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header(
            "x-amz-lex-session-state",
            metadata::encode_bytes(
                br#"{"intent": {"name": "SetVolume", "slots": {"percent": {"value": {"interpretedValue": "40"}}}}}"#,
            )
            .as_str(),
        )
        .insert_header(
            "x-amz-lex-interpretations",
            metadata::encode_bytes(
                br#"[{"intent": {"name": "SetVolume"}, "nluConfidence": {"score": 0.88}}]"#,
            )
            .as_str(),
        )
        .insert_header(
            "x-amz-lex-input-transcript",
            metadata::encode_bytes(br#""volume forty percent""#).as_str(),
        )
}

#[tokio::test]
async fn lex_recognizer_posts_pcm_and_decodes_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UTTERANCE_PATH))
        .and(header("content-type", "audio/l16; rate=16000; channels=1"))
        .and(header("authorization", "Bearer gateway-token"))
        .respond_with(lex_response())
        .expect(1)
        .mount(&server)
        .await;

    let config = recognition_config(&server);
    let client = RecognitionClient::new(
        Box::new(LexRecognizer::new(&config).unwrap()),
        config.retry.clone(),
    );

    let (result, _latency) = client
        .recognize(&Utterance::from_pcm(vec![0; 32000]))
        .await
        .unwrap();

    assert_eq!(result.intent_name, "SetVolume");
    assert_eq!(result.confidence, Some(0.88));
    assert_eq!(result.slots.get("percent").map(String::as_str), Some("40"));
    assert_eq!(result.transcript.as_deref(), Some("volume forty percent"));
}

#[tokio::test]
async fn lex_recognizer_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UTTERANCE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(UTTERANCE_PATH))
        .respond_with(lex_response())
        .mount(&server)
        .await;

    let config = recognition_config(&server);
    let client = RecognitionClient::new(
        Box::new(LexRecognizer::new(&config).unwrap()),
        config.retry.clone(),
    );

    let (result, _) = client
        .recognize(&Utterance::from_pcm(vec![0; 3200]))
        .await
        .unwrap();
    assert_eq!(result.intent_name, "SetVolume");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn lex_recognizer_surfaces_error_after_last_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let config = recognition_config(&server);
    let client = RecognitionClient::new(
        Box::new(LexRecognizer::new(&config).unwrap()),
        config.retry.clone(),
    );

    let err = client
        .recognize(&Utterance::from_pcm(vec![0; 3200]))
        .await
        .unwrap_err();
    assert!(matches!(err, tapvoice::Error::Recognition(msg) if msg.contains("boom")));
}

#[test]
fn lex_recognizer_requires_bot_identifiers() {
    let config = RecognitionConfig {
        endpoint: "http://localhost".to_string(),
        bot_id: String::new(),
        bot_alias_id: String::new(),
        locale_id: "en_US".to_string(),
        session_id: "s".to_string(),
        api_key: None,
        timeout: Duration::from_secs(1),
        retry: RetryPolicy::default(),
        min_confidence: 0.6,
    };
    assert!(matches!(
        LexRecognizer::new(&config),
        Err(tapvoice::Error::Config(_))
    ));
}

fn synthesis_config(server: &MockServer) -> SynthesisConfig {
    SynthesisConfig {
        endpoint: format!("{}/v1/audio/speech", server.uri()),
        api_key: Some("sk-test".to_string()),
        model: "tts-1".to_string(),
        voice: "alloy".to_string(),
        timeout: Duration::from_secs(2),
        retry: RetryPolicy::with_base_delay(Duration::from_millis(10)),
    }
}

#[tokio::test]
async fn synthesis_hits_the_service_once_per_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(json!({
            "model": "tts-1",
            "input": "Game paused.",
            "voice": "alloy",
            "response_format": "mp3"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let config = synthesis_config(&server);
    let sink = Arc::new(RecordingSink::default());
    let client = SynthesisClient::new(
        Box::new(HttpSynthesizer::new(&config).unwrap()),
        Arc::clone(&sink) as Arc<dyn AudioSink>,
        config.retry.clone(),
        config.voice.clone(),
    );

    client.speak("Game paused.").await;
    client.speak("Game paused.").await;

    assert_eq!(sink.played(), vec!["mp3-bytes", "mp3-bytes"]);
}

#[tokio::test]
async fn concurrent_requests_for_one_line_share_a_synthesis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"clip".to_vec())
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = synthesis_config(&server);
    let client = Arc::new(SynthesisClient::new(
        Box::new(HttpSynthesizer::new(&config).unwrap()),
        Arc::new(RecordingSink::default()) as Arc<dyn AudioSink>,
        config.retry.clone(),
        config.voice.clone(),
    ));

    let a = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.speak("Aha! You dead now!").await }
    });
    let b = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.speak("Aha! You dead now!").await }
    });
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_synthesis_is_silent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = synthesis_config(&server);
    let sink = Arc::new(RecordingSink::default());
    let client = SynthesisClient::new(
        Box::new(HttpSynthesizer::new(&config).unwrap()),
        Arc::clone(&sink) as Arc<dyn AudioSink>,
        config.retry.clone(),
        config.voice.clone(),
    );

    client.speak("nobody hears this").await;
    assert!(sink.played().is_empty());
}

fn generation_config(endpoint: Option<String>) -> GenerationConfig {
    GenerationConfig {
        endpoint,
        api_key: Some("sk-test".to_string()),
        model: "gpt-4o-mini".to_string(),
        max_tokens: 60,
        timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn chat_completion_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 60})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Nice try, hero.  "}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::from_config(&generation_config(Some(format!(
        "{}/v1/chat/completions",
        server.uri()
    ))))
    .unwrap()
    .unwrap();

    assert_eq!(client.complete("prompt").await.unwrap(), "Nice try, hero.");
}

#[tokio::test]
async fn chat_completion_error_status_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::from_config(&generation_config(Some(server.uri())))
        .unwrap()
        .unwrap();

    assert!(matches!(
        client.complete("prompt").await,
        Err(tapvoice::Error::Generation(_))
    ));
}

#[test]
fn generation_disabled_without_endpoint() {
    assert!(
        ChatCompletionsClient::from_config(&generation_config(None))
            .unwrap()
            .is_none()
    );
}
