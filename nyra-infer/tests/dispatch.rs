//! Dispatch tests: request envelope in, result envelope out, through a ready
//! engine backed by in-process fake capabilities.

mod common;

use std::sync::Arc;
use std::time::Duration;

use nyra_core::config::NyraConfig;
use nyra_core::embedding::cosine_similarity;
use nyra_infer::{FailureKind, InferenceRequest, TaskPayload, TaskType};

use common::{happy_state, memory, ready_engine, ready_engine_with, FakeGenerator, FakeLoader};

fn loader() -> FakeLoader {
    FakeLoader::new(Arc::new(FakeGenerator::replying("<|im_start|>assistant\n我也很想你呀~<|im_end|>")))
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn embedding_request_returns_unit_vector() {
    let (engine, _) = ready_engine(loader()).await;
    let request = InferenceRequest::from_json(r#"{"text":"你好","task_type":"GenerateEmbedding"}"#)
        .expect("valid request");

    let result = engine.handle(request).await;

    assert!(result.success, "error: {:?}", result.error);
    assert!(result.error.is_none());
    let Some(TaskPayload::Embedding(vector)) = &result.result else {
        panic!("expected an embedding payload, got {:?}", result.result);
    };
    assert!(!vector.is_empty());
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((magnitude - 1.0).abs() < 1e-4);

    let json = serde_json::to_value(&result).expect("serialize");
    assert!(json["processing_time_ms"].as_u64().is_some());
    assert!(json["result"].is_array());
}

#[tokio::test]
async fn same_text_embeds_identically() {
    let (engine, _) = ready_engine(loader()).await;
    let a = engine.handle(InferenceRequest::new(TaskType::GenerateEmbedding, "今天去公园")).await;
    let b = engine.handle(InferenceRequest::new(TaskType::GenerateEmbedding, "今天去公园")).await;
    let (Some(TaskPayload::Embedding(a)), Some(TaskPayload::Embedding(b))) = (a.result, b.result) else {
        panic!("expected embeddings");
    };
    assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_without_context_is_client_error() {
    let (engine, loader) = ready_engine(loader()).await;
    let request = InferenceRequest::from_json(r#"{"text":"你好","task_type":"GenerateResponse"}"#)
        .expect("valid request");

    let result = engine.handle(request).await;

    assert!(!result.success);
    assert!(result.result.is_none());
    assert_eq!(result.failure, Some(FailureKind::Client));
    assert_eq!(result.http_status(), 400);
    assert_eq!(loader.generator.calls(), 0);
}

#[tokio::test]
async fn response_with_empty_context_is_client_error() {
    let (engine, loader) = ready_engine(loader()).await;
    let request = InferenceRequest::new(TaskType::GenerateResponse, "你好")
        .with_context(vec![])
        .with_emotional_state(happy_state());

    let result = engine.handle(request).await;

    assert_eq!(result.http_status(), 400);
    assert_eq!(loader.generator.calls(), 0);
}

#[tokio::test]
async fn response_without_state_is_client_error() {
    let (engine, loader) = ready_engine(loader()).await;
    let request = InferenceRequest::new(TaskType::GenerateResponse, "你好").with_context(vec![memory(0, "用户喜欢猫")]);

    let result = engine.handle(request).await;

    assert_eq!(result.http_status(), 400);
    assert_eq!(loader.generator.calls(), 0);
}

#[tokio::test]
async fn response_renders_prompt_and_cleans_reply() {
    let (engine, loader) = ready_engine(loader()).await;
    let memories: Vec<_> = (0..8).map(|i| memory(i, &format!("记忆{i}"))).collect();
    let request = InferenceRequest::new(TaskType::GenerateResponse, "想我了吗？")
        .with_context(memories)
        .with_emotional_state(happy_state());

    let result = engine.handle(request).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.result, Some(TaskPayload::Text("我也很想你呀~".into())));

    let prompt = loader.generator.last_prompt().expect("generator was called");
    assert!(prompt.contains("开心程度: 0.8"));
    assert!(prompt.contains("心情: happy"));
    assert!(prompt.contains("- 记忆0"));
    assert!(prompt.contains("- 记忆4"));
    assert!(!prompt.contains("- 记忆5"));
    assert!(prompt.contains("用户说：想我了吗？"));
}

#[tokio::test]
async fn generator_failure_is_model_failure() {
    let mut generator = FakeGenerator::replying("unused");
    generator.fail = true;
    let (engine, _) = ready_engine(FakeLoader::new(Arc::new(generator))).await;
    let request = InferenceRequest::new(TaskType::GenerateResponse, "hi")
        .with_context(vec![memory(0, "likes tea")])
        .with_emotional_state(happy_state());

    let result = engine.handle(request).await;

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Model));
    assert_eq!(result.http_status(), 200);
    assert!(result.error.as_deref().expect("error").contains("CUDA out of memory"));
}

#[tokio::test]
async fn elapsed_deadline_is_timeout() {
    let mut generator = FakeGenerator::replying("too late");
    generator.delay = Some(Duration::from_millis(500));
    let mut config = NyraConfig::default();
    config.dispatch.request_timeout_ms = Some(20);
    let (engine, loader) = ready_engine_with(config, FakeLoader::new(Arc::new(generator))).await;
    let request = InferenceRequest::new(TaskType::GenerateResponse, "hi")
        .with_context(vec![memory(0, "likes tea")])
        .with_emotional_state(happy_state());

    let result = engine.handle(request).await;

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Timeout));
    assert_eq!(result.http_status(), 200);
    assert_eq!(loader.generator.calls(), 1);
}

// ---------------------------------------------------------------------------
// Emotion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn emotion_uses_classifier_mapping() {
    let (engine, _) = ready_engine(loader()).await;
    let result = engine.handle(InferenceRequest::new(TaskType::AnalyzeEmotion, "今天升职了")).await;
    let Some(TaskPayload::Emotion(state)) = result.result else {
        panic!("expected an emotion payload");
    };
    assert_eq!(state.mood(), "happy");
    assert!((state.happiness() - 0.95).abs() < 1e-6);
}

#[tokio::test]
async fn slow_classifier_past_deadline_yields_neutral_state() {
    let mut loader = loader();
    loader.classifier_delay = Some(Duration::from_millis(300));
    let mut config = NyraConfig::default();
    config.dispatch.request_timeout_ms = Some(20);
    let (engine, _) = ready_engine_with(config, loader).await;

    let result = engine.handle(InferenceRequest::new(TaskType::AnalyzeEmotion, "我好开心")).await;

    assert!(result.success, "emotion analysis must not fail: {:?}", result.error);
    assert!(result.failure.is_none());
    let Some(TaskPayload::Emotion(state)) = result.result else {
        panic!("expected an emotion payload");
    };
    assert_eq!(state.mood(), "calm");
    assert_eq!(state.happiness(), 0.5);
    assert_eq!(state.dependency(), 0.3);
}

#[tokio::test]
async fn emotion_falls_back_to_lexicon_without_classifier() {
    let mut loader = loader();
    loader.classifier = None;
    let (engine, _) = ready_engine(loader).await;

    let happy = engine.handle(InferenceRequest::new(TaskType::AnalyzeEmotion, "我好开心")).await;
    let plain = engine.handle(InferenceRequest::new(TaskType::AnalyzeEmotion, "今天下雨")).await;

    let json = serde_json::to_value(&happy).expect("serialize");
    assert_eq!(json["result"]["mood"], "happy");
    assert!((json["result"]["happiness"].as_f64().expect("number") - 0.7).abs() < 1e-6);
    let json = serde_json::to_value(&plain).expect("serialize");
    assert_eq!(json["result"]["mood"], "calm");
}

// ---------------------------------------------------------------------------
// Keywords and unknown tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn keywords_are_bounded() {
    let (engine, _) = ready_engine(loader()).await;
    let text = (0..30).map(|i| format!("topic{i}")).collect::<Vec<_>>().join(" ");
    let result = engine.handle(InferenceRequest::new(TaskType::ExtractKeywords, text)).await;
    let Some(TaskPayload::Keywords(keywords)) = result.result else {
        panic!("expected keywords");
    };
    assert_eq!(keywords.len(), 10);
    assert_eq!(keywords[0], "topic0");
}

#[tokio::test]
async fn broken_extractor_falls_back_to_raw_tokens() {
    let mut loader = loader();
    loader.broken_keywords = true;
    let (engine, _) = ready_engine(loader).await;
    let result = engine
        .handle(InferenceRequest::new(TaskType::ExtractKeywords, "the cat sat on the mat"))
        .await;
    assert!(result.success);
    assert_eq!(
        result.result,
        Some(TaskPayload::Keywords(
            ["the", "cat", "sat", "on", "the", "mat"].iter().map(ToString::to_string).collect()
        ))
    );
}

#[tokio::test]
async fn slow_extractor_past_deadline_yields_raw_tokens() {
    let mut loader = loader();
    loader.keyword_delay = Some(Duration::from_millis(300));
    let mut config = NyraConfig::default();
    config.dispatch.request_timeout_ms = Some(20);
    let (engine, _) = ready_engine_with(config, loader).await;

    let result = engine
        .handle(InferenceRequest::new(TaskType::ExtractKeywords, "the cat sat on the mat"))
        .await;

    assert!(result.success);
    assert_eq!(
        result.result,
        Some(TaskPayload::Keywords(
            ["the", "cat", "sat", "on", "the", "mat"].iter().map(ToString::to_string).collect()
        ))
    );
}

#[tokio::test]
async fn unknown_task_type_is_rejected() {
    let (engine, _) = ready_engine(loader()).await;
    let request = InferenceRequest::from_json(r#"{"text":"x","task_type":"CalculateImportance"}"#)
        .expect("valid envelope");
    let result = engine.handle(request).await;
    assert_eq!(result.http_status(), 400);
    assert_eq!(result.error.as_deref(), Some("unsupported task type: CalculateImportance"));
}
