mod harness;

use std::time::Duration;

use axum::http::StatusCode;
use harness::complete;
use harness::mock_provider::{MockProvider, Reply, chat_completion, embeddings, envelope};
use modelgate_config::ProviderType;
use modelgate_runtime::provider::{AZURE_OPENAI, ProviderProfile, Timeouts};
use modelgate_runtime::{Credentials, InvokeRequest, LargeLanguageModel, LlmError, PromptMessage, TextEmbeddingModel};
use serde_json::{Value, json};

fn compatible(mock: &MockProvider) -> Credentials {
    Credentials::new()
        .with("endpoint_url", mock.base_url())
        .with("api_key", "sk-test")
}

fn azure(mock: &MockProvider) -> Credentials {
    Credentials::new()
        .with("openai_api_key", "k")
        .with("openai_api_base", mock.root_url())
}

fn validation_message(err: LlmError) -> String {
    match err {
        LlmError::CredentialsValidation(message) => message,
        other => panic!("expected a validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn compatible_validation_accepts_expected_object() {
    let mock = MockProvider::start(Reply::ok(envelope(chat_completion("m", "pong"))))
        .await
        .unwrap();
    let llm = LargeLanguageModel::new(ProviderType::OpenaiCompatible).unwrap();

    llm.validate_credentials("m", &compatible(&mock)).await.unwrap();

    let sent = mock.last_request();
    assert_eq!(sent.body["max_tokens"], 5);
    assert_eq!(sent.body["stream"], false);
    assert_eq!(sent.body["sceneId"], "sk-test");
    assert_eq!(sent.body["messages"], json!([{"role": "user", "content": "ping"}]));
}

#[tokio::test]
async fn compatible_completion_validation_expects_text_completion() {
    let mock = MockProvider::start(Reply::ok(json!({"object": "chat.completion", "choices": []})))
        .await
        .unwrap();
    let llm = LargeLanguageModel::new(ProviderType::OpenaiCompatible).unwrap();
    let credentials = compatible(&mock).with("mode", "completion");

    let err = llm.validate_credentials("m", &credentials).await.unwrap_err();
    assert_eq!(
        validation_message(err),
        "Credentials validation failed: invalid response object, must be 'text_completion'"
    );
    assert_eq!(mock.last_request().body["prompt"], "ping");
}

#[tokio::test]
async fn compatible_validation_reports_status() {
    let mock = MockProvider::start(Reply::Text(StatusCode::UNAUTHORIZED, "bad key".to_owned()))
        .await
        .unwrap();
    let llm = LargeLanguageModel::new(ProviderType::OpenaiCompatible).unwrap();

    let err = llm.validate_credentials("m", &compatible(&mock)).await.unwrap_err();
    assert_eq!(validation_message(err), "Credentials validation failed with status code 401");
}

#[tokio::test]
async fn compatible_validation_rejects_non_json() {
    let mock = MockProvider::start(Reply::Text(StatusCode::OK, "<html>".to_owned()))
        .await
        .unwrap();
    let llm = LargeLanguageModel::new(ProviderType::OpenaiCompatible).unwrap();

    let err = llm.validate_credentials("m", &compatible(&mock)).await.unwrap_err();
    assert_eq!(validation_message(err), "Credentials validation failed: JSON decode error");
}

#[tokio::test]
async fn compatible_validation_surfaces_envelope_error() {
    let mock = MockProvider::start(Reply::ok(json!({"errorCode": 4010, "errorMessage": "scene expired"})))
        .await
        .unwrap();
    let llm = LargeLanguageModel::new(ProviderType::OpenaiCompatible).unwrap();

    let message = validation_message(llm.validate_credentials("m", &compatible(&mock)).await.unwrap_err());
    assert!(message.starts_with("Credentials validation failed: http error"));
    assert!(message.contains("scene expired"));
}

#[tokio::test]
async fn compatible_validation_unreachable_endpoint() {
    let llm = LargeLanguageModel::new(ProviderType::OpenaiCompatible).unwrap();
    let credentials = Credentials::new().with("endpoint_url", "http://127.0.0.1:1/v1");

    let message = validation_message(llm.validate_credentials("m", &credentials).await.unwrap_err());
    assert!(message.starts_with("An error occurred during credentials validation:"));
}

#[tokio::test]
async fn missing_endpoint_is_configuration_error() {
    let llm = LargeLanguageModel::new(ProviderType::OpenaiCompatible).unwrap();

    let err = llm.validate_credentials("m", &Credentials::new()).await.unwrap_err();
    assert!(matches!(err, LlmError::Configuration(_)));
}

#[tokio::test]
async fn azure_ping_succeeds() {
    let mock = MockProvider::start(Reply::ok(chat_completion("gpt-4", "pong"))).await.unwrap();
    let llm = LargeLanguageModel::new(ProviderType::AzureOpenai).unwrap();

    llm.validate_credentials("deploy", &azure(&mock)).await.unwrap();

    let sent = mock.last_request();
    assert_eq!(sent.body["max_tokens"], 20);
    assert_eq!(sent.body["temperature"], 0);
    assert_eq!(sent.body["messages"][0]["content"], "ping");
}

#[tokio::test]
async fn azure_rejection_names_error_class() {
    let mock = MockProvider::start(Reply::Json(
        StatusCode::UNAUTHORIZED,
        json!({"error": {"message": "Access denied due to invalid subscription key"}}),
    ))
    .await
    .unwrap();
    let llm = LargeLanguageModel::new(ProviderType::AzureOpenai).unwrap();

    let message = validation_message(llm.validate_credentials("deploy", &azure(&mock)).await.unwrap_err());
    assert!(message.starts_with("AuthorizationError:"), "{message}");
    assert!(message.contains("invalid subscription key"));
}

#[tokio::test]
async fn tuya_without_scene_fails_validation_before_any_call() {
    let mock = MockProvider::start(Reply::ok(chat_completion("gpt-4", "pong"))).await.unwrap();

    let llm = LargeLanguageModel::new(ProviderType::TuyaOpenai).unwrap();
    let message = validation_message(llm.validate_credentials("gpt-4", &azure(&mock)).await.unwrap_err());
    assert!(message.contains("scene_id"), "{message}");

    let embedding = TextEmbeddingModel::new(ProviderType::TuyaOpenai).unwrap();
    let message = validation_message(embedding.validate_credentials("emb", &azure(&mock)).await.unwrap_err());
    assert!(message.contains("scene_id"), "{message}");

    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn compatible_validation_sends_null_scene_without_key() {
    let mock = MockProvider::start(Reply::ok(chat_completion("m", "pong"))).await.unwrap();
    let llm = LargeLanguageModel::new(ProviderType::OpenaiCompatible).unwrap();
    let credentials = Credentials::new().with("endpoint_url", mock.base_url());

    llm.validate_credentials("m", &credentials).await.unwrap();

    let sent = mock.last_request();
    assert_eq!(sent.body.get("sceneId"), Some(&Value::Null));
    assert!(!sent.headers.contains_key("authorization"));
}

/// Azure profile whose validation calls give up after a fraction of a second
fn azure_with_quick_validation() -> &'static ProviderProfile {
    Box::leak(Box::new(ProviderProfile {
        timeouts: Timeouts {
            validation: Duration::from_millis(300),
            ..AZURE_OPENAI.timeouts
        },
        ..AZURE_OPENAI
    }))
}

#[tokio::test]
async fn silent_provider_fails_validation_quickly() {
    let mock = MockProvider::start(Reply::Delayed(
        Duration::from_secs(30),
        Box::new(Reply::ok(chat_completion("gpt-4", "pong"))),
    ))
    .await
    .unwrap();
    let llm = LargeLanguageModel::with_profile(azure_with_quick_validation()).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), llm.validate_credentials("deploy", &azure(&mock)))
        .await
        .expect("validation should give up at the validation limit")
        .unwrap_err();

    let message = validation_message(err);
    assert!(message.starts_with("ConnectionError:"), "{message}");
}

#[tokio::test]
async fn silent_provider_fails_embedding_validation_quickly() {
    let mock = MockProvider::start(Reply::Delayed(Duration::from_secs(30), Box::new(Reply::ok(embeddings(&[0.5])))))
        .await
        .unwrap();
    let model = TextEmbeddingModel::with_profile(azure_with_quick_validation()).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), model.validate_credentials("emb", &azure(&mock)))
        .await
        .expect("validation should give up at the validation limit")
        .unwrap_err();

    assert!(validation_message(err).starts_with("ConnectionError:"));
}

#[tokio::test]
async fn validation_limit_does_not_apply_to_invocations() {
    let mock = MockProvider::start(Reply::Delayed(
        Duration::from_secs(1),
        Box::new(Reply::ok(chat_completion("gpt-4", "slow but fine"))),
    ))
    .await
    .unwrap();
    let llm = LargeLanguageModel::with_profile(azure_with_quick_validation()).unwrap();

    let request = InvokeRequest::new("deploy", azure(&mock), vec![PromptMessage::user("hi")]);
    let result = complete(llm.invoke(&request).await.unwrap());
    assert_eq!(result.message.content, "slow but fine");
}

#[tokio::test]
async fn embedding_validation_embeds_ping() {
    let mock = MockProvider::start(Reply::ok(embeddings(&[0.25]))).await.unwrap();
    let model = TextEmbeddingModel::new(ProviderType::OpenaiCompatible).unwrap();

    model
        .validate_credentials("text-embedding-3-small", &compatible(&mock))
        .await
        .unwrap();
    assert_eq!(mock.last_request().body["input"], json!(["ping"]));
}

#[tokio::test]
async fn embedding_validation_wraps_failures() {
    let mock = MockProvider::start(Reply::Text(StatusCode::BAD_GATEWAY, "upstream down".to_owned()))
        .await
        .unwrap();
    let model = TextEmbeddingModel::new(ProviderType::AzureOpenai).unwrap();

    let message = validation_message(model.validate_credentials("emb", &azure(&mock)).await.unwrap_err());
    assert!(message.starts_with("ServerUnavailableError:"), "{message}");
}
