mod harness;

use harness::mock_provider::{MockProvider, Reply, embeddings, envelope};
use modelgate_config::ProviderType;
use modelgate_runtime::types::EmbeddingUsage;
use modelgate_runtime::{Credentials, LlmError, TextEmbeddingModel, TokenEstimator};
use serde_json::json;

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[tokio::test]
async fn compatible_embeds_in_one_batch() {
    let mock = MockProvider::start(Reply::ok(envelope(embeddings(&[0.5, 1.0]))))
        .await
        .unwrap();
    let model = TextEmbeddingModel::new(ProviderType::OpenaiCompatible).unwrap();
    let credentials = Credentials::new()
        .with("endpoint_url", mock.base_url())
        .with("api_key", "sk");

    let result = model
        .invoke("text-embedding-3-small", &credentials, &texts(&["a", "b"]), Some("u1"))
        .await
        .unwrap();

    assert_eq!(result.embeddings, vec![vec![0.5, 1.0], vec![1.0, 2.0]]);
    assert_eq!(result.usage, EmbeddingUsage { tokens: 4, total_tokens: 4 });
    assert_eq!(mock.request_count(), 1);

    let sent = mock.last_request();
    assert_eq!(sent.uri, "/v1/embeddings");
    assert_eq!(sent.body["input"], json!(["a", "b"]));
    assert_eq!(sent.body["sceneId"], "sk");
    assert_eq!(sent.body["user"], "u1");
}

#[tokio::test]
async fn out_of_order_vectors_are_sorted() {
    let body = json!({
        "data": [
            {"index": 1, "embedding": [2.0]},
            {"index": 0, "embedding": [1.0]},
        ],
    });
    let mock = MockProvider::start(Reply::ok(body)).await.unwrap();
    let model = TextEmbeddingModel::new(ProviderType::OpenaiCompatible).unwrap();
    let credentials = Credentials::new().with("endpoint_url", mock.base_url());

    let result = model
        .invoke("emb", &credentials, &texts(&["first", "second"]), None)
        .await
        .unwrap();

    assert_eq!(result.embeddings, vec![vec![1.0], vec![2.0]]);
    let estimator = TokenEstimator::shared();
    let expected = u32::try_from(estimator.count("first") + estimator.count("second")).unwrap();
    assert_eq!(result.usage.tokens, expected);
}

#[tokio::test]
async fn tuya_sends_one_text_per_request_and_sums_usage() {
    let reply = Reply::ok(json!({
        "errorCode": 200,
        "data": {
            "data": [{"index": 0, "embedding": [0.1, 0.2]}],
            "usage": {"prompt_tokens": "3", "total_tokens": "3"},
        },
    }));
    let mock = MockProvider::start(reply).await.unwrap();
    let model = TextEmbeddingModel::new(ProviderType::TuyaOpenai).unwrap();
    let credentials = Credentials::new()
        .with("openai_api_key", "k")
        .with("openai_api_base", mock.root_url())
        .with("scene_id", "s-1");

    let result = model
        .invoke("text-embedding-3-small", &credentials, &texts(&["x", "y", "z"]), None)
        .await
        .unwrap();

    assert_eq!(result.embeddings.len(), 3);
    assert_eq!(result.usage, EmbeddingUsage { tokens: 9, total_tokens: 9 });
    assert_eq!(mock.request_count(), 3);

    let inputs: Vec<_> = mock.requests().into_iter().map(|r| r.body["input"].clone()).collect();
    assert_eq!(inputs, vec![json!("x"), json!("y"), json!("z")]);
    assert!(
        mock.last_request()
            .uri
            .starts_with("/openai/deployments/text-embedding-3-small/embeddings?api-version=")
    );
}

#[tokio::test]
async fn unsuccessful_envelope_fails() {
    let mock = MockProvider::start(Reply::ok(json!({"success": false, "errorCode": "E1", "errorMessage": "quota"})))
        .await
        .unwrap();
    let model = TextEmbeddingModel::new(ProviderType::OpenaiCompatible).unwrap();
    let credentials = Credentials::new().with("endpoint_url", mock.base_url());

    let err = model
        .invoke("emb", &credentials, &texts(&["a"]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Invoke { .. }));
    assert!(err.to_string().contains("quota"));
}

#[tokio::test]
async fn vector_count_mismatch_fails() {
    let mock = MockProvider::start(Reply::ok(embeddings(&[0.5]))).await.unwrap();
    let model = TextEmbeddingModel::new(ProviderType::OpenaiCompatible).unwrap();
    let credentials = Credentials::new().with("endpoint_url", mock.base_url());

    let err = model
        .invoke("emb", &credentials, &texts(&["a", "b"]), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("expected 2 embeddings"));
}
