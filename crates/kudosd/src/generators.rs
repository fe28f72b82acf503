//! HTTP-backed asset generators.
//!
//! Each asset kind points at its own provider endpoint. The provider receives
//! the round context as JSON and answers with `{"text": ...}` or `{"url": ...}`.
//! Kinds without an endpoint fail immediately, which for text fails the round.

use async_trait::async_trait;
use kudos_common::config::GeneratorConfig;
use kudos_common::{AssetGenerator, AssetKind, GenerationError, GeneratorSet, RoundContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    kind: AssetKind,
    context: &'a RoundContext,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

pub struct HttpAssetGenerator {
    kind: AssetKind,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpAssetGenerator {
    pub fn new(kind: AssetKind, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            kind,
            endpoint: endpoint.to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AssetGenerator for HttpAssetGenerator {
    async fn generate(&self, context: &RoundContext) -> Result<String, GenerationError> {
        debug!(asset = %self.kind, endpoint = %self.endpoint, "Requesting asset");

        let mut request = self.client.post(&self.endpoint).json(&GenerateRequest {
            kind: self.kind,
            context,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::Provider(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider(format!(
                "{} answered {}: {}",
                self.kind,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Provider(format!("bad response body: {}", e)))?;

        // Text providers answer with text, media providers with a URL
        let value = match self.kind {
            AssetKind::Text => parsed.text.or(parsed.url),
            AssetKind::Voice | AssetKind::Image => parsed.url.or(parsed.text),
        };
        value
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| GenerationError::Provider(format!("{} response carried no asset", self.kind)))
    }
}

/// Stands in for a kind with no endpoint
pub struct UnconfiguredGenerator {
    kind: AssetKind,
}

impl UnconfiguredGenerator {
    pub fn new(kind: AssetKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl AssetGenerator for UnconfiguredGenerator {
    async fn generate(&self, _context: &RoundContext) -> Result<String, GenerationError> {
        Err(GenerationError::Unconfigured(self.kind))
    }
}

/// Build the generator set from config
pub fn build_generator_set(config: &GeneratorConfig) -> GeneratorSet {
    let api_key = config
        .api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .filter(|key| !key.is_empty());

    let build = |kind: AssetKind, endpoint: &Option<String>| -> Arc<dyn AssetGenerator> {
        match endpoint {
            Some(endpoint) => {
                info!("  {} generator: {}", kind, endpoint);
                Arc::new(HttpAssetGenerator::new(kind, endpoint, api_key.clone()))
            }
            None => {
                warn!("  {} generator not configured", kind);
                Arc::new(UnconfiguredGenerator::new(kind))
            }
        }
    };

    GeneratorSet::new(
        build(AssetKind::Text, &config.text_endpoint),
        build(AssetKind::Voice, &config.voice_endpoint),
        build(AssetKind::Image, &config.image_endpoint),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn context() -> RoundContext {
        RoundContext {
            user_id: "u1".into(),
            persona: "bard".into(),
            won: true,
            transcript: vec![],
            score: None,
            locale: None,
        }
    }

    /// Serve `app` on an ephemeral port and return its base URL
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_generator_reads_url() {
        let app = Router::new().route(
            "/image",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["kind"], "image");
                assert_eq!(body["context"]["persona"], "bard");
                Json(json!({ "url": "https://cdn/bard.png" }))
            }),
        );
        let base = serve(app).await;
        let generator =
            HttpAssetGenerator::new(AssetKind::Image, &format!("{}/image", base), None);
        let url = generator.generate(&context()).await.unwrap();
        assert_eq!(url, "https://cdn/bard.png");
    }

    #[tokio::test]
    async fn test_http_generator_reads_text() {
        let app = Router::new().route(
            "/text",
            post(|| async { Json(json!({ "text": "Bravo, bard." })) }),
        );
        let base = serve(app).await;
        let generator = HttpAssetGenerator::new(AssetKind::Text, &format!("{}/text", base), None);
        assert_eq!(generator.generate(&context()).await.unwrap(), "Bravo, bard.");
    }

    #[tokio::test]
    async fn test_http_generator_provider_error() {
        let app = Router::new().route(
            "/voice",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let base = serve(app).await;
        let generator = HttpAssetGenerator::new(AssetKind::Voice, &format!("{}/voice", base), None);
        let err = generator.generate(&context()).await.unwrap_err();
        match err {
            GenerationError::Provider(msg) => assert!(msg.contains("503"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_generator_empty_body() {
        let app = Router::new().route("/voice", post(|| async { Json(json!({})) }));
        let base = serve(app).await;
        let generator = HttpAssetGenerator::new(AssetKind::Voice, &format!("{}/voice", base), None);
        assert!(matches!(
            generator.generate(&context()).await,
            Err(GenerationError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_generator() {
        let set = build_generator_set(&GeneratorConfig::default());
        let err = set.get(AssetKind::Voice).generate(&context()).await.unwrap_err();
        assert_eq!(err, GenerationError::Unconfigured(AssetKind::Voice));
    }
}
