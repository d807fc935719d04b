//! Remote aspect classifier.
//!
//! The shell models are served out of process. Each aspect is one request:
//! `POST {base_url}/classify` with `{image_ref, aspect}`, answered by
//! `{label, confidence}`.

use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::debug;

use eggmart_grading::{Aspect, AspectClassifier, ClassifierError, RawLabel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image_ref: &'a str,
    aspect: Aspect,
}

/// HTTP client for the model server.
///
/// `AspectClassifier` is synchronous; calls block on the runtime the client
/// was built in and must run on a blocking thread (`spawn_blocking`).
#[derive(Debug, Clone)]
pub struct HttpAspectClassifier {
    client: reqwest::Client,
    base_url: String,
    runtime: Handle,
}

impl HttpAspectClassifier {
    /// Must be called from inside a tokio runtime.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let runtime = Handle::try_current()
            .map_err(|e| ClassifierError::Unavailable(format!("no async runtime: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClassifierError::Unavailable(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            runtime,
        })
    }

    async fn request(&self, image_ref: &str, aspect: Aspect) -> Result<RawLabel, ClassifierError> {
        let inference = |reason: String| ClassifierError::Inference { aspect, reason };

        let response = self
            .client
            .post(format!("{}/classify", self.base_url))
            .json(&ClassifyRequest { image_ref, aspect })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ClassifierError::Unavailable(e.to_string())
                } else {
                    inference(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(inference(format!("model server returned {status}: {body}")));
        }

        let label: RawLabel = response.json().await.map_err(|e| inference(e.to_string()))?;
        debug!(%aspect, label = %label.label, confidence = label.confidence, "aspect classified");
        Ok(label)
    }
}

impl AspectClassifier for HttpAspectClassifier {
    fn classify(&self, image_ref: &str, aspect: Aspect) -> Result<RawLabel, ClassifierError> {
        self.runtime.block_on(self.request(image_ref, aspect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ClassifierConfig {
        ClassifierConfig {
            base_url: base_url.to_string(),
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn needs_a_runtime() {
        assert!(matches!(
            HttpAspectClassifier::new(&config("http://models.local")),
            Err(ClassifierError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn trailing_slashes_are_trimmed() {
        let classifier = HttpAspectClassifier::new(&config("http://models.local/")).unwrap();
        assert_eq!(classifier.base_url, "http://models.local");
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(ClassifyRequest {
            image_ref: "uploads/egg.jpg",
            aspect: Aspect::Integrity,
        })
        .unwrap();
        assert_eq!(body["image_ref"], "uploads/egg.jpg");
        assert_eq!(body["aspect"], "integrity");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unreachable_server_fails_the_aspect() {
        // Port 9 (discard) is closed on test hosts.
        let classifier = HttpAspectClassifier::new(&config("http://127.0.0.1:9")).unwrap();
        let result = tokio::task::spawn_blocking(move || classifier.classify("uploads/egg.jpg", Aspect::Color))
            .await
            .unwrap();
        assert!(result.is_err());
    }
}
