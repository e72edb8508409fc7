use async_trait::async_trait;
use reqwest::Client;

use crate::{
    config::OpenAiConfig,
    domain::{Decision, PostContent, Settings},
};

use super::{
    inference::{build_request, parse_completion},
    ClassifyError, Classifier,
};

#[derive(Clone)]
pub struct OpenAiClassifier {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiClassifier {
    pub fn new(http: Client, config: OpenAiConfig) -> Self {
        Self { http, config }
    }

    pub async fn try_classify(
        &self,
        post: &PostContent,
        settings: &Settings,
    ) -> Result<Decision, ClassifyError> {
        if settings.api_key.is_empty() {
            return Err(ClassifyError::MissingCredential);
        }

        let request = build_request(&self.config.model, &settings.filter_condition, post);
        let response = self
            .http
            .post(self.config.api_url.clone())
            .bearer_auth(&settings.api_key)
            .timeout(self.config.request_timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Status(status));
        }

        let body = response.text().await?;
        parse_completion(&body)
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, post: &PostContent, settings: &Settings) -> Decision {
        match self.try_classify(post, settings).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::error!(
                    target: "classifier",
                    error = %err,
                    author = %post.author,
                    "classification failed; keeping post"
                );
                Decision::Keep
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server};
    use serde_json::json;
    use url::Url;

    use super::*;

    fn classifier(server: &Server) -> OpenAiClassifier {
        let config = OpenAiConfig {
            api_url: Url::parse(&format!("{}/v1/chat/completions", server.url())).unwrap(),
            model: "gpt-4o-mini-2024-07-18".to_string(),
            request_timeout: Duration::from_secs(5),
        };
        OpenAiClassifier::new(Client::new(), config)
    }

    fn settings() -> Settings {
        Settings {
            api_key: "sk-test".to_string(),
            filter_condition: "remove posts about sports".to_string(),
            is_enabled: true,
        }
    }

    fn verdict_body(keep: bool) -> String {
        let content = json!({ "keep_tweet": keep }).to_string();
        json!({ "choices": [{ "message": { "content": content } }] }).to_string()
    }

    #[tokio::test]
    async fn sends_one_authenticated_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini-2024-07-18",
                "response_format": { "type": "json_schema" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(verdict_body(false))
            .expect(1)
            .create_async()
            .await;

        let post = PostContent::new("alice", "The game last night was incredible");
        let decision = classifier(&server).classify(&post, &settings()).await;

        assert_eq!(decision, Decision::Remove);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_keeps_post() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let client = classifier(&server);
        let post = PostContent::new("bob", "hello");
        assert!(matches!(
            client.try_classify(&post, &settings()).await,
            Err(ClassifyError::Status(status)) if status.as_u16() == 500
        ));
        assert_eq!(client.classify(&post, &settings()).await, Decision::Keep);
    }

    #[tokio::test]
    async fn malformed_content_keeps_post() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(json!({ "choices": [{ "message": { "content": "maybe" } }] }).to_string())
            .create_async()
            .await;

        let post = PostContent::new("bob", "hello");
        assert_eq!(
            classifier(&server).classify(&post, &settings()).await,
            Decision::Keep
        );
    }

    #[tokio::test]
    async fn missing_key_never_hits_the_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let mut settings = settings();
        settings.api_key.clear();
        let post = PostContent::new("bob", "hello");
        let client = classifier(&server);

        assert!(matches!(
            client.try_classify(&post, &settings).await,
            Err(ClassifyError::MissingCredential)
        ));
        assert_eq!(client.classify(&post, &settings).await, Decision::Keep);
        mock.assert_async().await;
    }
}
