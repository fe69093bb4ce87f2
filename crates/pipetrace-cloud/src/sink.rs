//! Core sink and key validator backed by the logging service

use crate::client::HttpClient;
use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use async_trait::async_trait;
use pipetrace_core::{ApiKeyValidator, ConfigError, RemoteSink, SinkRecord, SinkResult};
use tracing::trace;

/// POSTs every record to the configured events URL
pub struct CloudSink {
    http: HttpClient,
    log_events_url: String,
}

impl CloudSink {
    pub fn new(config: &CloudConfig) -> CloudResult<Self> {
        let log_events_url = config
            .log_events_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| CloudError::Config("log_events_url is not set".to_string()))?;

        Ok(Self {
            http: HttpClient::new(&config.api_endpoint, config.timeout())?,
            log_events_url,
        })
    }

    pub fn log_events_url(&self) -> &str {
        &self.log_events_url
    }
}

#[async_trait]
impl RemoteSink for CloudSink {
    fn name(&self) -> &str {
        "cloud"
    }

    async fn send(&self, record: &SinkRecord) -> SinkResult<()> {
        trace!("POST {} event {}", record.event_type, record.event_id);
        self.http
            .log_event(&self.log_events_url, record)
            .await
            .map_err(Into::into)
    }
}

/// Resolves API keys against the service's auth endpoint
pub struct ApiKeyAuthenticator {
    http: HttpClient,
}

impl ApiKeyAuthenticator {
    pub fn new(config: &CloudConfig) -> CloudResult<Self> {
        Ok(Self {
            http: HttpClient::new(&config.api_endpoint, config.timeout())?,
        })
    }
}

#[async_trait]
impl ApiKeyValidator for ApiKeyAuthenticator {
    async fn validate(&self, api_key: &str) -> Result<String, ConfigError> {
        self.http.validate_api_key(api_key).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipetrace_core::{
        CallbackHandler, EventRecord, EventType, HandlerSettings, SessionContext, SinkError,
        SinkForwarder,
    };
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> CloudConfig {
        CloudConfig {
            api_endpoint: server.uri(),
            log_events_url: Some(format!("{}/v1/events", server.uri())),
            timeout_ms: 5_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let err = CloudSink::new(&CloudConfig::default()).err().unwrap();
        assert!(matches!(err, CloudError::Config(_)));

        let blank = CloudConfig {
            log_events_url: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(CloudSink::new(&blank).is_err());
    }

    #[tokio::test]
    async fn test_send_posts_full_record() {
        let server = MockServer::start().await;
        let event = EventRecord::with_time(
            EventType::Query,
            Some(json!({"q": "hello"})),
            "e1",
            "2024-01-01 00:00:00.000000",
        );
        let record = SinkRecord::from_event(&event, "root", &SessionContext::default());

        Mock::given(method("POST"))
            .and(path("/v1/events"))
            .and(body_json(json!({
                "user_id": null,
                "session_id": null,
                "trace_type": null,
                "event_type": "query",
                "parent_id": "root",
                "event_id": "e1",
                "event_time": "2024-01-01 00:00:00.000000",
                "event_payload": {"q": "hello"}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = CloudSink::new(&config(&server)).unwrap();
        sink.send(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_maps_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = CloudSink::new(&config(&server)).unwrap();
        let event = EventRecord::new(EventType::Llm, None, "e1");
        let record = SinkRecord::from_event(&event, "", &SessionContext::default());

        let err = sink.send(&record).await.unwrap_err();
        assert!(matches!(err, SinkError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_authenticator() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_id": "u-1"})))
            .mount(&server)
            .await;

        let auth = ApiKeyAuthenticator::new(&config(&server)).unwrap();
        assert_eq!(auth.validate("k").await.unwrap(), "u-1");
    }

    #[tokio::test]
    async fn test_authenticator_rejection_is_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let auth = ApiKeyAuthenticator::new(&config(&server)).unwrap();
        let err = auth.validate("k").await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidApiKey(_)));
    }

    #[tokio::test]
    async fn test_handler_mirrors_through_cloud_sink() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_id": "u-9"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/events"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let cfg = config(&server);
        let sink: Arc<dyn RemoteSink> = Arc::new(CloudSink::new(&cfg).unwrap());
        let mut handler = CallbackHandler::new(HandlerSettings::default())
            .with_forwarder(SinkForwarder::spawn(sink, 16));

        let auth = ApiKeyAuthenticator::new(&cfg).unwrap();
        handler.set_api_key(Some("k"), &auth).await.unwrap();

        handler.on_event_start(EventType::Llm, None, "e1", "root");
        handler.on_event_end(EventType::Llm, None, "e1");

        let stats = handler.take_forwarder().unwrap().shutdown().await;
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.failed, 0);
    }
}
