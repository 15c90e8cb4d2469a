//! End-to-end tests over real HTTP
//!
//! These tests run `RestfulClient` with its default `ReqwestTransport`
//! against a wiremock server.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::RestfulClient;
    use crate::config::{ServiceConfig, DEFAULT_USER_AGENT};
    use crate::core::RequestOptions;
    use crate::reporting::{MemoryReporter, REST_ERROR};

    fn client_for(server: &MockServer, config: ServiceConfig) -> (RestfulClient, Arc<MemoryReporter>) {
        let reporter = Arc::new(MemoryReporter::new());
        let client = RestfulClient::builder()
            .service_config("echo", config.clone())
            .service_config("bounce", config)
            .reporter(reporter.clone())
            .build()
            .unwrap();

        assert_eq!(client.service_url("echo").unwrap(), server.uri());
        (client, reporter)
    }

    #[tokio::test]
    async fn test_get_sends_default_headers_and_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/posts"))
            .and(header("Accept", "application/json"))
            .and(header("User-Agent", DEFAULT_USER_AGENT))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
            .expect(1)
            .mount(&server)
            .await;

        let (client, reporter) = client_for(&server, ServiceConfig::new(server.uri()));
        let posts = assert_ok!(
            client
                .get("echo", "/api/v1/posts", RequestOptions::new().query("page", "2"))
                .await
        );

        assert_eq!(posts, Some(json!([{"id": 1}, {"id": 2}])));
        assert!(reporter.is_empty());
    }

    #[tokio::test]
    async fn test_post_structured_payload_round_trip() {
        let server = MockServer::start().await;
        let payload = json!({"first_name": "Avner", "tags": ["a", "b"]});

        Mock::given(method("POST"))
            .and(path("/bounce"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(201).set_body_json(&payload))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, ServiceConfig::new(server.uri()));
        let echoed = assert_ok!(client.post("bounce", "bounce", payload.clone(), RequestOptions::new()).await);

        assert_eq!(echoed, Some(payload));
    }

    #[tokio::test]
    async fn test_put_raw_payload_and_custom_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/items/7"))
            .and(header("Content-Type", "text/plain"))
            .and(body_string("raw body"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, ServiceConfig::new(server.uri()));
        let result = client
            .put(
                "echo",
                "/items/7",
                "raw body",
                RequestOptions::new().header("Content-Type", "text/plain"),
            )
            .await;

        assert_eq!(assert_ok!(result), None);
    }

    #[tokio::test]
    async fn test_delete_with_payload() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/items/7"))
            .and(body_json(json!({"reason": "spam"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": true})))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, ServiceConfig::new(server.uri()));
        let result = client
            .delete("echo", "items/7", json!({"reason": "spam"}), RequestOptions::new())
            .await;

        assert_eq!(assert_ok!(result), Some(json!({"deleted": true})));
    }

    #[tokio::test]
    async fn test_slow_service_times_out_after_retries() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(3)
            .mount(&server)
            .await;

        let config = ServiceConfig::new(server.uri())
            .timeout(Duration::from_millis(100))
            .max_retries(2);
        let (client, reporter) = client_for(&server, config);

        let err = assert_err!(client.get("echo", "slow", RequestOptions::new()).await);

        assert!(err.is_timeout());
        assert_eq!(reporter.count(REST_ERROR), 3);
    }

    #[tokio::test]
    async fn test_slow_post_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(1)
            .mount(&server)
            .await;

        let config = ServiceConfig::new(server.uri())
            .timeout(Duration::from_millis(100))
            .max_retries(2);
        let (client, _) = client_for(&server, config);

        let err = assert_err!(client.post("echo", "slow", json!({"a": 1}), RequestOptions::new()).await);
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_server_error_is_reported_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let (client, reporter) = client_for(&server, ServiceConfig::new(server.uri()).max_retries(3));
        let err = assert_err!(client.get("echo", "broken", RequestOptions::new()).await);

        assert_eq!(err.status_code(), Some(503));
        assert_eq!(reporter.count(REST_ERROR), 1);
        assert!(reporter.events()[0].description.starts_with("BadReturnCode 503/ok for: GET"));
    }

    #[tokio::test]
    async fn test_not_found_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;

        let (client, reporter) = client_for(&server, ServiceConfig::new(server.uri()));

        assert_eq!(assert_ok!(client.get("echo", "missing", RequestOptions::new()).await), None);
        assert!(reporter.is_empty());
    }

    #[tokio::test]
    async fn test_connection_refused_is_http_error() {
        let reporter = Arc::new(MemoryReporter::new());
        let client = RestfulClient::builder()
            .service("gone", "http://127.0.0.1:1")
            .reporter(reporter.clone())
            .build()
            .unwrap();

        let err = assert_err!(client.get("gone", "anything", RequestOptions::new()).await);

        assert_eq!(err.kind(), "HttpError");
        assert_eq!(reporter.count(REST_ERROR), 1);
    }
}
