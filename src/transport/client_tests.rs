//! Tests for `ReqwestClient`.

use std::time::Duration;

use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

mod reqwest_client {
    use super::*;

    #[test]
    fn debug_format_is_readable() {
        let client = ReqwestClient::new();
        let debug = format!("{client:?}");

        assert!(debug.contains("ReqwestClient"));
    }

    #[test]
    fn with_settings_builds_client() {
        let client = ReqwestClient::with_settings(Duration::from_secs(5), "dest-registry/test");
        assert!(client.is_ok());
    }

    #[test]
    fn client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReqwestClient>();
    }

    #[tokio::test]
    async fn sends_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"foo":"bar"}"#))
            .respond_with(ResponseTemplate::new(202).set_body_string("queued"))
            .expect(1)
            .mount(&server)
            .await;

        let url = url::Url::parse(&format!("{}/hook", server.uri())).unwrap();
        let request = HttpRequest::post(url).with_json_body(br#"{"foo":"bar"}"#.to_vec());

        let response = ReqwestClient::new().request(request).await.unwrap();

        assert_eq!(response.status, ::http::StatusCode::ACCEPTED);
        assert_eq!(response.body_text(), Some("queued"));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client =
            ReqwestClient::with_settings(Duration::from_millis(100), "dest-registry/test").unwrap();
        let url = url::Url::parse(&server.uri()).unwrap();

        let result = client.request(HttpRequest::get(url)).await;

        assert!(matches!(result, Err(HttpError::Timeout)));
    }
}
