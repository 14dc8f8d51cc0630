//! Tests for [`HttpMessageProcessor`].
//!
//! Request construction is checked on the built `reqwest::Request`; outcome
//! handling is checked against a `wiremock` endpoint.

use super::*;
use crate::events::MemoryEventSink;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(url: &str) -> ConfigurationEntry {
    ConfigurationEntry::new("orders", url)
}

fn no_attributes() -> HashMap<String, String> {
    HashMap::new()
}

fn body_text(request: &reqwest::Request) -> Option<String> {
    request
        .body()
        .and_then(|b| b.as_bytes())
        .map(|b| String::from_utf8_lossy(b).into_owned())
}

// ============================================================================
// GET request construction
// ============================================================================

mod get_request_tests {
    use super::*;

    #[test]
    fn test_json_properties_become_query_parameters() {
        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            use_get: true,
            ..config("https://example.com/lookup")
        };

        let request = processor
            .build_request(r#"{"a":"1","b":"2"}"#, &no_attributes(), &configuration)
            .unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.url().path(), "/lookup");
        assert_eq!(request.url().query(), Some("a=1&b=2"));
        assert!(request.body().is_none());
    }

    #[test]
    fn test_query_parameters_keep_message_order() {
        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            use_get: true,
            ..config("https://example.com/lookup")
        };

        let request = processor
            .build_request(r#"{"b":"2","a":"1"}"#, &no_attributes(), &configuration)
            .unwrap();

        assert_eq!(request.url().query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_non_string_values_use_json_text() {
        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            use_get: true,
            ..config("https://example.com/lookup")
        };

        let request = processor
            .build_request(r#"{"n":5,"flag":true}"#, &no_attributes(), &configuration)
            .unwrap();

        assert_eq!(request.url().query(), Some("n=5&flag=true"));
    }

    #[test]
    fn test_existing_url_query_is_kept() {
        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            use_get: true,
            ..config("https://example.com/lookup?source=queue")
        };

        let request = processor
            .build_request(r#"{"a":"1"}"#, &no_attributes(), &configuration)
            .unwrap();

        assert_eq!(request.url().query(), Some("source=queue&a=1"));
    }

    #[test]
    fn test_malformed_content_degrades_to_parameterless_get() {
        let events = Arc::new(MemoryEventSink::new());
        let processor = HttpMessageProcessor::with_event_sink(events.clone());
        let configuration = ConfigurationEntry {
            use_get: true,
            ..config("https://example.com/lookup")
        };

        let request = processor
            .build_request("not-json", &no_attributes(), &configuration)
            .expect("malformed GET content must not fail the request");

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.url().query(), None);
        assert!(request.body().is_none());

        let warnings: Vec<_> = events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RedriveEvent::MalformedGetContent { content, url, .. } => Some((content, url)),
                _ => None,
            })
            .collect();
        assert_eq!(
            warnings,
            vec![(
                "not-json".to_string(),
                "https://example.com/lookup".to_string()
            )]
        );
    }

    #[test]
    fn test_json_array_is_treated_as_malformed() {
        let events = Arc::new(MemoryEventSink::new());
        let processor = HttpMessageProcessor::with_event_sink(events.clone());
        let configuration = ConfigurationEntry {
            use_get: true,
            ..config("https://example.com/lookup")
        };

        let request = processor
            .build_request(r#"["a","b"]"#, &no_attributes(), &configuration)
            .unwrap();

        assert_eq!(request.url().query(), None);
        assert_eq!(
            events.count(|e| matches!(e, RedriveEvent::MalformedGetContent { .. })),
            1
        );
    }
}

// ============================================================================
// Body request construction
// ============================================================================

mod body_request_tests {
    use super::*;

    #[test]
    fn test_default_is_post_with_raw_json_body() {
        let processor = HttpMessageProcessor::new();
        let content = r#"{"order": 42, "note": "leave at door"}"#;

        let request = processor
            .build_request(content, &no_attributes(), &config("https://example.com/hooks"))
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(body_text(&request).as_deref(), Some(content));
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_non_json_content_is_still_sent_verbatim() {
        let processor = HttpMessageProcessor::new();

        let request = processor
            .build_request("plain text", &no_attributes(), &config("https://example.com/hooks"))
            .unwrap();

        assert_eq!(body_text(&request).as_deref(), Some("plain text"));
    }

    #[test]
    fn test_put_flag_uses_put() {
        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            use_put: true,
            ..config("https://example.com/hooks")
        };

        let request = processor
            .build_request("{}", &no_attributes(), &configuration)
            .unwrap();

        assert_eq!(request.method(), Method::PUT);
    }

    #[test]
    fn test_delete_wins_over_put() {
        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            use_put: true,
            use_delete: true,
            ..config("https://example.com/hooks")
        };

        let request = processor
            .build_request("{}", &no_attributes(), &configuration)
            .unwrap();

        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(body_text(&request).as_deref(), Some("{}"));
    }

    #[test]
    fn test_invalid_url_fails() {
        let processor = HttpMessageProcessor::new();

        let result = processor.build_request("{}", &no_attributes(), &config("not a url"));

        assert!(matches!(result, Err(ProcessingError::InvalidUrl { .. })));
    }
}

// ============================================================================
// Authentication and attribute headers
// ============================================================================

mod header_tests {
    use super::*;

    #[test]
    fn test_all_credentials_are_applied_together() {
        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            aws_gateway_token: Some("gw-key".to_string()),
            auth_token: Some("Bearer abc".to_string()),
            basic_auth_user_name: Some("svc".to_string()),
            basic_auth_password: Some("hunter2".to_string()),
            ..config("https://example.com/hooks")
        };

        let request = processor
            .build_request("{}", &no_attributes(), &configuration)
            .unwrap();

        assert_eq!(request.headers().get(API_KEY_HEADER).unwrap(), "gw-key");

        let authorization: Vec<_> = request
            .headers()
            .get_all(AUTHORIZATION)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(authorization.contains(&"Bearer abc".to_string()));
        assert!(authorization.contains(&"Basic c3ZjOmh1bnRlcjI=".to_string()));
    }

    #[test]
    fn test_no_credentials_means_no_auth_headers() {
        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            basic_auth_user_name: Some("svc".to_string()),
            ..config("https://example.com/hooks")
        };

        let request = processor
            .build_request("{}", &no_attributes(), &configuration)
            .unwrap();

        assert!(request.headers().get(API_KEY_HEADER).is_none());
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_attributes_are_forwarded_as_headers() {
        let processor = HttpMessageProcessor::new();
        let attributes = HashMap::from([("k".to_string(), "v".to_string())]);

        let request = processor
            .build_request("{}", &attributes, &config("https://example.com/hooks"))
            .unwrap();

        assert_eq!(request.headers().get("k").unwrap(), "v");
    }

    #[test]
    fn test_invalid_attribute_value_names_the_attribute() {
        let processor = HttpMessageProcessor::new();
        let attributes = HashMap::from([("x-trace".to_string(), "a\nb".to_string())]);

        let result =
            processor.build_request("{}", &attributes, &config("https://example.com/hooks"));

        match result {
            Err(ProcessingError::InvalidRequest { message }) => {
                assert!(message.contains("x-trace"), "unexpected message: {}", message);
            }
            other => panic!("expected InvalidRequest, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_invalid_attribute_name_names_the_attribute() {
        let processor = HttpMessageProcessor::new();
        let attributes = HashMap::from([("bad header".to_string(), "v".to_string())]);

        let result =
            processor.build_request("{}", &attributes, &config("https://example.com/hooks"));

        assert!(matches!(
            result,
            Err(ProcessingError::InvalidRequest { ref message }) if message.contains("bad header")
        ));
    }

    #[test]
    fn test_empty_attribute_keys_and_values_are_skipped() {
        let processor = HttpMessageProcessor::new();
        let attributes = HashMap::from([
            (String::new(), "x".to_string()),
            ("k".to_string(), String::new()),
        ]);

        let request = processor
            .build_request("{}", &attributes, &config("https://example.com/hooks"))
            .unwrap();

        assert!(request.headers().get("k").is_none());
        assert!(request
            .headers()
            .values()
            .all(|v| v.to_str().map(|s| s != "x").unwrap_or(true)));
    }
}

// ============================================================================
// Dispatch and outcome interpretation
// ============================================================================

mod dispatch_tests {
    use super::*;

    #[test]
    fn test_only_ok_and_created_are_accepted() {
        assert!(is_accepted_status(StatusCode::OK));
        assert!(is_accepted_status(StatusCode::CREATED));
        assert!(!is_accepted_status(StatusCode::ACCEPTED));
        assert!(!is_accepted_status(StatusCode::NO_CONTENT));
        assert!(!is_accepted_status(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_created_response_succeeds() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hooks/orders"))
            .and(header("content-type", "application/json"))
            .and(header("x-api-key", "gw-key"))
            .and(body_string(r#"{"order":42}"#))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            aws_gateway_token: Some("gw-key".to_string()),
            ..config(&format!("{}/hooks/orders", mock_server.uri()))
        };

        let result = processor
            .process_message(r#"{"order":42}"#, &no_attributes(), &configuration)
            .await;

        assert!(result.is_ok(), "got: {:?}", result);
    }

    #[tokio::test]
    async fn test_get_sends_query_parameters() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lookup"))
            .and(query_param("a", "1"))
            .and(query_param("b", "2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            use_get: true,
            ..config(&format!("{}/lookup", mock_server.uri()))
        };

        let result = processor
            .process_message(r#"{"a":"1","b":"2"}"#, &no_attributes(), &configuration)
            .await;

        assert!(result.is_ok(), "got: {:?}", result);
    }

    #[tokio::test]
    async fn test_accepted_response_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&mock_server)
            .await;

        let processor = HttpMessageProcessor::new();
        let result = processor
            .process_message("{}", &no_attributes(), &config(&mock_server.uri()))
            .await;

        match result {
            Err(ProcessingError::HttpStatus { status, .. }) => assert_eq!(status, 202),
            other => panic!("expected HttpStatus error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_response_carries_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
            .mount(&mock_server)
            .await;

        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            use_put: true,
            ..config(&mock_server.uri())
        };

        let error = processor
            .process_message("{}", &no_attributes(), &configuration)
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(500));
        assert!(error.to_string().contains("database unavailable"));
    }

    /// A 200 that never arrives within the timeout is a transport failure.
    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            timeout: Some(Duration::from_millis(100)),
            ..config(&mock_server.uri())
        };

        let error = processor
            .process_message("{}", &no_attributes(), &configuration)
            .await
            .unwrap_err();

        assert!(error.is_transport(), "got: {:?}", error);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_failure() {
        let processor = HttpMessageProcessor::new();
        let configuration = ConfigurationEntry {
            timeout: Some(Duration::from_secs(2)),
            ..config("http://127.0.0.1:1/hooks")
        };

        let error = processor
            .process_message("{}", &no_attributes(), &configuration)
            .await
            .unwrap_err();

        assert!(error.is_transport(), "got: {:?}", error);
    }

    #[tokio::test]
    async fn test_clients_are_reused_per_settings() {
        let processor = HttpMessageProcessor::new();
        let fast = ConfigurationEntry {
            timeout: Some(Duration::from_secs(1)),
            ..config("https://example.com/a")
        };
        let other_url_same_settings = ConfigurationEntry {
            timeout: Some(Duration::from_secs(1)),
            ..config("https://example.org/b")
        };
        let insecure = ConfigurationEntry {
            ignore_certificate_errors: true,
            ..config("https://example.com/a")
        };

        processor.build_request("{}", &no_attributes(), &fast).unwrap();
        processor
            .build_request("{}", &no_attributes(), &other_url_same_settings)
            .unwrap();
        processor.build_request("{}", &no_attributes(), &insecure).unwrap();

        assert_eq!(processor.clients.lock().unwrap().len(), 2);
    }
}
