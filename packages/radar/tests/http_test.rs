//! Retry behaviour of the HTTP layer against a mock site.

use std::time::Duration;

use recruit_radar::http::{create_client, download_with_policy, RetryPolicy};
use recruit_radar::RadarError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    }
}

async fn download(url: String) -> recruit_radar::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let client = create_client().unwrap();
        download_with_policy(&client, &url, &quick_policy())
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_throttled_request_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs/1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<dl></dl>"))
        .expect(1)
        .mount(&server)
        .await;

    let bytes = download(format!("{}/jobs/1", server.uri())).await.unwrap();
    assert_eq!(bytes, b"<dl></dl>");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_page_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = download(format!("{}/jobs/gone", server.uri())).await.unwrap_err();
    assert!(matches!(err, RadarError::HttpStatus { status: 404, .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_errors_exhaust_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs/2"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = download(format!("{}/jobs/2", server.uri())).await.unwrap_err();
    match err {
        RadarError::RetriesExhausted { attempts, message } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("502"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
