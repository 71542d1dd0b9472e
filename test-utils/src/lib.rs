//! `test-utils` is used for testing in both `apiary-lib` and `apiary-bin`.
//! This crate does not depend on `apiary-lib` or `apiary-bin`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock API server, which responds with a predefined status to
/// every GET request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Mount a GET route on `$server` answering with `$status` and a JSON body.
///
/// An optional fourth argument sets how many calls the route expects; the
/// expectation is verified when the server is dropped.
#[macro_export]
macro_rules! mount_json {
    ($server:expr, $path:expr, $status:expr, $body:expr $(,)?) => {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path($path))
            .respond_with(wiremock::ResponseTemplate::new($status).set_body_json($body))
            .mount(&$server)
            .await
    };
    ($server:expr, $path:expr, $status:expr, $body:expr, $expected:expr $(,)?) => {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path($path))
            .respond_with(wiremock::ResponseTemplate::new($status).set_body_json($body))
            .expect($expected)
            .mount(&$server)
            .await
    };
}

/// A successful API page wrapping `$items`
#[macro_export]
macro_rules! api_page {
    ($items:tt) => {
        serde_json::json!({ "items": $items, "has_more": false, "quota_max": 300, "quota_remaining": 299 })
    };
    ($items:tt, has_more) => {
        serde_json::json!({ "items": $items, "has_more": true, "quota_max": 300, "quota_remaining": 299 })
    };
}

/// A structured API error payload
#[macro_export]
macro_rules! api_error {
    ($id:expr, $name:expr, $message:expr) => {
        serde_json::json!({ "error_id": $id, "error_name": $name, "error_message": $message })
    };
}

/// Build a client talking to the given mock server.
///
/// Further builder calls can be chained in before `build`.
#[macro_export]
macro_rules! mock_client {
    ($server:expr $(, $func:tt ($($arg:expr),*))*) => {
        ClientBuilder::builder()
            .base_url(url::Url::parse(&$server.uri()).expect("Expected valid mock server URL"))
            $(.$func($($arg),*))*
            .build()
            .client()
            .expect("Expected client to build")
    };
}
