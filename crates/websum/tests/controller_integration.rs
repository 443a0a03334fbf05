//! End-to-end runs of the controller against a mock page server and a mock
//! completion endpoint, with the real fetcher and cl100k tokenizer.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use websum::prelude::*;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ──────────────────────────────────────────────────────────

struct Harness {
    pages: MockServer,
    completion: MockServer,
}

impl Harness {
    async fn start() -> Self {
        Self {
            pages: MockServer::start().await,
            completion: MockServer::start().await,
        }
    }

    fn config(&self) -> Config {
        Config::new(format!("{}/v1", self.completion.uri()))
            .with_model("test-model")
            .with_request_timeout(Duration::from_secs(5))
            .with_fetch_timeout(Duration::from_secs(5))
    }

    fn url(&self, p: &str) -> String {
        format!("{}{p}", self.pages.uri())
    }

    async fn serve_page(&self, p: &str, content_type: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", content_type)
                    .set_body_string(body),
            )
            .mount(&self.pages)
            .await;
    }

    async fn completion_replies(&self, response: ResponseTemplate, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(response)
            .expect(calls)
            .mount(&self.completion)
            .await;
    }

    async fn sent_prompt(&self) -> String {
        let requests = self.completion.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        body["messages"][0]["content"].as_str().unwrap().to_string()
    }
}

fn summary(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    }))
}

fn words(n: usize) -> String {
    " word".repeat(n)
}

// ── Pass-through ─────────────────────────────────────────────────────

#[tokio::test]
async fn short_page_passes_through_without_completion() {
    let h = Harness::start().await;
    h.serve_page("/short", "text/plain", "one two three four five".into())
        .await;
    h.completion_replies(summary("unused"), 0).await;

    let controller = Controller::from_config(h.config()).unwrap();
    let out = controller
        .process_detailed(&h.url("/short"), None)
        .await
        .unwrap();
    assert_eq!(out.text, "one two three four five");
    assert_eq!(out.outcome, Outcome::PassThrough);
}

#[tokio::test]
async fn html_page_is_returned_as_markdown() {
    let h = Harness::start().await;
    h.serve_page(
        "/doc",
        "text/html; charset=utf-8",
        "<html><head><title>Doc</title><script>track()</script></head>\
         <body><h1>Install</h1><p>Run <code>make</code>.</p></body></html>"
            .into(),
    )
    .await;
    h.completion_replies(summary("unused"), 0).await;

    let controller = Controller::from_config(h.config()).unwrap();
    let text = controller.process(&h.url("/doc"), None).await.unwrap();
    assert!(text.starts_with("# Install"), "{text}");
    assert!(text.contains("Run `make`."), "{text}");
    assert!(!text.contains("track()"));
}

// ── Summarization ────────────────────────────────────────────────────

#[tokio::test]
async fn long_page_is_summarized_with_focus_context() {
    let h = Harness::start().await;
    h.serve_page("/long", "text/plain", words(800)).await;
    Mock::given(method("POST"))
        .and(body_string_contains("FOCUS CONTEXT"))
        .and(body_string_contains("pricing tiers"))
        .respond_with(summary("- Pro: $10"))
        .expect(1)
        .mount(&h.completion)
        .await;

    let config = h.config().with_max_output_tokens(100);
    let controller = Controller::from_config(config).unwrap();
    let out = controller
        .process_detailed(&h.url("/long"), Some("pricing tiers"))
        .await
        .unwrap();
    assert_eq!(out.text, "- Pro: $10");
    assert_eq!(out.outcome, Outcome::Summarized { truncation: None });
}

#[tokio::test]
async fn huge_page_is_truncated_to_fit_the_window() {
    let h = Harness::start().await;
    h.serve_page("/huge", "text/plain", words(50_000)).await;
    h.completion_replies(summary("condensed"), 1).await;

    let config = h
        .config()
        .with_max_output_tokens(100)
        .with_max_context_tokens(1000);
    let controller = Controller::from_config(config).unwrap();
    let out = controller
        .process_detailed(&h.url("/huge"), None)
        .await
        .unwrap();
    assert_eq!(out.text, "condensed");

    let truncation = match out.outcome {
        Outcome::Summarized {
            truncation: Some(t),
        } => t,
        other => panic!("expected truncation, got {other:?}"),
    };
    assert!(truncation.original_tokens >= 45_000, "{truncation:?}");
    assert!(truncation.kept_tokens < 1000, "{truncation:?}");
    assert!(truncation.kept_tokens > 500, "{truncation:?}");

    let tokenizer = Cl100kTokenizer::new().unwrap();
    let prompt = h.sent_prompt().await;
    assert!(tokenizer.count_tokens(&prompt) <= 1000);
    assert!(prompt.contains("<DOCUMENT_END>"));
}

// ── Failures ─────────────────────────────────────────────────────────

#[tokio::test]
async fn tiny_window_is_a_configuration_error() {
    let h = Harness::start().await;
    h.serve_page("/long", "text/plain", words(500)).await;
    h.completion_replies(summary("unused"), 0).await;

    let config = h
        .config()
        .with_max_output_tokens(10)
        .with_max_context_tokens(50);
    let controller = Controller::from_config(config).unwrap();
    let err = controller.process(&h.url("/long"), None).await.unwrap_err();
    match err {
        WebsumError::BudgetExhausted {
            static_tokens,
            safe_limit,
        } => {
            assert_eq!(safe_limit, 46);
            assert!(static_tokens > safe_limit);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn completion_server_error_is_reported_once() {
    let h = Harness::start().await;
    h.serve_page("/long", "text/plain", words(500)).await;
    h.completion_replies(ResponseTemplate::new(500).set_body_string("overloaded"), 1)
        .await;

    let config = h.config().with_max_output_tokens(100);
    let controller = Controller::from_config(config).unwrap();
    let err = controller.process(&h.url("/long"), None).await.unwrap_err();
    assert!(matches!(err, WebsumError::UpstreamError { status: 500, .. }), "{err}");
    assert_eq!(
        err.user_message(),
        "Error fetching URL: summarization API HTTP 500: overloaded"
    );
}

#[tokio::test]
async fn missing_page_fails_before_completion() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.pages)
        .await;
    h.completion_replies(summary("unused"), 0).await;

    let controller = Controller::from_config(h.config()).unwrap();
    let err = controller.process(&h.url("/gone"), None).await.unwrap_err();
    assert!(matches!(err, WebsumError::FetchFailed { .. }), "{err}");
}

#[tokio::test]
async fn oversized_page_is_rejected() {
    let h = Harness::start().await;
    h.serve_page("/big", "text/plain", "x".repeat(4096)).await;
    h.completion_replies(summary("unused"), 0).await;

    let controller = Controller::from_config(h.config().with_max_response_bytes(1024)).unwrap();
    let err = controller.process(&h.url("/big"), None).await.unwrap_err();
    assert!(err.to_string().contains("maximum size"), "{err}");
}

#[tokio::test]
async fn non_http_url_is_rejected() {
    let h = Harness::start().await;
    h.completion_replies(summary("unused"), 0).await;

    let controller = Controller::from_config(h.config()).unwrap();
    let err = controller
        .process("file:///etc/hosts", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WebsumError::InvalidUrl(_)));
}

// ── Cancellation ─────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_aborts_a_slow_fetch() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&h.pages)
        .await;
    h.completion_replies(summary("unused"), 0).await;

    let controller = Controller::from_config(h.config()).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = controller
        .process_with_cancel(&h.url("/slow"), None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, WebsumError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(5));
}
