//! Transport contract of the Tinkoff adapter.
//!
//! Every endpoint must send the bearer token and the configured deadline, and
//! every failure must carry a stable error code.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use candlefill_core::{
    DateRange, HttpClient, HttpError, HttpRequest, HttpResponse, MarketDataSource, SourceErrorKind,
    Ticker, TinkoffAdapter, TinkoffConfig,
};
use time::macros::date;

struct ScriptedHttpClient {
    response: Result<HttpResponse, HttpError>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    fn new(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("request log").clone()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("request log").push(request);
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

fn adapter(client: Arc<ScriptedHttpClient>) -> TinkoffAdapter {
    TinkoffAdapter::with_http_client(
        TinkoffConfig {
            base_url: String::from("https://sandbox.test/openapi"),
            token: String::from("t.contract"),
            timeout_ms: 1_234,
        },
        client,
    )
}

async fn call_every_endpoint(adapter: &TinkoffAdapter) -> Vec<Option<SourceErrorKind>> {
    let ticker = Ticker::parse("SBER").expect("valid");
    let range = DateRange::single(date!(2019 - 01 - 03));
    vec![
        adapter.find_by_ticker(&ticker).await.err().map(|e| e.kind()),
        adapter
            .daily_bars("BBG004730N88", range)
            .await
            .err()
            .map(|e| e.kind()),
        adapter.stocks().await.err().map(|e| e.kind()),
    ]
}

#[tokio::test]
async fn every_endpoint_sends_token_and_deadline() {
    let client = ScriptedHttpClient::new(Ok(HttpResponse::ok_json(r#"{"payload": {}}"#)));

    let outcomes = call_every_endpoint(&adapter(client.clone())).await;

    assert_eq!(outcomes, vec![None, None, None]);
    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    for request in requests {
        assert!(request.url.starts_with("https://sandbox.test/openapi/market/"));
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer t.contract")
        );
        assert_eq!(request.timeout_ms, 1_234);
    }
}

#[tokio::test]
async fn every_endpoint_reports_transport_failures() {
    let client = ScriptedHttpClient::new(Err(HttpError::new("connection refused")));

    let outcomes = call_every_endpoint(&adapter(client)).await;

    assert_eq!(outcomes, vec![Some(SourceErrorKind::Transport); 3]);
}

#[tokio::test]
async fn every_endpoint_reports_rejected_tokens() {
    let client = ScriptedHttpClient::new(Ok(HttpResponse {
        status: 401,
        body: String::new(),
    }));

    let outcomes = call_every_endpoint(&adapter(client)).await;

    assert_eq!(outcomes, vec![Some(SourceErrorKind::Unauthorized); 3]);
}
