use apibase::{
    BoxFuture, Client, ClientConfig, FetchOptions, RerunOverrides, Transport, TransportRequest,
    TransportResponse,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

struct ScriptedTransport {
    replies: Mutex<VecDeque<TransportResponse>>,
    sent: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<(u16, &str)>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|(status, body)| TransportResponse {
                        status,
                        body: body.to_string(),
                    })
                    .collect(),
            ),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<TransportRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<apibase::Result<TransportResponse>> {
        self.sent.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted reply left");
        Box::pin(async move { Ok(reply) })
    }
}

const FAILING_REPLY: &str = r#"{
    "data": {},
    "errors": [{
        "code": "InvalidArgumentError",
        "message": "first must not be negative",
        "path": ["itemsList"],
        "locations": [{"line": 1, "column": 3}],
        "details": {"first": "out of range"}
    }]
}"#;

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn unrecovered_errors_come_back_in_the_response() {
    let transport = ScriptedTransport::new(vec![(200, FAILING_REPLY)]);
    let client = Client::new(ClientConfig::new("W").with_transport(transport.clone())).unwrap();

    let response = client
        .request("{ itemsList(first: -1) { items { id } } }", None, None)
        .await
        .unwrap();

    assert!(response.has_errors());
    assert_eq!(
        response.errors[0].code.as_deref(),
        Some("InvalidArgumentError")
    );
    assert_eq!(response.data, Some(serde_json::json!({})));
    assert_eq!(transport.sent().len(), 1);
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn default_recovery_replays_with_overridden_variables() {
    let transport = ScriptedTransport::new(vec![
        (200, FAILING_REPLY),
        (200, r#"{"data": {"itemsList": {"items": [{"id": "a"}]}}}"#),
    ]);
    let caught = Arc::new(Mutex::new(Vec::new()));
    let seen = caught.clone();

    let config = ClientConfig::new("W")
        .with_transport(transport.clone())
        .catch_error("default", move |error, rerun| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(error.code().map(str::to_string));
                let replayed = rerun(RerunOverrides::variables(serde_json::json!({"first": 1})))
                    .await?;
                Ok(Some(replayed))
            }
        });
    let client = Client::new(config).unwrap();

    let response = client
        .request(
            "query Test($first: Int) { itemsList(first: $first) { items { id } } }",
            Some(serde_json::json!({"first": -1})),
            None,
        )
        .await
        .unwrap();

    // the caller sees the replay's result, never the failing attempt
    assert!(!response.has_errors());
    assert_eq!(response.data.unwrap()["itemsList"]["items"][0]["id"], "a");
    assert_eq!(
        *caught.lock().unwrap(),
        vec![Some("InvalidArgumentError".to_string())]
    );

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    let first: serde_json::Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
    let second: serde_json::Value = serde_json::from_str(sent[1].body.as_deref().unwrap()).unwrap();
    // replay reuses the original query string with the override applied
    assert_eq!(first["query"], second["query"]);
    assert_eq!(first["variables"]["first"], -1);
    assert_eq!(second["variables"]["first"], 1);
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn chained_recoveries_compose_across_attempts() {
    // first attempt fails with one code, the replay fails with another;
    // the second recovery sees the first replay's variables as its base
    let transport = ScriptedTransport::new(vec![
        (
            200,
            r#"{"data": {}, "errors": [{"code": "TokenExpiredError", "message": "expired"}]}"#,
        ),
        (
            200,
            r#"{"data": {}, "errors": [{"code": "InvalidArgumentError", "message": "bad"}]}"#,
        ),
        (200, r#"{"data": {"ok": true}}"#),
    ]);

    let config = ClientConfig::new("W")
        .with_transport(transport.clone())
        .catch_error("TokenExpiredError", |_error, rerun| async move {
            let replayed = rerun(RerunOverrides::variables(serde_json::json!({"step": 1})))
                .await?;
            Ok(Some(replayed))
        })
        .catch_error("InvalidArgumentError", |_error, rerun| async move {
            Ok(Some(rerun(RerunOverrides::default()).await?))
        });
    let client = Client::new(config).unwrap();

    let response = client
        .request("query Q($step: Int) { ok }", None, None)
        .await
        .unwrap();
    assert!(!response.has_errors());

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    let third: serde_json::Value = serde_json::from_str(sent[2].body.as_deref().unwrap()).unwrap();
    // the final attempt inherited the first recovery's override
    assert_eq!(third["variables"]["step"], 1);
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn transforms_and_headers_flow_through_one_call() {
    let transport = ScriptedTransport::new(vec![(200, r#"{"data": {"ok": true}}"#)]);
    let mut constructor_headers = HashMap::new();
    constructor_headers.insert("auth".to_string(), "A".to_string());

    let config = ClientConfig::new("W")
        .with_transport(transport.clone())
        .with_headers(constructor_headers)
        .transform_request(|next, mut request| async move {
            request.fetch_options = request.fetch_options.with_header("x-trace", "t1");
            next(request).await
        })
        .transform_response(|next, mut exchange| async move {
            if let Some(data) = exchange.response.data.as_mut() {
                data["stamped"] = serde_json::json!(true);
            }
            next(exchange).await
        });
    let client = Client::new(config).unwrap();

    let response = client
        .request(
            "{ ok }",
            None,
            Some(FetchOptions::default().with_header("auth", "B")),
        )
        .await
        .unwrap();

    assert_eq!(response.data.unwrap()["stamped"], true);

    let sent = transport.sent();
    // per-call override wins, the transform-injected header is present,
    // and the content type cannot be replaced
    assert_eq!(sent[0].headers["auth"], "B");
    assert_eq!(sent[0].headers["x-trace"], "t1");
    assert_eq!(sent[0].headers["content-type"], "application/json");
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn short_circuiting_response_step_stops_the_chain() {
    let transport = ScriptedTransport::new(vec![(200, r#"{"data": {"ok": true}}"#)]);
    let later_ran = Arc::new(Mutex::new(false));
    let later = later_ran.clone();

    let config = ClientConfig::new("W")
        .with_transport(transport)
        .transform_response(|_next, mut exchange| async move {
            exchange.response.data = Some(serde_json::json!({"replaced": true}));
            Ok(exchange)
        })
        .transform_response(move |next, exchange| {
            let later = later.clone();
            async move {
                *later.lock().unwrap() = true;
                next(exchange).await
            }
        });
    let client = Client::new(config).unwrap();

    let response = client.request("{ ok }", None, None).await.unwrap();
    assert_eq!(response.data.unwrap()["replaced"], true);
    assert!(!*later_ran.lock().unwrap());
}
