use async_trait::async_trait;
use cbpro::core::kernel::{
    AuthenticatedRest, EndpointClass, FixedClock, HttpTransport, RateLimit, RateLimitPolicy,
    RateLimiter, RawResponse, RequestBuilder, SignedRequest, TransportError,
};
use cbpro::exchanges::coinbase_pro::{ActivityType, CoinbaseRest, HoldType};
use cbpro::{CbproError, ClientConfig, ErrorKind};
use futures_util::{StreamExt, TryStreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SECRET: &str = "c2VjcmV0";
const TIMESTAMP: u64 = 1_700_000_000;

/// What the fake transport saw for one request
#[derive(Debug, Clone)]
struct Recorded {
    url: String,
    path: String,
    timestamp: String,
    key: Option<String>,
    sign: Option<String>,
    header_timestamp: Option<String>,
    passphrase: Option<String>,
}

/// Transport fake that answers from a script, in order
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    seen: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<Recorded> {
        self.seen.lock().unwrap().clone()
    }

    fn paths(&self) -> Vec<String> {
        self.seen().into_iter().map(|r| r.path).collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: &SignedRequest) -> Result<RawResponse, TransportError> {
        self.seen.lock().unwrap().push(Recorded {
            url: request.url().to_string(),
            path: request.path().to_string(),
            timestamp: request.timestamp().to_string(),
            key: request.header("CB-ACCESS-KEY").map(str::to_string),
            sign: request.header("CB-ACCESS-SIGN").map(str::to_string),
            header_timestamp: request.header("CB-ACCESS-TIMESTAMP").map(str::to_string),
            passphrase: request.header("CB-ACCESS-PASSPHRASE").map(str::to_string),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("script exhausted".to_string())))
    }
}

fn test_config() -> ClientConfig {
    ClientConfig::new("test_key".to_string(), SECRET.to_string(), "test_passphrase".to_string())
        .base_url("https://api.example.com".to_string())
}

fn client(
    transport: &Arc<ScriptedTransport>,
) -> CoinbaseRest<AuthenticatedRest<Arc<ScriptedTransport>>> {
    let rest = AuthenticatedRest::with_clock(
        &test_config(),
        Arc::clone(transport),
        Arc::new(FixedClock(TIMESTAMP)),
    )
    .unwrap();
    CoinbaseRest::new(rest)
}

fn ledger_entry(id: &str) -> String {
    format!(
        r#"{{"id":"{}","created_at":"2019-06-11T22:11:56.382Z","amount":"1.00","balance":"10.00","type":"transfer"}}"#,
        id
    )
}

fn ledger_page(ids: &[&str]) -> String {
    let entries: Vec<String> = ids.iter().map(|id| ledger_entry(id)).collect();
    format!("[{}]", entries.join(","))
}

#[tokio::test]
async fn test_get_account_is_signed_with_fixed_vector() {
    let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(
        200,
        r#"{"id":"abc123","balance":"1.50","holds":"0.25","available":"1.25","currency":"BTC"}"#,
    ))]);
    let account = client(&transport).get_account("abc123").await.unwrap();

    assert_eq!(account.id, "abc123");
    assert_eq!(account.holds.to_string(), "0.25");

    let seen = transport.seen();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.url, "https://api.example.com/accounts/abc123");
    assert_eq!(request.timestamp, "1700000000");
    assert_eq!(request.header_timestamp.as_deref(), Some("1700000000"));
    assert_eq!(request.key.as_deref(), Some("test_key"));
    assert_eq!(request.passphrase.as_deref(), Some("test_passphrase"));
    assert_eq!(
        request.sign.as_deref(),
        Some("+8+baDJmQe1rJKq4OpKtbYUieecCV0hpAvEivSAIPEI=")
    );
}

#[tokio::test]
async fn test_list_accounts_keeps_exact_decimals() {
    let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(
        200,
        r#"[{"id":"a1","currency":"USD","balance":"1000.0000000000000001","available":"999.99","hold":"0.0000000000000001","profile_id":"p1","trading_enabled":true}]"#,
    ))]);
    let accounts = client(&transport).list_accounts().await.unwrap();

    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].balance.to_string(), "1000.0000000000000001");
    assert_eq!(accounts[0].hold.to_string(), "0.0000000000000001");
    assert_eq!(transport.paths(), vec!["/accounts"]);
}

#[tokio::test]
async fn test_history_concatenates_three_pages_in_order() {
    let transport = ScriptedTransport::new(vec![
        Ok(RawResponse::new(200, ledger_page(&["5", "4"])).with_header("CB-AFTER", "4")),
        Ok(RawResponse::new(200, ledger_page(&["3", "2"])).with_header("CB-AFTER", "2")),
        Ok(RawResponse::new(200, ledger_page(&["1"])).with_header("CB-BEFORE", "1")),
    ]);
    let entries = client(&transport)
        .get_account_history("acct")
        .await
        .unwrap();

    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["5", "4", "3", "2", "1"]);
    assert!(entries.iter().all(|e| e.activity_type == ActivityType::Transfer));
    assert_eq!(
        transport.paths(),
        vec![
            "/accounts/acct/ledger",
            "/accounts/acct/ledger?after=4",
            "/accounts/acct/ledger?after=2",
        ]
    );
}

#[tokio::test]
async fn test_page_size_is_sent_on_every_page() {
    let transport = ScriptedTransport::new(vec![
        Ok(RawResponse::new(200, ledger_page(&["2", "1"])).with_header("CB-AFTER", "1")),
        Ok(RawResponse::new(200, "[]")),
    ]);
    let rest = client(&transport);
    let entries: Vec<_> = rest
        .account_history("acct", Some(2))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(
        transport.paths(),
        vec![
            "/accounts/acct/ledger?limit=2",
            "/accounts/acct/ledger?limit=2&after=1",
        ]
    );
}

#[tokio::test]
async fn test_pages_are_fetched_only_when_polled() {
    let transport = ScriptedTransport::new(vec![
        Ok(RawResponse::new(200, ledger_page(&["2", "1"])).with_header("CB-AFTER", "1")),
        Ok(RawResponse::new(200, ledger_page(&["0"]))),
    ]);
    let rest = client(&transport);
    let mut stream = rest.account_history("acct", None);

    assert!(transport.seen().is_empty());
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.id, "2");
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.id, "1");
    assert_eq!(transport.seen().len(), 1);

    drop(stream);
    assert_eq!(transport.seen().len(), 1);
}

#[tokio::test]
async fn test_failure_mid_walk_keeps_yielded_items() {
    let transport = ScriptedTransport::new(vec![
        Ok(RawResponse::new(200, ledger_page(&["2", "1"])).with_header("CB-AFTER", "1")),
        Ok(RawResponse::new(503, r#"{"message":"service unavailable"}"#)),
    ]);
    let rest = client(&transport);
    let mut stream = rest.account_history("acct", None);

    let mut ids = Vec::new();
    let mut failure = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(entry) => ids.push(entry.id),
            Err(e) => failure = Some(e),
        }
    }

    assert_eq!(ids, vec!["2", "1"]);
    let failure = failure.expect("second page should fail");
    assert!(failure.is_retryable());
    match failure {
        CbproError::Api(api) => {
            assert_eq!(api.status, 503);
            assert_eq!(api.path, "/accounts/acct/ledger?after=1");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_holds_walk_stops_on_empty_page() {
    let hold = r#"[{"id":"h1","account_id":"acct","created_at":"2019-06-11T22:11:56.382Z","amount":"4.23","type":"order","ref":"o1"}]"#;
    let transport = ScriptedTransport::new(vec![
        Ok(RawResponse::new(200, hold).with_header("CB-AFTER", "h1")),
        Ok(RawResponse::new(200, "[]").with_header("CB-AFTER", "h1")),
    ]);
    let holds = client(&transport).get_account_holds("acct").await.unwrap();

    assert_eq!(holds.len(), 1);
    assert_eq!(holds[0].hold_type, HoldType::Order);
    assert_eq!(holds[0].reference, "o1");
    assert_eq!(transport.seen().len(), 2);
}

#[tokio::test]
async fn test_non_2xx_is_api_error_with_status() {
    let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(
        404,
        r#"{"message":"NotFound"}"#,
    ))]);
    let err = client(&transport).get_account("missing").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.path(), Some("/accounts/missing"));
    match err {
        CbproError::Api(api) => {
            assert_eq!(api.status, 404);
            assert_eq!(api.message, "NotFound");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unexpected_shape_is_decode_error() {
    let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(200, r#"{"not":"a list"}"#))]);
    let err = client(&transport).list_accounts().await.unwrap_err();

    match err {
        CbproError::Decode { path, body, .. } => {
            assert_eq!(path, "/accounts");
            assert_eq!(body, br#"{"not":"a list"}"#.to_vec());
        }
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transport_failure_is_network_error() {
    let transport = ScriptedTransport::new(vec![Err(TransportError(
        "connection reset by peer".to_string(),
    ))]);
    let err = client(&transport).list_accounts().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_invalid_account_id_never_reaches_transport() {
    let transport = ScriptedTransport::new(vec![]);
    let rest = client(&transport);

    let err = rest.get_account("abc/holds").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);

    let err = rest.get_account_history("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);

    let mut holds = rest.account_holds("a?b", Some(10));
    assert_eq!(
        holds.next().await.unwrap().unwrap_err().kind(),
        ErrorKind::InvalidParameters
    );
    assert!(holds.next().await.is_none());

    assert!(transport.seen().is_empty());
}

#[tokio::test]
async fn test_nth_call_is_rate_limited_without_transport() {
    let ok = || Ok(RawResponse::new(200, "[]"));
    let transport = ScriptedTransport::new(vec![ok(), ok(), ok()]);
    let config = test_config();
    let builder = RequestBuilder::new(
        config.rest_url(),
        &config.credentials,
        Arc::new(FixedClock(TIMESTAMP)),
    )
    .unwrap();
    let limiter = Arc::new(RateLimiter::with_limits(
        RateLimitPolicy::FailFast,
        [(
            EndpointClass::Accounts,
            RateLimit::with_period(Duration::from_secs(3600), 2).unwrap(),
        )],
    ));
    let rest = CoinbaseRest::new(AuthenticatedRest::from_parts(
        builder,
        Arc::clone(&transport),
        limiter,
    ));

    rest.list_accounts().await.unwrap();
    rest.list_accounts().await.unwrap();
    let err = rest.list_accounts().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert!(matches!(
        err,
        CbproError::RateLimited {
            class: EndpointClass::Accounts,
            ..
        }
    ));
    assert_eq!(transport.seen().len(), 2);
}

#[tokio::test]
async fn test_blocking_policy_waits_for_refill() {
    let ok = || Ok(RawResponse::new(200, "[]"));
    let transport = ScriptedTransport::new(vec![ok(), ok()]);
    let config = test_config();
    let builder = RequestBuilder::new(
        config.rest_url(),
        &config.credentials,
        Arc::new(FixedClock(TIMESTAMP)),
    )
    .unwrap();
    let limiter = Arc::new(RateLimiter::with_limits(
        RateLimitPolicy::Block,
        [(
            EndpointClass::Accounts,
            RateLimit::with_period(Duration::from_millis(50), 1).unwrap(),
        )],
    ));
    let rest = CoinbaseRest::new(AuthenticatedRest::from_parts(
        builder,
        Arc::clone(&transport),
        limiter,
    ));

    let started = std::time::Instant::now();
    rest.list_accounts().await.unwrap();
    rest.list_accounts().await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(transport.seen().len(), 2);
}

#[tokio::test]
async fn test_secret_never_appears_in_errors_or_debug() {
    let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(
        401,
        r#"{"message":"invalid signature"}"#,
    ))]);
    let rest = client(&transport);
    let err = rest.list_accounts().await.unwrap_err();

    assert!(!err.to_string().contains(SECRET));
    assert!(!format!("{:?}", err).contains(SECRET));
    assert!(!format!("{:?}", rest).contains(SECRET));
    assert!(!format!("{:?}", rest).contains("test_passphrase"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_one_budget() {
    const CALLS: usize = 40;
    const BURST: u32 = 7;

    let transport =
        ScriptedTransport::new((0..CALLS).map(|_| Ok(RawResponse::new(200, "[]"))).collect());
    let config = test_config();
    let builder = RequestBuilder::new(
        config.rest_url(),
        &config.credentials,
        Arc::new(FixedClock(TIMESTAMP)),
    )
    .unwrap();
    let limiter = Arc::new(RateLimiter::with_limits(
        RateLimitPolicy::FailFast,
        [(
            EndpointClass::Accounts,
            RateLimit::with_period(Duration::from_secs(3600), BURST).unwrap(),
        )],
    ));
    let rest = Arc::new(CoinbaseRest::new(AuthenticatedRest::from_parts(
        builder,
        Arc::clone(&transport),
        limiter,
    )));

    let handles: Vec<_> = (0..CALLS)
        .map(|_| {
            let rest = Arc::clone(&rest);
            tokio::spawn(async move { rest.list_accounts().await })
        })
        .collect();
    let results: Vec<_> = futures_util::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    let limited = results
        .iter()
        .filter(|result| matches!(result, Err(e) if e.kind() == ErrorKind::RateLimited))
        .count();

    assert_eq!(succeeded, BURST as usize);
    assert_eq!(limited, CALLS - BURST as usize);
    assert_eq!(transport.seen().len(), BURST as usize);
}
