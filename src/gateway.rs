//! Query gateway to the hosted indexer.
//!
//! Requests go through a [`Transport`] (HTTP in production, scripted in
//! tests). The gateway decodes the GraphQL envelope, retries transport
//! failures, and keeps the latest response per query+variables (per query
//! alone for clock-relative windows). Failures are
//! values, never panics: views show them with a retry hint.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::queries::NamedQuery;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// How a view is refreshed: on a fixed interval, or only on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshPolicy {
    pub interval: Option<Duration>,
}

impl RefreshPolicy {
    pub fn manual() -> Self {
        Self { interval: None }
    }

    pub fn polling(every: Duration) -> Self {
        Self {
            interval: Some(every),
        }
    }

    /// `0` disables polling.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::manual()
        } else {
            Self::polling(Duration::from_secs(secs))
        }
    }

    pub fn is_polling(&self) -> bool {
        self.interval.is_some()
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interval {
            Some(every) => write!(f, "polling every {}s", every.as_secs()),
            None => f.write_str("manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries per fetch, including the first.
    pub attempts: u32,
    /// Wait before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub query: &'static str,
    pub operation_name: &'static str,
    pub variables: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphQlMessage {
    #[serde(default)]
    pub message: String,
}

/// The `{data, errors}` envelope every GraphQL response arrives in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlMessage>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &GraphQlRequest) -> Result<GraphQlResponse, GatewayError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("whale-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &GraphQlRequest) -> Result<GraphQlResponse, GatewayError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::rejected(
                request.operation_name,
                format!("HTTP {status}"),
            ));
        }

        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            GatewayError::rejected(request.operation_name, format!("undecodable response: {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedResponse {
    data: Value,
    fetched_at: DateTime<Utc>,
}

pub struct Gateway {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    cache: Mutex<HashMap<String, CachedResponse>>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Run `query`, retrying transport failures per the retry policy.
    pub async fn fetch<Q: NamedQuery>(&self, query: &Q) -> Result<Q::Response, GatewayError> {
        let request = GraphQlRequest {
            query: Q::DOCUMENT,
            operation_name: Q::NAME,
            variables: query.variables(),
        };

        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        let envelope = loop {
            match self.transport.execute(&request).await {
                Ok(envelope) => break envelope,
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(query = Q::NAME, attempt, error = %err, "query failed, retrying");
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(query = Q::NAME, attempt, error = %err, "query failed");
                    return Err(err);
                }
            }
        };

        let data = decode_envelope(Q::NAME, envelope).map_err(|err| {
            warn!(query = Q::NAME, error = %err, "query rejected");
            err
        })?;

        let typed: Q::Response = serde_json::from_value(data.clone()).map_err(|e| {
            let err = GatewayError::rejected(Q::NAME, format!("unexpected response shape: {e}"));
            warn!(query = Q::NAME, error = %err, "query rejected");
            err
        })?;

        let key = query.cache_key();
        debug!(query = Q::NAME, key = %key, "query succeeded");
        self.store::<Q>(key, data);

        Ok(typed)
    }

    fn store<Q: NamedQuery>(&self, key: String, data: Value) {
        let mut cache = self.lock_cache();
        if Q::ROLLING_WINDOW {
            let prefix = format!("{}:", Q::NAME);
            cache.retain(|k, _| !k.starts_with(&prefix));
        }
        cache.insert(
            key,
            CachedResponse {
                data,
                fetched_at: Utc::now(),
            },
        );
    }

    /// Last successful response for exactly this query and variables.
    pub fn cached<Q: NamedQuery>(&self, query: &Q) -> Option<(Q::Response, DateTime<Utc>)> {
        let entry = self.lock_cache().get(&query.cache_key()).cloned()?;
        let typed = serde_json::from_value(entry.data).ok()?;
        Some((typed, entry.fetched_at))
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedResponse>> {
        // Entries are replaced wholesale, so a poisoned map is still consistent.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode_envelope(name: &str, envelope: GraphQlResponse) -> Result<Value, GatewayError> {
    if !envelope.errors.is_empty() {
        let message = envelope
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(GatewayError::rejected(name, message));
    }
    match envelope.data {
        Some(Value::Null) | None => Err(GatewayError::rejected(name, "response carried no data")),
        Some(data) => Ok(data),
    }
}

// ---------------------------------------------------------------------------
// Per-view query state
// ---------------------------------------------------------------------------

/// What a view renders from. `stale` keeps the last good payload visible
/// while a refresh is in flight or after it failed.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    Pending {
        stale: Option<T>,
    },
    Failed {
        message: String,
        stale: Option<T>,
    },
    Ready {
        data: T,
        updated_at: DateTime<Utc>,
    },
}

/// Identifies one issued request; only the newest may land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Clone)]
pub struct LiveQuery<T> {
    issued: u64,
    state: QueryState<T>,
    last_updated: Option<DateTime<Utc>>,
}

impl<T: Clone> Default for LiveQuery<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LiveQuery<T> {
    pub fn new() -> Self {
        Self {
            issued: 0,
            state: QueryState::Pending { stale: None },
            last_updated: None,
        }
    }

    pub fn state(&self) -> &QueryState<T> {
        &self.state
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// A request was issued and has not resolved yet.
    pub fn in_flight(&self) -> bool {
        matches!(self.state, QueryState::Pending { .. })
    }

    fn latest_data(&self) -> Option<T> {
        match &self.state {
            QueryState::Ready { data, .. } => Some(data.clone()),
            QueryState::Pending { stale } | QueryState::Failed { stale, .. } => stale.clone(),
        }
    }

    /// Start a new request. Anything issued earlier becomes stale.
    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        self.state = QueryState::Pending {
            stale: self.latest_data(),
        };
        Ticket(self.issued)
    }

    /// Start a request for different parameters. The previous payload no
    /// longer matches, so `seed` (typically the cached response for the new
    /// parameters) replaces it.
    pub fn reissue(&mut self, seed: Option<T>) -> Ticket {
        self.issued += 1;
        self.state = QueryState::Pending { stale: seed };
        Ticket(self.issued)
    }

    /// Apply a completed request. Returns `false` (and changes nothing) if a
    /// newer request was issued after `ticket`.
    pub fn resolve(
        &mut self,
        ticket: Ticket,
        result: Result<T, GatewayError>,
        now: DateTime<Utc>,
    ) -> bool {
        if ticket.0 != self.issued {
            debug!(ticket = ticket.0, latest = self.issued, "discarding superseded response");
            return false;
        }
        self.state = match result {
            Ok(data) => {
                self.last_updated = Some(now);
                QueryState::Ready {
                    data,
                    updated_at: now,
                }
            }
            Err(err) => QueryState::Failed {
                message: err.to_string(),
                stale: self.latest_data(),
            },
        };
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::queries::{ActivitySummary, TokenInfo, WhaleAlerts};
    use crate::transfer::TransfersResponse;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back canned responses in order and records what was asked.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<GraphQlResponse, GatewayError>>>,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<GraphQlRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn with(replies: Vec<Result<GraphQlResponse, GatewayError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        pub(crate) fn data(data: Value) -> Result<GraphQlResponse, GatewayError> {
            Ok(GraphQlResponse {
                data: Some(data),
                errors: Vec::new(),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: &GraphQlRequest) -> Result<GraphQlResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::transport("script exhausted")))
        }
    }

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::from_millis(1),
        }
    }

    fn alerts_query() -> WhaleAlerts {
        WhaleAlerts {
            min_amount: "50000000000".into(),
            first: 20,
        }
    }

    fn one_transfer() -> Value {
        json!({ "transfers": [{ "id": "t1", "value": "50000000000", "timestamp": "1700000000",
            "from": { "address": "0x0000000000000000000000000000000000000000" },
            "to": { "address": "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be" } }] })
    }

    #[tokio::test]
    async fn success_decodes_and_caches() {
        let transport = Arc::new(ScriptedTransport::with(vec![ScriptedTransport::data(one_transfer())]));
        let gateway = Gateway::new(transport.clone(), fast_retry(1));
        let query = alerts_query();

        let resp: TransfersResponse = gateway.fetch(&query).await.unwrap();
        assert_eq!(resp.transfers.len(), 1);

        let (cached, _) = gateway.cached(&query).unwrap();
        assert_eq!(cached, resp);

        let other = WhaleAlerts { min_amount: "1".into(), first: 20 };
        assert!(gateway.cached(&other).is_none());

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].operation_name, "WhaleAlerts");
        assert_eq!(seen[0].variables["minAmount"], "50000000000");
    }

    #[tokio::test]
    async fn cache_is_replaced_wholesale() {
        let transport = Arc::new(ScriptedTransport::with(vec![
            ScriptedTransport::data(one_transfer()),
            ScriptedTransport::data(json!({ "transfers": [] })),
        ]));
        let gateway = Gateway::new(transport, fast_retry(1));
        let query = alerts_query();

        gateway.fetch(&query).await.unwrap();
        gateway.fetch(&query).await.unwrap();
        let (cached, _) = gateway.cached(&query).unwrap();
        assert!(cached.transfers.is_empty());
    }

    fn activity_query(since: i64) -> ActivitySummary {
        ActivitySummary {
            since_1h: since.to_string(),
            since_24h: (since - 82_800).to_string(),
            whale_min: "50000000000".into(),
        }
    }

    #[tokio::test]
    async fn polling_a_rolling_window_keeps_one_entry() {
        let polls = 50;
        let replies = (0..polls)
            .map(|_| ScriptedTransport::data(json!({ "last1h": [], "last24h": [] })))
            .collect();
        let gateway = Gateway::new(Arc::new(ScriptedTransport::with(replies)), fast_retry(1));

        for i in 0..polls {
            gateway.fetch(&activity_query(1_700_000_000 + 15 * i)).await.unwrap();
        }
        assert_eq!(gateway.lock_cache().len(), 1);
        assert!(gateway.cached(&activity_query(1_700_000_000)).is_none());
        assert!(gateway.cached(&activity_query(1_700_000_000 + 15 * (polls - 1))).is_some());
    }

    #[tokio::test]
    async fn fixed_parameters_keep_an_entry_each() {
        let transport = Arc::new(ScriptedTransport::with(vec![
            ScriptedTransport::data(one_transfer()),
            ScriptedTransport::data(json!({ "transfers": [] })),
        ]));
        let gateway = Gateway::new(transport, fast_retry(1));
        let other = WhaleAlerts { min_amount: "1".into(), first: 20 };

        gateway.fetch(&alerts_query()).await.unwrap();
        gateway.fetch(&other).await.unwrap();
        assert_eq!(gateway.lock_cache().len(), 2);
        assert!(gateway.cached(&alerts_query()).is_some());
    }

    #[tokio::test]
    async fn transport_failures_are_retried() {
        let transport = Arc::new(ScriptedTransport::with(vec![
            Err(GatewayError::transport("connection reset")),
            ScriptedTransport::data(one_transfer()),
        ]));
        let gateway = Gateway::new(transport.clone(), fast_retry(3));

        assert!(gateway.fetch(&alerts_query()).await.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retries_stop_at_the_limit() {
        let transport = Arc::new(ScriptedTransport::with(vec![
            Err(GatewayError::transport("down")),
            Err(GatewayError::transport("still down")),
            ScriptedTransport::data(one_transfer()),
        ]));
        let gateway = Gateway::new(transport.clone(), fast_retry(2));

        let err = gateway.fetch(&alerts_query()).await.unwrap_err();
        assert_eq!(err, GatewayError::transport("still down"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn graphql_errors_are_rejections_and_not_retried() {
        let transport = Arc::new(ScriptedTransport::with(vec![Ok(GraphQlResponse {
            data: None,
            errors: vec![GraphQlMessage {
                message: "indexing_error".into(),
            }],
        })]));
        let gateway = Gateway::new(transport.clone(), fast_retry(3));

        let err = gateway.fetch(&TokenInfo).await.unwrap_err();
        assert_eq!(err, GatewayError::rejected("TokenInfo", "indexing_error"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(gateway.cached(&TokenInfo).is_none());
    }

    #[tokio::test]
    async fn null_data_and_bad_shape_are_rejections() {
        let transport = Arc::new(ScriptedTransport::with(vec![
            Ok(GraphQlResponse {
                data: Some(Value::Null),
                errors: Vec::new(),
            }),
            ScriptedTransport::data(json!({ "transfers": "nope" })),
        ]));
        let gateway = Gateway::new(transport, fast_retry(1));

        let first = gateway.fetch(&alerts_query()).await.unwrap_err();
        assert!(matches!(first, GatewayError::QueryRejected { .. }));
        let second = gateway.fetch(&alerts_query()).await.unwrap_err();
        assert!(second.to_string().contains("unexpected response shape"));
    }

    #[test]
    fn refresh_policy_from_secs() {
        assert_eq!(RefreshPolicy::from_secs(0), RefreshPolicy::manual());
        assert!(RefreshPolicy::from_secs(30).is_polling());
        assert_eq!(RefreshPolicy::from_secs(30).to_string(), "polling every 30s");
        assert_eq!(RefreshPolicy::manual().to_string(), "manual");
    }

    #[test]
    fn last_issued_wins() {
        let now = Utc::now();
        let mut live: LiveQuery<u32> = LiveQuery::new();
        let first = live.issue();
        let second = live.issue();

        assert!(live.resolve(second, Ok(2), now));
        assert!(!live.resolve(first, Ok(1), now));
        assert_eq!(
            live.state(),
            &QueryState::Ready {
                data: 2,
                updated_at: now
            }
        );
    }

    #[test]
    fn stale_error_is_discarded_too() {
        let now = Utc::now();
        let mut live: LiveQuery<u32> = LiveQuery::new();
        let old = live.issue();
        let new = live.issue();
        assert!(!live.resolve(old, Err(GatewayError::transport("late")), now));
        assert!(matches!(live.state(), QueryState::Pending { stale: None }));
        assert!(live.resolve(new, Ok(7), now));
    }

    #[test]
    fn in_flight_until_resolved() {
        let now = Utc::now();
        let mut live: LiveQuery<u32> = LiveQuery::new();
        let t = live.issue();
        assert!(live.in_flight());
        live.resolve(t, Err(GatewayError::transport("offline")), now);
        assert!(!live.in_flight());

        let t = live.issue();
        live.resolve(t, Ok(3), now);
        assert!(!live.in_flight());
    }

    #[test]
    fn reissue_drops_data_for_old_parameters() {
        let now = Utc::now();
        let mut live: LiveQuery<u32> = LiveQuery::new();
        let t = live.issue();
        live.resolve(t, Ok(5), now);

        live.reissue(None);
        assert_eq!(live.state(), &QueryState::Pending { stale: None });
        live.reissue(Some(9));
        assert_eq!(live.state(), &QueryState::Pending { stale: Some(9) });
    }

    #[test]
    fn failure_keeps_previous_data() {
        let now = Utc::now();
        let mut live: LiveQuery<u32> = LiveQuery::new();
        let t = live.issue();
        live.resolve(t, Ok(5), now);
        assert_eq!(live.last_updated(), Some(now));

        let t = live.issue();
        assert_eq!(live.state(), &QueryState::Pending { stale: Some(5) });
        live.resolve(t, Err(GatewayError::transport("offline")), now);
        match live.state() {
            QueryState::Failed { message, stale } => {
                assert!(message.contains("offline"));
                assert_eq!(*stale, Some(5));
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(live.last_updated(), Some(now));
    }
}
