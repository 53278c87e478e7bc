//! Authenticated Request Pipeline
//!
//! Every outbound API call from the application goes through here. The
//! pipeline attaches the current access credential, intercepts a 401 reply,
//! renews the credential (coalescing concurrent renewals into one wire call),
//! and retries the original request exactly once. A second 401, or any
//! renewal failure, forces a logout: credentials cleared, state set to
//! `Unauthenticated`, `SessionExpired` emitted.

use crate::error::PipelineError;
use crate::hub::SessionHub;
use crate::identity::IdentityClient;
use crate::store::{CredentialKind, CredentialStore};
use crate::types::SessionState;
use bridge_traits::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_runtime::events::SessionEvent;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Authenticated HTTP pipeline for the commerce API.
pub struct RequestPipeline {
    http: Arc<dyn HttpClient>,
    base_url: Url,
    store: CredentialStore,
    identity: Arc<IdentityClient>,
    hub: Arc<SessionHub>,
    /// Serializes renewal so concurrent 401s cost one wire call.
    renewal_gate: Mutex<()>,
    renewal_timeout: Option<Duration>,
}

impl RequestPipeline {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: Url,
        store: CredentialStore,
        identity: Arc<IdentityClient>,
        hub: Arc<SessionHub>,
        renewal_timeout: Option<Duration>,
    ) -> Self {
        Self {
            http,
            base_url,
            store,
            identity,
            hub,
            renewal_gate: Mutex::new(()),
            renewal_timeout,
        }
    }

    /// Absolute URL for an API path.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Execute an authenticated request against the API.
    ///
    /// Returns `Ok` only for 2xx responses. A 401 triggers one transparent
    /// renewal and one retry; every other non-2xx status maps to
    /// [`PipelineError::Upstream`] without retrying.
    #[instrument(skip(self, body))]
    pub async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<HttpResponse, PipelineError> {
        // An absent credential is not an error yet: the call proceeds
        // unauthenticated and the service decides.
        let access = self.store.get(CredentialKind::Access).await;

        let response = self
            .transmit(method, path, body.clone(), access.as_deref())
            .await?;

        if !response.is_unauthorized() {
            return finish(response);
        }

        debug!("Access credential rejected, attempting renewal");
        let fresh = self.obtain_fresh_credential(access.as_deref()).await?;

        // Exactly one retry, with the fresh credential.
        let response = self.transmit(method, path, body, Some(&fresh)).await?;

        if response.is_unauthorized() {
            // Freshly renewed credential rejected too; nothing sane left to
            // try with.
            warn!("Renewed credential rejected, forcing logout");
            self.force_logout("session rejected by the service").await;
            return Err(PipelineError::Unauthenticated);
        }

        finish(response)
    }

    /// Execute an authenticated request with a JSON body.
    pub async fn send_json<T: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &T,
    ) -> Result<HttpResponse, PipelineError> {
        let json = serde_json::to_vec(body)
            .map_err(|e| bridge_traits::BridgeError::OperationFailed(e.to_string()))?;
        self.send(method, path, Some(Bytes::from(json))).await
    }

    /// Single transmission; no retry logic here.
    async fn transmit(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Bytes>,
        access: Option<&str>,
    ) -> Result<HttpResponse, PipelineError> {
        let mut request = HttpRequest::new(method, self.endpoint(path));

        if let Some(access) = access {
            request = request.bearer_token(access);
        }

        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        Ok(self.http.execute(request).await?)
    }

    /// Produce a valid access credential after a 401, renewing at most once
    /// across all concurrent callers.
    ///
    /// Callers queue on the gate; whoever gets in first renews and stores the
    /// result, and everyone behind it finds the store already holding a
    /// credential that differs from the one rejected, so they reuse it
    /// without another wire call.
    async fn obtain_fresh_credential(
        &self,
        rejected: Option<&str>,
    ) -> Result<String, PipelineError> {
        let _gate = self.renewal_gate.lock().await;

        if let Some(current) = self.store.get(CredentialKind::Access).await {
            if Some(current.as_str()) != rejected {
                debug!("Credential already renewed by a concurrent request");
                return Ok(current);
            }
        }

        let renewal = match self.store.get(CredentialKind::Renewal).await {
            Some(renewal) => renewal,
            None => {
                self.force_logout("no renewal credential available").await;
                return Err(PipelineError::Unauthenticated);
            }
        };

        let renewed = match self.renew_with_timeout(&renewal).await {
            Ok(access) => access,
            Err(e) => {
                warn!(error = %e, "Credential renewal failed");
                self.force_logout("credential renewal failed").await;
                return Err(PipelineError::Unauthenticated);
            }
        };

        if let Err(e) = self.store.set(CredentialKind::Access, &renewed).await {
            // A credential we cannot persist would desynchronize every other
            // pipeline user; treat it like a failed renewal.
            warn!(error = %e, "Failed to persist renewed credential");
            self.force_logout("could not persist renewed credential")
                .await;
            return Err(PipelineError::Unauthenticated);
        }

        info!("Access credential renewed");
        self.hub.emit(SessionEvent::CredentialsRenewed);
        Ok(renewed)
    }

    async fn renew_with_timeout(&self, renewal: &str) -> Result<String, PipelineError> {
        match self.renewal_timeout {
            Some(limit) => tokio::time::timeout(limit, self.identity.renew(renewal))
                .await
                .map_err(|_| {
                    PipelineError::Transport(bridge_traits::BridgeError::OperationFailed(
                        "credential renewal timed out".to_string(),
                    ))
                })?,
            None => self.identity.renew(renewal).await,
        }
    }

    /// Terminate the session from inside the pipeline: clear credentials,
    /// drop to `Unauthenticated`, and tell observers why.
    async fn force_logout(&self, reason: &str) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear credentials during forced logout");
        }
        self.hub.publish(
            SessionState::Unauthenticated,
            Some(SessionEvent::SessionExpired {
                reason: reason.to_string(),
            }),
        );
    }
}

/// Map a final (non-401) response to the pipeline result.
fn finish(response: HttpResponse) -> Result<HttpResponse, PipelineError> {
    if response.is_success() {
        return Ok(response);
    }

    let message = match response.text() {
        Ok(text) if !text.trim().is_empty() => text,
        _ => format!("request failed with status {}", response.status),
    };

    Err(PipelineError::Upstream {
        status: response.status,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CredentialPair;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::SecureStore;
    use core_runtime::events::{CoreEvent, EventBus};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct InMemorySecureStore {
        storage: AsyncMutex<HashMap<String, Vec<u8>>>,
    }

    impl InMemorySecureStore {
        fn new() -> Self {
            Self {
                storage: AsyncMutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl SecureStore for InMemorySecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.storage
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.storage.lock().await.remove(key);
            Ok(())
        }
    }

    /// Scripted transport: routes renewal calls separately from API calls so
    /// a single client can serve both the pipeline and the identity client.
    struct ScriptedHttpClient {
        api_responses: AsyncMutex<VecDeque<HttpResponse>>,
        renewal_responses: AsyncMutex<VecDeque<HttpResponse>>,
        api_requests: AsyncMutex<Vec<HttpRequest>>,
        renewal_calls: AtomicUsize,
    }

    impl ScriptedHttpClient {
        fn new(api: Vec<HttpResponse>, renewal: Vec<HttpResponse>) -> Self {
            Self {
                api_responses: AsyncMutex::new(api.into()),
                renewal_responses: AsyncMutex::new(renewal.into()),
                api_requests: AsyncMutex::new(Vec::new()),
                renewal_calls: AtomicUsize::new(0),
            }
        }

        async fn api_requests(&self) -> Vec<HttpRequest> {
            self.api_requests.lock().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            if request.url.contains("/auth/credentials/refresh") {
                self.renewal_calls.fetch_add(1, Ordering::SeqCst);
                return self
                    .renewal_responses
                    .lock()
                    .await
                    .pop_front()
                    .ok_or_else(|| {
                        BridgeError::OperationFailed("no scripted renewal response".to_string())
                    });
            }

            self.api_requests.lock().await.push(request);
            self.api_responses
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| {
                    BridgeError::OperationFailed("no scripted api response".to_string())
                })
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    async fn pipeline_with(
        api: Vec<HttpResponse>,
        renewal: Vec<HttpResponse>,
        stored: Option<CredentialPair>,
    ) -> (Arc<RequestPipeline>, Arc<ScriptedHttpClient>, CredentialStore, Arc<SessionHub>)
    {
        let http = Arc::new(ScriptedHttpClient::new(api, renewal));
        let store = CredentialStore::new(Arc::new(InMemorySecureStore::new()));
        if let Some(pair) = stored {
            store.store_pair(&pair).await.unwrap();
        }

        let base = Url::parse("https://api.example.com").unwrap();
        let identity = Arc::new(IdentityClient::new(http.clone(), base.clone()));
        let hub = Arc::new(SessionHub::new(EventBus::new(16)));
        let pipeline = Arc::new(RequestPipeline::new(
            http.clone(),
            base,
            store.clone(),
            identity,
            hub.clone(),
            None,
        ));
        (pipeline, http, store, hub)
    }

    #[tokio::test]
    async fn test_send_attaches_bearer() {
        let (pipeline, http, _, _) = pipeline_with(
            vec![response(200, "{}")],
            vec![],
            Some(CredentialPair::new("acc-1", "ren-1")),
        )
        .await;

        let result = pipeline.send(HttpMethod::Get, "/products", None).await;
        assert!(result.is_ok());

        let requests = http.api_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].headers.get("Authorization"),
            Some(&"Bearer acc-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_send_without_credentials_proceeds_unauthenticated() {
        // The service may still accept the call (public endpoint).
        let (pipeline, http, _, _) = pipeline_with(vec![response(200, "{}")], vec![], None).await;

        let result = pipeline.send(HttpMethod::Get, "/products", None).await;
        assert!(result.is_ok());

        let requests = http.api_requests().await;
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn test_rejected_without_renewal_credential_is_unauthenticated() {
        let (pipeline, http, _, hub) =
            pipeline_with(vec![response(401, "")], vec![], None).await;

        let err = pipeline
            .send(HttpMethod::Get, "/products", None)
            .await
            .unwrap_err();
        assert!(err.is_unauthenticated());

        // One transmission, no renewal attempt, no retry.
        assert_eq!(http.api_requests().await.len(), 1);
        assert_eq!(http.renewal_calls.load(Ordering::SeqCst), 0);
        assert_eq!(hub.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_non_success_maps_to_upstream_without_retry() {
        let (pipeline, http, _, _) = pipeline_with(
            vec![response(500, "internal")],
            vec![],
            Some(CredentialPair::new("acc-1", "ren-1")),
        )
        .await;

        let err = pipeline
            .send(HttpMethod::Get, "/products", None)
            .await
            .unwrap_err();
        match err {
            PipelineError::Upstream { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal");
            }
            other => panic!("expected Upstream, got {:?}", other),
        }
        assert_eq!(http.api_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_renewal_then_retry_succeeds() {
        let (pipeline, http, store, hub) = pipeline_with(
            vec![response(401, ""), response(200, r#"{"ok": true}"#)],
            vec![response(200, r#"{"accessCredential": "acc-2"}"#)],
            Some(CredentialPair::new("acc-1", "ren-1")),
        )
        .await;
        let mut events = hub.bus().subscribe();

        let result = pipeline.send(HttpMethod::Get, "/products", None).await;
        assert!(result.is_ok());

        // Exactly two transmissions; the retry carried the fresh credential.
        let requests = http.api_requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].headers.get("Authorization"),
            Some(&"Bearer acc-2".to_string())
        );

        // The fresh credential was persisted; the renewal credential kept.
        assert_eq!(
            store.get(CredentialKind::Access).await.as_deref(),
            Some("acc-2")
        );
        assert_eq!(
            store.get(CredentialKind::Renewal).await.as_deref(),
            Some("ren-1")
        );

        let event = events.recv().await.unwrap();
        assert_eq!(event, CoreEvent::Session(SessionEvent::CredentialsRenewed));
    }

    #[tokio::test]
    async fn test_renewal_failure_forces_logout() {
        let (pipeline, http, store, hub) = pipeline_with(
            vec![response(401, "")],
            vec![response(401, "")],
            Some(CredentialPair::new("acc-1", "ren-1")),
        )
        .await;
        let mut events = hub.bus().subscribe();

        let err = pipeline
            .send(HttpMethod::Get, "/products", None)
            .await
            .unwrap_err();
        assert!(err.is_unauthenticated());

        // Only the original transmission; no retry with a dead session.
        assert_eq!(http.api_requests().await.len(), 1);

        // Credentials cleared, state dropped, expiry announced.
        assert!(store.pair().await.is_none());
        assert_eq!(hub.state(), SessionState::Unauthenticated);
        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::Session(SessionEvent::SessionExpired { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_unauthorized_forces_logout() {
        let (pipeline, http, store, hub) = pipeline_with(
            vec![response(401, ""), response(401, "")],
            vec![response(200, r#"{"accessCredential": "acc-2"}"#)],
            Some(CredentialPair::new("acc-1", "ren-1")),
        )
        .await;

        let err = pipeline
            .send(HttpMethod::Get, "/products", None)
            .await
            .unwrap_err();
        assert!(err.is_unauthenticated());

        // Retried once and only once.
        assert_eq!(http.api_requests().await.len(), 2);
        assert!(store.pair().await.is_none());
        assert_eq!(hub.state(), SessionState::Unauthenticated);
    }

    /// Transport that accepts or rejects purely on the bearer value, so
    /// concurrent interleavings stay deterministic.
    struct CredentialSensitiveClient {
        valid_bearer: String,
        renewal_calls: AtomicUsize,
        api_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl HttpClient for CredentialSensitiveClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            if request.url.contains("/auth/credentials/refresh") {
                self.renewal_calls.fetch_add(1, Ordering::SeqCst);
                return Ok(response(200, r#"{"accessCredential": "acc-2"}"#));
            }

            self.api_calls.fetch_add(1, Ordering::SeqCst);
            let expected = format!("Bearer {}", self.valid_bearer);
            if request.headers.get("Authorization") == Some(&expected) {
                Ok(response(200, "{}"))
            } else {
                Ok(response(401, ""))
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_renewal() {
        let http = Arc::new(CredentialSensitiveClient {
            valid_bearer: "acc-2".to_string(),
            renewal_calls: AtomicUsize::new(0),
            api_calls: AtomicUsize::new(0),
        });
        let store = CredentialStore::new(Arc::new(InMemorySecureStore::new()));
        store
            .store_pair(&CredentialPair::new("acc-1", "ren-1"))
            .await
            .unwrap();

        let base = Url::parse("https://api.example.com").unwrap();
        let identity = Arc::new(IdentityClient::new(http.clone(), base.clone()));
        let hub = Arc::new(SessionHub::new(EventBus::new(16)));
        let pipeline = Arc::new(RequestPipeline::new(
            http.clone(),
            base,
            store.clone(),
            identity,
            hub,
            None,
        ));

        let mut handles = Vec::new();
        for path in ["/one", "/two", "/three"] {
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                pipeline.send(HttpMethod::Get, path, None).await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        // One renewal wire call total, despite every stale request being
        // rejected; each request transmitted at most twice.
        assert_eq!(http.renewal_calls.load(Ordering::SeqCst), 1);
        assert!(http.api_calls.load(Ordering::SeqCst) <= 6);
        assert_eq!(
            store.get(CredentialKind::Access).await.as_deref(),
            Some("acc-2")
        );
    }

    #[tokio::test]
    async fn test_send_json_sets_content_type() {
        let (pipeline, http, _, _) = pipeline_with(
            vec![response(201, "{}")],
            vec![],
            Some(CredentialPair::new("acc-1", "ren-1")),
        )
        .await;

        pipeline
            .send_json(
                HttpMethod::Post,
                "/subscriptions",
                &serde_json::json!({"planId": "plan-1"}),
            )
            .await
            .unwrap();

        let requests = http.api_requests().await;
        assert_eq!(
            requests[0].headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );
    }
}
