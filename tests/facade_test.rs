use async_trait::async_trait;
use blog_ui::circuit::{CircuitPolicy, CircuitState, ResilienceGuard};
use blog_ui::client::CatalogBackend;
use blog_ui::fallback::{UNAVAILABLE_TITLE, UNAVAILABLE_WORDS};
use blog_ui::query::{CatalogRequest, QueryKind};
use blog_ui::{CatalogError, CatalogFacade, CatalogResult, PageRequest};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const COOLDOWN: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct RecordingBackend {
    responses: Arc<Mutex<VecDeque<CatalogResult<String>>>>,
    calls: Arc<Mutex<Vec<CatalogRequest>>>,
    delay: Option<Duration>,
}

impl RecordingBackend {
    fn with_responses(responses: Vec<CatalogResult<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    fn failing(n: usize) -> Self {
        Self::with_responses((0..n).map(|_| Err(server_error())).collect())
    }

    async fn calls(&self) -> Vec<CatalogRequest> {
        self.calls.lock().await.clone()
    }

    async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl CatalogBackend for RecordingBackend {
    async fn fetch(&self, request: &CatalogRequest) -> CatalogResult<String> {
        self.calls.lock().await.push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut guard = self.responses.lock().await;
        guard.pop_front().unwrap_or_else(|| Ok(entries_page(&["fresh"])))
    }
}

fn server_error() -> CatalogError {
    CatalogError::UpstreamServer {
        status: 503,
        body: "down".into(),
    }
}

fn entry_json(id: i64, title: &str) -> serde_json::Value {
    serde_json::json!({
        "entryId": id,
        "content": "",
        "created": {"name": "making", "date": "2024-03-01T10:00:00+09:00"},
        "updated": {"name": "making", "date": "2024-03-02T10:00:00+09:00"},
        "frontMatter": {"title": title, "tags": ["rust"], "categories": ["Programming"]}
    })
}

fn entries_page(titles: &[&str]) -> String {
    let content: Vec<_> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| entry_json(i as i64 + 1, t))
        .collect();
    serde_json::json!({
        "content": content,
        "totalPages": 1,
        "totalElements": titles.len(),
        "first": true,
        "last": true,
        "numberOfElements": titles.len(),
        "size": 10,
        "number": 0
    })
    .to_string()
}

fn facade(backend: &RecordingBackend, failure_threshold: u32) -> CatalogFacade {
    let guard = ResilienceGuard::new(Duration::from_secs(1), |_| CircuitPolicy {
        failure_threshold,
        failure_rate_threshold: 1.0,
        window_size: 20,
        minimum_calls: 20,
        cooldown: COOLDOWN,
    });
    CatalogFacade::new(Arc::new(backend.clone()), guard)
}

fn assert_placeholder_page(page: &blog_ui::Page<blog_ui::Entry>) {
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].title(), UNAVAILABLE_TITLE);
    assert!(page.first && page.last);
    assert_eq!(page.number_of_elements, 1);
}

#[tokio::test]
async fn healthy_upstream_passes_results_through() {
    let backend = RecordingBackend::with_responses(vec![Ok(entries_page(&["one", "two"]))]);
    let facade = facade(&backend, 3);

    let page = facade.find_all(PageRequest::new(0, 10)).await.unwrap();
    assert_eq!(page.content.len(), 2);
    assert_eq!(page.content[1].title(), "two");
    assert_eq!(page.content[0].created_by().name, "making");

    let calls = backend.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].segments, vec!["entries"]);
    assert_eq!(
        calls[0].param("excludeContent").and_then(|p| p.value.as_deref()),
        Some("true")
    );
}

#[tokio::test]
async fn opens_after_consecutive_failures_and_stops_calling() {
    let backend = RecordingBackend::failing(3);
    let facade = facade(&backend, 3);

    for _ in 0..3 {
        let page = facade.find_all(PageRequest::default()).await.unwrap();
        assert_placeholder_page(&page);
    }
    assert_eq!(facade.circuit_state(QueryKind::All), CircuitState::Open);

    let page = facade.find_all(PageRequest::default()).await.unwrap();
    assert_placeholder_page(&page);
    assert_eq!(backend.call_count().await, 3);
}

#[tokio::test]
async fn circuits_are_independent_per_kind() {
    let backend = RecordingBackend::failing(2);
    let facade = facade(&backend, 2);

    facade.find_tags().await.unwrap();
    facade.find_tags().await.unwrap();
    assert_eq!(facade.circuit_state(QueryKind::AllTags), CircuitState::Open);
    assert_eq!(facade.circuit_state(QueryKind::All), CircuitState::Closed);

    let page = facade.find_all(PageRequest::default()).await.unwrap();
    assert_eq!(page.content[0].title(), "fresh");
}

#[tokio::test(start_paused = true)]
async fn successful_trial_call_closes_the_circuit() {
    let backend = RecordingBackend::failing(2);
    let facade = facade(&backend, 2);

    facade.find_tags().await.unwrap();
    facade.find_tags().await.unwrap();
    assert_eq!(facade.circuit_state(QueryKind::AllTags), CircuitState::Open);

    tokio::time::advance(COOLDOWN).await;
    backend
        .responses
        .lock()
        .await
        .push_back(Ok(r#"["rust","tokio"]"#.into()));

    let tags = facade.find_tags().await.unwrap();
    assert_eq!(tags, vec!["rust", "tokio"]);
    assert_eq!(facade.circuit_state(QueryKind::AllTags), CircuitState::Closed);
    assert_eq!(backend.call_count().await, 3);
}

#[tokio::test(start_paused = true)]
async fn failed_trial_call_reopens_for_another_cooldown() {
    let backend = RecordingBackend::failing(3);
    let facade = facade(&backend, 2);

    facade.find_categories().await.unwrap();
    facade.find_categories().await.unwrap();
    tokio::time::advance(COOLDOWN).await;

    let categories = facade.find_categories().await.unwrap();
    assert_eq!(categories, vec![UNAVAILABLE_WORDS.to_vec()]);
    assert_eq!(
        facade.circuit_state(QueryKind::AllCategories),
        CircuitState::Open
    );

    tokio::time::advance(COOLDOWN / 2).await;
    facade.find_categories().await.unwrap();
    assert_eq!(backend.call_count().await, 3);
}

#[tokio::test(start_paused = true)]
async fn slow_upstream_counts_as_failure() {
    let backend = RecordingBackend {
        delay: Some(Duration::from_secs(10)),
        ..Default::default()
    };
    let facade = facade(&backend, 1);

    let entry = facade.find_by_id(7).await.unwrap();
    assert_eq!(entry.id(), 7);
    assert_eq!(entry.title(), UNAVAILABLE_TITLE);
    assert_eq!(facade.circuit_state(QueryKind::ById), CircuitState::Open);
}

#[tokio::test]
async fn malformed_body_is_served_as_placeholder() {
    let backend = RecordingBackend::with_responses(vec![Ok("<html>oops</html>".into())]);
    let facade = facade(&backend, 1);

    let page = facade
        .find_by_tag("rust", PageRequest::default())
        .await
        .unwrap();
    assert_placeholder_page(&page);
    assert_eq!(facade.circuit_state(QueryKind::ByTag), CircuitState::Open);
}

#[tokio::test]
async fn client_errors_propagate_without_tripping() {
    let not_found = || {
        Err(CatalogError::UpstreamClient {
            status: 404,
            body: "no such entry".into(),
        })
    };
    let backend = RecordingBackend::with_responses(vec![not_found(), not_found(), not_found()]);
    let facade = facade(&backend, 2);

    for _ in 0..3 {
        let err = facade.find_by_id(99).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
    assert_eq!(facade.circuit_state(QueryKind::ById), CircuitState::Closed);
    assert_eq!(backend.call_count().await, 3);
}

#[tokio::test]
async fn invalid_queries_never_reach_the_backend() {
    let backend = RecordingBackend::failing(1);
    let facade = facade(&backend, 1);

    let err = facade.find_all(PageRequest::new(-1, 10)).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidQuery(_)));
    let err = facade.find_by_id(-3).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidQuery(_)));
    let err = facade
        .find_by_categories(Vec::new(), PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidQuery(_)));

    // Still rejected while the circuit is open.
    facade.find_all(PageRequest::default()).await.unwrap();
    assert_eq!(facade.circuit_state(QueryKind::All), CircuitState::Open);
    let err = facade.find_all(PageRequest::new(0, 0)).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidQuery(_)));

    assert_eq!(backend.call_count().await, 1);
}

#[tokio::test]
async fn user_queries_distinguish_author_and_editor() {
    let backend = RecordingBackend::default();
    let facade = facade(&backend, 3);

    facade
        .find_by_created_by("making", PageRequest::new(2, 5))
        .await
        .unwrap();
    facade
        .find_by_updated_by("making", PageRequest::new(2, 5))
        .await
        .unwrap();

    let calls = backend.calls().await;
    assert_eq!(calls[0].kind, QueryKind::ByCreatedBy);
    assert_eq!(calls[0].segments, vec!["users", "making", "entries"]);
    assert!(calls[0].param("updated").is_none());

    assert_eq!(calls[1].kind, QueryKind::ByUpdatedBy);
    let updated = calls[1].param("updated").unwrap();
    assert_eq!(updated.value, None);
    assert_eq!(
        calls[1].param("page").and_then(|p| p.value.as_deref()),
        Some("2")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_all_get_placeholders() {
    let backend = RecordingBackend {
        delay: Some(Duration::from_millis(50)),
        ..RecordingBackend::failing(16)
    };
    let facade = Arc::new(facade(&backend, 4));

    // Every call is admitted while the circuit is still closed; outcomes
    // only arrive after the backend delay.
    let tasks = (0..16).map(|_| {
        let facade = facade.clone();
        tokio::spawn(async move {
            facade
                .find_by_query("rust", PageRequest::new(0, 10))
                .await
        })
    });
    let results = futures::future::join_all(tasks).await;

    assert_eq!(results.len(), 16);
    for result in results {
        let page = result.unwrap().unwrap();
        assert_placeholder_page(&page);
    }
    assert_eq!(backend.call_count().await, 16);
    assert_eq!(
        facade.circuit_state(QueryKind::BySearchTerm),
        CircuitState::Open
    );

    // Open now: further calls never reach the backend.
    let page = facade
        .find_by_query("rust", PageRequest::new(0, 10))
        .await
        .unwrap();
    assert_placeholder_page(&page);
    assert_eq!(backend.call_count().await, 16);
}

#[tokio::test]
async fn health_snapshot_lists_every_kind() {
    let backend = RecordingBackend::default();
    let facade = facade(&backend, 3);

    let states = facade.circuit_states();
    assert_eq!(states.len(), QueryKind::ALL.len());
    assert!(states.iter().all(|(_, s)| *s == CircuitState::Closed));
}
