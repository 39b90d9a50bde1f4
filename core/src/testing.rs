//! Mock collaborators shared by the subsystem test suites

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExperimentError;
use crate::judgment::{Judgment, JudgmentStatus, QueryJudgment};
use crate::outcome::ExperimentOutcome;
use crate::traits::{
    ExperimentListener, JudgmentStore, SearchEngine, SearchError, SearchHit, SearchRequest,
    StoreError,
};

// ============================================================================
// Mock JudgmentStore
// ============================================================================

pub(crate) struct MockJudgmentStore {
    judgments: HashMap<String, Judgment>,
    unavailable: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl MockJudgmentStore {
    pub(crate) fn new() -> Self {
        Self {
            judgments: HashMap::new(),
            unavailable: HashSet::new(),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_judgment(mut self, id: &str, judgment: Judgment) -> Self {
        self.judgments.insert(id.to_string(), judgment);
        self
    }

    /// Judgment rating `query` with `(docId, rating)` pairs
    pub(crate) fn with_ratings(self, id: &str, query: &str, ratings: &[(&str, f64)]) -> Self {
        self.with_judgment(id, Judgment::new(id, vec![QueryJudgment::new(query, ratings)]))
    }

    pub(crate) fn with_status(mut self, id: &str, status: JudgmentStatus) -> Self {
        let judgment = self.judgments.entry(id.to_string()).or_default();
        judgment.status = status;
        self
    }

    pub(crate) fn with_unavailable(mut self, id: &str) -> Self {
        self.unavailable.insert(id.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JudgmentStore for MockJudgmentStore {
    fn store_name(&self) -> &str {
        "mock"
    }

    async fn get_judgment(&self, judgment_id: &str) -> Result<Judgment, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(judgment_id) {
            tokio::time::sleep(*delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.contains(judgment_id) {
            return Err(StoreError::Unavailable(format!("{judgment_id} unreachable")));
        }
        self.judgments
            .get(judgment_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(judgment_id.to_string()))
    }
}

// ============================================================================
// Mock SearchEngine
// ============================================================================

type Ranker = Arc<dyn Fn(&SearchRequest) -> Vec<String> + Send + Sync>;

pub(crate) struct MockSearchEngine {
    hits: HashMap<String, Vec<String>>,
    ranker: Option<Ranker>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<SearchRequest>>,
}

impl MockSearchEngine {
    pub(crate) fn new() -> Self {
        Self {
            hits: HashMap::new(),
            ranker: None,
            failing: HashSet::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fixed ranking returned for `index`
    pub(crate) fn with_hits(mut self, index: &str, doc_ids: &[&str]) -> Self {
        self.hits
            .insert(index.to_string(), doc_ids.iter().map(|d| d.to_string()).collect());
        self
    }

    /// Ranking computed per request, used when no fixed ranking matches
    pub(crate) fn with_ranker<F>(mut self, ranker: F) -> Self
    where
        F: Fn(&SearchRequest) -> Vec<String> + Send + Sync + 'static,
    {
        self.ranker = Some(Arc::new(ranker));
        self
    }

    pub(crate) fn with_failing_index(mut self, index: &str) -> Self {
        self.failing.insert(index.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchEngine for MockSearchEngine {
    fn engine_name(&self) -> &str {
        "mock"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&request.index) {
            return Err(SearchError::Backend {
                status: 500,
                message: format!("{} is broken", request.index),
            });
        }

        let doc_ids = match (self.hits.get(&request.index), &self.ranker) {
            (Some(doc_ids), _) => doc_ids.clone(),
            (None, Some(ranker)) => ranker(request),
            (None, None) => Vec::new(),
        };
        Ok(doc_ids.into_iter().map(SearchHit::new).collect())
    }
}

// ============================================================================
// Recording listener
// ============================================================================

#[derive(Default)]
pub(crate) struct RecordingListener {
    responses: Mutex<Vec<ExperimentOutcome>>,
    failures: Mutex<Vec<ExperimentError>>,
    settled: tokio::sync::Notify,
}

impl RecordingListener {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn responses(&self) -> Vec<ExperimentOutcome> {
        self.responses.lock().unwrap().clone()
    }

    pub(crate) fn failures(&self) -> Vec<ExperimentError> {
        self.failures.lock().unwrap().clone()
    }

    pub(crate) fn notifications(&self) -> usize {
        self.responses.lock().unwrap().len() + self.failures.lock().unwrap().len()
    }

    /// Wait until at least one notification arrived
    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.settled.notified();
            if self.notifications() > 0 {
                return;
            }
            notified.await;
        }
    }
}

impl ExperimentListener for RecordingListener {
    fn on_response(&self, outcome: ExperimentOutcome) {
        self.responses.lock().unwrap().push(outcome);
        self.settled.notify_waiters();
    }

    fn on_failure(&self, error: ExperimentError) {
        self.failures.lock().unwrap().push(error);
        self.settled.notify_waiters();
    }
}
