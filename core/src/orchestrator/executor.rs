//! Orchestrator execution logic

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::cancellation::CancellationToken;
use crate::config::{ExperimentRequest, ExperimentType, OrchestratorConfig};
use crate::error::{ExperimentError, ExperimentResult};
use crate::fanout::{
    Branch, FanInReport, FanOutCoordinator, RunContext, SearchConfigExecutor, SearchRateLimiter,
};
use crate::gate::FailureGate;
use crate::judgment::JudgmentLoader;
use crate::outcome::ExperimentOutcome;
use crate::traits::{ExperimentListener, JudgmentStore, MetricScorer, SearchEngine};

use super::aggregator::{PointwiseAggregator, ResultAggregator};
use super::hybrid::HybridOptimizer;
use super::listener::ChannelListener;
use super::scheduler::DeadlineScheduler;

/// Orchestrator manages the experiment lifecycle
///
/// Each submitted request becomes an independent run with its own
/// cancellation token and failure gate: judgments are loaded, branches fan
/// out, and exactly one notification reaches the run's listener.
pub struct Orchestrator {
    /// Runtime configuration
    pub(crate) config: OrchestratorConfig,

    /// Shared run pipeline
    pub(crate) pipeline: Arc<RunPipeline>,

    /// Collaborator names for diagnostics
    pub(crate) store_name: String,
    pub(crate) engine_name: String,
}

/// Stages shared by every run of an orchestrator
pub(crate) struct RunPipeline {
    loader: JudgmentLoader,
    coordinator: FanOutCoordinator,
    hybrid: Arc<HybridOptimizer>,
}

/// Handle to a submitted run
#[derive(Debug)]
pub struct RunHandle {
    experiment_id: String,
    run_id: String,
    token: Arc<CancellationToken>,
    task: JoinHandle<Option<FanInReport>>,
}

impl RunHandle {
    /// Experiment identifier
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Run identifier
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Request cancellation of the run
    ///
    /// Returns `true` if this call cancelled the run.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    /// The run's cancellation token
    pub fn token(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.token)
    }

    /// Check whether every stage of the run has finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the run and all of its branches settled
    ///
    /// Returns the fan-in report, or `None` if the run ended before fan-out.
    pub async fn settled(self) -> ExperimentResult<Option<FanInReport>> {
        self.task
            .await
            .map_err(|e| ExperimentError::internal(format!("run {} aborted: {e}", self.run_id)))
    }
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    ///
    /// # Errors
    ///
    /// Returns an invalid-request error if the configuration does not validate.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn JudgmentStore>,
        engine: Arc<dyn SearchEngine>,
        scorer: Arc<dyn MetricScorer>,
    ) -> ExperimentResult<Self> {
        config.validate()?;

        let store_name = store.store_name().to_string();
        let engine_name = engine.engine_name().to_string();

        let mut executor = SearchConfigExecutor::new(engine, scorer).with_rate_limiter(Arc::new(
            SearchRateLimiter::new(config.search_rate_limit),
        ));
        if let Some(limit) = config.max_concurrent_branches {
            executor = executor.with_concurrency_limit(Arc::new(Semaphore::new(limit)));
        }

        let pipeline = RunPipeline {
            loader: JudgmentLoader::new(store, config.merge_policy),
            coordinator: FanOutCoordinator::new(Arc::new(executor)),
            hybrid: Arc::new(HybridOptimizer::new(config.hybrid.clone())),
        };

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            store_name,
            engine_name,
        })
    }

    /// Get the orchestrator configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Submit a run; the listener receives exactly one notification
    ///
    /// The request is validated before anything is spawned, so contract
    /// violations are returned here and never reach the listener. Must be
    /// called from within a tokio runtime.
    pub fn submit(
        &self,
        request: ExperimentRequest,
        listener: Arc<dyn ExperimentListener>,
    ) -> ExperimentResult<RunHandle> {
        let token = Arc::new(CancellationToken::new(request.experiment_id.clone()));
        self.submit_with_token(request, token, listener)
    }

    /// Submit a run whose cancellation is controlled by an external token
    pub fn submit_with_token(
        &self,
        request: ExperimentRequest,
        token: Arc<CancellationToken>,
        listener: Arc<dyn ExperimentListener>,
    ) -> ExperimentResult<RunHandle> {
        request.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ExperimentError::internal(format!("no async runtime: {e}")))?;

        let experiment_id = request.experiment_id.clone();
        let run_id = request.run_id.clone();
        let gate = Arc::new(FailureGate::new(listener));
        let pipeline = Arc::clone(&self.pipeline);
        let run_token = Arc::clone(&token);

        let task = runtime.spawn(async move {
            let run_id = request.run_id.clone();
            let run = pipeline.execute(request, run_token, Arc::clone(&gate));
            supervise(&run_id, gate, run).await
        });

        Ok(RunHandle {
            experiment_id,
            run_id,
            token,
            task,
        })
    }

    /// Run an experiment and wait for its outcome
    pub async fn run(&self, request: ExperimentRequest) -> ExperimentResult<ExperimentOutcome> {
        let token = Arc::new(CancellationToken::new(request.experiment_id.clone()));
        self.run_with_token(request, token).await
    }

    /// Run with a deadline
    ///
    /// The run is cancelled when the deadline elapses. A run cancelled before
    /// dispatch fails with a timeout; branches not yet searching are skipped.
    pub async fn run_with_deadline(
        &self,
        request: ExperimentRequest,
        deadline: Duration,
    ) -> ExperimentResult<ExperimentOutcome> {
        request.validate()?;
        let token = Arc::new(CancellationToken::new(request.experiment_id.clone()));
        let _scheduler = DeadlineScheduler::arm(Arc::clone(&token), deadline);
        self.run_with_token(request, token).await
    }

    /// Run with Ctrl+C cancellation and the configured deadline, if any
    pub async fn run_with_signal_handling(
        &self,
        request: ExperimentRequest,
    ) -> ExperimentResult<ExperimentOutcome> {
        request.validate()?;
        let token = Arc::new(CancellationToken::new(request.experiment_id.clone()));
        let _scheduler = self
            .config
            .deadline()
            .map(|deadline| DeadlineScheduler::arm(Arc::clone(&token), deadline));

        let signal_token = Arc::clone(&token);
        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, cancelling run...");
                    signal_token.cancel();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run_with_token(request, token).await;

        signal_handle.abort();

        result
    }

    async fn run_with_token(
        &self,
        request: ExperimentRequest,
        token: Arc<CancellationToken>,
    ) -> ExperimentResult<ExperimentOutcome> {
        let (listener, rx) = ChannelListener::new();
        let handle = self.submit_with_token(request, token, Arc::new(listener))?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(match handle.settled().await {
                Err(e) => e,
                Ok(_) => ExperimentError::internal("run ended without a notification"),
            }),
        }
    }
}

/// Drive a run, turning a panic into an internal failure on the gate
pub(crate) async fn supervise<F>(run_id: &str, gate: Arc<FailureGate>, run: F) -> Option<FanInReport>
where
    F: Future<Output = Option<FanInReport>>,
{
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(report) => report,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            tracing::error!(run_id = %run_id, panic = %message, "Run task panicked");
            gate.try_fail(ExperimentError::internal(format!(
                "run {run_id} panicked: {message}"
            )));
            None
        }
    }
}

impl RunPipeline {
    async fn execute(
        &self,
        request: ExperimentRequest,
        token: Arc<CancellationToken>,
        gate: Arc<FailureGate>,
    ) -> Option<FanInReport> {
        let start = Instant::now();
        tracing::info!(
            experiment_id = %request.experiment_id,
            run_id = %request.run_id,
            experiment_type = %request.experiment_type,
            configurations = request.search_configurations.len(),
            judgments = request.judgment_ids.len(),
            "Starting experiment"
        );

        if token.is_cancelled() {
            gate.try_fail(ExperimentError::timeout(format!(
                "run {} cancelled before judgments were loaded",
                request.run_id
            )));
            return None;
        }

        let ratings = match self.loader.load(&request.judgment_ids).await {
            Ok(ratings) => ratings,
            Err(e) => {
                tracing::warn!(run_id = %request.run_id, error = %e, "Judgment loading failed");
                gate.try_fail(e);
                return None;
            }
        };

        let (branches, aggregator): (Vec<Branch>, Arc<dyn ResultAggregator>) =
            match request.experiment_type {
                ExperimentType::PointwiseEvaluation => (
                    request
                        .search_configurations
                        .iter()
                        .map(|(id, config)| Branch::new(id.clone(), config.clone()))
                        .collect(),
                    Arc::new(PointwiseAggregator),
                ),
                ExperimentType::HybridOptimizer => (
                    self.hybrid.expand(&request.search_configurations),
                    Arc::clone(&self.hybrid) as Arc<dyn ResultAggregator>,
                ),
            };

        let ctx = Arc::new(RunContext {
            experiment_id: request.experiment_id,
            run_id: request.run_id,
            query_text: request.query_text,
            size: request.size,
            token,
            ratings: Arc::new(ratings),
        });

        let report = self
            .coordinator
            .run(branches, Arc::clone(&ctx), gate, aggregator)
            .await;

        tracing::info!(
            experiment_id = %ctx.experiment_id,
            run_id = %ctx.run_id,
            dispatched = report.dispatched,
            succeeded = report.succeeded,
            failed = report.failed,
            state = ?report.state,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Experiment finished"
        );

        Some(report)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("judgment_store", &self.store_name)
            .field("search_engine", &self.engine_name)
            .finish()
    }
}
