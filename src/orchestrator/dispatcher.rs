//! Orchestrator facade.
//!
//! # Responsibilities
//! - Own every subsystem and wire them together
//! - Walk a task through route → retry → fallback → backup
//! - Always produce a `TaskResult`; dispatch failures degrade, they do not
//!   propagate as panics or errors to the caller
//!
//! Routing is synchronous and happens one task at a time in the drain
//! loop, so every decision sees the load of the dispatch before it; only
//! the calls themselves overlap. Finished results and statuses are
//! retained until collected via `take_result` or evicted once the
//! `result_retention` bound is exceeded, oldest first.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::config::DispatcherConfig;
use crate::destination::{CallAdapter, CallResult, Destination, DestinationDescriptor, DestinationRegistry};
use crate::error::DispatchError;
use crate::events::{Event, EventType, SharedSink, TracingSink};
use crate::health::{HealthProbe, HealthStatus, HealthTracker};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::orchestrator::status::StatusBoard;
use crate::resilience::{CircuitBreakerRegistry, CircuitState, RetryEngine};
use crate::routing::{FallbackSelector, RoutingDecision, TaskRouter};
use crate::task::{CallAttempt, Priority, Task, TaskStatus};

/// Terminal outcome of one task's dispatch. Always produced, never an error.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub status: TaskStatus,
    /// Output of the successful call, if any.
    pub output: Option<CallResult>,
    /// True when the output came from a fallback or the backup rather than
    /// the primary routing choice.
    pub degraded: bool,
    pub destination_used: Option<String>,
    /// Append-only log of every call attempt made for this task.
    pub attempts: Vec<CallAttempt>,
    pub error: Option<DispatchError>,
}

/// Per-destination line in a [`SystemHealth`] report.
#[derive(Debug, Clone, Serialize)]
pub struct DestinationReport {
    pub id: String,
    pub health: HealthStatus,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
    pub sample_count: usize,
    pub circuit: CircuitState,
    pub load: f64,
    pub is_backup: bool,
}

/// Point-in-time view of the whole dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub destinations: Vec<DestinationReport>,
    pub healthy_count: usize,
    pub open_circuits: usize,
    /// Healthy share of all registered destinations, 0.0 – 1.0.
    pub availability: f64,
    pub queue_depth: usize,
}

/// Facade over routing, resilience and health tracking.
///
/// Construct once, call [`start`](Self::start) to spawn the background
/// loops, then submit tasks. All methods take `&self`; the orchestrator is
/// shared behind an `Arc`.
pub struct ResilienceOrchestrator {
    config: DispatcherConfig,
    registry: Arc<DestinationRegistry>,
    health: Arc<HealthTracker>,
    breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryEngine,
    router: TaskRouter,
    fallback: FallbackSelector,
    probe: Arc<HealthProbe>,
    status: StatusBoard,
    results: DashMap<Uuid, TaskResult>,
    /// Finished task ids in completion order, for bounded retention.
    retained: Mutex<VecDeque<Uuid>>,
    events: SharedSink,
    shutdown: Shutdown,
}

impl ResilienceOrchestrator {
    pub fn new(config: DispatcherConfig) -> Self {
        Self::with_event_sink(config, Arc::new(TracingSink))
    }

    pub fn with_event_sink(config: DispatcherConfig, events: SharedSink) -> Self {
        let registry = Arc::new(DestinationRegistry::new());
        let health = Arc::new(HealthTracker::new(events.clone()));
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            config.circuit_breaker,
            events.clone(),
        ));
        let retry = RetryEngine::new(breakers.clone(), health.clone());
        let router = TaskRouter::new(registry.clone(), health.clone(), config.router.clone());
        let fallback = FallbackSelector::new(registry.clone(), health.clone());
        let probe = Arc::new(HealthProbe::new(
            registry.clone(),
            health.clone(),
            breakers.clone(),
            config.probe.clone(),
        ));

        Self {
            config,
            registry,
            health,
            breakers,
            retry,
            router,
            fallback,
            probe,
            status: StatusBoard::new(),
            results: DashMap::new(),
            retained: Mutex::new(VecDeque::new()),
            events,
            shutdown: Shutdown::new(),
        }
    }

    /// Reproducible backoff jitter for tests.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.retry = RetryEngine::new(self.breakers.clone(), self.health.clone())
            .with_jitter_seed(seed);
        self
    }

    /// Spawn the queue drain loop, the load decay ticker and the health
    /// probe loop. Idempotent use is not supported; call once.
    pub fn start(self: &Arc<Self>) {
        let drain = self.clone();
        let mut drain_shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            tracing::info!("queue drain loop starting");
            loop {
                tokio::select! {
                    task = drain.router.queue().pop() => {
                        // Route here, not in the spawned task: decisions for
                        // equal-priority tasks must observe each other's
                        // load bumps in dequeue order.
                        match drain.prepare(&task) {
                            Ok(decision) => {
                                let this = drain.clone();
                                tokio::spawn(async move {
                                    let result = this.dispatch(&task, decision).await;
                                    this.finalize(task.id, result);
                                });
                            }
                            Err(early) => {
                                drain.finalize(task.id, early);
                            }
                        }
                    }
                    _ = drain_shutdown.recv() => {
                        tracing::info!("queue drain loop received shutdown, exiting");
                        break;
                    }
                }
            }
        });

        let decay = self.clone();
        let mut decay_shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_secs(
                decay.config.router.load_decay_interval_secs,
            ));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        decay.router.decay_loads();
                        metrics::record_queue_depth(decay.router.queue().len().await);
                    }
                    _ = decay_shutdown.recv() => break,
                }
            }
        });

        tokio::spawn(self.probe.clone().run(self.shutdown.subscribe()));
    }

    /// Stop all background loops. In-flight executions run to completion.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Stop the background loops and wait until each has acknowledged the
    /// signal by exiting. In-flight executions still run to completion.
    pub async fn stop_and_drain(&self) {
        self.shutdown.trigger();
        self.shutdown.drained().await;
    }

    /// Register a destination, making it immediately routable.
    pub fn register_destination(
        &self,
        descriptor: DestinationDescriptor,
        adapter: Arc<dyn CallAdapter>,
    ) {
        self.registry.register(descriptor, adapter);
    }

    /// Remove a destination along with its health window and breaker. Tasks
    /// already executing against it finish their current attempt.
    pub fn deregister_destination(&self, id: &str) -> bool {
        let removed = self.registry.deregister(id);
        if removed {
            self.health.forget(id);
            self.breakers.forget(id);
        }
        removed
    }

    /// Accept a task for dispatch.
    ///
    /// Critical tasks skip the queue and start executing immediately; all
    /// others wait for the drain loop. Returns the task id for status
    /// queries.
    pub async fn submit_task(
        self: &Arc<Self>,
        spec: crate::task::TaskSpec,
    ) -> Result<Uuid, DispatchError> {
        let task = Task::from_spec(spec);
        let id = task.id;
        self.status.insert(id);

        if task.priority == Priority::Critical {
            tracing::debug!(task = %id, "critical task bypassing queue");
            let this = self.clone();
            tokio::spawn(async move {
                this.execute_task(task).await;
            });
        } else if let Err(error) = self.router.queue().push(task).await {
            self.status.advance(id, TaskStatus::Failed);
            return Err(error);
        }

        Ok(id)
    }

    /// Execute one task end to end: route, retry against the primary, walk
    /// the fallback chain, and finally try the backup. The result is stored
    /// for [`take_result`](Self::take_result) and also returned.
    pub async fn execute_task(&self, task: Task) -> TaskResult {
        let result = match self.prepare(&task) {
            Ok(decision) => self.dispatch(&task, decision).await,
            Err(early) => early,
        };
        self.finalize(task.id, result)
    }

    /// Synchronous routing stage: deadline gate, routing decision, status
    /// and load updates. Kept separate from [`dispatch`](Self::dispatch) so
    /// the drain loop can route queued tasks one at a time while their
    /// executions overlap.
    fn prepare(&self, task: &Task) -> Result<RoutingDecision, TaskResult> {
        if task.is_expired() {
            return Err(self.expired_result(task, Vec::new()));
        }

        let decision = match self.router.route(task) {
            Ok(decision) => decision,
            Err(error) => {
                tracing::error!(task = %task.id, error = %error, "routing failed");
                return Err(TaskResult {
                    task_id: task.id,
                    status: TaskStatus::Failed,
                    output: None,
                    degraded: false,
                    destination_used: None,
                    attempts: Vec::new(),
                    error: Some(error),
                });
            }
        };

        self.status.advance(task.id, TaskStatus::Assigned);
        self.events.emit(
            Event::new(EventType::TaskRouted)
                .task(task.id)
                .destination(&decision.destination.id)
                .details(serde_json::json!({
                    "confidence": decision.confidence,
                    "reason": decision.reason,
                    "capability_filter_relaxed": decision.capability_filter_relaxed,
                })),
        );
        self.status.advance(task.id, TaskStatus::Running);
        // Bump the load before execution is spawned so the next routing
        // decision already sees this dispatch.
        self.router.record_dispatch(&decision.destination);
        Ok(decision)
    }

    async fn dispatch(&self, task: &Task, decision: RoutingDecision) -> TaskResult {
        let mut attempts: Vec<CallAttempt> = Vec::new();
        let primary = decision.destination.clone();
        match self.call_destination(task, &primary, &mut attempts).await {
            Ok(output) => return self.completed_result(task, &primary, false, output, attempts),
            Err(error) if !error.escalates_to_fallback() => {
                tracing::info!(task = %task.id, error = %error, "failing without fallback");
                return TaskResult {
                    task_id: task.id,
                    status: TaskStatus::Failed,
                    output: None,
                    degraded: false,
                    destination_used: Some(primary.id.clone()),
                    attempts,
                    error: Some(error),
                };
            }
            Err(error) => {
                tracing::warn!(
                    task = %task.id,
                    destination = %primary.id,
                    error = %error,
                    "primary destination failed, consulting fallback chain"
                );
            }
        }

        let chain = self
            .fallback
            .order_candidates(&primary.id, &task.required_capabilities);
        let mut last_error: Option<DispatchError> = None;

        let (alternates, backup): (Vec<_>, Vec<_>) = chain
            .candidates
            .into_iter()
            .partition(|d| !d.is_backup);

        for candidate in alternates
            .into_iter()
            .take(self.config.orchestrator.max_fallback_attempts)
        {
            if task.is_expired() {
                return self.expired_result(task, attempts);
            }
            self.router.record_dispatch(&candidate);
            match self.call_destination(task, &candidate, &mut attempts).await {
                Ok(output) => {
                    return self.completed_result(task, &candidate, true, output, attempts)
                }
                Err(error) if !error.escalates_to_fallback() => {
                    return TaskResult {
                        task_id: task.id,
                        status: TaskStatus::Failed,
                        output: None,
                        degraded: false,
                        destination_used: Some(candidate.id.clone()),
                        attempts,
                        error: Some(error),
                    };
                }
                Err(error) => last_error = Some(error),
            }
        }

        // Last resort: the backup, outside the fallback attempt budget.
        for candidate in backup {
            if task.is_expired() {
                return self.expired_result(task, attempts);
            }
            tracing::warn!(task = %task.id, "all alternates failed, trying backup");
            self.router.record_dispatch(&candidate);
            match self.call_destination(task, &candidate, &mut attempts).await {
                Ok(output) => {
                    return self.completed_result(task, &candidate, true, output, attempts)
                }
                Err(error) => last_error = Some(error),
            }
        }

        tracing::error!(
            task = %task.id,
            attempts = attempts.len(),
            "every destination exhausted"
        );
        self.events.emit(
            Event::new(EventType::TaskExhausted)
                .task(task.id)
                .details(serde_json::json!({"attempts": attempts.len()})),
        );
        TaskResult {
            task_id: task.id,
            status: TaskStatus::Failed,
            output: None,
            // The system as a whole failed this task; the caller is getting
            // reduced service even though there is no output.
            degraded: true,
            destination_used: None,
            attempts,
            error: last_error.or(Some(DispatchError::NoCandidateDestination)),
        }
    }

    /// Record the result in the status board, the metrics and the bounded
    /// result store.
    fn finalize(&self, task_id: Uuid, result: TaskResult) -> TaskResult {
        self.status.advance(task_id, result.status);
        match result.status {
            TaskStatus::Completed => metrics::record_task_outcome("completed"),
            TaskStatus::Expired => metrics::record_task_outcome("expired"),
            _ => metrics::record_task_outcome("failed"),
        }

        self.results.insert(task_id, result.clone());
        self.retain(task_id);
        result
    }

    fn retain(&self, task_id: Uuid) {
        let mut retained = match self.retained.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        retained.push_back(task_id);
        while retained.len() > self.config.orchestrator.result_retention {
            if let Some(evicted) = retained.pop_front() {
                self.results.remove(&evicted);
                self.status.forget(evicted);
                tracing::debug!(task = %evicted, "result evicted from retention");
            }
        }
    }

    /// Load accounting for the dispatch already happened in
    /// [`prepare`](Self::prepare) or the fallback walk.
    async fn call_destination(
        &self,
        task: &Task,
        destination: &Arc<Destination>,
        attempts: &mut Vec<CallAttempt>,
    ) -> Result<CallResult, DispatchError> {
        let outcome = self
            .retry
            .execute(destination, &task.payload, &self.config.retry, attempts)
            .await;
        self.router
            .record_completion(&destination.id, &task.task_type, outcome.is_ok());
        outcome
    }

    fn completed_result(
        &self,
        task: &Task,
        destination: &Arc<Destination>,
        degraded: bool,
        output: CallResult,
        attempts: Vec<CallAttempt>,
    ) -> TaskResult {
        if degraded {
            tracing::info!(
                task = %task.id,
                destination = %destination.id,
                "task completed via fallback"
            );
        }
        TaskResult {
            task_id: task.id,
            status: TaskStatus::Completed,
            output: Some(output),
            degraded,
            destination_used: Some(destination.id.clone()),
            attempts,
            error: None,
        }
    }

    fn expired_result(&self, task: &Task, attempts: Vec<CallAttempt>) -> TaskResult {
        tracing::warn!(task = %task.id, "task deadline elapsed before completion");
        self.events
            .emit(Event::new(EventType::TaskExpired).task(task.id));
        TaskResult {
            task_id: task.id,
            status: TaskStatus::Expired,
            output: None,
            degraded: false,
            destination_used: None,
            attempts,
            error: Some(DispatchError::TaskExpired {
                task_id: task.id.to_string(),
            }),
        }
    }

    /// Current lifecycle status of a submitted task.
    pub fn get_routing_status(&self, task_id: Uuid) -> Option<TaskStatus> {
        self.status.get(task_id)
    }

    /// Remove and return a finished task's result, if available. Collecting
    /// the result also drops the task's status entry.
    pub fn take_result(&self, task_id: Uuid) -> Option<TaskResult> {
        let result = self.results.remove(&task_id).map(|(_, result)| result);
        if result.is_some() {
            self.status.forget(task_id);
        }
        result
    }

    /// Snapshot of every destination's health, circuit and load, plus queue
    /// depth.
    pub async fn get_system_health(&self) -> SystemHealth {
        let mut destinations: Vec<DestinationReport> = self
            .registry
            .all()
            .into_iter()
            .map(|destination| {
                let snapshot = self.health.get_health(&destination.id);
                DestinationReport {
                    id: destination.id.clone(),
                    health: snapshot.status,
                    success_rate: snapshot.success_rate,
                    avg_latency_ms: snapshot.avg_latency.as_millis() as u64,
                    sample_count: snapshot.sample_count,
                    circuit: self.breakers.state(&destination.id),
                    load: destination.load(),
                    is_backup: destination.is_backup,
                }
            })
            .collect();
        destinations.sort_by(|a, b| a.id.cmp(&b.id));

        let healthy_count = destinations
            .iter()
            .filter(|d| d.health == HealthStatus::Healthy)
            .count();
        let open_circuits = destinations
            .iter()
            .filter(|d| d.circuit == CircuitState::Open)
            .count();
        let availability = if destinations.is_empty() {
            0.0
        } else {
            healthy_count as f64 / destinations.len() as f64
        };

        SystemHealth {
            healthy_count,
            open_circuits,
            availability,
            queue_depth: self.router.queue().len().await,
            destinations,
        }
    }

    /// Latest probe-published load distribution.
    pub fn load_distribution(&self) -> Arc<std::collections::HashMap<String, f64>> {
        self.probe.load_distribution()
    }

    pub fn registry(&self) -> &DestinationRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &crate::routing::TaskQueue {
        self.router.queue()
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn health_tracker(&self) -> &HealthTracker {
        &self.health
    }
}

/// Run one probe sweep immediately. Exposed for hosts that want a warm
/// health view before accepting traffic.
impl ResilienceOrchestrator {
    pub async fn probe_now(&self) {
        let started = Instant::now();
        self.probe.sweep().await;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "manual probe sweep finished"
        );
    }
}
