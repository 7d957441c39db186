//! Analysis Orchestrator - validates a trigger, runs the computation with a
//! timeout race, and maintains result history

pub mod computation;

use crate::activity::ActivityLog;
use crate::advisory;
use crate::analysis::{AnalysisResult, Deltas};
use crate::dataset::Row;
use crate::error::{Result, ValidationFailure};
use crate::history::AuditHistory;
use crate::persistence::{PersistenceStore, StoreCollection};
use crate::store::{CollectionStore, CombineMode};
use chrono::Utc;
use self::computation::{BackgroundComputation, Computation, ComputationInput, InProcessComputation};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Engine-level tunables.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// How long the background computation may run before the orchestrator
    /// falls back to the synchronous path
    pub computation_timeout: Duration,

    /// Cadence of the silent re-audit loop
    pub live_refresh_interval: Duration,

    /// Run analysis passes on the blocking thread pool
    pub offload_computation: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            computation_timeout: Duration::from_secs(10),
            live_refresh_interval: Duration::from_secs(60),
            offload_computation: true,
        }
    }
}

/// Per-run lifecycle. `Blocked` and `Rendered` are the two terminal states
/// of a trigger.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditState {
    Idle,
    Validating,
    Blocked,
    Computing,
    Rendered,
}

/// The user's current coordinate mapping and combination mode.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CoordinateSelection {
    pub x: Option<String>,
    pub y: Option<String>,
    pub mode: CombineMode,
}

/// What a trigger produced.
#[derive(Debug)]
pub enum AuditOutcome {
    Completed(Box<AnalysisResult>),
    /// Another run was in flight; this trigger coalesced into it
    Coalesced,
}

pub struct AuditOrchestrator {
    store: Arc<AsyncMutex<CollectionStore>>,
    history: Arc<AsyncMutex<AuditHistory>>,
    persistence: Arc<dyn PersistenceStore>,
    activity: Arc<ActivityLog>,
    computation: Arc<dyn Computation>,
    selection: Mutex<CoordinateSelection>,
    state: Mutex<AuditState>,
    running: AtomicBool,
    pending: AtomicBool,
    options: EngineOptions,
}

impl AuditOrchestrator {
    pub fn new(
        store: Arc<AsyncMutex<CollectionStore>>,
        history: Arc<AsyncMutex<AuditHistory>>,
        persistence: Arc<dyn PersistenceStore>,
        activity: Arc<ActivityLog>,
        options: EngineOptions,
    ) -> Self {
        let computation: Arc<dyn Computation> = if options.offload_computation {
            Arc::new(BackgroundComputation::new())
        } else {
            Arc::new(InProcessComputation)
        };
        Self::with_computation(store, history, persistence, activity, options, computation)
    }

    pub fn with_computation(
        store: Arc<AsyncMutex<CollectionStore>>,
        history: Arc<AsyncMutex<AuditHistory>>,
        persistence: Arc<dyn PersistenceStore>,
        activity: Arc<ActivityLog>,
        options: EngineOptions,
        computation: Arc<dyn Computation>,
    ) -> Self {
        Self {
            store,
            history,
            persistence,
            activity,
            computation,
            selection: Mutex::new(CoordinateSelection::default()),
            state: Mutex::new(AuditState::Idle),
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            options,
        }
    }

    pub fn state(&self) -> AuditState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: AuditState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn selection(&self) -> CoordinateSelection {
        self.selection.lock().unwrap().clone()
    }

    pub fn select_x(&self, column: impl Into<String>) {
        self.selection.lock().unwrap().x = Some(column.into());
    }

    pub fn select_y(&self, column: impl Into<String>) {
        self.selection.lock().unwrap().y = Some(column.into());
    }

    pub fn set_mode(&self, mode: CombineMode) {
        self.selection.lock().unwrap().mode = mode;
    }

    pub fn store(&self) -> Arc<AsyncMutex<CollectionStore>> {
        Arc::clone(&self.store)
    }

    pub fn history(&self) -> Arc<AsyncMutex<AuditHistory>> {
        Arc::clone(&self.history)
    }

    /// Run one audit. Concurrent triggers are serialized through a
    /// single-slot pending flag: the latest trigger wins and exactly one
    /// computation is in flight at any time.
    pub async fn trigger_audit(&self) -> Result<AuditOutcome> {
        if self.running.swap(true, Ordering::SeqCst) {
            self.pending.store(true, Ordering::SeqCst);
            self.activity
                .info("Audit trigger coalesced into the in-flight run");
            return Ok(AuditOutcome::Coalesced);
        }

        let mut outcome = self.run_once().await;
        loop {
            if self.pending.swap(false, Ordering::SeqCst) {
                outcome = self.run_once().await;
                continue;
            }
            self.running.store(false, Ordering::SeqCst);
            // A trigger may have slipped in between the pending check and
            // the release; reclaim the slot for it.
            if self.pending.load(Ordering::SeqCst) && !self.running.swap(true, Ordering::SeqCst) {
                self.pending.store(false, Ordering::SeqCst);
                outcome = self.run_once().await;
                continue;
            }
            break;
        }

        outcome.map(|result| AuditOutcome::Completed(Box::new(result)))
    }

    /// Validate the current selection against the collection. Each failure
    /// is a distinct, user-reportable reason.
    async fn validate(&self) -> std::result::Result<(Vec<Row>, String, String, Vec<String>), ValidationFailure> {
        let selection = self.selection();
        let store = self.store.lock().await;

        if store.is_empty() {
            return Err(ValidationFailure::NoDatasetLoaded);
        }
        let x = selection.x.ok_or(ValidationFailure::XUnselected)?;
        let y = selection.y.ok_or(ValidationFailure::YUnselected)?;

        let rows = store.select_working_set(selection.mode);
        if rows.is_empty() {
            return Err(ValidationFailure::EmptyWorkingSet);
        }

        let numeric_columns: Vec<String> = store
            .get_all()
            .iter()
            .flat_map(|ds| ds.schema.numerical.iter().cloned())
            .unique()
            .collect();

        Ok((rows, x, y, numeric_columns))
    }

    async fn run_once(&self) -> Result<AnalysisResult> {
        self.set_state(AuditState::Validating);

        let (rows, chosen_x, chosen_y, numeric_columns) = match self.validate().await {
            Ok(prepared) => prepared,
            Err(reason) => {
                self.set_state(AuditState::Blocked);
                self.activity.warn(format!("Audit blocked: {reason}"));
                return Err(reason.into());
            }
        };

        self.set_state(AuditState::Computing);
        let input = ComputationInput {
            rows,
            chosen_x: chosen_x.clone(),
            chosen_y: chosen_y.clone(),
            numeric_columns,
        };

        // Race the computation against the timer. The timed-out run is
        // abandoned, not cancelled; whichever path completes first is the
        // one result this trigger keeps.
        let output = match tokio::time::timeout(
            self.options.computation_timeout,
            self.computation.run(input.clone()),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "computation failed, falling back to the synchronous path");
                self.activity
                    .warn(format!("Computation fell back to synchronous execution: {e}"));
                computation::compute(&input)?
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.options.computation_timeout.as_millis() as u64,
                    "computation timed out, falling back to the synchronous path"
                );
                self.computation.cancel();
                self.activity
                    .warn("Computation timed out; synchronous fallback produced the result");
                computation::compute(&input)?
            }
        };

        let prior = self.history.lock().await.latest().await;
        let deltas = prior
            .as_ref()
            .map(|p| Deltas::between(&output.main_statistics, &p.main_statistics))
            .unwrap_or_default();

        let top_category = output
            .categorical_aggregation
            .first()
            .map(|c| c.key.clone());
        let assessment = advisory::interpret(
            &output.main_statistics,
            output.correlation,
            &deltas,
            &chosen_x,
            &chosen_y,
            top_category.as_deref(),
        );
        let narrative_sections = advisory::build_narrative(
            &assessment,
            &output.main_statistics,
            &chosen_x,
            &chosen_y,
            top_category.as_deref(),
        );

        let result = AnalysisResult {
            track_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            content_hash: output.content_hash,
            chosen_x,
            chosen_y,
            statistics_by_column: output.statistics_by_column,
            main_statistics: output.main_statistics,
            correlation: output.correlation,
            categorical_aggregation: output.categorical_aggregation,
            deltas,
            interpretation: assessment.interpretation,
            impact_matrix: assessment.impact_matrix,
            advisory: assessment.advisory,
            narrative_sections,
        };

        match serde_json::to_value(&result) {
            Ok(record) => {
                if let Err(e) = self.persistence.put(StoreCollection::Audits, record).await {
                    warn!(error = %e, "audit result write-through failed");
                    self.activity
                        .warn(format!("Could not persist audit result: {e}"));
                }
            }
            Err(e) => warn!(error = %e, "audit result could not be serialized"),
        }

        self.history.lock().await.prepend_if_new(&result).await;
        self.set_state(AuditState::Rendered);
        info!(track_id = %result.track_id, "audit rendered");

        Ok(result)
    }

    /// Whether the silent refresh loop has anything to do: a full
    /// coordinate mapping and at least one dataset.
    async fn refresh_armed(&self) -> bool {
        let selection = self.selection();
        if selection.x.is_none() || selection.y.is_none() {
            return false;
        }
        !self.store.lock().await.is_empty()
    }

    /// Start the periodic live-refresh loop. Re-triggers the normal audit
    /// path; every failure is logged and swallowed. The caller owns the
    /// handle and aborts it to stop the loop.
    pub fn spawn_live_refresh(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(orchestrator.options.live_refresh_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; consume it so the loop waits
            // one full interval before the first silent audit.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !orchestrator.refresh_armed().await {
                    continue;
                }
                match orchestrator.trigger_audit().await {
                    Ok(_) => debug!("live refresh completed"),
                    Err(e) => {
                        debug!(error = %e, "live refresh failed");
                        orchestrator
                            .activity
                            .warn(format!("Live refresh failed silently: {e}"));
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, DatasetMeta, DatasetSchema};
    use crate::error::EngineError;
    use crate::persistence::MemoryStore;
    use super::computation::ComputationOutput;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sales_dataset() -> Dataset {
        let headers: Vec<String> = vec!["region".to_string(), "revenue".to_string()];
        let rows = vec![
            row(&[("region", "East"), ("revenue", "600")]),
            row(&[("region", "West"), ("revenue", "250")]),
            row(&[("region", "North"), ("revenue", "150")]),
        ];
        Dataset {
            id: "d1".to_string(),
            name: "sales.csv".to_string(),
            content_hash: crate::stats::content_hash(&rows),
            meta: DatasetMeta::new(None, rows.len()),
            schema: crate::ingestion::discover_schema(&headers, &rows),
            rows,
            headers,
        }
    }

    struct Fixture {
        orchestrator: Arc<AuditOrchestrator>,
        persistence: Arc<MemoryStore>,
    }

    async fn fixture(options: EngineOptions) -> Fixture {
        let persistence = Arc::new(MemoryStore::new());
        let activity = Arc::new(ActivityLog::new());
        let store = Arc::new(AsyncMutex::new(CollectionStore::new(
            Arc::clone(&persistence) as Arc<dyn PersistenceStore>,
            Arc::clone(&activity),
        )));
        let history = Arc::new(AsyncMutex::new(AuditHistory::new(
            Arc::clone(&persistence) as Arc<dyn PersistenceStore>,
            Arc::clone(&activity),
        )));
        let orchestrator = Arc::new(AuditOrchestrator::new(
            store,
            history,
            Arc::clone(&persistence) as Arc<dyn PersistenceStore>,
            activity,
            options,
        ));
        Fixture {
            orchestrator,
            persistence,
        }
    }

    async fn loaded_fixture() -> Fixture {
        let f = fixture(EngineOptions::default()).await;
        f.orchestrator.store().lock().await.add(sales_dataset()).await;
        f.orchestrator.select_x("region");
        f.orchestrator.select_y("revenue");
        f
    }

    #[tokio::test]
    async fn validation_reports_distinct_reasons_in_order() {
        let f = fixture(EngineOptions::default()).await;

        let err = f.orchestrator.trigger_audit().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationFailure::NoDatasetLoaded)
        ));

        f.orchestrator.store().lock().await.add(sales_dataset()).await;
        let err = f.orchestrator.trigger_audit().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationFailure::XUnselected)
        ));

        f.orchestrator.select_x("region");
        let err = f.orchestrator.trigger_audit().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationFailure::YUnselected)
        ));
        assert_eq!(f.orchestrator.state(), AuditState::Blocked);

        // A blocked trigger must not produce any result.
        assert!(f
            .persistence
            .get_all(StoreCollection::Audits)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn empty_working_set_blocks() {
        let f = fixture(EngineOptions::default()).await;
        let empty = Dataset {
            id: "empty".to_string(),
            name: "empty.csv".to_string(),
            rows: Vec::new(),
            headers: vec!["region".to_string(), "revenue".to_string()],
            schema: DatasetSchema {
                numerical: vec!["revenue".to_string()],
                temporal: Vec::new(),
                categorical: vec!["region".to_string()],
            },
            content_hash: crate::stats::content_hash(&[]),
            meta: DatasetMeta::new(None, 0),
        };
        f.orchestrator.store().lock().await.add(empty).await;
        f.orchestrator.select_x("region");
        f.orchestrator.select_y("revenue");

        let err = f.orchestrator.trigger_audit().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationFailure::EmptyWorkingSet)
        ));
    }

    #[tokio::test]
    async fn successful_audit_renders_persists_and_records_history() {
        let f = loaded_fixture().await;

        let outcome = f.orchestrator.trigger_audit().await.unwrap();
        let result = match outcome {
            AuditOutcome::Completed(result) => result,
            AuditOutcome::Coalesced => panic!("unexpected coalesce"),
        };

        assert_eq!(f.orchestrator.state(), AuditState::Rendered);
        assert_eq!(result.main_statistics.sum, 1000.0);
        assert_eq!(result.top_category(), Some("East"));
        // East's 600 of 1000 concentrates 60%.
        assert_eq!(result.interpretation.operational_state, "Highly Concentrated");

        let persisted = f.persistence.get_all(StoreCollection::Audits).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0]["track_id"], result.track_id.as_str());

        let history = f.orchestrator.history();
        assert_eq!(history.lock().await.len().await, 1);
    }

    struct SlowComputation {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Computation for SlowComputation {
        async fn run(&self, input: ComputationInput) -> Result<ComputationOutput> {
            tokio::time::sleep(self.delay).await;
            computation::compute(&input)
        }

        fn cancel(&self) {}
    }

    #[tokio::test]
    async fn timeout_falls_back_to_synchronous_computation() {
        let persistence = Arc::new(MemoryStore::new());
        let activity = Arc::new(ActivityLog::new());
        let store = Arc::new(AsyncMutex::new(CollectionStore::new(
            Arc::clone(&persistence) as Arc<dyn PersistenceStore>,
            Arc::clone(&activity),
        )));
        let history = Arc::new(AsyncMutex::new(AuditHistory::new(
            Arc::clone(&persistence) as Arc<dyn PersistenceStore>,
            Arc::clone(&activity),
        )));
        let options = EngineOptions {
            computation_timeout: Duration::from_millis(20),
            ..EngineOptions::default()
        };
        let orchestrator = Arc::new(AuditOrchestrator::with_computation(
            store,
            history,
            Arc::clone(&persistence) as Arc<dyn PersistenceStore>,
            Arc::clone(&activity),
            options,
            Arc::new(SlowComputation {
                delay: Duration::from_secs(5),
            }),
        ));
        orchestrator.store().lock().await.add(sales_dataset()).await;
        orchestrator.select_x("region");
        orchestrator.select_y("revenue");

        let outcome = orchestrator.trigger_audit().await.unwrap();
        assert!(matches!(outcome, AuditOutcome::Completed(_)));
        // Exactly one result was kept despite the abandoned slow run.
        let persisted = persistence.get_all(StoreCollection::Audits).await.unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_trigger_coalesces() {
        let persistence = Arc::new(MemoryStore::new());
        let activity = Arc::new(ActivityLog::new());
        let store = Arc::new(AsyncMutex::new(CollectionStore::new(
            Arc::clone(&persistence) as Arc<dyn PersistenceStore>,
            Arc::clone(&activity),
        )));
        let history = Arc::new(AsyncMutex::new(AuditHistory::new(
            Arc::clone(&persistence) as Arc<dyn PersistenceStore>,
            Arc::clone(&activity),
        )));
        let orchestrator = Arc::new(AuditOrchestrator::with_computation(
            store,
            history,
            Arc::clone(&persistence) as Arc<dyn PersistenceStore>,
            Arc::clone(&activity),
            EngineOptions::default(),
            Arc::new(SlowComputation {
                delay: Duration::from_millis(200),
            }),
        ));
        orchestrator.store().lock().await.add(sales_dataset()).await;
        orchestrator.select_x("region");
        orchestrator.select_y("revenue");

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.trigger_audit().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = orchestrator.trigger_audit().await.unwrap();
        assert!(matches!(second, AuditOutcome::Coalesced));

        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, AuditOutcome::Completed(_)));
    }
}
