//! Session - the explicit context object tying ingestion, the collection
//! store, history, and the orchestrator together
//!
//! Every piece of engine state hangs off a `Session`; independent sessions
//! coexist freely in one process.

use crate::activity::ActivityLog;
use crate::analysis::AnalysisResult;
use crate::audit::{AuditOrchestrator, AuditOutcome, EngineOptions};
use crate::error::{EngineError, Result};
use crate::export::{build_report, ReportDocument};
use crate::history::AuditHistory;
use crate::ingestion::{DatasetLoader, IngestFile};
use crate::persistence::{MemoryStore, PersistenceStore, StoreCollection};
use crate::render::Renderer;
use crate::store::{CollectionStore, CombineMode, CoordinateCandidates, ReconciledView};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

/// Config key the coordinate selection is stored under.
const SELECTION_CONFIG_KEY: &str = "coordinate_selection";

/// Install a global tracing subscriber honoring `RUST_LOG`-style filters.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Outcome of a batch ingestion: admitted dataset ids plus the files that
/// were skipped and why.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub admitted: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

pub struct Session {
    activity: Arc<ActivityLog>,
    persistence: Arc<dyn PersistenceStore>,
    loader: DatasetLoader,
    store: Arc<AsyncMutex<CollectionStore>>,
    orchestrator: Arc<AuditOrchestrator>,
    refresh_task: Option<tokio::task::JoinHandle<()>>,
}

impl Session {
    pub fn new(persistence: Arc<dyn PersistenceStore>) -> Self {
        Self::with_options(persistence, EngineOptions::default())
    }

    /// A session backed by the in-memory store; the default for tests and
    /// headless embedding.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn with_options(persistence: Arc<dyn PersistenceStore>, options: EngineOptions) -> Self {
        let activity = Arc::new(ActivityLog::new());
        let store = Arc::new(AsyncMutex::new(CollectionStore::new(
            Arc::clone(&persistence),
            Arc::clone(&activity),
        )));
        let history = Arc::new(AsyncMutex::new(AuditHistory::new(
            Arc::clone(&persistence),
            Arc::clone(&activity),
        )));
        let orchestrator = Arc::new(AuditOrchestrator::new(
            Arc::clone(&store),
            history,
            Arc::clone(&persistence),
            Arc::clone(&activity),
            options,
        ));

        Self {
            activity,
            persistence,
            loader: DatasetLoader::new(),
            store,
            orchestrator,
            refresh_task: None,
        }
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn persistence(&self) -> Arc<dyn PersistenceStore> {
        Arc::clone(&self.persistence)
    }

    pub fn orchestrator(&self) -> Arc<AuditOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Mutable loader access, e.g. to register a spreadsheet decoder.
    pub fn loader_mut(&mut self) -> &mut DatasetLoader {
        &mut self.loader
    }

    /// Ingest one file into the collection.
    pub async fn ingest_file(&self, file: &IngestFile) -> Result<String> {
        let dataset = self.loader.load(file)?;
        let id = dataset.id.clone();
        self.store.lock().await.add(dataset).await;
        self.activity
            .info(format!("Dataset '{}' ingested as {id}", file.name));
        Ok(id)
    }

    /// Ingest a batch. A failing file aborts that file only: a missing
    /// decoder dependency is reported loudly, an unsupported schema drops
    /// the dataset silently (log only), and the rest of the batch is still
    /// attempted.
    pub async fn ingest_files(&self, files: &[IngestFile]) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();

        for file in files {
            match self.ingest_file(file).await {
                Ok(id) => outcome.admitted.push(id),
                Err(e @ EngineError::SchemaUnsupported(_)) => {
                    warn!(file = %file.name, error = %e, "dataset dropped");
                    self.activity.warn(format!("Skipped '{}': {e}", file.name));
                    outcome.skipped.push((file.name.clone(), e.to_string()));
                }
                Err(e) => {
                    error!(file = %file.name, error = %e, "file ingestion failed");
                    self.activity
                        .error(format!("Could not ingest '{}': {e}", file.name));
                    outcome.skipped.push((file.name.clone(), e.to_string()));
                }
            }
        }

        info!(
            admitted = outcome.admitted.len(),
            skipped = outcome.skipped.len(),
            "batch ingestion finished"
        );
        outcome
    }

    pub async fn remove_dataset(&self, id: &str) -> bool {
        self.store.lock().await.remove(id).await
    }

    pub async fn reconcile(&self) -> ReconciledView {
        let mode = self.orchestrator.selection().mode;
        self.store.lock().await.reconcile(mode)
    }

    /// Suggested coordinate mapping for the current collection.
    pub async fn coordinate_candidates(&self) -> CoordinateCandidates {
        let mode = self.orchestrator.selection().mode;
        self.store.lock().await.coordinate_candidates(mode)
    }

    pub fn select_coordinates(&self, x: impl Into<String>, y: impl Into<String>) {
        self.orchestrator.select_x(x);
        self.orchestrator.select_y(y);
    }

    pub fn set_mode(&self, mode: CombineMode) {
        self.orchestrator.set_mode(mode);
    }

    /// Trigger one audit through the orchestrator.
    pub async fn run_audit(&self) -> Result<AuditOutcome> {
        self.orchestrator.trigger_audit().await
    }

    /// The most recent analysis result, if any.
    pub async fn latest_result(&self) -> Option<AnalysisResult> {
        self.orchestrator.history().lock().await.latest().await
    }

    /// Push the latest result and the current working rows at a renderer.
    /// Returns whether there was anything to render.
    pub async fn render_latest(&self, renderer: &dyn Renderer) -> bool {
        let result = match self.latest_result().await {
            Some(result) => result,
            None => return false,
        };
        let rows = {
            let store = self.store.lock().await;
            store.select_working_set(self.orchestrator.selection().mode)
        };
        renderer.render(&result, &rows);
        true
    }

    /// Assemble the printable report for the last result, pulling the chart
    /// snapshot from the renderer. Blocked with a named reason when the
    /// result is incomplete or absent.
    pub async fn export_report(&self, renderer: &dyn Renderer) -> Result<ReportDocument> {
        let result = self
            .latest_result()
            .await
            .ok_or_else(|| EngineError::ExportBlocked("no analysis result".to_string()))?;

        let report = build_report(&result, renderer.chart_snapshot());
        if let Err(e) = &report {
            self.activity.warn(format!("Export blocked: {e}"));
        }
        report
    }

    /// Persist the current coordinate selection to the config collection,
    /// best-effort.
    pub async fn save_selection(&self) {
        let selection = self.orchestrator.selection();
        let record = serde_json::json!({
            "key": SELECTION_CONFIG_KEY,
            "value": serde_json::to_value(&selection).unwrap_or(Value::Null),
        });
        if let Err(e) = self.persistence.put(StoreCollection::Config, record).await {
            warn!(error = %e, "selection write-through failed");
            self.activity
                .warn(format!("Could not persist coordinate selection: {e}"));
        }
    }

    /// Restore a previously saved coordinate selection. Returns whether one
    /// was found and applied.
    pub async fn restore_selection(&self) -> bool {
        let records = match self.persistence.get_all(StoreCollection::Config).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "config read failed");
                return false;
            }
        };

        let stored = records
            .iter()
            .find(|r| r.get("key").and_then(Value::as_str) == Some(SELECTION_CONFIG_KEY))
            .and_then(|r| r.get("value"))
            .cloned();
        let stored = match stored {
            Some(value) => value,
            None => return false,
        };

        match serde_json::from_value::<crate::audit::CoordinateSelection>(stored) {
            Ok(selection) => {
                if let Some(x) = selection.x {
                    self.orchestrator.select_x(x);
                }
                if let Some(y) = selection.y {
                    self.orchestrator.select_y(y);
                }
                self.orchestrator.set_mode(selection.mode);
                true
            }
            Err(e) => {
                warn!(error = %e, "stored coordinate selection is undecodable");
                false
            }
        }
    }

    /// Start the periodic silent re-audit loop. Idempotent; the previous
    /// loop is stopped first.
    pub fn start_live_refresh(&mut self) {
        self.stop_live_refresh();
        self.refresh_task = Some(self.orchestrator.spawn_live_refresh());
    }

    pub fn stop_live_refresh(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }

    /// Forget all past results, in memory and in the persisted collection.
    pub async fn clear_history(&self) {
        self.orchestrator.history().lock().await.clear().await;
        self.activity.info("Audit history cleared");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_live_refresh();
    }
}
