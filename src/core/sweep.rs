//! Post-build sweep over a finished output tree.

use crate::config::toml_config::PortalsConfig;
use crate::core::relocator::{self, RelocateMode};
use crate::core::store::ContentStore;
use crate::core::walker::{self, ExtensionFilter};
use crate::domain::model::{Diagnostic, Label, Relocation, ScanResult};
use crate::domain::ports::Storage;
use crate::utils::error::{PortalError, Result};
use crate::utils::monitor::SweepMonitor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// How the sweep orders portal collection against outlet resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepPhases {
    /// Collect portals from every file, then resolve every outlet. File order does not matter.
    #[default]
    TwoPhase,
    /// One pass in walk order. An outlet only sees portals from its own file and earlier files.
    FileOrder,
}

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub filter: ExtensionFilter,
    pub phases: SweepPhases,
    pub concurrency: usize,
    pub dry_run: bool,
    pub monitor: bool,
}

impl SweepOptions {
    pub fn from_config(config: &PortalsConfig) -> Self {
        Self {
            filter: ExtensionFilter::new(&config.sweep.extensions),
            phases: config.sweep.phases,
            concurrency: config.sweep.concurrency,
            dry_run: config.sweep.dry_run,
            monitor: config.monitoring.enabled,
        }
    }
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            filter: ExtensionFilter::html(),
            phases: SweepPhases::default(),
            concurrency: 8,
            dry_run: false,
            monitor: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub phases: SweepPhases,
    pub dry_run: bool,
    pub files_scanned: usize,
    /// Files written back, or that would have been in a dry run.
    pub changed: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
    pub portals: usize,
    pub outlets: usize,
    pub empty_outlets: usize,
    pub malformed_markers: usize,
    /// Labels with recorded content that no outlet received. Their content was dropped.
    pub orphaned_labels: Vec<Label>,
    /// Labels with an outlet that came up empty although content was recorded later in the walk.
    pub resolved_too_early: Vec<Label>,
}

impl SweepReport {
    fn new(root: &Path, options: &SweepOptions) -> Self {
        Self {
            root: root.to_path_buf(),
            started_at: Utc::now(),
            phases: options.phases,
            dry_run: options.dry_run,
            files_scanned: 0,
            changed: Vec::new(),
            failures: Vec::new(),
            portals: 0,
            outlets: 0,
            empty_outlets: 0,
            malformed_markers: 0,
            orphaned_labels: Vec::new(),
            resolved_too_early: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn fail(&mut self, path: PathBuf, error: &PortalError) {
        tracing::error!("❌ Error processing file {}: {}", path.display(), error);
        self.failures.push(FileFailure {
            path,
            error: error.to_string(),
        });
    }
}

pub struct SweepProcessor<S: Storage> {
    storage: S,
    options: SweepOptions,
}

/// Which labels reached an outlet with content, and which only met empty outlets.
#[derive(Default)]
struct LabelUsage {
    filled: HashSet<Label>,
    starved: HashSet<Label>,
}

struct Loaded {
    path: PathBuf,
    text: String,
    scan: ScanResult,
}

impl<S: Storage + Clone + 'static> SweepProcessor<S> {
    pub fn new(storage: S, options: SweepOptions) -> Self {
        Self { storage, options }
    }

    pub fn options(&self) -> &SweepOptions {
        &self.options
    }

    /// Relocates portals across every matching file under `root`.
    ///
    /// Per-file failures land in the report. Only a failed walk is an `Err`.
    pub async fn sweep(&self, root: &Path) -> Result<SweepReport> {
        let monitor = SweepMonitor::new(self.options.monitor);
        let mut report = SweepReport::new(root, &self.options);

        tracing::info!("🌀 Portal sweep: processing built files under {}", root.display());

        let walk_root = root.to_path_buf();
        let filter = self.options.filter.clone();
        let walked = tokio::task::spawn_blocking(move || walker::walk(&walk_root, &filter))
            .await
            .map_err(|e| PortalError::TaskError {
                message: e.to_string(),
            })??;
        for (path, error) in walked.skipped {
            report.fail(path, &error);
        }
        let files = walked.files;
        report.files_scanned = files.len();

        // One store per sweep; dropped when this call returns.
        let mut store = ContentStore::new();
        let mut usage = LabelUsage::default();

        match self.options.phases {
            SweepPhases::TwoPhase => {
                self.two_phase(files, &mut store, &mut usage, &mut report, &monitor)
                    .await
            }
            SweepPhases::FileOrder => {
                self.file_order(files, &mut store, &mut usage, &mut report)
                    .await
            }
        }

        report.resolved_too_early = store
            .labels()
            .filter(|label| usage.starved.contains(*label))
            .cloned()
            .collect();
        report.orphaned_labels = store
            .labels()
            .filter(|label| !usage.filled.contains(*label))
            .cloned()
            .collect();
        for label in &report.orphaned_labels {
            if usage.starved.contains(label) {
                tracing::warn!(
                    "⚠️ Outlet '{}' was resolved before its portal content was collected; {} fragment(s) dropped. Use two-phase sweeps to resolve it",
                    label,
                    store.lookup(label).len()
                );
            } else {
                tracing::warn!(
                    "⚠️ Portal content for '{}' has no outlet in the output tree; {} fragment(s) dropped",
                    label,
                    store.lookup(label).len()
                );
            }
        }

        tracing::info!(
            "✅ Portal sweep complete: {} file(s) scanned, {} changed, {} failed",
            report.files_scanned,
            report.changed.len(),
            report.failures.len()
        );
        monitor.log_final_stats();
        Ok(report)
    }

    async fn two_phase(
        &self,
        files: Vec<PathBuf>,
        store: &mut ContentStore,
        usage: &mut LabelUsage,
        report: &mut SweepReport,
        monitor: &SweepMonitor,
    ) {
        let mut loaded = Vec::with_capacity(files.len());
        for (path, text) in self.read_all(files, report).await {
            // Recording happens here, in walk order, so fragment order is deterministic.
            let scan = relocator::collect(&text, store);
            loaded.push(Loaded { path, text, scan });
        }
        tracing::debug!(
            "Collected {} fragment(s) under {} label(s)",
            store.fragment_count(),
            store.labels().count()
        );
        monitor.log_stats("Collect phase");

        let mut pending = Vec::new();
        for Loaded { path, text, scan } in loaded {
            if scan.is_empty() {
                self.log_diagnostics(&path, &scan.diagnostics, report);
                continue;
            }
            let relocation = relocator::apply(&text, scan, store);
            self.note(&path, &relocation, usage, report);
            if relocation.changed {
                pending.push((path, relocation.text));
            }
        }

        self.write_all(pending, report).await;
        monitor.log_stats("Resolve phase");
    }

    async fn file_order(
        &self,
        files: Vec<PathBuf>,
        store: &mut ContentStore,
        usage: &mut LabelUsage,
        report: &mut SweepReport,
    ) {
        for path in files {
            let text = match self.storage.read_text(&path).await {
                Ok(text) => text,
                Err(e) => {
                    report.fail(path, &e);
                    continue;
                }
            };

            let relocation = relocator::relocate(&text, store, RelocateMode::Visible);
            self.note(&path, &relocation, usage, report);
            if !relocation.changed {
                continue;
            }

            if self.options.dry_run {
                report.changed.push(path);
                continue;
            }
            match self.storage.write_text(&path, &relocation.text).await {
                Ok(()) => {
                    tracing::info!("Successfully processed portals for {}", path.display());
                    report.changed.push(path);
                }
                Err(e) => report.fail(path, &e),
            }
        }
    }

    /// Reads files concurrently and returns them in walk order. Unreadable files are reported and skipped.
    async fn read_all(&self, files: Vec<PathBuf>, report: &mut SweepReport) -> Vec<(PathBuf, String)> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, path) in files.into_iter().enumerate() {
            let storage = self.storage.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let text = storage.read_text(&path).await;
                (index, path, text)
            });
        }

        let mut loaded = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, path, Ok(text))) => loaded.push((index, path, text)),
                Ok((_, path, Err(e))) => report.fail(path, &e),
                Err(e) => {
                    let err = PortalError::TaskError {
                        message: e.to_string(),
                    };
                    tracing::error!("❌ {}", err);
                }
            }
        }

        loaded.sort_by_key(|(index, _, _)| *index);
        loaded.into_iter().map(|(_, path, text)| (path, text)).collect()
    }

    async fn write_all(&self, pending: Vec<(PathBuf, String)>, report: &mut SweepReport) {
        if self.options.dry_run {
            for (path, _) in pending {
                tracing::info!("Would relocate portals in {}", path.display());
                report.changed.push(path);
            }
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, (path, text)) in pending.into_iter().enumerate() {
            let storage = self.storage.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let written = storage.write_text(&path, &text).await;
                (index, path, written)
            });
        }

        let mut changed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, path, Ok(()))) => {
                    tracing::info!("Successfully processed portals for {}", path.display());
                    changed.push((index, path));
                }
                Ok((_, path, Err(e))) => report.fail(path, &e),
                Err(e) => {
                    let err = PortalError::TaskError {
                        message: e.to_string(),
                    };
                    tracing::error!("❌ {}", err);
                }
            }
        }

        changed.sort_by_key(|(index, _)| *index);
        report.changed.extend(changed.into_iter().map(|(_, path)| path));
    }

    fn note(
        &self,
        path: &Path,
        relocation: &Relocation,
        usage: &mut LabelUsage,
        report: &mut SweepReport,
    ) {
        report.portals += relocation.discovered.len();
        report.outlets += relocation.outlets.len();
        report.empty_outlets += relocation.empty_outlets.len();
        self.log_diagnostics(path, &relocation.diagnostics, report);

        if !relocation.discovered.is_empty() {
            tracing::debug!(
                "Found {} portal(s) in {}",
                relocation.discovered.len(),
                path.display()
            );
        }
        for label in &relocation.empty_outlets {
            tracing::debug!(
                "Outlet '{}' in {} has no portal content; left empty",
                label,
                path.display()
            );
        }

        for label in &relocation.outlets {
            if relocation.empty_outlets.contains(label) {
                usage.starved.insert(label.clone());
            } else {
                usage.filled.insert(label.clone());
            }
        }
    }

    fn log_diagnostics(
        &self,
        path: &Path,
        diagnostics: &[Diagnostic],
        report: &mut SweepReport,
    ) {
        report.malformed_markers += diagnostics.len();
        for diagnostic in diagnostics {
            tracing::warn!(
                "⚠️ Malformed portal marker in {}: {}; left in place",
                path.display(),
                diagnostic
            );
        }
    }
}
