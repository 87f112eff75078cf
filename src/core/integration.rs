use crate::config::toml_config::PortalsConfig;
use crate::core::sweep::{SweepOptions, SweepProcessor, SweepReport};
use crate::core::transform::{SessionSummary, TransformHook};
use crate::domain::model::{SessionKind, TransformOutput};
use crate::domain::ports::{BuildHooks, ScriptInjector, Storage};
use crate::utils::validation::resolve_output_dir;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which relocation runs during a build. The two never share a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Sweep the output tree once the build is done.
    #[default]
    Sweep,
    /// Rewrite source files as the host compiles them.
    Streaming,
}

/// Portal relocation packaged as a set of build hooks.
pub struct PortalIntegration<S: Storage> {
    strategy: Strategy,
    hook: TransformHook,
    sweeper: SweepProcessor<S>,
    last_report: Option<SweepReport>,
    last_session: Option<SessionSummary>,
}

impl<S: Storage + Clone + 'static> PortalIntegration<S> {
    pub fn new(strategy: Strategy, hook: TransformHook, sweeper: SweepProcessor<S>) -> Self {
        Self {
            strategy,
            hook,
            sweeper,
            last_report: None,
            last_session: None,
        }
    }

    pub fn from_config(config: &PortalsConfig, storage: S) -> Self {
        Self::new(
            config.build.strategy,
            TransformHook::from_config(&config.transform, &config.live),
            SweepProcessor::new(storage, SweepOptions::from_config(config)),
        )
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn last_report(&self) -> Option<&SweepReport> {
        self.last_report.as_ref()
    }

    pub fn last_session(&self) -> Option<&SessionSummary> {
        self.last_session.as_ref()
    }
}

#[async_trait]
impl<S: Storage + Clone + 'static> BuildHooks for PortalIntegration<S> {
    fn name(&self) -> &str {
        "astro-portals"
    }

    async fn on_setup(&mut self, session: SessionKind, injector: &mut dyn ScriptInjector) {
        tracing::debug!("Portal integration setup: {:?} session, {:?} strategy", session, self.strategy);
        // The fallback script is injected for dev sessions whichever strategy is active.
        self.hook.begin_session(session, injector);
    }

    fn transform(&mut self, module_id: &str, code: &str) -> Option<TransformOutput> {
        match self.strategy {
            Strategy::Streaming => self.hook.transform(module_id, code),
            Strategy::Sweep => None,
        }
    }

    async fn on_build_done(&mut self, output_dir: &str) {
        self.last_session = Some(self.hook.end_session());

        if self.strategy != Strategy::Sweep {
            return;
        }

        tracing::info!("Portal integration: Processing built files...");
        let root = match resolve_output_dir(output_dir) {
            Ok(root) => root,
            Err(e) => {
                tracing::error!("❌ Portal sweep skipped: {}", e);
                return;
            }
        };

        match self.sweeper.sweep(&root).await {
            Ok(report) => {
                if !report.is_clean() {
                    tracing::warn!(
                        "⚠️ {} file(s) were left unrelocated because of errors",
                        report.failures.len()
                    );
                }
                self.last_report = Some(report);
            }
            Err(e) => {
                // The build itself has succeeded; a failed sweep only leaves portals in place.
                tracing::error!("❌ Portal sweep failed: {}", e);
                tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            }
        }
    }
}
