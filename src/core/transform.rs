//! Streaming relocation, applied per source file as the host compiles it.
//!
//! Outlets resolve against whatever portals the host has visited so far. An
//! outlet visited before its portal resolves to nothing and is never
//! revisited. The hook cannot fix that, but it remembers those outlets and
//! reports them at the end of the session.

use crate::config::toml_config::{LiveConfig, TransformConfig};
use crate::core::live;
use crate::core::relocator::{self, RelocateMode};
use crate::core::store::ContentStore;
use crate::core::walker::ExtensionFilter;
use crate::domain::model::{Label, SessionKind, TransformOutput};
use crate::domain::ports::ScriptInjector;
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredOutlet {
    pub module_id: String,
    pub label: Label,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub modules_transformed: usize,
    pub fragments: usize,
    /// Outlets that came up empty although their label was recorded later in the session.
    pub resolved_too_early: Vec<DeferredOutlet>,
    /// Labels recorded but never consumed by an outlet.
    pub unconsumed_labels: Vec<Label>,
}

impl SessionSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct TransformHook {
    store: ContentStore,
    filter: ExtensionFilter,
    mode: RelocateMode,
    inject_in_dev: bool,
    session: Option<SessionKind>,
    deferred: Vec<DeferredOutlet>,
    consumed: HashSet<Label>,
    modules_transformed: usize,
}

impl TransformHook {
    pub fn new(filter: ExtensionFilter, mode: RelocateMode, inject_in_dev: bool) -> Self {
        Self {
            store: ContentStore::new(),
            filter,
            mode,
            inject_in_dev,
            session: None,
            deferred: Vec::new(),
            consumed: HashSet::new(),
            modules_transformed: 0,
        }
    }

    pub fn from_config(transform: &TransformConfig, live: &LiveConfig) -> Self {
        Self::new(
            ExtensionFilter::new(&transform.extensions),
            transform.own_fragments,
            live.inject_in_dev,
        )
    }

    pub fn session(&self) -> Option<SessionKind> {
        self.session
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Starts a session with an empty store. Dev sessions also get the live fallback script.
    pub fn begin_session(&mut self, kind: SessionKind, injector: &mut dyn ScriptInjector) {
        if let Some(previous) = self.session {
            tracing::warn!("⚠️ Portal session {:?} was never ended; discarding its state", previous);
        }
        self.reset();
        self.session = Some(kind);

        if kind == SessionKind::Dev && self.inject_in_dev {
            live::inject(injector);
        }
    }

    /// Rewrites one source file. `None` means the host should keep the file as it is.
    pub fn transform(&mut self, module_id: &str, code: &str) -> Option<TransformOutput> {
        if !self.filter.matches_module(module_id) {
            return None;
        }

        let relocation = relocator::relocate(code, &mut self.store, self.mode);

        for diagnostic in &relocation.diagnostics {
            tracing::warn!(
                "⚠️ Malformed portal marker in {}: {}; left in place",
                module_id,
                diagnostic
            );
        }
        if !relocation.changed {
            return None;
        }

        tracing::debug!(
            "Transformed {}: {} portal(s) collected, {} outlet(s) filled",
            module_id,
            relocation.discovered.len(),
            relocation.outlets.len() - relocation.empty_outlets.len()
        );

        self.consumed.extend(relocation.outlets.iter().cloned());
        self.deferred
            .extend(relocation.empty_outlets.into_iter().map(|label| DeferredOutlet {
                module_id: module_id.to_string(),
                label,
            }));
        self.modules_transformed += 1;

        Some(TransformOutput {
            code: relocation.text,
            map: None,
        })
    }

    /// Ends the session, reports ordering problems and clears the store.
    pub fn end_session(&mut self) -> SessionSummary {
        let resolved_too_early: Vec<DeferredOutlet> = self
            .deferred
            .iter()
            .filter(|outlet| self.store.contains(&outlet.label))
            .cloned()
            .collect();
        for outlet in &resolved_too_early {
            tracing::warn!(
                "⚠️ Outlet '{}' in {} was transformed before its portal content; it stays empty. Use the post-build sweep to resolve it",
                outlet.label,
                outlet.module_id
            );
        }

        let unconsumed_labels: Vec<Label> = self
            .store
            .labels()
            .filter(|label| !self.consumed.contains(*label))
            .cloned()
            .collect();
        for label in &unconsumed_labels {
            tracing::warn!("⚠️ Portal content for '{}' never reached an outlet", label);
        }

        let summary = SessionSummary {
            modules_transformed: self.modules_transformed,
            fragments: self.store.fragment_count(),
            resolved_too_early,
            unconsumed_labels,
        };
        self.reset();
        self.session = None;
        summary
    }

    fn reset(&mut self) {
        self.store.clear();
        self.deferred.clear();
        self.consumed.clear();
        self.modules_transformed = 0;
    }
}
