use crate::domain::model::{InjectStage, SessionKind, TransformOutput};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read_text(&self, path: &Path) -> impl std::future::Future<Output = Result<String>> + Send;
    fn write_text(
        &self,
        path: &Path,
        text: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Host call that adds a client script to served pages.
pub trait ScriptInjector: Send {
    fn inject_script(&mut self, stage: InjectStage, content: &str);
}

/// Hook surface a host build pipeline drives.
#[async_trait]
pub trait BuildHooks: Send {
    fn name(&self) -> &str;

    /// Called once when a build or dev session starts.
    async fn on_setup(&mut self, session: SessionKind, injector: &mut dyn ScriptInjector);

    /// Called once per source file, in host visitation order. `None` passes the file through.
    fn transform(&mut self, module_id: &str, code: &str) -> Option<TransformOutput>;

    /// Called once the output tree is complete.
    async fn on_build_done(&mut self, output_dir: &str);
}
