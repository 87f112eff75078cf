//! Client-side fallback for pages served before any build-time relocation ran.

use crate::domain::model::InjectStage;
use crate::domain::ports::ScriptInjector;

/// Moves each `[data-portal]` element's children into the `[data-outlet]` with the same name.
pub const LIVE_FALLBACK_SCRIPT: &str = r#"for (const portal of document.querySelectorAll("[data-portal]")) {
  const name = portal.getAttribute("data-portal");
  const outlet = document.querySelector(`[data-outlet="${CSS.escape(name)}"]`);
  if (!outlet) {
    console.error(`No outlet found for portal: ${name}`);
    continue;
  }
  outlet.append(...portal.childNodes);
}
"#;

pub fn inject(injector: &mut dyn ScriptInjector) {
    injector.inject_script(InjectStage::Page, LIVE_FALLBACK_SCRIPT);
    tracing::debug!("Injected live portal fallback script");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingInjector {
        scripts: Vec<(InjectStage, String)>,
    }

    impl ScriptInjector for RecordingInjector {
        fn inject_script(&mut self, stage: InjectStage, content: &str) {
            self.scripts.push((stage, content.to_string()));
        }
    }

    #[test]
    fn test_inject_adds_page_script() {
        let mut injector = RecordingInjector::default();
        inject(&mut injector);

        assert_eq!(injector.scripts.len(), 1);
        assert_eq!(injector.scripts[0].0, InjectStage::Page);
        assert!(injector.scripts[0].1.contains("data-outlet"));
    }
}
