use crate::core::grammar;
use crate::core::store::ContentStore;
use crate::domain::model::{Fragment, Relocation, ScanResult, Span};
use serde::{Deserialize, Serialize};

/// Whether an outlet can see portals found earlier in its own document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelocateMode {
    /// Record this document's portals first, then resolve its outlets.
    #[default]
    Visible,
    /// Resolve outlets from earlier documents only, then record.
    PriorOnly,
}

/// Scans, records and rewrites one document.
pub fn relocate(text: &str, store: &mut ContentStore, mode: RelocateMode) -> Relocation {
    let scan = grammar::scan(text);
    if scan.is_empty() {
        return Relocation::unchanged(text, scan.diagnostics);
    }

    match mode {
        RelocateMode::Visible => {
            store.record_all(fragments_of(&scan));
            apply(text, scan, store)
        }
        RelocateMode::PriorOnly => {
            let discovered = fragments_of(&scan);
            let relocation = apply(text, scan, store);
            store.record_all(discovered);
            relocation
        }
    }
}

/// First half of a two-phase pass: record the portals, keep the scan for `apply`.
pub fn collect(text: &str, store: &mut ContentStore) -> ScanResult {
    let scan = grammar::scan(text);
    store.record_all(fragments_of(&scan));
    scan
}

/// Rewrites `text` from an existing scan without touching the store.
pub fn apply(text: &str, scan: ScanResult, store: &ContentStore) -> Relocation {
    if scan.is_empty() {
        return Relocation::unchanged(text, scan.diagnostics);
    }

    let portal_edits: Vec<(Span, String)> = scan
        .portals
        .iter()
        .map(|portal| (portal.span, String::new()))
        .collect();

    let mut empty_outlets = Vec::new();
    let outlet_edits: Vec<(Span, String)> = scan
        .outlets
        .iter()
        .map(|outlet| {
            if !store.contains(&outlet.label) {
                empty_outlets.push(outlet.label.clone());
            }
            (outlet.span, store.joined(&outlet.label))
        })
        .collect();

    let stripped = splice(text, portal_edits.clone());
    let mut edits = portal_edits;
    edits.extend(outlet_edits);
    let rewritten = splice(text, edits);

    let changed = rewritten != text;
    Relocation {
        stripped,
        text: rewritten,
        discovered: fragments_of(&scan),
        outlets: scan.outlets.iter().map(|outlet| outlet.label.clone()).collect(),
        empty_outlets,
        diagnostics: scan.diagnostics,
        changed,
    }
}

pub fn fragments_of(scan: &ScanResult) -> Vec<Fragment> {
    scan.portals
        .iter()
        .map(|portal| Fragment {
            label: portal.label.clone(),
            content: portal.raw_content.clone(),
        })
        .collect()
}

/// Replaces non-overlapping spans in one pass.
fn splice(text: &str, mut edits: Vec<(Span, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        out.push_str(&text[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grammar::{OUTLET, PORTAL_END, PORTAL_START};
    use crate::domain::model::Label;

    fn portal(label: &str, content: &str) -> String {
        format!(
            "{}<div data-portal=\"{}\">{}</div>{}",
            PORTAL_START, label, content, PORTAL_END
        )
    }

    fn outlet(label: &str) -> String {
        format!("{}<div data-outlet=\"{}\"></div>", OUTLET, label)
    }

    #[test]
    fn test_single_portal_moves_to_outlet() {
        let text = format!("<body>{}<main>{}</main></body>", portal("x", "A"), outlet("x"));
        let mut store = ContentStore::new();
        let result = relocate(&text, &mut store, RelocateMode::Visible);

        assert!(result.changed);
        assert_eq!(
            result.text,
            "<body><main><div data-portal=\"x\">A</div></main></body>"
        );
        assert_eq!(
            result.stripped,
            format!("<body><main>{}</main></body>", outlet("x"))
        );
        assert_eq!(result.discovered.len(), 1);
        assert!(result.empty_outlets.is_empty());
    }

    #[test]
    fn test_unlabeled_fragments_join_with_newline() {
        let text = format!("{s}A{e}<p>x</p>{s}B{e}{o}", s = PORTAL_START, e = PORTAL_END, o = OUTLET);
        let mut store = ContentStore::new();
        let result = relocate(&text, &mut store, RelocateMode::Visible);
        assert_eq!(result.text, "<p>x</p>A\nB");
    }

    #[test]
    fn test_missing_content_resolves_to_empty() {
        let text = format!("<nav>{}</nav>", outlet("y"));
        let mut store = ContentStore::new();
        let result = relocate(&text, &mut store, RelocateMode::Visible);

        assert!(result.changed);
        assert_eq!(result.text, "<nav></nav>");
        assert_eq!(result.empty_outlets, vec![Label::named("y")]);
    }

    #[test]
    fn test_no_markers_is_unchanged() {
        let mut store = ContentStore::new();
        let result = relocate("<p>nothing here</p>", &mut store, RelocateMode::Visible);
        assert!(!result.changed);
        assert_eq!(result.text, "<p>nothing here</p>");
        assert!(store.is_empty());
    }

    #[test]
    fn test_labels_are_isolated() {
        let text = format!(
            "{}{s}loose{e}{}{}{o}",
            portal("x", "X"),
            outlet("y"),
            outlet("x"),
            s = PORTAL_START,
            e = PORTAL_END,
            o = OUTLET
        );
        let mut store = ContentStore::new();
        let result = relocate(&text, &mut store, RelocateMode::Visible);
        assert_eq!(result.text, "<div data-portal=\"x\">X</div>loose");
    }

    #[test]
    fn test_portals_feed_later_documents() {
        let mut store = ContentStore::new();
        let source = relocate(&portal("nav", "LINKS"), &mut store, RelocateMode::Visible);
        assert_eq!(source.text, "");

        let target = relocate(&outlet("nav"), &mut store, RelocateMode::Visible);
        assert_eq!(target.text, "<div data-portal=\"nav\">LINKS</div>");
    }

    #[test]
    fn test_prior_only_does_not_self_insert() {
        let mut store = ContentStore::new();
        store.record(Label::named("x"), "EARLIER");

        let text = format!("{}{}", portal("x", "MINE"), outlet("x"));
        let result = relocate(&text, &mut store, RelocateMode::PriorOnly);

        assert_eq!(result.text, "EARLIER");
        assert_eq!(store.lookup(&Label::named("x")).len(), 2);
    }

    #[test]
    fn test_collect_then_apply() {
        let mut store = ContentStore::new();
        let target_text = outlet("nav");
        let target_scan = collect(&target_text, &mut store);
        let source_scan = collect(&portal("nav", "L"), &mut store);

        let target = apply(&target_text, target_scan, &store);
        assert_eq!(target.text, "<div data-portal=\"nav\">L</div>");

        let source = apply(&portal("nav", "L"), source_scan, &store);
        assert_eq!(source.text, "");
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let text = format!("{}{}", portal("x", "A"), outlet("x"));
        let mut store = ContentStore::new();
        let first = relocate(&text, &mut store, RelocateMode::Visible);

        let mut fresh = ContentStore::new();
        let second = relocate(&first.text, &mut fresh, RelocateMode::Visible);
        assert!(!second.changed);
    }

    #[test]
    fn test_unterminated_portal_stays_in_place() {
        let text = format!("{}never ends", PORTAL_START);
        let mut store = ContentStore::new();
        let result = relocate(&text, &mut store, RelocateMode::Visible);
        assert!(!result.changed);
        assert_eq!(result.text, text);
        assert_eq!(result.diagnostics.len(), 1);
    }
}
