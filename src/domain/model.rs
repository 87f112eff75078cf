use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Identifier shared by portals and outlets. Unlabeled markers form their own group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Unlabeled,
    Named(String),
}

impl Label {
    /// Empty attribute values count as unlabeled.
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Label::Named(v.to_string()),
            _ => Label::Unlabeled,
        }
    }

    pub fn named(value: impl Into<String>) -> Self {
        Label::Named(value.into())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Unlabeled => f.write_str("<unlabeled>"),
            Label::Named(name) => f.write_str(name),
        }
    }
}

/// Byte range into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalBlock {
    pub label: Label,
    /// Text between the start and end sentinels, trimmed.
    pub raw_content: String,
    /// Whole block, sentinels included.
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutletMarker {
    pub label: Label,
    /// Sentinel plus the qualifying element, if any.
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnterminatedPortal,
    StrayPortalEnd,
    UnclosedOutletElement,
}

/// Marker text the grammar refused to match. It stays in the document as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            DiagnosticKind::UnterminatedPortal => "portal start without matching end",
            DiagnosticKind::StrayPortalEnd => "portal end without matching start",
            DiagnosticKind::UnclosedOutletElement => "outlet element without closing tag",
        };
        write!(f, "{} at byte {}", what, self.span.start)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub portals: Vec<PortalBlock>,
    pub outlets: Vec<OutletMarker>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.portals.is_empty() && self.outlets.is_empty()
    }
}

/// One portal's captured content, as recorded into the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub label: Label,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Input with every portal block removed.
    pub stripped: String,
    /// Stripped text with every outlet substituted.
    pub text: String,
    /// Fragments discovered in this document, in document order.
    pub discovered: Vec<Fragment>,
    /// Label of every substituted outlet, in document order.
    pub outlets: Vec<Label>,
    /// Outlets whose label had no recorded portal when they were resolved.
    pub empty_outlets: Vec<Label>,
    pub diagnostics: Vec<Diagnostic>,
    pub changed: bool,
}

impl Relocation {
    pub fn unchanged(text: &str, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            stripped: text.to_string(),
            text: text.to_string(),
            discovered: Vec::new(),
            outlets: Vec::new(),
            empty_outlets: Vec::new(),
            diagnostics,
            changed: false,
        }
    }
}

/// Result handed back to the host's per-file transform hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    pub map: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Build,
    Dev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectStage {
    /// Runs on every served page after it loads.
    Page,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_from_attribute() {
        assert_eq!(Label::from_attribute(Some("nav")), Label::named("nav"));
        assert_eq!(Label::from_attribute(Some("")), Label::Unlabeled);
        assert_eq!(Label::from_attribute(None), Label::Unlabeled);
    }
}
