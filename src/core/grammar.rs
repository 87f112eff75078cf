//! Marker grammar.
//!
//! Scanning happens in two steps. A single regex tokenizes the sentinel
//! comments, then a small state machine pairs portal starts with ends and
//! reads the one element that may immediately follow a sentinel. Nothing else
//! in the surrounding markup is parsed.

use crate::domain::model::{
    Diagnostic, DiagnosticKind, Label, OutletMarker, PortalBlock, ScanResult, Span,
};
use regex::Regex;
use std::sync::LazyLock;

pub const PORTAL_START: &str = "<!--__ASTRO_PORTAL__START__-->";
pub const PORTAL_END: &str = "<!--__ASTRO_PORTAL__END__-->";
pub const OUTLET: &str = "<!--__ASTRO_PORTAL_OUTLET__-->";

pub const PORTAL_ATTRIBUTE: &str = "data-portal";
pub const OUTLET_ATTRIBUTE: &str = "data-outlet";

// The trailing `__` is optional so `<!--__ASTRO_PORTAL__START-->` is also a start sentinel.
static SENTINEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--__ASTRO_PORTAL(__START|__END|_OUTLET)(?:__)?-->")
        .expect("sentinel pattern is valid")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SentinelKind {
    Start,
    End,
    Outlet,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: SentinelKind,
    span: Span,
}

#[derive(Debug)]
struct StartTag<'a> {
    name: &'a str,
    attributes: &'a str,
    /// Byte offset just past `>`.
    end: usize,
    self_closing: bool,
}

/// Scans `text` for portal blocks and outlet markers, in document order.
///
/// Never fails: markers that cannot be paired are reported as diagnostics and
/// left out of the result.
pub fn scan(text: &str) -> ScanResult {
    let tokens = tokenize(text);
    let mut result = ScanResult::default();

    let mut open: Option<Token> = None;
    // Outlet sentinels seen while a portal is open. They belong to the portal
    // content unless that portal never closes.
    let mut buffered: Vec<usize> = Vec::new();

    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            SentinelKind::Start => {
                if let Some(previous) = open.replace(*token) {
                    abandon_portal(text, &tokens, previous, &mut buffered, &mut result);
                }
            }
            SentinelKind::End => match open.take() {
                Some(start) => {
                    buffered.clear();
                    result.portals.push(portal_block(text, start.span, token.span));
                }
                None => result.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::StrayPortalEnd,
                    span: token.span,
                }),
            },
            SentinelKind::Outlet => {
                if open.is_some() {
                    buffered.push(index);
                } else {
                    push_outlet(text, &tokens, index, &mut result);
                }
            }
        }
    }

    if let Some(previous) = open.take() {
        abandon_portal(text, &tokens, previous, &mut buffered, &mut result);
    }

    result.outlets.sort_by_key(|outlet| outlet.span.start);
    result.diagnostics.sort_by_key(|diagnostic| diagnostic.span.start);
    result
}

fn tokenize(text: &str) -> Vec<Token> {
    SENTINEL_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let kind = match caps.get(1)?.as_str() {
                "__START" => SentinelKind::Start,
                "__END" => SentinelKind::End,
                _ => SentinelKind::Outlet,
            };
            Some(Token {
                kind,
                span: Span::new(whole.start(), whole.end()),
            })
        })
        .collect()
}

fn abandon_portal(
    text: &str,
    tokens: &[Token],
    start: Token,
    buffered: &mut Vec<usize>,
    result: &mut ScanResult,
) {
    result.diagnostics.push(Diagnostic {
        kind: DiagnosticKind::UnterminatedPortal,
        span: start.span,
    });
    for index in buffered.drain(..) {
        push_outlet(text, tokens, index, result);
    }
}

fn portal_block(text: &str, start: Span, end: Span) -> PortalBlock {
    let content = &text[start.end..end.start];
    let label = parse_start_tag(text, start.end, end.start)
        .map(|tag| Label::from_attribute(attribute_value(tag.attributes, PORTAL_ATTRIBUTE)))
        .unwrap_or(Label::Unlabeled);

    PortalBlock {
        label,
        raw_content: content.trim().to_string(),
        span: Span::new(start.start, end.end),
    }
}

fn push_outlet(text: &str, tokens: &[Token], index: usize, result: &mut ScanResult) {
    let sentinel = tokens[index].span;
    // The qualifying element may not reach into the next sentinel.
    let limit = tokens
        .get(index + 1)
        .map(|next| next.span.start)
        .unwrap_or(text.len());

    let Some(tag) = parse_start_tag(text, sentinel.end, limit) else {
        result.outlets.push(OutletMarker {
            label: Label::Unlabeled,
            span: sentinel,
        });
        return;
    };

    let Some(value) = attribute_value(tag.attributes, OUTLET_ATTRIBUTE) else {
        result.outlets.push(OutletMarker {
            label: Label::Unlabeled,
            span: sentinel,
        });
        return;
    };

    let end = match element_end(text, &tag, limit) {
        Some(end) => end,
        None => {
            result.diagnostics.push(Diagnostic {
                kind: DiagnosticKind::UnclosedOutletElement,
                span: Span::new(sentinel.start, tag.end),
            });
            tag.end
        }
    };

    result.outlets.push(OutletMarker {
        label: Label::from_attribute(Some(value)),
        span: Span::new(sentinel.start, end),
    });
}

/// Parses the start tag beginning at `pos` after optional whitespace, without reading past `limit`.
fn parse_start_tag(text: &str, pos: usize, limit: usize) -> Option<StartTag<'_>> {
    let region = text.get(pos..limit)?;
    let offset = pos + (region.len() - region.trim_start().len());
    let rest = &text[offset..limit];

    let mut chars = rest.char_indices();
    if chars.next()?.1 != '<' {
        return None;
    }
    if !chars.next()?.1.is_ascii_alphabetic() {
        return None;
    }

    let name_len = rest[1..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '_'))
        .unwrap_or(rest.len() - 1);
    let name = &rest[1..1 + name_len];

    let mut quote: Option<char> = None;
    for (i, c) in rest.char_indices().skip(1 + name_len) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => {
                let attributes = &rest[1 + name_len..i];
                return Some(StartTag {
                    name,
                    attributes,
                    end: offset + i + 1,
                    self_closing: attributes.trim_end().ends_with('/'),
                });
            }
            (None, _) => {}
        }
    }
    None
}

/// Reads attribute `name` from a start tag's attribute text. Attributes are
/// walked one by one, so text inside another attribute's quoted value never matches.
/// A bare attribute without `=` has no value.
fn attribute_value<'a>(attributes: &'a str, name: &str) -> Option<&'a str> {
    let bytes = attributes.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        while i < len && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < len && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'/') {
            i += 1;
        }
        let current = &attributes[name_start..i];

        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let value = match bytes.get(i) {
            Some(&quote @ (b'"' | b'\'')) => {
                let start = i + 1;
                let end = attributes[start..]
                    .find(quote as char)
                    .map_or(len, |offset| start + offset);
                i = (end + 1).min(len);
                &attributes[start..end]
            }
            Some(_) => {
                let start = i;
                while i < len && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                &attributes[start..i]
            }
            None => "",
        };

        if current.eq_ignore_ascii_case(name) {
            return Some(value);
        }
    }
    None
}

/// Finds the end of the element opened by `tag`, counting nested elements of the same name.
fn element_end(text: &str, tag: &StartTag<'_>, limit: usize) -> Option<usize> {
    if tag.self_closing
        || VOID_ELEMENTS
            .iter()
            .any(|void| void.eq_ignore_ascii_case(tag.name))
    {
        return Some(tag.end);
    }

    let mut depth = 1usize;
    let mut cursor = tag.end;
    while cursor < limit {
        let next = cursor + text[cursor..limit].find('<')?;
        let after = &text[next + 1..limit];

        if let Some(closing) = after.strip_prefix('/') {
            if starts_with_name(closing, tag.name) {
                let tail = &closing[tag.name.len()..];
                let trimmed = tail.trim_start();
                if trimmed.starts_with('>') {
                    depth -= 1;
                    let close_end = next + 2 + tag.name.len() + (tail.len() - trimmed.len()) + 1;
                    if depth == 0 {
                        return Some(close_end);
                    }
                    cursor = close_end;
                    continue;
                }
            }
        } else if starts_with_name(after, tag.name) {
            if let Some(inner) = parse_start_tag(text, next, limit) {
                if inner.name.eq_ignore_ascii_case(tag.name) && !inner.self_closing {
                    depth += 1;
                }
                cursor = inner.end;
                continue;
            }
        }
        cursor = next + 1;
    }
    None
}

fn starts_with_name(text: &str, name: &str) -> bool {
    let Some(candidate) = text.get(..name.len()) else {
        return false;
    };
    if !candidate.eq_ignore_ascii_case(name) {
        return false;
    }
    // `<div` must not match `<divider`.
    !text[name.len()..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels_of_portals(result: &ScanResult) -> Vec<Label> {
        result.portals.iter().map(|p| p.label.clone()).collect()
    }

    #[test]
    fn test_scan_without_markers_is_empty() {
        let result = scan("<html><body><p>plain</p></body></html>");
        assert!(result.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_scan_unlabeled_portal_and_outlet() {
        let text = format!("<main>{}<p>Hi</p>{}</main><footer>{}</footer>", PORTAL_START, PORTAL_END, OUTLET);
        let result = scan(&text);

        assert_eq!(result.portals.len(), 1);
        assert_eq!(result.portals[0].label, Label::Unlabeled);
        assert_eq!(result.portals[0].raw_content, "<p>Hi</p>");
        assert_eq!(&text[result.portals[0].span.range()], format!("{}<p>Hi</p>{}", PORTAL_START, PORTAL_END));

        assert_eq!(result.outlets.len(), 1);
        assert_eq!(result.outlets[0].label, Label::Unlabeled);
        assert_eq!(&text[result.outlets[0].span.range()], OUTLET);
    }

    #[test]
    fn test_scan_labeled_markers() {
        let text = concat!(
            "<!--__ASTRO_PORTAL__START__-->\n  <div data-portal=\"nav\">LINKS</div>\n<!--__ASTRO_PORTAL__END__-->",
            "<header><!--__ASTRO_PORTAL_OUTLET__--> <nav data-outlet='nav'><span>old</span></nav></header>"
        );
        let result = scan(text);

        assert_eq!(labels_of_portals(&result), vec![Label::named("nav")]);
        assert_eq!(result.portals[0].raw_content, "<div data-portal=\"nav\">LINKS</div>");
        assert_eq!(result.outlets[0].label, Label::named("nav"));
        assert!(text[result.outlets[0].span.range()].ends_with("</nav>"));
    }

    #[test]
    fn test_scan_accepts_short_sentinels() {
        let text = r#"<!--__ASTRO_PORTAL__START--><div data-portal="nav">LINKS</div><!--__ASTRO_PORTAL__END--><!--__ASTRO_PORTAL_OUTLET--><div data-outlet="nav"></div>"#;
        let result = scan(text);

        assert_eq!(labels_of_portals(&result), vec![Label::named("nav")]);
        assert_eq!(result.outlets.len(), 1);
        assert_eq!(result.outlets[0].label, Label::named("nav"));
        assert_eq!(result.outlets[0].span.end, text.len());
    }

    #[test]
    fn test_scan_is_non_greedy() {
        let text = format!(
            "{s}A{e}<p>between</p>{s}B{e}",
            s = PORTAL_START,
            e = PORTAL_END
        );
        let result = scan(&text);
        let contents: Vec<&str> = result.portals.iter().map(|p| p.raw_content.as_str()).collect();
        assert_eq!(contents, vec!["A", "B"]);
    }

    #[test]
    fn test_only_immediately_following_element_labels() {
        let text = format!("{}text first <div data-portal=\"late\">x</div>{}", PORTAL_START, PORTAL_END);
        let result = scan(&text);
        assert_eq!(result.portals[0].label, Label::Unlabeled);
    }

    #[test]
    fn test_outlet_element_without_attribute_is_not_consumed() {
        let text = format!("{}<div class=\"x\"></div>", OUTLET);
        let result = scan(&text);
        assert_eq!(result.outlets[0].label, Label::Unlabeled);
        assert_eq!(result.outlets[0].span, Span::new(0, OUTLET.len()));
    }

    #[test]
    fn test_outlet_element_nesting_and_void_elements() {
        let text = format!(
            "{o}<div data-outlet=\"a\"><div>inner</div></div><p>after</p>{o}<img data-outlet=b>rest",
            o = OUTLET
        );
        let result = scan(&text);
        assert_eq!(result.outlets.len(), 2);
        assert!(text[result.outlets[0].span.range()].ends_with("<div>inner</div></div>"));
        assert_eq!(result.outlets[1].label, Label::named("b"));
        assert!(text[result.outlets[1].span.range()].ends_with("<img data-outlet=b>"));
    }

    #[test]
    fn test_unclosed_outlet_element_is_reported() {
        let text = format!("{}<section data-outlet=\"x\"><p>never closed", OUTLET);
        let result = scan(&text);
        assert_eq!(result.outlets[0].label, Label::named("x"));
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnclosedOutletElement);
        assert!(text[result.outlets[0].span.range()].ends_with("data-outlet=\"x\">"));
    }

    #[test]
    fn test_unterminated_portal_is_left_alone() {
        let text = format!("{}dangling {}", PORTAL_START, OUTLET);
        let result = scan(&text);
        assert!(result.portals.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnterminatedPortal);
        // The outlet was only provisionally inside the portal.
        assert_eq!(result.outlets.len(), 1);
    }

    #[test]
    fn test_outlet_inside_portal_is_content() {
        let text = format!("{}<p>{}</p>{}", PORTAL_START, OUTLET, PORTAL_END);
        let result = scan(&text);
        assert_eq!(result.portals.len(), 1);
        assert!(result.outlets.is_empty());
        assert!(result.portals[0].raw_content.contains(OUTLET));
    }

    #[test]
    fn test_superseded_start_and_stray_end() {
        let text = format!("{s}a{s}b{e}{e}", s = PORTAL_START, e = PORTAL_END);
        let result = scan(&text);
        assert_eq!(result.portals.len(), 1);
        assert_eq!(result.portals[0].raw_content, "b");
        let kinds: Vec<DiagnosticKind> = result.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::UnterminatedPortal, DiagnosticKind::StrayPortalEnd]
        );
    }

    #[test]
    fn test_attribute_inside_another_value_is_ignored() {
        let text = format!(
            "{}<div title=\" data-outlet=x\" data-outlet=\"nav\"></div>",
            OUTLET
        );
        let result = scan(&text);
        assert_eq!(result.outlets[0].label, Label::named("nav"));

        let text = format!(
            "{}<b alt='data-portal=\"x\"' data-portal=side>S</b>{}",
            PORTAL_START, PORTAL_END
        );
        assert_eq!(labels_of_portals(&scan(&text)), vec![Label::named("side")]);
    }

    #[test]
    fn test_attribute_value_forms() {
        assert_eq!(attribute_value(r#" class="a" data-outlet="nav""#, OUTLET_ATTRIBUTE), Some("nav"));
        assert_eq!(attribute_value(" data-outlet='nav'", OUTLET_ATTRIBUTE), Some("nav"));
        assert_eq!(attribute_value(" DATA-OUTLET = nav /", OUTLET_ATTRIBUTE), Some("nav"));
        assert_eq!(attribute_value(r#" data-outlet="""#, OUTLET_ATTRIBUTE), Some(""));
        assert_eq!(attribute_value(" hidden data-outlet", OUTLET_ATTRIBUTE), None);
        assert_eq!(attribute_value(" data-outlets=\"nav\"", OUTLET_ATTRIBUTE), None);
    }

    #[test]
    fn test_scan_is_deterministic() {
        let text = format!("{s}<i data-portal=\"x\">1</i>{e}{o}<b data-outlet=\"x\"></b>", s = PORTAL_START, e = PORTAL_END, o = OUTLET);
        assert_eq!(scan(&text), scan(&text));
    }
}
