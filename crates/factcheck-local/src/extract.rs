//! HTML body extraction: strip boilerplate, return deterministic plain text.
//!
//! Not a full readability engine — "good enough" main-content extraction for
//! feeding article bodies into `ArticleIndexCache`.

use std::io::Cursor;

fn strip_block(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open_pat = format!("<{tag}");
    let close_pat = format!("</{tag}");
    let mut out = String::with_capacity(html.len());
    let mut i = 0usize;
    while i < html.len() {
        let Some(start_rel) = lower[i..].find(&open_pat) else {
            out.push_str(&html[i..]);
            break;
        };
        let start = i + start_rel;
        out.push_str(&html[i..start]);
        let Some(close_rel) = lower[start..].find(&close_pat) else {
            break;
        };
        let close_start = start + close_rel;
        let Some(gt_rel) = lower[close_start..].find('>') else {
            break;
        };
        i = close_start + gt_rel + 1;
    }
    out
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

/// Convert HTML to readable plain text using `html2text`, after stripping
/// script/style blocks so their content never leaks into the output.
pub fn html_to_text(html: &str, width: usize) -> String {
    let s = strip_block(html, "script");
    let s = strip_block(&s, "style");
    let out = html2text::from_read(Cursor::new(s.as_bytes()), width).unwrap_or(s);
    if !has_any_text(&out) {
        String::new()
    } else {
        out
    }
}

fn class_or_id_lc(el: &html_scraper::ElementRef) -> String {
    let mut s = String::new();
    if let Some(c) = el.value().attr("class") {
        s.push_str(c);
        s.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        s.push_str(i);
    }
    s.to_ascii_lowercase()
}

const BOILERPLATE_HINTS: &[&str] = &[
    "nav", "footer", "header", "sidebar", "menu", "advert", "ads-", "cookie", "subscribe",
    "newsletter", "comment", "social", "share", "related", "promo", "banner", "breadcrumb",
];

fn is_boilerplate_container(el: &html_scraper::ElementRef) -> bool {
    let tag = el.value().name();
    if matches!(tag, "nav" | "footer" | "header" | "aside") {
        return true;
    }
    let hint = class_or_id_lc(el);
    BOILERPLATE_HINTS.iter().any(|h| hint.contains(h))
}

fn element_text_chars(el: &html_scraper::ElementRef) -> usize {
    el.text().map(|t| t.chars().count()).sum()
}

/// Pick the main-content subtree by scoring `<article>`/`<main>`/`<section>`/
/// `<div>` candidates on text density, after excluding boilerplate containers
/// by tag name and class/id hints. Returns `None` if nothing scores above a
/// minimal bar, letting the caller fall back to whole-document extraction.
pub fn html_main_to_text(html: &str, width: usize) -> Option<String> {
    let doc = html_scraper::Html::parse_document(html);
    let selector = html_scraper::Selector::parse("article, main, section, div").ok()?;
    let mut best: Option<(usize, String)> = None;
    for el in doc.select(&selector) {
        if is_boilerplate_container(&el) {
            continue;
        }
        let chars = element_text_chars(&el);
        if chars < 200 {
            continue;
        }
        if best.as_ref().map(|(n, _)| chars > *n).unwrap_or(true) {
            best = Some((chars, el.html()));
        }
    }
    let (_, fragment_html) = best?;
    let text = html_to_text(&fragment_html, width);
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Normalize line endings and strip control characters so extracted text is
/// safe for downstream JSON/logging.
pub fn clean_extracted_text(mut s: String) -> String {
    s = s.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == '\u{FEFF}' {
            continue;
        }
        if ch == '\u{000C}' {
            out.push('\n');
            continue;
        }
        if (ch <= '\u{001F}' && ch != '\n' && ch != '\t') || ch == '\u{007F}' {
            out.push(' ');
            continue;
        }
        out.push(ch);
    }
    out
}

/// Best-effort article body extraction: try main-content detection first,
/// fall back to whole-page text.
pub fn extract_article_body(html: &str) -> String {
    let text = html_main_to_text(html, 100).unwrap_or_else(|| html_to_text(html, 100));
    clean_extracted_text(text).trim().to_string()
}
