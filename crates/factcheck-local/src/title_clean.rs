//! Title cleaning for search-result titles (§4.3 Stage B).
//!
//! Grounded in `clean_news_title` from the original fact-checking service:
//! strip bracketed/parenthesized/braced tags, HTML tags, a configurable list
//! of media-brand keywords, and punctuation separators, then collapse
//! whitespace. The brand list is generalized (not hardcoded to one
//! language) since this system is not scoped to a single source language.

const DEFAULT_BRAND_KEYWORDS: &[&str] = &[
    "중앙일보",
    "경향신문",
    "문화일보",
    "조선일보",
    "동아일보",
    "한겨레",
];

#[derive(Debug, Clone)]
pub struct TitleCleaner {
    brand_keywords: Vec<String>,
}

impl Default for TitleCleaner {
    fn default() -> Self {
        Self {
            brand_keywords: DEFAULT_BRAND_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TitleCleaner {
    pub fn new(brand_keywords: Vec<String>) -> Self {
        Self { brand_keywords }
    }

    fn strip_delimited(s: &str, open: char, close: char) -> String {
        let mut out = String::with_capacity(s.len());
        let mut depth = 0i32;
        for ch in s.chars() {
            if ch == open {
                depth += 1;
                continue;
            }
            if ch == close {
                if depth > 0 {
                    depth -= 1;
                }
                continue;
            }
            if depth == 0 {
                out.push(ch);
            }
        }
        out
    }

    fn strip_html_tags(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut in_tag = false;
        for ch in s.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => out.push(ch),
                _ => {}
            }
        }
        out
    }

    pub fn clean(&self, raw_title: &str) -> String {
        let mut s = raw_title.to_string();
        s = Self::strip_delimited(&s, '[', ']');
        s = Self::strip_delimited(&s, '(', ')');
        s = Self::strip_delimited(&s, '{', '}');
        s = Self::strip_html_tags(&s);

        for brand in &self.brand_keywords {
            s = s.replace(brand.as_str(), " ");
        }

        s = s.replace(['|', ':', '_', '-', '+', '=', '/', '\\'], " ");

        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
