use maud::{Markup, html};
use regex::Regex;

use crate::search::ResultPage;

pub const UNAVAILABLE_MESSAGE: &str = "Search is currently unavailable.";
pub const NO_RESULTS_MESSAGE: &str = "No posts found.";

/// HTML for the `#search-results` region.
pub fn render_results(page: &ResultPage<'_>) -> String {
    if page.shown.is_empty() {
        return html! { div class="no-results" { (NO_RESULTS_MESSAGE) } }.into_string();
    }

    let highlighter = Highlighter::new(page.query.terms());
    let markup: Markup = html! {
        ul {
            @for post in &page.shown {
                li {
                    a href=(post.url) {
                        span class="title" { (highlighter.mark(&post.title)) }
                        @if let Some(summary) = &post.summary {
                            span class="summary" { (highlighter.mark(summary)) }
                        }
                    }
                }
            }
        }
        @if page.remaining > 0 {
            div class="more-results" {
                (page.remaining)
                @if page.remaining == 1 { " more result not shown" } @else { " more results not shown" }
            }
        }
    };
    markup.into_string()
}

pub fn render_unavailable() -> String {
    html! { div class="no-results" { (UNAVAILABLE_MESSAGE) } }.into_string()
}

/// Plain-text rendering for terminals.
pub fn render_results_text(page: &ResultPage<'_>) -> String {
    if page.shown.is_empty() {
        return format!("{NO_RESULTS_MESSAGE}\n");
    }
    let mut out = String::new();
    for post in &page.shown {
        out.push_str(&format!("{}  {}\n", post.title, post.url));
        if let Some(summary) = &post.summary {
            out.push_str(&format!("    {summary}\n"));
        }
    }
    if page.remaining > 0 {
        out.push_str(&format!("... {} more\n", page.remaining));
    }
    out
}

enum Segment<'a> {
    Plain(&'a str),
    Hit(&'a str),
}

/// Wraps case-insensitive occurrences of the query terms in `<mark>`, keeping
/// the original casing of the text.
///
/// Text is lower-cased exactly as the search filter lower-cases it before
/// matching, so every post that matched gets its marks even where lowering
/// changes the length (`İ` becomes `i̇`).
pub struct Highlighter {
    pattern: Option<Regex>,
}

impl Highlighter {
    pub fn new(terms: &[String]) -> Self {
        let mut terms: Vec<String> = terms
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Self { pattern: None };
        }
        // longest first so overlapping terms mark the widest span
        terms.sort_by_key(|t| std::cmp::Reverse(t.len()));
        terms.dedup();

        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = match Regex::new(&alternation) {
            Ok(re) => Some(re),
            Err(err) => {
                tracing::warn!(error = %err, "highlight pattern rejected; rendering without marks");
                None
            }
        };
        Self { pattern }
    }

    pub fn mark(&self, text: &str) -> Markup {
        let segments = self.split(text);
        html! {
            @for segment in &segments {
                @match segment {
                    Segment::Plain(s) => { (s) }
                    Segment::Hit(s) => { mark { (s) } }
                }
            }
        }
    }

    fn split<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let Some(re) = &self.pattern else {
            return vec![Segment::Plain(text)];
        };
        let lowered = text.to_lowercase();
        // byte of `lowered` -> byte range of the source char it came from
        let mut origin = Vec::with_capacity(lowered.len());
        for (i, c) in text.char_indices() {
            let width: usize = c.to_lowercase().map(char::len_utf8).sum();
            origin.extend(std::iter::repeat_n((i, i + c.len_utf8()), width));
        }
        if origin.len() != lowered.len() {
            return vec![Segment::Plain(text)];
        }

        let mut out = Vec::new();
        let mut last = 0;
        for m in re.find_iter(&lowered) {
            let start = origin[m.start()].0;
            let end = origin[m.end() - 1].1;
            // starts inside a source char the previous hit already covers
            if start < last {
                continue;
            }
            if start > last {
                out.push(Segment::Plain(&text[last..start]));
            }
            out.push(Segment::Hit(&text[start..end]));
            last = end;
        }
        if last < text.len() {
            out.push(Segment::Plain(&text[last..]));
        }
        out
    }
}
